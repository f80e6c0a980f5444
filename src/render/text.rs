//! Font resolution and single-line text layout.

use std::{borrow::Cow, path::Path, sync::Arc};

use crate::{
    config::FontConfig,
    error::{InfobarError, InfobarResult},
};

/// RGBA8 brush carried through Parley layouts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrush {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TextBrush {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FontWeight {
    Regular,
    Bold,
}

/// One loaded font face: raw bytes for Parley, the same bytes for glyph
/// drawing.
#[derive(Clone)]
pub struct FontFace {
    pub bytes: Arc<Vec<u8>>,
    pub index: u32,
    pub font: vello_cpu::peniko::FontData,
}

impl FontFace {
    pub fn from_bytes(bytes: Vec<u8>, index: u32) -> Self {
        let bytes = Arc::new(bytes);
        let font = vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(bytes.as_ref().clone()),
            index,
        );
        Self { bytes, index, font }
    }

    fn from_file(path: &Path) -> InfobarResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            InfobarError::config(format!("read font '{}': {e}", path.display()))
        })?;
        Ok(Self::from_bytes(bytes, 0))
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontFace")
            .field("bytes_len", &self.bytes.len())
            .field("index", &self.index)
            .finish()
    }
}

/// Regular and bold faces used by the bar. Bold falls back to regular.
#[derive(Clone, Debug)]
pub struct FontSet {
    pub regular: FontFace,
    pub bold: FontFace,
}

impl FontSet {
    /// Explicit paths first, then the system font database by family, then any
    /// sans-serif face.
    pub fn resolve(cfg: &FontConfig) -> InfobarResult<Self> {
        let needs_db = cfg.regular_path.is_none() || cfg.bold_path.is_none();
        let db = needs_db.then(system_fontdb);

        let regular = match &cfg.regular_path {
            Some(path) => FontFace::from_file(path)?,
            None => db
                .as_ref()
                .and_then(|db| query_face(db, &cfg.family, usvg::fontdb::Weight::NORMAL))
                .ok_or_else(|| {
                    InfobarError::config(format!(
                        "no usable font found (family '{}' or any sans-serif)",
                        cfg.family
                    ))
                })?,
        };

        let bold = match &cfg.bold_path {
            Some(path) => FontFace::from_file(path)?,
            None => db
                .as_ref()
                .and_then(|db| query_face(db, &cfg.family, usvg::fontdb::Weight::BOLD))
                .unwrap_or_else(|| {
                    tracing::info!("no bold face found, using regular for bold text");
                    regular.clone()
                }),
        };

        Ok(Self { regular, bold })
    }

    pub fn face(&self, weight: FontWeight) -> &FontFace {
        match weight {
            FontWeight::Regular => &self.regular,
            FontWeight::Bold => &self.bold,
        }
    }
}

fn system_fontdb() -> usvg::fontdb::Database {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    tracing::debug!(faces = db.len(), "loaded system fonts");
    db
}

fn query_face(
    db: &usvg::fontdb::Database,
    family: &str,
    weight: usvg::fontdb::Weight,
) -> Option<FontFace> {
    let mut families = Vec::with_capacity(2);
    if !family.trim().is_empty() {
        families.push(usvg::fontdb::Family::Name(family));
    }
    families.push(usvg::fontdb::Family::SansSerif);

    let id = db.query(&usvg::fontdb::Query {
        families: &families,
        weight,
        ..Default::default()
    })?;
    db.with_face_data(id, |data, index| FontFace::from_bytes(data.to_vec(), index))
}

/// A shaped line plus the face it was shaped with.
pub struct TextLine {
    pub layout: parley::Layout<TextBrush>,
    pub font: vello_cpu::peniko::FontData,
}

impl TextLine {
    pub fn width(&self) -> f32 {
        self.layout.width()
    }

    pub fn height(&self) -> f32 {
        self.layout.height()
    }
}

/// Parley contexts with the bar's two faces registered once.
pub struct TextEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    fonts: FontSet,
    regular_family: String,
    bold_family: String,
}

impl TextEngine {
    pub fn new(fonts: FontSet) -> InfobarResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let regular_family = register(&mut font_ctx, &fonts.regular)?;
        let bold_family = if Arc::ptr_eq(&fonts.regular.bytes, &fonts.bold.bytes) {
            regular_family.clone()
        } else {
            register(&mut font_ctx, &fonts.bold)?
        };
        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            fonts,
            regular_family,
            bold_family,
        })
    }

    /// Shape `text` on one unbroken line.
    pub fn line(
        &mut self,
        text: &str,
        weight: FontWeight,
        size_px: f32,
        brush: TextBrush,
    ) -> InfobarResult<TextLine> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(InfobarError::render("text size must be finite and > 0"));
        }
        let (family, parley_weight) = match weight {
            FontWeight::Regular => (&self.regular_family, parley::style::FontWeight::NORMAL),
            FontWeight::Bold => (&self.bold_family, parley::style::FontWeight::BOLD),
        };

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(family.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontWeight(parley_weight));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(None);

        Ok(TextLine {
            layout,
            font: self.fonts.face(weight).font.clone(),
        })
    }
}

fn register(font_ctx: &mut parley::FontContext, face: &FontFace) -> InfobarResult<String> {
    let families = font_ctx.collection.register_fonts(
        parley::fontique::Blob::from(face.bytes.as_ref().clone()),
        None,
    );
    let family_id = families
        .first()
        .map(|(id, _)| *id)
        .ok_or_else(|| InfobarError::render("no font families registered from font bytes"))?;
    let name = font_ctx
        .collection
        .family_name(family_id)
        .ok_or_else(|| InfobarError::render("registered font family has no name"))?;
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn system_fonts() -> Option<FontSet> {
        FontSet::resolve(&FontConfig::default()).ok()
    }

    #[test]
    fn missing_explicit_font_file_is_a_config_error() {
        let cfg = FontConfig {
            regular_path: Some("/definitely/not/here.ttf".into()),
            bold_path: Some("/definitely/not/here-bold.ttf".into()),
            ..FontConfig::default()
        };
        let err = FontSet::resolve(&cfg).unwrap_err();
        assert!(err.to_string().starts_with("config error:"));
    }

    #[test]
    fn wider_text_lays_out_wider() {
        let Some(fonts) = system_fonts() else {
            eprintln!("skipping: no system font available");
            return;
        };
        let mut engine = TextEngine::new(fonts).unwrap();
        let white = TextBrush::rgba(255, 255, 255, 255);
        let short = engine.line("Hi", FontWeight::Regular, 20.0, white).unwrap();
        let long = engine
            .line("Hi there, a longer line", FontWeight::Regular, 20.0, white)
            .unwrap();
        assert!(long.width() > short.width());
        assert!(short.height() > 0.0);
    }

    #[test]
    fn bigger_size_is_taller() {
        let Some(fonts) = system_fonts() else {
            eprintln!("skipping: no system font available");
            return;
        };
        let mut engine = TextEngine::new(fonts).unwrap();
        let brush = TextBrush::default();
        let small = engine.line("Title", FontWeight::Bold, 14.0, brush).unwrap();
        let big = engine.line("Title", FontWeight::Bold, 34.0, brush).unwrap();
        assert!(big.height() > small.height());
    }

    #[test]
    fn invalid_size_is_rejected() {
        let Some(fonts) = system_fonts() else {
            eprintln!("skipping: no system font available");
            return;
        };
        let mut engine = TextEngine::new(fonts).unwrap();
        assert!(
            engine
                .line("x", FontWeight::Regular, 0.0, TextBrush::default())
                .is_err()
        );
    }
}
