use std::sync::Arc;

use chrono::{DateTime, Utc};
use vello_cpu::{
    kurbo::{Affine, Rect},
    peniko::Color,
};

use crate::{
    config::{LayoutConfig, OverlayConfig},
    error::{InfobarError, InfobarResult},
    event::{ChannelEvent, format_remaining},
    render::{
        RenderedImage, SurfacePainter,
        layout::BarMetrics,
        text::{FontSet, FontWeight, TextBrush, TextEngine, TextLine},
    },
};

const HEADER: [u8; 4] = [210, 165, 92, 255];
const HEADER_TEXT: TextBrush = TextBrush::rgba(15, 15, 15, 255);
const HEADER_HIGHLIGHT: [u8; 4] = [255, 255, 255, 40];
const DIVIDER: [u8; 4] = [0, 0, 0, 120];
const BODY_RGB: [u8; 3] = [12, 68, 150];
const TITLE: TextBrush = TextBrush::rgba(255, 255, 255, 255);
const SUB: TextBrush = TextBrush::rgba(210, 230, 255, 255);
const MENU: TextBrush = TextBrush::rgba(230, 240, 255, 255);
const NEXT: TextBrush = TextBrush::rgba(255, 255, 255, 230);
const NEXT_LABEL: TextBrush = TextBrush::rgba(220, 235, 255, 255);

const HEADER_GLYPH: &str = "-:-:-";
const MENU_ITEMS: [&str; 3] = ["Information", "Search by time", "Search by channel"];
const MENU_BULLET: &str = "\u{2022}";

/// CPU painter for the bar: vello_cpu fills, Parley-shaped text and an SVG
/// info icon.
pub struct InfobarPainter {
    text: TextEngine,
    body_alpha: u8,
    icon: Option<(u32, Arc<vello_cpu::Pixmap>)>,
}

impl InfobarPainter {
    pub fn new(fonts: FontSet, layout: &LayoutConfig) -> InfobarResult<Self> {
        Ok(Self {
            text: TextEngine::new(fonts)?,
            body_alpha: layout.body_alpha,
            icon: None,
        })
    }

    /// Resolve fonts from the config and build a painter.
    pub fn from_config(cfg: &OverlayConfig) -> InfobarResult<Self> {
        let fonts = FontSet::resolve(&cfg.fonts)?;
        Self::new(fonts, &cfg.layout)
    }

    fn icon(&mut self, diameter: u32, stroke: f32) -> InfobarResult<Arc<vello_cpu::Pixmap>> {
        if let Some((d, pixmap)) = &self.icon
            && *d == diameter
        {
            return Ok(pixmap.clone());
        }
        let premul = rasterize_info_icon(diameter, stroke)?;
        let pixmap = Arc::new(premul_bytes_to_pixmap(&premul, diameter, diameter)?);
        self.icon = Some((diameter, pixmap.clone()));
        Ok(pixmap)
    }

    fn line(
        &mut self,
        text: &str,
        weight: FontWeight,
        size_px: u32,
        brush: TextBrush,
    ) -> InfobarResult<TextLine> {
        self.text.line(text, weight, size_px as f32, brush)
    }
}

impl SurfacePainter for InfobarPainter {
    #[tracing::instrument(
        skip_all,
        fields(channel = event.channel_number, width = metrics.width, height = metrics.height())
    )]
    fn paint(
        &mut self,
        event: &ChannelEvent,
        metrics: &BarMetrics,
        now: DateTime<Utc>,
    ) -> InfobarResult<RenderedImage> {
        let width = metrics.width;
        let height = metrics.height();
        let w16: u16 = width
            .try_into()
            .map_err(|_| InfobarError::render("bar width exceeds u16"))?;
        let h16: u16 = height
            .try_into()
            .map_err(|_| InfobarError::render("bar height exceeds u16"))?;
        if w16 == 0 || h16 == 0 {
            return Err(InfobarError::render(format!(
                "bar has no area ({width}x{height})"
            )));
        }

        let m = *metrics;
        let wf = f64::from(width);
        let header_h = f64::from(m.header_h);
        let total_h = f64::from(height);
        let pad = m.pad as f32;

        let mut ctx = vello_cpu::RenderContext::new(w16, h16);
        ctx.set_paint_transform(Affine::IDENTITY);

        // Header band.
        fill(&mut ctx, Rect::new(0.0, 0.0, wf, header_h), HEADER);
        fill(&mut ctx, Rect::new(0.0, 1.0, wf, 2.0), HEADER_HIGHLIGHT);
        fill(
            &mut ctx,
            Rect::new(0.0, header_h - 3.0, wf, header_h - 1.0),
            DIVIDER,
        );

        let header_y = (m.header_h as f32 * 0.18).trunc();
        let number = self.line(
            &event.channel_number.to_string(),
            FontWeight::Bold,
            m.header_px,
            HEADER_TEXT,
        )?;
        draw_line(&mut ctx, &number, pad, header_y);
        let name = self.line(&event.channel_name, FontWeight::Bold, m.header_px, HEADER_TEXT)?;
        draw_line(&mut ctx, &name, pad + number.width() + m.px(16.0), header_y);
        let glyph = self.line(HEADER_GLYPH, FontWeight::Bold, m.header_px, HEADER_TEXT)?;
        draw_line(&mut ctx, &glyph, width as f32 - glyph.width() - pad, header_y);

        // Body band.
        let [r, g, b] = BODY_RGB;
        fill(
            &mut ctx,
            Rect::new(0.0, header_h, wf, total_h),
            [r, g, b, self.body_alpha],
        );

        let title_y = m.header_h as f32 + m.px(12.0);
        let title = self.line(&event.title, FontWeight::Bold, m.title_px, TITLE)?;
        draw_line(&mut ctx, &title, pad, title_y);

        let rem_y = title_y + (m.title_px as f32 * 1.3).trunc();
        let remaining = format!("Remaining time {}", format_remaining(now, event.end));
        let remaining = self.line(&remaining, FontWeight::Regular, m.sub_px, SUB)?;
        draw_line(&mut ctx, &remaining, pad, rem_y);

        if let Some(next_title) = event.next_title.as_deref().filter(|s| !s.is_empty()) {
            let next_y = rem_y + (m.sub_px as f32 * 1.25).trunc();
            let label = self.line("Next:", FontWeight::Regular, m.next_label_px, NEXT_LABEL)?;
            draw_line(&mut ctx, &label, pad, next_y);

            let text = match event.next_start {
                Some(start) => format!("{next_title}  {}", start.format("%H:%M")),
                None => next_title.to_string(),
            };
            let next = self.line(&text, FontWeight::Bold, m.next_px, NEXT)?;
            let next_x = pad + (label.width() + 12.0 * m.scale).trunc();
            draw_line(&mut ctx, &next, next_x, next_y - m.px(2.0));
        }

        // Menu row.
        let menu_px = m.menu_px as f32;
        let menu_y = total_h as f32 - m.px(10.0) - menu_px;
        let radius = (menu_px * 0.75).trunc().max(1.0);
        let diameter = (radius * 2.0) as u32;
        let center_y = menu_y + (m.menu_px / 2) as f32;
        let stroke = m.px(2.0).max(2.0);
        let icon = self.icon(diameter, stroke)?;
        draw_pixmap(&mut ctx, icon, pad, center_y - radius);

        let gap = m.px(18.0);
        let mut x = pad + radius * 2.0 + m.px(8.0);
        for (i, item) in MENU_ITEMS.iter().enumerate() {
            if i > 0 {
                let bullet = self.line(MENU_BULLET, FontWeight::Regular, m.menu_px, MENU)?;
                draw_line(&mut ctx, &bullet, x, menu_y);
                x += bullet.width().trunc() + gap;
            }
            let label = self.line(item, FontWeight::Regular, m.menu_px, MENU)?;
            draw_line(&mut ctx, &label, x, menu_y);
            x += label.width().trunc() + gap;
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(w16, h16);
        ctx.render_to_pixmap(&mut pixmap);

        let mut rgba8 = pixmap.data_as_u8_slice().to_vec();
        unpremultiply_rgba8_in_place(&mut rgba8);
        RenderedImage::new(width, height, rgba8)
    }
}

fn fill(ctx: &mut vello_cpu::RenderContext, rect: Rect, [r, g, b, a]: [u8; 4]) {
    ctx.set_transform(Affine::IDENTITY);
    ctx.set_paint(Color::from_rgba8(r, g, b, a));
    ctx.fill_rect(&rect);
}

/// Draw a shaped line with its top-left corner at `(x, y)`.
fn draw_line(ctx: &mut vello_cpu::RenderContext, line: &TextLine, x: f32, y: f32) {
    ctx.set_transform(Affine::translate((f64::from(x), f64::from(y))));
    for layout_line in line.layout.lines() {
        for item in layout_line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let brush = run.style().brush;
            ctx.set_paint(Color::from_rgba8(brush.r, brush.g, brush.b, brush.a));
            let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(&line.font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}

fn draw_pixmap(ctx: &mut vello_cpu::RenderContext, pixmap: Arc<vello_cpu::Pixmap>, x: f32, y: f32) {
    let w = f64::from(pixmap.width());
    let h = f64::from(pixmap.height());
    ctx.set_transform(Affine::translate((f64::from(x), f64::from(y))));
    ctx.set_paint(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(pixmap),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    });
    ctx.fill_rect(&Rect::new(0.0, 0.0, w, h));
}

fn info_icon_svg(diameter: u32, stroke: f32) -> String {
    let d = diameter as f32;
    let r = d / 2.0;
    let ring = (r - stroke / 2.0).max(0.5);
    let dot = (stroke * 0.7).max(1.0);
    let stem_w = stroke.max(1.0);
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{d}" height="{d}" viewBox="0 0 {d} {d}">
<circle cx="{r}" cy="{r}" r="{ring}" fill="none" stroke="#e6f0ff" stroke-width="{stroke}"/>
<circle cx="{r}" cy="{dot_y}" r="{dot}" fill="#e6f0ff"/>
<rect x="{stem_x}" y="{stem_y}" width="{stem_w}" height="{stem_h}" fill="#e6f0ff"/>
</svg>"##,
        dot_y = r * 0.55,
        stem_x = r - stem_w / 2.0,
        stem_y = r * 0.85,
        stem_h = r * 0.75,
    )
}

fn rasterize_info_icon(diameter: u32, stroke: f32) -> InfobarResult<Vec<u8>> {
    let svg = info_icon_svg(diameter, stroke);
    let tree = usvg::Tree::from_str(&svg, &usvg::Options::default())
        .map_err(|e| InfobarError::render(format!("parse info icon svg: {e}")))?;
    rasterize_svg_to_premul_rgba8(&tree, diameter, diameter)
}

fn rasterize_svg_to_premul_rgba8(
    tree: &usvg::Tree,
    width: u32,
    height: u32,
) -> InfobarResult<Vec<u8>> {
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| InfobarError::render("failed to allocate svg pixmap"))?;

    let sx = (width as f32) / tree.size().width();
    let sy = (height as f32) / tree.size().height();
    let xform = resvg::tiny_skia::Transform::from_scale(sx, sy);

    resvg::render(tree, xform, &mut pixmap.as_mut());
    Ok(pixmap.data().to_vec())
}

fn premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> InfobarResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| InfobarError::render("image width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| InfobarError::render("image height exceeds u16"))?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(InfobarError::render("icon byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for px in rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

/// The presenter blends straight alpha.
fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
