//! Screen placement and scaled bar metrics.
//!
//! All sizes are derived from a design baseline (720 px wide) and scaled by the
//! safe-area width, then truncated to whole pixels.

use crate::config::LayoutConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Pixel rectangle, top-left origin, y down.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Region inset by `margin` of each dimension on every side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SafeArea {
    pub inset_x: u32,
    pub inset_y: u32,
    pub width: u32,
    pub height: u32,
}

impl SafeArea {
    pub fn of(screen: ScreenSize, margin: f32) -> Self {
        let inset_x = (screen.width as f32 * margin) as u32;
        let inset_y = (screen.height as f32 * margin) as u32;
        Self {
            inset_x,
            inset_y,
            width: screen.width.saturating_sub(inset_x * 2),
            height: screen.height.saturating_sub(inset_y * 2),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BarMetrics {
    pub scale: f32,
    pub width: u32,
    pub header_h: u32,
    pub body_h: u32,
    pub pad: u32,
    pub title_px: u32,
    pub header_px: u32,
    pub sub_px: u32,
    pub menu_px: u32,
    pub next_label_px: u32,
    pub next_px: u32,
}

impl BarMetrics {
    pub fn for_width(safe_width: u32, baseline_width: f32) -> Self {
        let scale = safe_width as f32 / baseline_width;
        let px = |base: f32| (base * scale) as u32;
        let font = |base: f32, min: u32| px(base).max(min);
        Self {
            scale,
            width: safe_width,
            header_h: px(42.0),
            body_h: px(148.0),
            pad: px(12.0),
            title_px: font(34.0, 22),
            header_px: font(22.0, 14),
            sub_px: font(18.0, 12),
            menu_px: font(16.0, 11),
            next_label_px: font(16.0, 11),
            next_px: font(20.0, 14),
        }
    }

    pub fn height(&self) -> u32 {
        self.header_h + self.body_h
    }

    /// A baseline length scaled to this bar, truncated to whole pixels.
    pub fn px(&self, base: f32) -> f32 {
        (base * self.scale).trunc()
    }
}

/// Where the bar goes on a given screen, and how big it is drawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BarPlacement {
    pub screen: ScreenSize,
    pub safe: SafeArea,
    pub metrics: BarMetrics,
    /// Quad rectangle: full safe width, flush with the bottom of the safe area.
    pub rect: PixelRect,
}

impl BarPlacement {
    pub fn compute(screen: ScreenSize, cfg: &LayoutConfig) -> Self {
        let safe = SafeArea::of(screen, cfg.safe_margin);
        let metrics = BarMetrics::for_width(safe.width, cfg.baseline_width);
        let height = metrics.height();
        let y = screen
            .height
            .saturating_sub(safe.inset_y)
            .saturating_sub(height);
        Self {
            screen,
            safe,
            metrics,
            rect: PixelRect {
                x: safe.inset_x,
                y,
                width: safe.width,
                height,
            },
        }
    }

    /// True when there is nothing to draw into (tiny or zero-sized screens).
    pub fn is_degenerate(&self) -> bool {
        self.rect.width == 0 || self.rect.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pal_screen_matches_reference_metrics() {
        let p = BarPlacement::compute(ScreenSize::new(720, 576), &LayoutConfig::default());
        assert_eq!(p.safe.inset_x, 36);
        assert_eq!(p.safe.inset_y, 28);
        assert_eq!(p.safe.width, 648);
        assert_eq!(p.metrics.header_h, 37);
        assert_eq!(p.metrics.body_h, 133);
        assert_eq!(p.metrics.pad, 10);
        assert_eq!(p.metrics.title_px, 30);
        assert_eq!(p.metrics.menu_px, 14);
        assert_eq!(
            p.rect,
            PixelRect {
                x: 36,
                y: 576 - 28 - 170,
                width: 648,
                height: 170
            }
        );
    }

    #[test]
    fn full_hd_scales_linearly() {
        let p = BarPlacement::compute(ScreenSize::new(1920, 1080), &LayoutConfig::default());
        assert_eq!(p.safe.inset_x, 96);
        assert_eq!(p.safe.inset_y, 54);
        assert_eq!(p.safe.width, 1728);
        assert!((p.metrics.scale - 2.4).abs() < 1e-6);
        assert_eq!(p.metrics.header_h, 100);
        assert_eq!(p.metrics.body_h, 355);
        assert_eq!(p.metrics.title_px, 81);
        assert_eq!(p.rect.y + p.rect.height, 1080 - 54);
    }

    #[test]
    fn small_screens_hit_font_minimums() {
        let m = BarMetrics::for_width(200, 720.0);
        assert_eq!(m.title_px, 22);
        assert_eq!(m.header_px, 14);
        assert_eq!(m.sub_px, 12);
        assert_eq!(m.menu_px, 11);
        assert_eq!(m.next_label_px, 11);
        assert_eq!(m.next_px, 14);
    }

    #[test]
    fn zero_screen_is_degenerate() {
        let p = BarPlacement::compute(ScreenSize::new(0, 0), &LayoutConfig::default());
        assert!(p.is_degenerate());
    }
}
