//! Presentation seam between the compositor and a display.

#[cfg(feature = "gpu")]
pub mod gpu;
#[cfg(feature = "gpu")]
pub mod window;

use crate::{
    error::InfobarResult,
    render::{PixelRect, RenderedImage, ScreenSize},
};

/// One textured quad for the current frame.
#[derive(Debug)]
pub struct QuadDraw<'a, T> {
    pub texture: &'a T,
    pub rect: PixelRect,
    pub screen: ScreenSize,
    /// Multiplies every pixel's alpha; always within `[0, 1]`.
    pub opacity: f32,
}

impl<T> QuadDraw<'_, T> {
    /// `[left, top, right, bottom]` in normalized device coordinates (y up).
    pub fn ndc_rect(&self) -> [f32; 4] {
        let sw = self.screen.width.max(1) as f32;
        let sh = self.screen.height.max(1) as f32;
        let x0 = self.rect.x as f32;
        let y0 = self.rect.y as f32;
        let x1 = x0 + self.rect.width as f32;
        let y1 = y0 + self.rect.height as f32;
        [
            x0 / sw * 2.0 - 1.0,
            1.0 - y0 / sh * 2.0,
            x1 / sw * 2.0 - 1.0,
            1.0 - y1 / sh * 2.0,
        ]
    }
}

/// A display that can hold one uploaded image and draw it as a quad.
pub trait PresentBackend {
    type Texture;

    fn upload(&mut self, image: &RenderedImage) -> InfobarResult<Self::Texture>;

    /// Clear to fully transparent, then draw `quad` if there is one.
    fn present(&mut self, quad: Option<QuadDraw<'_, Self::Texture>>) -> InfobarResult<()>;

    fn resize(&mut self, _screen: ScreenSize) {}
}
