//! Infobar image production: layout metrics, text shaping, CPU painting and
//! the key-based render cache.

pub mod cache;
pub mod cpu;
pub mod layout;
pub mod text;

use chrono::{DateTime, Utc};

use crate::{
    error::{InfobarError, InfobarResult},
    event::ChannelEvent,
};

pub use cache::{CacheKey, RenderCache, RenderedSurface};
pub use cpu::InfobarPainter;
pub use layout::{BarMetrics, BarPlacement, PixelRect, SafeArea, ScreenSize};

/// Owned straight-alpha RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8: Vec<u8>,
}

impl RenderedImage {
    pub fn new(width: u32, height: u32, rgba8: Vec<u8>) -> InfobarResult<Self> {
        if rgba8.len() != width as usize * height as usize * 4 {
            return Err(InfobarError::render(format!(
                "image buffer is {} bytes, expected {width}x{height}x4",
                rgba8.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8,
        })
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.rgba8.get(i..i + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Produces the bar image for an event.
pub trait SurfacePainter {
    /// `now` is the wall clock used for the remaining-time readout.
    fn paint(
        &mut self,
        event: &ChannelEvent,
        metrics: &BarMetrics,
        now: DateTime<Utc>,
    ) -> InfobarResult<RenderedImage>;
}

impl<P: SurfacePainter + ?Sized> SurfacePainter for Box<P> {
    fn paint(
        &mut self,
        event: &ChannelEvent,
        metrics: &BarMetrics,
        now: DateTime<Utc>,
    ) -> InfobarResult<RenderedImage> {
        (**self).paint(event, metrics, now)
    }
}
