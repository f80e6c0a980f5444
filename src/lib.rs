#![forbid(unsafe_code)]

pub mod compositor;
pub mod config;
pub mod error;
pub mod event;
pub mod fade;
pub mod hook;
pub mod present;
pub mod render;
pub mod transport;

pub use compositor::{Compositor, FrameOutcome};
pub use config::OverlayConfig;
pub use error::{InfobarError, InfobarResult};
pub use event::ChannelEvent;
pub use fade::{FadePhase, FadeSample, FadeTimeline, FadeTiming};
pub use hook::{InfobarHook, extract_now_playing};
pub use present::{PresentBackend, QuadDraw};
pub use render::{
    BarMetrics, BarPlacement, CacheKey, InfobarPainter, PixelRect, RenderCache, RenderedImage,
    RenderedSurface, ScreenSize, SurfacePainter,
};
pub use transport::{
    AcceptedEvent, EventSlot, FileWatcher, InfobarNotifier, NowPlaying, UdpListener,
};

#[cfg(feature = "gpu")]
pub use present::window::run_overlay;
