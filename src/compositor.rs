//! Per-frame driver: poll the file transport, follow the latest accepted event
//! through the fade timeline and draw the cached bar when it is visible.

use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::{
    config::OverlayConfig,
    error::InfobarResult,
    fade::{FadePhase, FadeTimeline},
    present::{PresentBackend, QuadDraw},
    render::{BarPlacement, RenderCache, ScreenSize, SurfacePainter},
    transport::{EventSlot, FileWatcher},
};

/// What one frame did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameOutcome {
    /// Nothing visible; a cleared frame was presented.
    Idle,
    /// The bar was drawn at `opacity`.
    Drawn { phase: FadePhase, opacity: f32 },
    /// The fade says visible, but no surface is available for the event
    /// (its paint or upload failed, or the screen has no room for the bar).
    Suppressed { phase: FadePhase },
}

pub struct Compositor<P, B: PresentBackend> {
    config: OverlayConfig,
    slot: EventSlot,
    watcher: FileWatcher,
    timeline: FadeTimeline,
    seen_generation: u64,
    placement: BarPlacement,
    cache: RenderCache<P, B::Texture>,
    backend: B,
}

impl<P: SurfacePainter, B: PresentBackend> Compositor<P, B> {
    pub fn new(
        config: OverlayConfig,
        slot: EventSlot,
        painter: P,
        backend: B,
        screen: ScreenSize,
    ) -> Self {
        let watcher = FileWatcher::new(config.event_file.clone());
        let timeline = FadeTimeline::new(config.fade);
        let placement = BarPlacement::compute(screen, &config.layout);
        tracing::info!(
            width = screen.width,
            height = screen.height,
            bar_y = placement.rect.y,
            bar_h = placement.rect.height,
            event_file = %config.event_file.display(),
            "compositor ready"
        );
        Self {
            config,
            slot,
            watcher,
            timeline,
            seen_generation: 0,
            placement,
            cache: RenderCache::new(painter),
            backend,
        }
    }

    pub fn slot(&self) -> &EventSlot {
        &self.slot
    }

    pub fn placement(&self) -> &BarPlacement {
        &self.placement
    }

    pub fn cache(&self) -> &RenderCache<P, B::Texture> {
        &self.cache
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Recompute placement for a new screen size and drop the cached surface.
    pub fn resize(&mut self, screen: ScreenSize) {
        if screen == self.placement.screen {
            return;
        }
        self.placement = BarPlacement::compute(screen, &self.config.layout);
        self.cache.invalidate();
        self.backend.resize(screen);
        tracing::debug!(width = screen.width, height = screen.height, "compositor resized");
    }

    /// Run one frame. `now` drives the fade; `wall` feeds the remaining-time
    /// text when the bar has to be repainted.
    pub fn tick(&mut self, now: Instant, wall: DateTime<Utc>) -> InfobarResult<FrameOutcome> {
        if let Some(event) = self.watcher.poll() {
            self.slot.accept_at(event, now);
        }

        let latest = self.slot.latest();
        if let Some(accepted) = &latest
            && accepted.generation != self.seen_generation
        {
            self.seen_generation = accepted.generation;
            self.timeline.restart(accepted.accepted_at);
        }

        let sample = self.timeline.sample(now);
        let Some(accepted) = latest.filter(|_| sample.is_visible()) else {
            self.backend.present(None)?;
            return Ok(FrameOutcome::Idle);
        };
        if self.placement.is_degenerate() {
            self.backend.present(None)?;
            return Ok(FrameOutcome::Suppressed {
                phase: sample.phase,
            });
        }

        let surface = self.cache.ensure_surface(
            &accepted.event,
            &self.placement.metrics,
            wall,
            &mut self.backend,
        )?;
        match surface {
            Some(surface) => {
                self.backend.present(Some(QuadDraw {
                    texture: &surface.texture,
                    rect: self.placement.rect,
                    screen: self.placement.screen,
                    opacity: sample.opacity,
                }))?;
                Ok(FrameOutcome::Drawn {
                    phase: sample.phase,
                    opacity: sample.opacity,
                })
            }
            None => {
                self.backend.present(None)?;
                Ok(FrameOutcome::Suppressed {
                    phase: sample.phase,
                })
            }
        }
    }
}
