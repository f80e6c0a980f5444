use chrono::{DateTime, Utc};

use crate::{
    error::InfobarResult,
    event::ChannelEvent,
    present::PresentBackend,
    render::{RenderedImage, SurfacePainter, layout::BarMetrics},
};

/// Visually relevant identity of an event.
///
/// `start` and the producer timestamp are left out, and times are floored to
/// whole seconds, so re-deliveries that only differ there reuse the surface.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub channel_number: i64,
    pub channel_name: String,
    pub title: String,
    pub end_s: i64,
    pub next_title: Option<String>,
    pub next_start_s: i64,
}

impl CacheKey {
    pub fn of(event: &ChannelEvent) -> Self {
        Self {
            channel_number: event.channel_number,
            channel_name: event.channel_name.clone(),
            title: event.title.clone(),
            end_s: event.end.timestamp(),
            next_title: event.next_title.clone(),
            next_start_s: event.next_start.map_or(0, |t| t.timestamp()),
        }
    }
}

/// The one live composited image and the texture uploaded from it.
#[derive(Debug)]
pub struct RenderedSurface<T> {
    pub key: CacheKey,
    pub image: RenderedImage,
    pub texture: T,
}

/// Regenerates the bar only when the [`CacheKey`] changes.
///
/// Replacing the surface drops the previous texture.
pub struct RenderCache<P, T> {
    painter: P,
    surface: Option<RenderedSurface<T>>,
    failed: Option<CacheKey>,
    regenerations: u64,
}

impl<P: SurfacePainter, T> RenderCache<P, T> {
    pub fn new(painter: P) -> Self {
        Self {
            painter,
            surface: None,
            failed: None,
            regenerations: 0,
        }
    }

    pub fn surface(&self) -> Option<&RenderedSurface<T>> {
        self.surface.as_ref()
    }

    /// Successful paint+upload cycles so far.
    pub fn regenerations(&self) -> u64 {
        self.regenerations
    }

    /// Forget the stored key and surface; the next call repaints.
    pub fn invalidate(&mut self) {
        self.surface = None;
        self.failed = None;
    }

    /// Surface for `event`, painting and uploading it if the key changed.
    ///
    /// A paint or upload failure is logged and remembered for that key, and
    /// yields `Ok(None)`. Only display-level upload failures are returned.
    pub fn ensure_surface<B>(
        &mut self,
        event: &ChannelEvent,
        metrics: &BarMetrics,
        now: DateTime<Utc>,
        backend: &mut B,
    ) -> InfobarResult<Option<&RenderedSurface<T>>>
    where
        B: PresentBackend<Texture = T>,
    {
        let key = CacheKey::of(event);
        if self.surface.as_ref().is_some_and(|s| s.key == key) {
            return Ok(self.surface.as_ref());
        }
        if self.failed.as_ref() == Some(&key) {
            return Ok(None);
        }

        let image = match self.painter.paint(event, metrics, now) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(error = %e, title = %event.title, "infobar paint failed");
                self.fail(key);
                return Ok(None);
            }
        };
        let texture = match backend.upload(&image) {
            Ok(texture) => texture,
            Err(e) if e.is_display() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "infobar texture upload failed");
                self.fail(key);
                return Ok(None);
            }
        };

        self.regenerations += 1;
        tracing::debug!(
            regenerations = self.regenerations,
            width = image.width,
            height = image.height,
            "infobar surface regenerated"
        );
        self.failed = None;
        self.surface = Some(RenderedSurface {
            key,
            image,
            texture,
        });
        Ok(self.surface.as_ref())
    }

    fn fail(&mut self, key: CacheKey) {
        self.surface = None;
        self.failed = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::InfobarError, present::QuadDraw};
    use chrono::TimeDelta;
    use serde_json::json;
    use std::{cell::Cell, rc::Rc};

    struct CountingPainter {
        calls: Rc<Cell<u32>>,
        fail_title: Option<&'static str>,
    }

    impl SurfacePainter for CountingPainter {
        fn paint(
            &mut self,
            event: &ChannelEvent,
            _metrics: &BarMetrics,
            _now: DateTime<Utc>,
        ) -> InfobarResult<RenderedImage> {
            self.calls.set(self.calls.get() + 1);
            if self.fail_title == Some(event.title.as_str()) {
                return Err(InfobarError::render("boom"));
            }
            RenderedImage::new(1, 1, vec![255; 4])
        }
    }

    /// Textures are drop-counted so replacement can be observed.
    struct Tex(Rc<Cell<u32>>);

    impl Drop for Tex {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[derive(Default)]
    struct Backend {
        uploads: u32,
        dropped: Rc<Cell<u32>>,
        fail_display: bool,
    }

    impl PresentBackend for Backend {
        type Texture = Tex;

        fn upload(&mut self, _image: &RenderedImage) -> InfobarResult<Tex> {
            if self.fail_display {
                return Err(InfobarError::display("device lost"));
            }
            self.uploads += 1;
            Ok(Tex(self.dropped.clone()))
        }

        fn present(&mut self, _quad: Option<QuadDraw<'_, Tex>>) -> InfobarResult<()> {
            Ok(())
        }
    }

    fn metrics() -> BarMetrics {
        BarMetrics::for_width(648, 720.0)
    }

    fn event(title: &str) -> ChannelEvent {
        ChannelEvent::from_json_value(&json!({
            "channel_number": 3,
            "channel_name": "TV3",
            "title": title,
            "start": "2025-08-16T20:00:00Z",
            "end": "2025-08-16T22:18:00Z"
        }))
    }

    fn new_cache(fail_title: Option<&'static str>) -> (RenderCache<CountingPainter, Tex>, Rc<Cell<u32>>) {
        let calls = Rc::new(Cell::new(0));
        let painter = CountingPainter {
            calls: calls.clone(),
            fail_title,
        };
        (RenderCache::new(painter), calls)
    }

    #[test]
    fn same_key_paints_once() {
        let (mut cache, calls) = new_cache(None);
        let mut backend = Backend::default();
        let ev = event("Movie");
        let now = ev.start;
        assert!(cache.ensure_surface(&ev, &metrics(), now, &mut backend).unwrap().is_some());
        assert!(cache.ensure_surface(&ev, &metrics(), now, &mut backend).unwrap().is_some());
        assert_eq!(calls.get(), 1);
        assert_eq!(backend.uploads, 1);
        assert_eq!(cache.regenerations(), 1);
    }

    #[test]
    fn start_and_subsecond_changes_share_a_key() {
        let a = event("Movie");
        let b = ChannelEvent {
            start: a.start + TimeDelta::minutes(5),
            end: a.end + TimeDelta::milliseconds(400),
            received_at: a.received_at + TimeDelta::seconds(9),
            ..a.clone()
        };
        assert_eq!(CacheKey::of(&a), CacheKey::of(&b));

        let c = ChannelEvent {
            end: a.end + TimeDelta::seconds(1),
            ..a.clone()
        };
        assert_ne!(CacheKey::of(&a), CacheKey::of(&c));
    }

    #[test]
    fn key_change_replaces_and_drops_old_texture() {
        let (mut cache, calls) = new_cache(None);
        let mut backend = Backend::default();
        let now = Utc::now();
        cache
            .ensure_surface(&event("One"), &metrics(), now, &mut backend)
            .unwrap();
        cache
            .ensure_surface(&event("Two"), &metrics(), now, &mut backend)
            .unwrap();
        assert_eq!(calls.get(), 2);
        assert_eq!(backend.dropped.get(), 1);
        assert_eq!(cache.surface().unwrap().key.title, "Two");
    }

    #[test]
    fn failed_key_is_not_retried_until_key_changes() {
        let (mut cache, calls) = new_cache(Some("Broken"));
        let mut backend = Backend::default();
        let now = Utc::now();
        let broken = event("Broken");
        for _ in 0..3 {
            let s = cache
                .ensure_surface(&broken, &metrics(), now, &mut backend)
                .unwrap();
            assert!(s.is_none());
        }
        assert_eq!(calls.get(), 1);
        assert!(
            cache
                .ensure_surface(&event("Fine"), &metrics(), now, &mut backend)
                .unwrap()
                .is_some()
        );
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn invalidate_forces_repaint() {
        let (mut cache, calls) = new_cache(None);
        let mut backend = Backend::default();
        let ev = event("Movie");
        cache.ensure_surface(&ev, &metrics(), ev.start, &mut backend).unwrap();
        cache.invalidate();
        assert!(cache.surface().is_none());
        cache.ensure_surface(&ev, &metrics(), ev.start, &mut backend).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn display_upload_failure_propagates() {
        let (mut cache, _) = new_cache(None);
        let mut backend = Backend {
            fail_display: true,
            ..Backend::default()
        };
        let ev = event("Movie");
        let err = cache
            .ensure_surface(&ev, &metrics(), ev.start, &mut backend)
            .err()
            .unwrap();
        assert!(err.is_display());
    }
}
