use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use crate::event::ChannelEvent;

/// An event as seen by the presentation side.
#[derive(Clone, Debug)]
pub struct AcceptedEvent {
    pub event: Arc<ChannelEvent>,
    pub accepted_at: Instant,
    /// Bumped on every acceptance, identical re-deliveries included.
    pub generation: u64,
}

#[derive(Debug, Default)]
struct SlotState {
    latest: Option<AcceptedEvent>,
    generation: u64,
}

/// The single "latest event" slot shared by both transports and the
/// compositor. Replaced wholesale, never edited in place.
#[derive(Clone, Debug, Default)]
pub struct EventSlot {
    inner: Arc<Mutex<SlotState>>,
}

impl EventSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept(&self, event: ChannelEvent) -> u64 {
        self.accept_at(event, Instant::now())
    }

    pub fn accept_at(&self, event: ChannelEvent, accepted_at: Instant) -> u64 {
        let event = Arc::new(event);
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        state.generation += 1;
        let generation = state.generation;
        tracing::debug!(
            generation,
            channel = event.channel_number,
            title = %event.title,
            "event accepted"
        );
        state.latest = Some(AcceptedEvent {
            event,
            accepted_at,
            generation,
        });
        generation
    }

    pub fn latest(&self) -> Option<AcceptedEvent> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
            .clone()
    }

    pub fn generation(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(title: &str) -> ChannelEvent {
        ChannelEvent::from_json_value(&json!({"channel_number": 1, "title": title}))
    }

    #[test]
    fn empty_slot_has_nothing() {
        let slot = EventSlot::new();
        assert!(slot.latest().is_none());
        assert_eq!(slot.generation(), 0);
    }

    #[test]
    fn last_accepted_wins() {
        let slot = EventSlot::new();
        slot.accept(event("a"));
        let shared = slot.clone();
        shared.accept(event("b"));
        let latest = slot.latest().unwrap();
        assert_eq!(latest.event.title, "b");
        assert_eq!(latest.generation, 2);
    }

    #[test]
    fn identical_redelivery_still_bumps_generation() {
        let slot = EventSlot::new();
        let g1 = slot.accept(event("same"));
        let g2 = slot.accept(event("same"));
        assert!(g2 > g1);
    }

    #[test]
    fn concurrent_writers_leave_a_whole_event() {
        let slot = EventSlot::new();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let slot = slot.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        slot.accept(event(&format!("t{i}-{j}")));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        let latest = slot.latest().unwrap();
        assert_eq!(latest.generation, 200);
        assert!(latest.event.title.starts_with('t'));
    }
}
