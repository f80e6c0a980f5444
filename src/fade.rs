use std::time::{Duration, Instant};

/// Durations of the three visible phases, in seconds.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FadeTiming {
    pub fade_in_s: f64,
    pub hold_s: f64,
    pub fade_out_s: f64,
}

impl Default for FadeTiming {
    fn default() -> Self {
        Self {
            fade_in_s: 0.18,
            hold_s: 5.0,
            fade_out_s: 0.28,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FadePhase {
    Idle,
    FadeIn,
    Hold,
    FadeOut,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FadeSample {
    pub phase: FadePhase,
    pub opacity: f32,
}

impl FadeSample {
    pub const IDLE: Self = Self {
        phase: FadePhase::Idle,
        opacity: 0.0,
    };

    pub fn is_visible(&self) -> bool {
        self.phase != FadePhase::Idle && self.opacity > 0.0
    }
}

impl FadeTiming {
    pub fn total_s(&self) -> f64 {
        self.fade_in_s + self.hold_s + self.fade_out_s
    }

    /// Phase and opacity `elapsed` after the anchor.
    pub fn sample(&self, elapsed: Duration) -> FadeSample {
        let t = elapsed.as_secs_f64();
        let hold_end = self.fade_in_s + self.hold_s;

        if t < self.fade_in_s {
            FadeSample {
                phase: FadePhase::FadeIn,
                opacity: clamp_unit(t / self.fade_in_s),
            }
        } else if t < hold_end {
            FadeSample {
                phase: FadePhase::Hold,
                opacity: 1.0,
            }
        } else if t < self.total_s() {
            FadeSample {
                phase: FadePhase::FadeOut,
                opacity: clamp_unit(1.0 - (t - hold_end) / self.fade_out_s),
            }
        } else {
            FadeSample::IDLE
        }
    }
}

fn clamp_unit(v: f64) -> f32 {
    v.clamp(0.0, 1.0) as f32
}

/// Visibility timer for the latest accepted event.
///
/// Never stopped explicitly: it runs out on its own, and only a new anchor
/// restarts it.
#[derive(Clone, Debug)]
pub struct FadeTimeline {
    timing: FadeTiming,
    anchor: Option<Instant>,
}

impl FadeTimeline {
    pub fn new(timing: FadeTiming) -> Self {
        Self {
            timing,
            anchor: None,
        }
    }

    pub fn restart(&mut self, anchor: Instant) {
        self.anchor = Some(anchor);
    }

    pub fn sample(&self, now: Instant) -> FadeSample {
        match self.anchor {
            Some(anchor) => self.timing.sample(now.saturating_duration_since(anchor)),
            None => FadeSample::IDLE,
        }
    }
}
