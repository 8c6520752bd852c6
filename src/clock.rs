use serde::{Deserialize, Serialize};

/// Timing information handed to every per-frame update.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameTime {
    /// Seconds since the previous frame, already capped.
    pub delta: f32,
    /// Seconds since the clock was created (sum of capped deltas).
    pub elapsed: f32,
}

/// Clock tunables read from the scene manifest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    pub max_delta: f32,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self { max_delta: 0.1 }
    }
}

/// Monotonic frame clock.
///
/// Deltas are capped at `max_delta` so a tab that was in the background for
/// a minute resumes with one ordinary step instead of teleporting every
/// animated object.
#[derive(Debug, Clone)]
pub struct Clock {
    max_delta: f32,
    elapsed: f32,
    last_timestamp: Option<f64>,
}

impl Clock {
    pub fn new(settings: ClockSettings) -> Self {
        Self {
            max_delta: sanitize(settings.max_delta).max(f32::EPSILON),
            elapsed: 0.0,
            last_timestamp: None,
        }
    }

    /// Advances by a raw delta in seconds. Negative or non-finite input counts as zero.
    pub fn advance(&mut self, raw_delta: f32) -> FrameTime {
        let delta = sanitize(raw_delta).min(self.max_delta);
        self.elapsed += delta;
        FrameTime {
            delta,
            elapsed: self.elapsed,
        }
    }

    /// Advances from an absolute timestamp in seconds (e.g. `performance.now() / 1000`).
    ///
    /// The first call only records the timestamp and yields a zero delta.
    pub fn tick_at(&mut self, now_seconds: f64) -> FrameTime {
        let raw = match self.last_timestamp {
            Some(last) => (now_seconds - last) as f32,
            None => 0.0,
        };
        self.last_timestamp = Some(now_seconds);
        self.advance(raw)
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn max_delta(&self) -> f32 {
        self.max_delta
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(ClockSettings::default())
    }
}

fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_capped() {
        let mut clock = Clock::default();
        let time = clock.advance(5.0);
        assert!((time.delta - 0.1).abs() < f32::EPSILON);
        assert!((time.elapsed - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn elapsed_is_monotonic_for_bad_input() {
        let mut clock = Clock::default();
        clock.advance(0.05);
        let before = clock.elapsed();
        let time = clock.advance(-1.0);
        assert_eq!(time.delta, 0.0);
        let time = clock.advance(f32::NAN);
        assert_eq!(time.delta, 0.0);
        assert_eq!(clock.elapsed(), before);
    }

    #[test]
    fn timestamps_produce_deltas_after_first_tick() {
        let mut clock = Clock::default();
        assert_eq!(clock.tick_at(10.0).delta, 0.0);
        let time = clock.tick_at(10.016);
        assert!((time.delta - 0.016).abs() < 1e-4);
        // Resume after a long pause is capped.
        let time = clock.tick_at(70.0);
        assert!((time.delta - 0.1).abs() < f32::EPSILON);
    }
}
