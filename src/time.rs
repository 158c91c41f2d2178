// src/time.rs
//! Frame clock: clamped delta time plus a once-per-interval report tick.

use std::time::{Duration, Instant};

/// Snapshot of timing data for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Time {
    /// Seconds since the previous frame, clamped.
    pub delta: f32,
    /// Average FPS over the last completed report interval.
    pub fps: f32,
    /// True on the first frame of each new report interval.
    pub report_due: bool,
}

#[derive(Debug)]
pub struct FrameClock {
    last_frame: Instant,
    /// Prevents a long stall (drag, tab-out) from turning into a huge step.
    max_delta: f32,
    report_interval: Duration,
    interval_start: Instant,
    interval_frames: u32,
    fps: f32,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::starting_at(Instant::now())
    }
}

impl FrameClock {
    pub const MAX_DELTA: f32 = 0.25;

    pub fn new() -> Self {
        Self::default()
    }

    fn starting_at(now: Instant) -> Self {
        Self {
            last_frame: now,
            max_delta: Self::MAX_DELTA,
            report_interval: Duration::from_secs(1),
            interval_start: now,
            interval_frames: 0,
            fps: 0.0,
        }
    }

    /// Call once per frame, before any update.
    pub fn tick(&mut self) -> Time {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Time {
        let raw = now.saturating_duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.interval_frames += 1;

        let elapsed = now.saturating_duration_since(self.interval_start);
        let report_due = elapsed >= self.report_interval;
        if report_due {
            self.fps = self.interval_frames as f32 / elapsed.as_secs_f32();
            self.interval_frames = 0;
            self.interval_start = now;
        }

        Time {
            delta: raw.min(self.max_delta),
            fps: self.fps,
            report_due,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_clamped() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        let t = clock.tick_at(start + Duration::from_millis(16));
        assert!((t.delta - 0.016).abs() < 1e-4);
        let t = clock.tick_at(start + Duration::from_secs(5));
        assert_eq!(t.delta, FrameClock::MAX_DELTA);
    }

    #[test]
    fn reports_once_per_interval() {
        let start = Instant::now();
        let mut clock = FrameClock::starting_at(start);
        let mut reports = 0;
        for i in 1..=120u64 {
            let t = clock.tick_at(start + Duration::from_millis(i * 25));
            if t.report_due {
                reports += 1;
                assert!((t.fps - 40.0).abs() < 0.5);
            }
        }
        assert_eq!(reports, 3);
    }
}
