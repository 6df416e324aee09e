//! Windowed speed sampling for progress events.

use std::time::{Duration, Instant};

/// Counts bytes per window and says when the next progress event is due.
#[derive(Debug)]
pub(crate) struct ProgressSampler {
    interval: Duration,
    window_start: Instant,
    window_bytes: u64,
}

impl ProgressSampler {
    pub(crate) fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            window_start: now,
            window_bytes: 0,
        }
    }

    /// Account `n` bytes. Returns the window speed (bytes/ms) and starts a new
    /// window once `interval` has elapsed.
    pub(crate) fn record(&mut self, n: u64, now: Instant) -> Option<f32> {
        self.window_bytes += n;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }
        Some(self.take(elapsed, now))
    }

    /// Speed of the partial window at completion.
    pub(crate) fn finish(&mut self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.window_start);
        self.take(elapsed, now)
    }

    fn take(&mut self, elapsed: Duration, now: Instant) -> f32 {
        let ms = elapsed.as_secs_f64() * 1000.0;
        let speed = if ms > 0.0 {
            (self.window_bytes as f64 / ms) as f32
        } else {
            0.0
        };
        self.window_bytes = 0;
        self.window_start = now;
        speed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_once_per_interval() {
        let t0 = Instant::now();
        let mut s = ProgressSampler::new(Duration::from_millis(100), t0);
        assert_eq!(s.record(500, t0 + Duration::from_millis(10)), None);
        assert_eq!(s.record(500, t0 + Duration::from_millis(50)), None);
        let speed = s.record(1000, t0 + Duration::from_millis(100)).unwrap();
        assert!((speed - 20.0).abs() < 1e-3);
        // new window
        assert_eq!(s.record(10, t0 + Duration::from_millis(150)), None);
    }

    #[test]
    fn finish_reports_partial_window() {
        let t0 = Instant::now();
        let mut s = ProgressSampler::new(Duration::from_secs(10), t0);
        s.record(300, t0 + Duration::from_millis(100));
        let speed = s.finish(t0 + Duration::from_millis(150));
        assert!((speed - 2.0).abs() < 1e-3);
        assert_eq!(s.finish(t0 + Duration::from_millis(150)), 0.0);
    }
}
