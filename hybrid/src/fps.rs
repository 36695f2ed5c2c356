//! Frame-rate readout

use std::time::{Duration, Instant};

/// Averages frame counts over a fixed window.
pub struct FpsCounter {
    interval: Duration,
    window_start: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    pub fn new(now: Instant) -> Self {
        Self {
            interval: Duration::from_millis(500),
            window_start: now,
            frames: 0,
            fps: 0.0,
        }
    }

    /// Counts one frame. Returns the new rate when a window closes.
    pub fn tick(&mut self, now: Instant) -> Option<f32> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.interval {
            return None;
        }
        self.fps = self.frames as f32 / elapsed.as_secs_f32();
        self.frames = 0;
        self.window_start = now;
        Some(self.fps)
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_interval() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);
        for i in 1..30 {
            assert_eq!(counter.tick(start + Duration::from_millis(i * 16)), None);
        }
        let fps = counter.tick(start + Duration::from_millis(500)).unwrap();
        assert!((fps - 60.0).abs() < 1e-3);
        assert_eq!(counter.fps(), fps);
    }

    #[test]
    fn restarts_window_after_report() {
        let start = Instant::now();
        let mut counter = FpsCounter::new(start);
        assert_eq!(counter.tick(start + Duration::from_secs(1)), Some(1.0));
        assert_eq!(counter.tick(start + Duration::from_millis(1200)), None);
        assert_eq!(counter.fps(), 1.0);
    }
}
