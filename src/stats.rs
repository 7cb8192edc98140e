//! Frame timing.

use instant::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(1);

/// Counts frames and reports the rate about once a second.
#[derive(Debug)]
pub struct FrameStats {
    frames: u32,
    window_start: Instant,
    last_frame: Instant,
}

impl FrameStats {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            frames: 0,
            window_start: now,
            last_frame: now,
        }
    }

    /// Registers a frame and returns the time since the previous one.
    pub fn tick(&mut self) -> Duration {
        self.tick_at(Instant::now()).0
    }

    fn tick_at(&mut self, now: Instant) -> (Duration, Option<f32>) {
        let dt = now - self.last_frame;
        self.last_frame = now;
        self.frames += 1;

        let elapsed = now - self.window_start;
        if elapsed < WINDOW {
            return (dt, None);
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        log::debug!("{fps:.1} fps");
        self.frames = 0;
        self.window_start = now;
        (dt, Some(fps))
    }
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_once_per_second() {
        let mut stats = FrameStats::new();
        let start = stats.window_start;
        let mut reports = Vec::new();
        for frame in 1..=120u64 {
            let (_, fps) = stats.tick_at(start + Duration::from_millis(frame * 1000 / 60));
            reports.extend(fps);
        }
        assert_eq!(reports.len(), 2);
        assert!((reports[0] - 60.0).abs() < 1.0);
    }
}
