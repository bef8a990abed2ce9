//! Frame timing.
//!
//! Per-frame delta time with a ceiling, optional frame limiting when VSync
//! is off, and an FPS readout for the settings panel.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Longest step handed to the simulation, in seconds.
pub const MAX_DT: f32 = 0.25;

/// Frame timing manager.
#[derive(Debug)]
pub struct FrameTiming {
    /// Time budget per frame
    frame_budget: Duration,
    /// Time of last frame start
    last_frame: Instant,
    /// Whether VSync is enabled (disables manual frame limiting)
    vsync: bool,
    /// Recent frame times for averaging
    frame_times: VecDeque<f32>,
    /// Maximum samples for averaging
    max_samples: usize,
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self::new(60)
    }
}

impl FrameTiming {
    /// Create a new frame timing manager limiting to `target_fps`.
    #[must_use]
    pub fn new(target_fps: u32) -> Self {
        Self {
            frame_budget: Self::budget(target_fps),
            last_frame: Instant::now(),
            vsync: true,
            frame_times: VecDeque::with_capacity(120),
            max_samples: 120,
        }
    }

    /// Create with VSync setting.
    #[must_use]
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    fn budget(target_fps: u32) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1)))
    }

    /// Seconds since the previous call, clamped to [`MAX_DT`].
    pub fn delta_time(&mut self) -> f32 {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(MAX_DT);
        self.last_frame = now;

        self.frame_times.push_back(dt);
        if self.frame_times.len() > self.max_samples {
            self.frame_times.pop_front();
        }

        dt
    }

    /// Sleep for the remainder of the frame budget (if VSync is off).
    pub fn sleep_remainder(&self) {
        if self.vsync {
            return;
        }

        let elapsed = self.last_frame.elapsed();
        if elapsed < self.frame_budget {
            std::thread::sleep(self.frame_budget - elapsed);
        }
    }

    /// FPS averaged over recent frames.
    #[must_use]
    pub fn current_fps(&self) -> f32 {
        let ms = self.average_frame_time_ms();
        if ms > 0.0 {
            1000.0 / ms
        } else {
            0.0
        }
    }

    /// Average frame time in milliseconds.
    #[must_use]
    pub fn average_frame_time_ms(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }
        (self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32) * 1000.0
    }

    /// Reset timing (call after a stall such as window creation).
    pub fn reset(&mut self) {
        self.last_frame = Instant::now();
        self.frame_times.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_timing_delta() {
        let mut timing = FrameTiming::new(60);

        std::thread::sleep(Duration::from_millis(16));
        let dt = timing.delta_time();
        assert!(dt >= 0.015);
        assert!(dt <= MAX_DT);
    }

    #[test]
    fn test_frame_timing_max_dt() {
        let mut timing = FrameTiming::new(60);

        std::thread::sleep(Duration::from_millis(300));
        let dt = timing.delta_time();

        assert!((dt - MAX_DT).abs() < f32::EPSILON);
    }

    #[test]
    fn test_fps_from_samples() {
        let mut timing = FrameTiming::new(60);
        assert!(timing.current_fps().abs() < f32::EPSILON);

        timing.frame_times.extend([0.02, 0.02]);
        assert!((timing.average_frame_time_ms() - 20.0).abs() < 1e-3);
        assert!((timing.current_fps() - 50.0).abs() < 1e-2);
    }

    #[test]
    fn test_sample_window_is_bounded() {
        let mut timing = FrameTiming::new(60);
        for _ in 0..200 {
            timing.delta_time();
        }
        assert_eq!(timing.frame_times.len(), 120);
    }

    #[test]
    fn test_vsync_setting() {
        assert!(FrameTiming::new(60).with_vsync(true).vsync);
        assert!(!FrameTiming::new(60).with_vsync(false).vsync);
    }

    #[test]
    fn test_zero_target_fps_has_budget() {
        let timing = FrameTiming::new(0);
        assert_eq!(timing.frame_budget, Duration::from_secs(1));
    }

    #[test]
    fn test_reset_timing() {
        let mut timing = FrameTiming::new(60);
        timing.frame_times.push_back(0.016);

        timing.reset();

        assert!(timing.frame_times.is_empty());
    }
}
