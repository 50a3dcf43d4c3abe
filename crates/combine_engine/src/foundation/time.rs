//! Time management utilities

use std::time::Instant;

/// Frame clock tracking scaled and unscaled deltas plus a rolling FPS
///
/// The clock is an explicit context object owned by the engine. `tick`
/// reads the wall clock; `advance` feeds a synthetic delta, which keeps
/// tests and headless runs deterministic.
#[derive(Debug, Clone)]
pub struct Clock {
    last_frame: Instant,
    unscaled_delta: f32,
    time_scale: f32,
    total_time: f32,
    frame_count: u64,
    fps: f32,
    fps_frames: u32,
    fps_elapsed: f32,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Create a new clock with a time scale of 1
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            unscaled_delta: 0.0,
            time_scale: 1.0,
            total_time: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frames: 0,
            fps_elapsed: 0.0,
        }
    }

    /// Advance by the wall-clock time since the previous tick
    pub fn tick(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;
        self.step(elapsed);
    }

    /// Advance by a fixed number of seconds, ignoring the wall clock
    pub fn advance(&mut self, seconds: f32) {
        self.last_frame = Instant::now();
        self.step(seconds.max(0.0));
    }

    fn step(&mut self, elapsed: f32) {
        self.unscaled_delta = elapsed;
        self.total_time += elapsed;
        self.frame_count += 1;

        self.fps_frames += 1;
        self.fps_elapsed += elapsed;
        if self.fps_elapsed >= 1.0 {
            self.fps = self.fps_frames as f32 / self.fps_elapsed;
            self.fps_frames = 0;
            self.fps_elapsed = 0.0;
        }
    }

    /// Time since the last frame in seconds, multiplied by the time scale
    pub fn delta_time(&self) -> f32 {
        self.unscaled_delta * self.time_scale
    }

    /// Time since the last frame in seconds, ignoring the time scale
    pub fn unscaled_delta_time(&self) -> f32 {
        self.unscaled_delta
    }

    /// Total unscaled time since creation or the last reset
    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of frames ticked
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second over the last full second
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Multiplier applied to `delta_time`; negative values clamp to zero
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Current time scale
    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Reset all counters; the time scale is kept
    pub fn reset(&mut self) {
        let time_scale = self.time_scale;
        *self = Self::new();
        self.time_scale = time_scale;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_advance_and_scale() {
        let mut clock = Clock::new();
        clock.set_time_scale(0.5);
        clock.advance(0.2);

        assert_relative_eq!(clock.delta_time(), 0.1);
        assert_relative_eq!(clock.unscaled_delta_time(), 0.2);
        assert_relative_eq!(clock.total_time(), 0.2);
        assert_eq!(clock.frame_count(), 1);
    }

    #[test]
    fn test_fps_updates_once_per_second() {
        let mut clock = Clock::new();
        for _ in 0..7 {
            clock.advance(0.125);
        }
        assert_relative_eq!(clock.fps(), 0.0);

        clock.advance(0.125);
        assert_relative_eq!(clock.fps(), 8.0);
    }

    #[test]
    fn test_reset_keeps_time_scale() {
        let mut clock = Clock::new();
        clock.set_time_scale(2.0);
        clock.advance(1.0);
        clock.reset();

        assert_eq!(clock.frame_count(), 0);
        assert_relative_eq!(clock.total_time(), 0.0);
        assert_relative_eq!(clock.time_scale(), 2.0);
    }

    #[test]
    fn test_negative_scale_clamps() {
        let mut clock = Clock::new();
        clock.set_time_scale(-1.0);
        assert_relative_eq!(clock.time_scale(), 0.0);
    }
}
