use std::sync::Arc;
use std::time::{Duration, Instant};

use super::tracker::{LoiteringMonitor, NaiveProximityTracker, PersonTracker};
use super::FrameAnalysis;
use crate::config::PipelineConfig;

/// Frames per second over rolling one-second windows.
#[derive(Debug)]
pub struct FpsMeter {
    window_start: Instant,
    frames: u32,
    fps: f32,
}

impl FpsMeter {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            window_start: start,
            frames: 0,
            fps: 0.0,
        }
    }

    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed >= Duration::from_secs(1) {
            self.fps = self.frames as f32 / elapsed.as_secs_f32();
            self.frames = 0;
            self.window_start = now;
        }
        self.fps
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }
}

impl Default for FpsMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracking state of one camera feed. Owned by its worker and never shared.
pub struct PerCameraState {
    pub tracker: Box<dyn PersonTracker>,
    pub loitering: LoiteringMonitor,
    pub frame_count: u64,
    pub fps: FpsMeter,
    pub cached: Option<Arc<FrameAnalysis>>,
}

impl PerCameraState {
    pub fn new(config: &PipelineConfig, loitering_frames: u32) -> Self {
        Self::with_tracker(
            Box::new(NaiveProximityTracker::from_config(config)),
            LoiteringMonitor::new(
                loitering_frames,
                config.movement_threshold_px,
                config.loitering_dwell_secs,
            ),
        )
    }

    pub fn with_tracker(tracker: Box<dyn PersonTracker>, loitering: LoiteringMonitor) -> Self {
        Self {
            tracker,
            loitering,
            frame_count: 0,
            fps: FpsMeter::new(),
            cached: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_updates_once_per_window() {
        let start = Instant::now();
        let mut meter = FpsMeter::starting_at(start);
        for i in 1..30 {
            assert_eq!(meter.tick_at(start + Duration::from_millis(i * 33)), 0.0);
        }
        let fps = meter.tick_at(start + Duration::from_millis(1000));
        assert!((fps - 30.0).abs() < 0.01);
        assert_eq!(meter.fps(), fps);
    }
}
