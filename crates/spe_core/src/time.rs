use std::time::{Duration, Instant};

use crate::animation::FrameTiming;

const FPS_SAMPLE_COUNT: usize = 60;

/// Frame counter and pacing for a fixed target frame rate.
///
/// `current_frame` starts at 0 and runs 1..=target_frame_rate once ticking,
/// wrapping back to 1. Pacing is optional: headless drivers only call
/// `advance`, real-time drivers also call `pace` once per frame.
pub struct FrameClock {
    target_frame_rate: u32,
    current_frame: u32,
    pub frame_count: u64,
    pub real_dt: f64,
    last_instant: Instant,

    fps_samples: [f64; FPS_SAMPLE_COUNT],
    fps_sample_index: usize,
    pub smoothed_fps: f64,
    pub smoothed_frame_time_ms: f64,
}

impl FrameClock {
    pub fn new(target_frame_rate: u32) -> Self {
        let target_frame_rate = target_frame_rate.max(1);
        let budget = 1.0 / target_frame_rate as f64;
        Self {
            target_frame_rate,
            current_frame: 0,
            frame_count: 0,
            real_dt: budget,
            last_instant: Instant::now(),
            fps_samples: [budget; FPS_SAMPLE_COUNT],
            fps_sample_index: 0,
            smoothed_fps: target_frame_rate as f64,
            smoothed_frame_time_ms: budget * 1000.0,
        }
    }

    pub fn target_frame_rate(&self) -> u32 {
        self.target_frame_rate
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    pub fn timing(&self) -> FrameTiming {
        FrameTiming {
            target_frame_rate: self.target_frame_rate,
            current_frame: self.current_frame,
        }
    }

    /// Move to the next frame, wrapping after `target_frame_rate`.
    pub fn advance(&mut self) {
        self.current_frame += 1;
        if self.current_frame > self.target_frame_rate {
            self.current_frame = 1;
        }
        self.frame_count += 1;
    }

    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs(1) / self.target_frame_rate
    }

    /// Sleep out the rest of this frame's budget and return the frame rate
    /// the frame actually ran at.
    pub fn pace(&mut self) -> f64 {
        let budget = self.frame_budget();
        let mut elapsed = self.last_instant.elapsed();

        if elapsed < budget {
            std::thread::sleep(budget - elapsed);
            elapsed = budget;
        } else if elapsed > budget * 4 {
            log::warn!(
                "Frame took {:.1}ms against a {:.1}ms budget",
                elapsed.as_secs_f64() * 1000.0,
                budget.as_secs_f64() * 1000.0
            );
        }

        self.last_instant = Instant::now();
        self.record_frame_time(elapsed.as_secs_f64());
        1.0 / self.real_dt
    }

    fn record_frame_time(&mut self, dt: f64) {
        self.real_dt = dt.max(f64::EPSILON);
        self.fps_samples[self.fps_sample_index] = self.real_dt;
        self.fps_sample_index = (self.fps_sample_index + 1) % FPS_SAMPLE_COUNT;
        let avg_dt: f64 = self.fps_samples.iter().sum::<f64>() / FPS_SAMPLE_COUNT as f64;
        self.smoothed_frame_time_ms = avg_dt * 1000.0;
        self.smoothed_fps = if avg_dt > 0.0 { 1.0 / avg_dt } else { 0.0 };
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new(60)
    }
}
