//! Shared frame timing read by script update hooks

use parking_lot::RwLock;
use std::sync::Arc;

/// Timing for the current frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    /// Seconds since the previous tick
    pub delta_time: f32,
    /// Seconds since the clock was created
    pub elapsed: f64,
    /// Number of ticks seen
    pub frame: u64,
}

/// Cloneable handle to the process-wide frame time
#[derive(Debug, Clone, Default)]
pub struct FrameClock(Arc<RwLock<FrameTime>>);

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delta time of the current tick
    pub fn delta_time(&self) -> f32 {
        self.0.read().delta_time
    }

    pub fn elapsed(&self) -> f64 {
        self.0.read().elapsed
    }

    pub fn frame(&self) -> u64 {
        self.0.read().frame
    }

    /// Snapshot of the current frame time
    pub fn now(&self) -> FrameTime {
        *self.0.read()
    }

    pub(crate) fn advance(&self, delta_time: f32) {
        let mut time = self.0.write();
        time.delta_time = delta_time;
        time.elapsed += f64::from(delta_time);
        time.frame += 1;
    }
}
