//! Wall-clock timing of the training stages.
//!
//! Each stage records the duration of its most recent invocation in
//! milliseconds. The device is synchronized before the clock stops, so
//! the figure covers the enqueued kernels and not just their submission.

use std::time::Instant;

use crate::device::Device;
use crate::error::TrainResult;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A timed stage of the training pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Forward,
    Backprop,
    Update,
    CalcCost,
    Visualization,
}

/// Last-observed stage durations, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Profiler {
    pub forward_time: f32,
    pub backprop_time: f32,
    pub update_time: f32,
    pub calc_cost_time: f32,
    pub visualization_time: f32,
}

impl Profiler {
    /// Creates a profiler with all durations at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `op`, waits for the device, and records the elapsed time.
    pub fn profile<D, R, F>(&mut self, stage: Stage, device: &D, op: F) -> TrainResult<R>
    where
        D: Device,
        F: FnOnce() -> TrainResult<R>,
    {
        let start = Instant::now();
        let result = op()?;
        device.synchronize()?;
        self.record(stage, start.elapsed().as_secs_f32() * 1000.0);
        Ok(result)
    }

    /// Stores a duration for `stage`.
    pub fn record(&mut self, stage: Stage, millis: f32) {
        let slot = match stage {
            Stage::Forward => &mut self.forward_time,
            Stage::Backprop => &mut self.backprop_time,
            Stage::Update => &mut self.update_time,
            Stage::CalcCost => &mut self.calc_cost_time,
            Stage::Visualization => &mut self.visualization_time,
        };
        *slot = millis;
    }

    /// Sum of the four training stages.
    pub fn step_time(&self) -> f32 {
        self.forward_time + self.backprop_time + self.update_time + self.calc_cost_time
    }
}
