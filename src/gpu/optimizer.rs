//! GPU-side ADAM parameters.
//!
//! The update itself runs in [`ADAM_SHADER`](super::shaders::ADAM_SHADER);
//! this module only packs one [`AdamStep`] into the shader's uniform block.

use crate::error::TrainResult;
use crate::gpu::uniforms::to_u32;
use crate::optimizer::AdamStep;

/// Uniform buffer for the ADAM shader.
///
/// This struct must match `AdamParams` in the shader exactly.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct AdamUniforms {
    /// Effective learning rate.
    pub learn_mult: f32,
    /// First moment decay (beta1).
    pub beta1: f32,
    /// Second moment decay (beta2).
    pub beta2: f32,
    /// Epsilon for numerical stability.
    pub epsilon: f32,
    /// `1 - beta1^t`.
    pub bias1: f32,
    /// `1 - beta2^t`.
    pub bias2: f32,
    /// Number of parameters.
    pub num_params: u32,
    /// Padding for alignment.
    pub _padding: u32,
}

impl AdamUniforms {
    /// Packs `step` for a tensor of `num_params` elements.
    pub fn new(step: &AdamStep, num_params: usize) -> TrainResult<Self> {
        Ok(Self {
            learn_mult: step.learn_mult,
            beta1: step.beta1,
            beta2: step.beta2,
            epsilon: step.epsilon,
            bias1: step.bias1,
            bias2: step.bias2,
            num_params: to_u32(num_params)?,
            _padding: 0,
        })
    }
}
