//! Gradient and moment stores for the device optimizer.
//!
//! [`GradientStore`] holds one weight-shaped and one bias-shaped tensor per
//! layer. It is used three times by the trainer: for the gradients produced
//! by backpropagation, and for the first and second ADAM moments kept in
//! [`AdamMoments`].

use ndarray::Array2;

use crate::device::Device;
use crate::error::TrainResult;
use crate::matrix::DeviceMatrix;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// First moment decay.
pub const ADAM_BETA1: f32 = 0.9;

/// Second moment decay.
pub const ADAM_BETA2: f32 = 0.999;

/// Denominator stabilizer.
pub const ADAM_EPSILON: f32 = 1e-8;

/// Per-layer tensors shaped like the weight and bias stacks.
pub struct GradientStore<D: Device> {
    /// Weight-shaped tensors, one per layer.
    pub dw: Vec<DeviceMatrix<D>>,
    /// Bias-shaped tensors (`rows × 1`), one per layer.
    pub db: Vec<DeviceMatrix<D>>,
}

impl<D: Device> GradientStore<D> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            dw: Vec::new(),
            db: Vec::new(),
        }
    }

    /// Appends zeroed tensors for a layer with a `rows × cols` weight matrix.
    pub fn push_layer(&mut self, device: &D, rows: usize, cols: usize) -> TrainResult<()> {
        self.dw.push(DeviceMatrix::zeros(device, rows, cols)?);
        self.db.push(DeviceMatrix::zeros(device, rows, 1)?);
        Ok(())
    }

    /// Number of layers.
    #[inline]
    pub fn depth(&self) -> usize {
        self.dw.len()
    }

    /// Copies every tensor to the host as `(weights, biases)`.
    pub fn to_host(&self, device: &D) -> TrainResult<(Vec<Array2<f32>>, Vec<Array2<f32>>)> {
        let dw = self
            .dw
            .iter()
            .map(|m| m.to_host(device))
            .collect::<TrainResult<Vec<_>>>()?;
        let db = self
            .db
            .iter()
            .map(|m| m.to_host(device))
            .collect::<TrainResult<Vec<_>>>()?;
        Ok((dw, db))
    }
}

impl<D: Device> Default for GradientStore<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// ADAM state: the two moment stores plus the step counter.
pub struct AdamMoments<D: Device> {
    /// Running mean of gradients.
    pub first: GradientStore<D>,
    /// Running mean of squared gradients.
    pub second: GradientStore<D>,
    /// Number of ADAM steps taken so far.
    pub t: u32,
}

impl<D: Device> AdamMoments<D> {
    /// Creates empty moment stores.
    pub fn new() -> Self {
        Self {
            first: GradientStore::new(),
            second: GradientStore::new(),
            t: 0,
        }
    }

    /// Appends zeroed moments for a layer with a `rows × cols` weight matrix.
    pub fn push_layer(&mut self, device: &D, rows: usize, cols: usize) -> TrainResult<()> {
        self.first.push_layer(device, rows, cols)?;
        self.second.push_layer(device, rows, cols)
    }

    /// Advances the step counter and returns the step's scalars.
    pub fn begin_step(&mut self, learn_mult: f32) -> AdamStep {
        self.t = self.t.saturating_add(1);
        AdamStep::new(learn_mult, self.t)
    }
}

impl<D: Device> Default for AdamMoments<D> {
    fn default() -> Self {
        Self::new()
    }
}

/// Scalars shared by every tensor updated in one ADAM step.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AdamStep {
    /// Effective learning rate (`learn_rate / node_count`).
    pub learn_mult: f32,
    /// First moment decay.
    pub beta1: f32,
    /// Second moment decay.
    pub beta2: f32,
    /// Denominator stabilizer.
    pub epsilon: f32,
    /// `1 - beta1^t`.
    pub bias1: f32,
    /// `1 - beta2^t`.
    pub bias2: f32,
}

impl AdamStep {
    /// Builds the scalars for step `t` (1-based).
    pub fn new(learn_mult: f32, t: u32) -> Self {
        let t = t.max(1).min(i32::MAX as u32) as i32;
        Self {
            learn_mult,
            beta1: ADAM_BETA1,
            beta2: ADAM_BETA2,
            epsilon: ADAM_EPSILON,
            bias1: 1.0 - ADAM_BETA1.powi(t),
            bias2: 1.0 - ADAM_BETA2.powi(t),
        }
    }

    /// Applies the update to one element.
    #[inline]
    pub fn apply(&self, param: &mut f32, grad: f32, m: &mut f32, v: &mut f32) {
        *m = self.beta1 * *m + (1.0 - self.beta1) * grad;
        *v = self.beta2 * *v + (1.0 - self.beta2) * grad * grad;
        let m_hat = *m / self.bias1;
        let v_hat = *v / self.bias2;
        *param -= self.learn_mult * m_hat / (v_hat.sqrt() + self.epsilon);
    }
}
