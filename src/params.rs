//! Device-resident trainable parameters and their scalar coefficients.

use crate::activation::Activation;
use crate::config::{TrainConfig, MIN_LEARN_RATE, MIN_REG_TERM};
use crate::device::Device;
use crate::error::TrainResult;
use crate::matrix::DeviceMatrix;
use crate::optimizer::{AdamMoments, GradientStore};

/// Weight and bias stacks plus the coefficients the kernels consume.
///
/// Layer `i` has a weight matrix of shape `(sizes[i+1], sizes[i])` and a bias
/// of shape `(sizes[i+1], 1)`.
pub struct TrainParams<D: Device> {
    pub(crate) w: Vec<DeviceMatrix<D>>,
    pub(crate) b: Vec<DeviceMatrix<D>>,

    /// Base learning rate.
    pub learn_rate: f32,
    /// `1 / node_count`.
    pub learn_coeff: f32,
    /// `learn_rate * learn_coeff`, the rate actually applied.
    pub learn_mult: f32,
    /// Base regularization strength.
    pub reg_term: f32,
    /// `reg_term / node_count`, applied in the weight gradient.
    pub reg_mod: f32,
    /// `reg_term / node_count`, applied in the cost.
    pub reg_mult: f32,
    /// `1 / train_examples_count`.
    pub coefficiant: f32,
    /// Number of training examples (columns of the data matrix).
    pub train_examples_count: usize,
}

impl<D: Device> TrainParams<D> {
    /// Creates an empty store with coefficients derived from `config`.
    ///
    /// `node_count` is the number of non-output nodes; both it and
    /// `examples` must be non-zero.
    pub fn new(config: &TrainConfig, node_count: usize, examples: usize) -> Self {
        let learn_coeff = 1.0 / node_count as f32;
        let reg_mod = config.reg_term / node_count as f32;
        Self {
            w: Vec::new(),
            b: Vec::new(),
            learn_rate: config.learn_rate,
            learn_coeff,
            learn_mult: config.learn_rate * learn_coeff,
            reg_term: config.reg_term,
            reg_mod,
            reg_mult: reg_mod,
            coefficiant: 1.0 / examples as f32,
            train_examples_count: examples,
        }
    }

    /// Appends one layer's parameters.
    pub fn push_layer(&mut self, w: DeviceMatrix<D>, b: DeviceMatrix<D>) {
        debug_assert_eq!(b.shape(), [w.rows(), 1]);
        self.w.push(w);
        self.b.push(b);
    }

    /// Number of layers.
    #[inline]
    pub fn depth(&self) -> usize {
        self.w.len()
    }

    /// The weight stack.
    pub fn weights(&self) -> &[DeviceMatrix<D>] {
        &self.w
    }

    /// The bias stack.
    pub fn biases(&self) -> &[DeviceMatrix<D>] {
        &self.b
    }

    /// Sets the base learning rate, clamped below at [`MIN_LEARN_RATE`].
    pub fn set_learn_rate(&mut self, rate: f32) {
        self.learn_rate = rate.max(MIN_LEARN_RATE);
        self.learn_mult = self.learn_rate * self.learn_coeff;
    }

    /// Sets the regularization term, clamped below at [`MIN_REG_TERM`].
    pub fn set_reg_term(&mut self, term: f32) {
        self.reg_term = term.max(MIN_REG_TERM);
        self.reg_mod = self.reg_term * self.learn_coeff;
        self.reg_mult = self.reg_mod;
    }

    /// Runs the forward pass into `stack`.
    ///
    /// `stack[0]` is the input and is left untouched; `stack[i + 1]` receives
    /// layer `i`'s activations.
    pub fn forward_into(
        &self,
        device: &D,
        stack: &mut [DeviceMatrix<D>],
        activations: &[Activation],
    ) -> TrainResult<()> {
        debug_assert_eq!(stack.len(), self.depth() + 1);
        for i in 0..self.depth() {
            let (prev, next) = stack.split_at_mut(i + 1);
            device.forward_layer(&mut next[0], &self.w[i], &prev[i], &self.b[i], activations[i])?;
        }
        Ok(())
    }

    /// Plain gradient step: `param -= learn_mult * grad` for every tensor.
    pub fn apply_gradients(&mut self, device: &D, grads: &GradientStore<D>) -> TrainResult<()> {
        for (w, dw) in self.w.iter_mut().zip(&grads.dw) {
            device.update_parameter(w, dw, self.learn_mult)?;
        }
        for (b, db) in self.b.iter_mut().zip(&grads.db) {
            device.update_parameter(b, db, self.learn_mult)?;
        }
        Ok(())
    }

    /// ADAM step over every tensor, advancing the moment counter once.
    pub fn apply_adam(
        &mut self,
        device: &D,
        grads: &GradientStore<D>,
        moments: &mut AdamMoments<D>,
    ) -> TrainResult<()> {
        let step = moments.begin_step(self.learn_mult);
        let AdamMoments { first, second, .. } = moments;

        for i in 0..self.depth() {
            device.update_parameter_adam(
                &mut self.w[i],
                &grads.dw[i],
                &mut first.dw[i],
                &mut second.dw[i],
                &step,
            )?;
            device.update_parameter_adam(
                &mut self.b[i],
                &grads.db[i],
                &mut first.db[i],
                &mut second.db[i],
                &step,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::CpuDevice;

    #[test]
    fn test_coefficients() {
        let config = TrainConfig::with_reg(0.5, 2.0);
        let params = TrainParams::<CpuDevice>::new(&config, 4, 8);

        assert_eq!(params.learn_coeff, 0.25);
        assert_eq!(params.learn_mult, 0.125);
        assert_eq!(params.reg_mod, 0.5);
        assert_eq!(params.reg_mult, 0.5);
        assert_eq!(params.coefficiant, 0.125);
        assert_eq!(params.train_examples_count, 8);
    }

    #[test]
    fn test_set_learn_rate_clamps() {
        let mut params = TrainParams::<CpuDevice>::new(&TrainConfig::default(), 10, 1);
        params.set_learn_rate(-3.0);
        assert_eq!(params.learn_rate, MIN_LEARN_RATE);
        assert!((params.learn_mult - MIN_LEARN_RATE / 10.0).abs() < 1e-9);

        params.set_learn_rate(0.5);
        assert!((params.learn_mult - 0.05).abs() < 1e-7);
    }

    #[test]
    fn test_set_reg_term_clamps() {
        let mut params = TrainParams::<CpuDevice>::new(&TrainConfig::default(), 2, 1);
        params.set_reg_term(0.0);
        assert_eq!(params.reg_term, MIN_REG_TERM);

        params.set_reg_term(1.0);
        assert_eq!(params.reg_mod, 0.5);
        assert_eq!(params.reg_mult, 0.5);
    }
}
