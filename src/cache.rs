//! Per-batch activations, error signals and the latest cost.

use ndarray::Array2;

use crate::activation::Activation;
use crate::device::Device;
use crate::error::TrainResult;
use crate::matrix::DeviceMatrix;
use crate::optimizer::GradientStore;
use crate::params::TrainParams;

/// Training cache for a fixed batch.
///
/// `a[0]` is the training data and is never overwritten. `a[i + 1]` holds
/// layer `i`'s activations and `dz[i]` its error signal, both
/// `sizes[i + 1] × examples`.
pub struct NetCache<D: Device> {
    pub(crate) a: Vec<DeviceMatrix<D>>,
    pub(crate) dz: Vec<DeviceMatrix<D>>,
    pub(crate) cost: f32,
}

impl<D: Device> NetCache<D> {
    /// Creates a cache whose input slot holds `data`.
    pub fn new(data: DeviceMatrix<D>) -> Self {
        Self {
            a: vec![data],
            dz: Vec::new(),
            cost: 0.0,
        }
    }

    /// Appends zeroed activation and error-signal slots for a layer of
    /// `rows` nodes.
    pub fn push_layer(&mut self, device: &D, rows: usize) -> TrainResult<()> {
        let examples = self.examples();
        self.a.push(DeviceMatrix::zeros(device, rows, examples)?);
        self.dz.push(DeviceMatrix::zeros(device, rows, examples)?);
        Ok(())
    }

    /// Number of examples in the batch.
    #[inline]
    pub fn examples(&self) -> usize {
        self.a[0].cols()
    }

    /// Activation slots, input first.
    pub fn activations(&self) -> &[DeviceMatrix<D>] {
        &self.a
    }

    /// Error-signal slots, one per layer.
    pub fn errors(&self) -> &[DeviceMatrix<D>] {
        &self.dz
    }

    /// The output layer's activations.
    pub fn output(&self) -> &DeviceMatrix<D> {
        &self.a[self.a.len() - 1]
    }

    /// Most recently computed cost.
    #[inline]
    pub fn cost(&self) -> f32 {
        self.cost
    }

    /// Forward pass over the training batch.
    pub fn forward(
        &mut self,
        device: &D,
        params: &TrainParams<D>,
        activations: &[Activation],
    ) -> TrainResult<()> {
        params.forward_into(device, &mut self.a, activations)
    }

    /// Backward pass: fills the error signals and the gradient store.
    ///
    /// Requires a forward pass for the current parameters. The output
    /// layer's `dW` carries the `0.5 * reg_mod * W` term like every other
    /// layer, matching the weight penalty summed in the cost.
    pub fn backward(
        &mut self,
        device: &D,
        params: &TrainParams<D>,
        labels: &DeviceMatrix<D>,
        activations: &[Activation],
        grads: &mut GradientStore<D>,
    ) -> TrainResult<()> {
        let last = params.depth() - 1;
        let coeff = params.coefficiant;
        let reg = 0.5 * params.reg_mod;

        device.subtract(&mut self.dz[last], &self.a[last + 1], labels)?;
        device.set_dw(
            &mut grads.dw[last],
            &self.dz[last],
            &self.a[last],
            &params.w[last],
            coeff,
            reg,
        )?;
        device.set_db(&mut grads.db[last], &self.dz[last], coeff)?;

        for l in (0..last).rev() {
            let (lower, upper) = self.dz.split_at_mut(l + 1);
            device.back_activation(
                &mut lower[l],
                &params.w[l + 1],
                &upper[0],
                &self.a[l + 1],
                activations[l],
            )?;
            device.set_dw(
                &mut grads.dw[l],
                &self.dz[l],
                &self.a[l],
                &params.w[l],
                coeff,
                reg,
            )?;
            device.set_db(&mut grads.db[l], &self.dz[l], coeff)?;
        }
        Ok(())
    }

    /// Reduces the output error signal and weights into the cost and stores it.
    pub fn calc_cost(&mut self, device: &D, params: &TrainParams<D>) -> TrainResult<f32> {
        let last = self.dz.len() - 1;
        self.cost = device.calc_cost(&self.dz[last], params.weights(), params.coefficiant, params.reg_mult)?;
        Ok(self.cost)
    }

    /// Copies every activation slot to the host.
    pub fn activations_to_host(&self, device: &D) -> TrainResult<Vec<Array2<f32>>> {
        self.a.iter().map(|m| m.to_host(device)).collect()
    }

    /// Copies every error-signal slot to the host.
    pub fn errors_to_host(&self, device: &D) -> TrainResult<Vec<Array2<f32>>> {
        self.dz.iter().map(|m| m.to_host(device)).collect()
    }
}
