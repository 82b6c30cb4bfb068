//! The device-resident training engine.
//!
//! [`NetTrainer`] owns every device buffer of a training run: the parameter
//! stacks, the activation cache, the gradient and moment stores, and the
//! optional visualization buffers. All work is issued to a single [`Device`]
//! in program order.
//!
//! # Example
//!
//! ```rust
//! use ndarray::array;
//! use nettrain::{Activation, CpuDevice, NetTrainer, Network, TrainConfig};
//!
//! let network = Network::new(&[2, 4, 1], &[Activation::Tanh, Activation::Sigmoid], Some(7)).unwrap();
//! let data = array![[0.0, 0.0, 1.0, 1.0], [0.0, 1.0, 0.0, 1.0]];
//! let labels = array![[0.0, 1.0, 1.0, 0.0]];
//!
//! let mut trainer = NetTrainer::new(CpuDevice::new(), &network, &data, &labels, &TrainConfig::default()).unwrap();
//! for _ in 0..10 {
//!     trainer.update_single_step();
//! }
//! assert!(trainer.cost().is_finite());
//! ```
//!
//! # Step order
//!
//! [`update_single_step`](NetTrainer::update_single_step) runs forward,
//! backward, ADAM, then cost. The cost is reduced from the error signal of
//! the forward pass *before* the update, so the value read after a step is
//! one step behind the parameters.

use ndarray::Array2;

use crate::activation::Activation;
use crate::cache::NetCache;
use crate::config::TrainConfig;
use crate::device::Device;
use crate::device_check;
use crate::error::{TrainError, TrainResult};
use crate::matrix::DeviceMatrix;
use crate::network::Network;
use crate::optimizer::{AdamMoments, GradientStore};
use crate::params::TrainParams;
use crate::profiler::{Profiler, Stage};
use crate::visual::Visualization;

/// Trains a dense network on a fixed batch held on `D`.
pub struct NetTrainer<D: Device> {
    device: D,
    layer_sizes: Vec<usize>,
    activations: Vec<Activation>,
    labels: DeviceMatrix<D>,
    params: TrainParams<D>,
    cache: NetCache<D>,
    derivative: GradientStore<D>,
    momentum: AdamMoments<D>,
    visual: Option<Visualization<D>>,
    profiler: Profiler,
}

impl<D: Device> NetTrainer<D> {
    /// Uploads the network, data and labels and allocates every per-layer
    /// buffer.
    ///
    /// `data` is `input_size × examples` and `labels` is
    /// `output_size × examples`: one column per example.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` or `network` is invalid, or if the data
    /// or labels disagree with the network's layer sizes or with each other.
    /// Device faults during upload terminate the process.
    pub fn new(
        device: D,
        network: &Network,
        data: &Array2<f32>,
        labels: &Array2<f32>,
        config: &TrainConfig,
    ) -> TrainResult<Self> {
        config.validate()?;
        network.validate()?;

        let examples = data.ncols();
        if examples == 0 {
            return Err(TrainError::invalid_network("training batch has no examples"));
        }
        if data.nrows() != network.input_size() {
            return Err(TrainError::shape_mismatch(
                &[network.input_size(), examples],
                &[data.nrows(), data.ncols()],
            ));
        }
        if labels.dim() != (network.output_size(), examples) {
            return Err(TrainError::shape_mismatch(
                &[network.output_size(), examples],
                &[labels.nrows(), labels.ncols()],
            ));
        }

        let labels_dev = device_check!(DeviceMatrix::to_device(&device, labels));
        let node_count = network.node_count();
        let mut params = TrainParams::new(config, node_count, examples);
        for (w, b) in network.weights.iter().zip(&network.biases) {
            let scaled = w * config.weight_scale;
            params.push_layer(
                device_check!(DeviceMatrix::to_device(&device, &scaled)),
                device_check!(DeviceMatrix::to_device(&device, b)),
            );
        }
        let cache = NetCache::new(device_check!(DeviceMatrix::to_device(&device, data)));

        let mut trainer = Self {
            device,
            layer_sizes: network.layer_sizes.clone(),
            activations: network.activations.clone(),
            labels: labels_dev,
            params,
            cache,
            derivative: GradientStore::new(),
            momentum: AdamMoments::new(),
            visual: None,
            profiler: Profiler::new(),
        };
        for i in 0..network.depth() {
            trainer.add_layer(network.layer_sizes[i + 1], network.layer_sizes[i]);
        }

        log::info!(
            "trainer ready on {}: layers {:?}, {} examples, learn_mult {:.3e}, reg_mult {:.3e}",
            trainer.device.name(),
            trainer.layer_sizes,
            examples,
            trainer.params.learn_mult,
            trainer.params.reg_mult
        );
        Ok(trainer)
    }

    /// Allocates the zeroed cache, gradient and moment slots of a layer with
    /// a `rows × cols` weight matrix.
    fn add_layer(&mut self, rows: usize, cols: usize) {
        let device = &self.device;
        device_check!(self.cache.push_layer(device, rows));
        device_check!(self.derivative.push_layer(device, rows, cols));
        device_check!(self.momentum.push_layer(device, rows, cols));
    }

    /// Recomputes every activation from the current parameters.
    pub fn forward_train(&mut self) {
        let Self {
            ref device,
            ref activations,
            ref params,
            ref mut cache,
            ref mut profiler,
            ..
        } = *self;
        device_check!(profiler.profile(Stage::Forward, device, || {
            cache.forward(device, params, activations)
        }));
    }

    /// Reduces the current output error signal into the cost and returns it.
    pub fn calc_cost(&mut self) -> f32 {
        let Self {
            ref device,
            ref params,
            ref mut cache,
            ref mut profiler,
            ..
        } = *self;
        device_check!(profiler.profile(Stage::CalcCost, device, || cache.calc_cost(device, params)))
    }

    /// Fills the error signals and the gradient store.
    ///
    /// Must follow a [`forward_train`](Self::forward_train) for the current
    /// parameters.
    pub fn backward_propagation(&mut self) {
        let Self {
            ref device,
            ref activations,
            ref labels,
            ref params,
            ref mut cache,
            ref mut derivative,
            ref mut profiler,
            ..
        } = *self;
        device_check!(profiler.profile(Stage::Backprop, device, || {
            cache.backward(device, params, labels, activations, derivative)
        }));
    }

    /// Plain gradient step on every parameter tensor.
    pub fn update_parameters(&mut self) {
        let Self {
            ref device,
            ref mut params,
            ref derivative,
            ref mut profiler,
            ..
        } = *self;
        device_check!(profiler.profile(Stage::Update, device, || {
            params.apply_gradients(device, derivative)
        }));
    }

    /// ADAM step on every parameter tensor.
    pub fn update_parameters_adam(&mut self) {
        let Self {
            ref device,
            ref mut params,
            ref derivative,
            ref mut momentum,
            ref mut profiler,
            ..
        } = *self;
        device_check!(profiler.profile(Stage::Update, device, || {
            params.apply_adam(device, derivative, momentum)
        }));
    }

    /// One training iteration: forward, backward, ADAM, then cost.
    ///
    /// Returns the cost of the parameters as they were *before* this step.
    pub fn update_single_step(&mut self) -> f32 {
        self.forward_train();
        self.backward_propagation();
        self.update_parameters_adam();
        let cost = self.calc_cost();

        log::debug!(
            "step {}: cost {:.6} (forward {:.3}ms, backprop {:.3}ms, update {:.3}ms, cost {:.3}ms)",
            self.momentum.t,
            cost,
            self.profiler.forward_time,
            self.profiler.backprop_time,
            self.profiler.update_time,
            self.profiler.calc_cost_time
        );
        cost
    }

    /// Allocates the visualization buffers for an `m × k` raster.
    ///
    /// `screen` holds one input point per column and must have exactly
    /// `m * k` columns. Rebuilding replaces any previous buffers.
    pub fn build_visualization(&mut self, screen: &Array2<f32>, m: usize, k: usize) -> TrainResult<()> {
        Visualization::<D>::check_target(screen, &self.layer_sizes, m, k)?;
        let visual = device_check!(Visualization::build(&self.device, screen, &self.layer_sizes, m, k));
        self.visual = Some(visual);
        Ok(())
    }

    /// Renders the current network over the screen into `out`.
    ///
    /// Reads the parameters only; the training cache and cost are untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if no visualization was built or if `out` does not
    /// hold exactly `m * k` pixels.
    pub fn visualization(&mut self, out: &mut [i32], discrete: bool) -> TrainResult<()> {
        let Self {
            ref device,
            ref activations,
            ref params,
            ref mut visual,
            ref mut profiler,
            ..
        } = *self;
        let visual = visual.as_mut().ok_or(TrainError::VisualizationNotBuilt)?;
        if out.len() != visual.pixel_count() {
            return Err(TrainError::VisualizationTarget {
                m: visual.m(),
                k: visual.k(),
                pixels: out.len(),
            });
        }
        device_check!(profiler.profile(Stage::Visualization, device, || {
            visual.render(device, params, activations, discrete, out)
        }));
        Ok(())
    }

    /// Copies the device weights and biases into `network`.
    ///
    /// # Errors
    ///
    /// Returns an error if `network` has different layer sizes.
    pub fn update_host_network(&self, network: &mut Network) -> TrainResult<()> {
        if network.layer_sizes != self.layer_sizes {
            return Err(TrainError::shape_mismatch(&self.layer_sizes, &network.layer_sizes));
        }
        network.weights.resize_with(self.params.depth(), || Array2::zeros((0, 0)));
        network.biases.resize_with(self.params.depth(), || Array2::zeros((0, 0)));
        for (i, (w, b)) in self.params.weights().iter().zip(self.params.biases()).enumerate() {
            network.weights[i] = device_check!(w.to_host(&self.device));
            network.biases[i] = device_check!(b.to_host(&self.device));
        }
        Ok(())
    }

    /// Adds `delta` to the learning rate, clamped below at 0.001.
    pub fn modify_learning_rate(&mut self, delta: f32) {
        let requested = self.params.learn_rate + delta;
        self.params.set_learn_rate(requested);
        if self.params.learn_rate != requested {
            log::warn!("learning rate {} clamped to {}", requested, self.params.learn_rate);
        }
    }

    /// Adds `delta` to the regularization term, clamped below at `f32::EPSILON`.
    pub fn modify_reg_term(&mut self, delta: f32) {
        let requested = self.params.reg_term + delta;
        self.params.set_reg_term(requested);
        if self.params.reg_term != requested {
            log::warn!("regularization term {} clamped to {}", requested, self.params.reg_term);
        }
    }

    /// The device this trainer runs on.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Parameter stacks and coefficients.
    pub fn train_params(&self) -> &TrainParams<D> {
        &self.params
    }

    /// Activations, error signals and cost.
    pub fn cache(&self) -> &NetCache<D> {
        &self.cache
    }

    /// Gradients of the most recent backward pass.
    pub fn gradients(&self) -> &GradientStore<D> {
        &self.derivative
    }

    /// ADAM moments.
    pub fn momentum(&self) -> &AdamMoments<D> {
        &self.momentum
    }

    /// Stage timings of the most recent calls.
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    /// Last computed cost.
    #[inline]
    pub fn cost(&self) -> f32 {
        self.cache.cost()
    }

    /// Number of training examples.
    #[inline]
    pub fn examples_count(&self) -> usize {
        self.params.train_examples_count
    }

    /// Layer widths, input first.
    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    /// One activation kind per layer.
    pub fn activations(&self) -> &[Activation] {
        &self.activations
    }

    /// Number of layers.
    #[inline]
    pub fn depth(&self) -> usize {
        self.params.depth()
    }
}
