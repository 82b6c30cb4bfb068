//! Host-side description of a dense feed-forward network.

use ndarray::Array2;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::activation::Activation;
use crate::error::{TrainError, TrainResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Layer sizes, activations and parameters of a dense network.
///
/// With `L = layer_sizes.len() - 1` layers:
/// - `weights[i]` is `layer_sizes[i + 1] × layer_sizes[i]`
/// - `biases[i]` is `layer_sizes[i + 1] × 1`
/// - `activations[i]` is applied at layer `i`'s output
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Network {
    /// Node counts, input first.
    pub layer_sizes: Vec<usize>,

    /// One activation per layer.
    pub activations: Vec<Activation>,

    /// Weight matrices.
    pub weights: Vec<Array2<f32>>,

    /// Bias column vectors.
    pub biases: Vec<Array2<f32>>,
}

impl Network {
    /// Creates a randomly initialized network.
    ///
    /// Weights are drawn uniformly from `±sqrt(1 / fan_in)`; biases start at
    /// zero. A fixed `seed` gives a reproducible network.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::InvalidNetwork`] if there are fewer than two
    /// sizes, a size is zero, or the activation count does not match.
    pub fn new(
        layer_sizes: &[usize],
        activations: &[Activation],
        seed: Option<u64>,
    ) -> TrainResult<Self> {
        validate_topology(layer_sizes, activations)?;

        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };

        let mut weights = Vec::with_capacity(layer_sizes.len() - 1);
        let mut biases = Vec::with_capacity(layer_sizes.len() - 1);
        for pair in layer_sizes.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let bound = (1.0 / fan_in as f32).sqrt();
            weights.push(Array2::from_shape_simple_fn((fan_out, fan_in), || {
                rng.gen_range(-bound..bound)
            }));
            biases.push(Array2::zeros((fan_out, 1)));
        }

        Ok(Self {
            layer_sizes: layer_sizes.to_vec(),
            activations: activations.to_vec(),
            weights,
            biases,
        })
    }

    /// Assembles a network from explicit parameters, checking every shape.
    pub fn from_parts(
        layer_sizes: Vec<usize>,
        activations: Vec<Activation>,
        weights: Vec<Array2<f32>>,
        biases: Vec<Array2<f32>>,
    ) -> TrainResult<Self> {
        let network = Self {
            layer_sizes,
            activations,
            weights,
            biases,
        };
        network.validate()?;
        Ok(network)
    }

    /// Checks that sizes, activations and parameter shapes agree.
    pub fn validate(&self) -> TrainResult<()> {
        validate_topology(&self.layer_sizes, &self.activations)?;

        let depth = self.depth();
        if self.weights.len() != depth || self.biases.len() != depth {
            return Err(TrainError::invalid_network(format!(
                "{} layers but {} weight and {} bias matrices",
                depth,
                self.weights.len(),
                self.biases.len()
            )));
        }

        for i in 0..depth {
            let (fan_in, fan_out) = (self.layer_sizes[i], self.layer_sizes[i + 1]);
            let w = self.weights[i].dim();
            if w != (fan_out, fan_in) {
                return Err(TrainError::shape_mismatch(&[fan_out, fan_in], &[w.0, w.1]));
            }
            let b = self.biases[i].dim();
            if b != (fan_out, 1) {
                return Err(TrainError::shape_mismatch(&[fan_out, 1], &[b.0, b.1]));
            }
        }
        Ok(())
    }

    /// Number of layers (weight matrices).
    #[inline]
    pub fn depth(&self) -> usize {
        self.layer_sizes.len() - 1
    }

    /// Width of the input layer.
    #[inline]
    pub fn input_size(&self) -> usize {
        self.layer_sizes[0]
    }

    /// Width of the output layer.
    #[inline]
    pub fn output_size(&self) -> usize {
        self.layer_sizes[self.layer_sizes.len() - 1]
    }

    /// Sum of all non-output layer sizes.
    pub fn node_count(&self) -> usize {
        self.layer_sizes[..self.depth()].iter().sum()
    }

    /// Total number of trainable parameters.
    pub fn param_count(&self) -> usize {
        self.weights.iter().map(|w| w.len()).sum::<usize>()
            + self.biases.iter().map(|b| b.len()).sum::<usize>()
    }

    /// Host forward pass over a batch stored column-per-example.
    ///
    /// # Panics
    ///
    /// Panics if `input` does not have `input_size()` rows.
    pub fn forward(&self, input: &Array2<f32>) -> Array2<f32> {
        assert_eq!(input.nrows(), self.input_size(), "input rows");

        let mut a = input.clone();
        for ((w, b), act) in self.weights.iter().zip(&self.biases).zip(&self.activations) {
            let z = w.dot(&a) + b;
            a = z.mapv(|x| act.apply(x));
        }
        a
    }
}

fn validate_topology(layer_sizes: &[usize], activations: &[Activation]) -> TrainResult<()> {
    if layer_sizes.len() < 2 {
        return Err(TrainError::invalid_network(format!(
            "need at least input and output layers, got {} sizes",
            layer_sizes.len()
        )));
    }
    if let Some(i) = layer_sizes.iter().position(|&s| s == 0) {
        return Err(TrainError::invalid_network(format!("layer {} has zero nodes", i)));
    }
    if activations.len() != layer_sizes.len() - 1 {
        return Err(TrainError::invalid_network(format!(
            "{} layers but {} activations",
            layer_sizes.len() - 1,
            activations.len()
        )));
    }
    Ok(())
}
