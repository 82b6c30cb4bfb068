//! Activation kinds and their element-wise kernels.
//!
//! The set is closed: every layer declares one of six kinds, and both the
//! forward kernel and the backward derivative kernel dispatch on the tag.
//! Derivatives are expressed in terms of the activation *output* `a`, since
//! the training cache keeps activations but not pre-activations.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Negative-side slope of [`Activation::LeakyReLU`].
pub const LEAKY_SLOPE: f32 = 0.01;

/// Nonlinearity applied at a layer's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Activation {
    /// Logistic function `1 / (1 + e^-x)`.
    #[default]
    Sigmoid,
    /// Hyperbolic tangent.
    Tanh,
    /// Rectified linear unit.
    ReLU,
    /// ReLU with a small negative slope.
    LeakyReLU,
    /// `sin(x)`.
    Sine,
    /// Identity.
    Linear,
}

impl Activation {
    /// All kinds, in tag order.
    pub const ALL: [Activation; 6] = [
        Activation::Sigmoid,
        Activation::Tanh,
        Activation::ReLU,
        Activation::LeakyReLU,
        Activation::Sine,
        Activation::Linear,
    ];

    /// Applies the activation to a pre-activation value.
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::ReLU => x.max(0.0),
            Activation::LeakyReLU => {
                if x > 0.0 {
                    x
                } else {
                    LEAKY_SLOPE * x
                }
            }
            Activation::Sine => x.sin(),
            Activation::Linear => x,
        }
    }

    /// Derivative of the activation, given its output `a`.
    ///
    /// For [`Activation::Sine`] this is `cos(asin(a))`, exact while the
    /// pre-activation stays inside `(-π/2, π/2)`.
    #[inline]
    pub fn derivative(self, a: f32) -> f32 {
        match self {
            Activation::Sigmoid => a * (1.0 - a),
            Activation::Tanh => 1.0 - a * a,
            Activation::ReLU => {
                if a > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::LeakyReLU => {
                if a > 0.0 {
                    1.0
                } else {
                    LEAKY_SLOPE
                }
            }
            Activation::Sine => (1.0 - a * a).max(0.0).sqrt(),
            Activation::Linear => 1.0,
        }
    }

    /// Numeric tag shared with the GPU kernels.
    #[inline]
    pub const fn tag(self) -> u32 {
        match self {
            Activation::Sigmoid => 0,
            Activation::Tanh => 1,
            Activation::ReLU => 2,
            Activation::LeakyReLU => 3,
            Activation::Sine => 4,
            Activation::Linear => 5,
        }
    }

    /// Inverse of [`tag`](Self::tag).
    pub fn from_tag(tag: u32) -> Option<Self> {
        Self::ALL.get(tag as usize).copied()
    }
}

impl std::fmt::Display for Activation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::ReLU => "relu",
            Activation::LeakyReLU => "leaky_relu",
            Activation::Sine => "sine",
            Activation::Linear => "linear",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for act in Activation::ALL {
            assert_eq!(Activation::from_tag(act.tag()), Some(act));
        }
        assert_eq!(Activation::from_tag(6), None);
    }

    #[test]
    fn test_derivative_matches_finite_difference() {
        let h = 1e-3f32;
        for act in Activation::ALL {
            for &x in &[-0.9f32, -0.3, 0.2, 0.7] {
                let numeric = (act.apply(x + h) - act.apply(x - h)) / (2.0 * h);
                let analytic = act.derivative(act.apply(x));
                assert!(
                    (numeric - analytic).abs() < 1e-2,
                    "{act} at {x}: numeric {numeric}, analytic {analytic}"
                );
            }
        }
    }

    #[test]
    fn test_relu_family_at_zero() {
        assert_eq!(Activation::ReLU.apply(-2.0), 0.0);
        assert_eq!(Activation::ReLU.derivative(0.0), 0.0);
        assert_eq!(Activation::LeakyReLU.apply(-2.0), -0.02);
        assert_eq!(Activation::LeakyReLU.derivative(-0.02), LEAKY_SLOPE);
    }

    #[test]
    fn test_linear_is_identity() {
        assert_eq!(Activation::Linear.apply(3.5), 3.5);
        assert_eq!(Activation::Linear.derivative(3.5), 1.0);
    }
}
