//! Training configuration and hyperparameters.
//!
//! This module provides [`TrainConfig`] for the scalar hyperparameters handed
//! to [`NetTrainer`](crate::NetTrainer) at construction.
//!
//! # Example
//!
//! ```rust
//! use nettrain::TrainConfig;
//!
//! let config = TrainConfig {
//!     learn_rate: 0.1,
//!     reg_term: 0.0,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```
//!
//! # Derived coefficients
//!
//! The trainer never uses `learn_rate` or `reg_term` directly. Both are scaled
//! by the reciprocal of the network's node count:
//!
//! | Stored | Formula |
//! |--------|---------|
//! | `learn_mult` | `learn_rate / node_count` |
//! | `reg_mult`, `reg_mod` | `reg_term / node_count` |
//! | `coefficiant` | `1 / example_count` |

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lower bound applied when the learning rate is edited during training.
pub const MIN_LEARN_RATE: f32 = 0.001;

/// Lower bound applied when the regularization term is edited during training.
pub const MIN_REG_TERM: f32 = f32::EPSILON;

/// Scalar hyperparameters for a training run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrainConfig {
    /// Factor applied to the host weights when they are pushed to the device.
    pub weight_scale: f32,

    /// Base learning rate, divided by the node count before use.
    pub learn_rate: f32,

    /// L2 regularization strength, divided by the node count before use.
    pub reg_term: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            weight_scale: 1.0,
            learn_rate: 0.1,
            reg_term: 0.0,
        }
    }
}

impl TrainConfig {
    /// Creates a config with the given learning rate.
    pub fn with_learn_rate(learn_rate: f32) -> Self {
        Self {
            learn_rate,
            ..Default::default()
        }
    }

    /// Creates a config with learning rate and regularization.
    pub fn with_reg(learn_rate: f32, reg_term: f32) -> Self {
        Self {
            learn_rate,
            reg_term,
            ..Default::default()
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any value is non-finite, the learning rate
    /// is not positive, the regularization term is negative, or the weight
    /// scale is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.learn_rate.is_finite() || self.learn_rate <= 0.0 {
            return Err(ConfigError::InvalidLearnRate(self.learn_rate));
        }
        if !self.reg_term.is_finite() || self.reg_term < 0.0 {
            return Err(ConfigError::InvalidRegTerm(self.reg_term));
        }
        if !self.weight_scale.is_finite() || self.weight_scale == 0.0 {
            return Err(ConfigError::InvalidWeightScale(self.weight_scale));
        }
        Ok(())
    }
}

/// Errors returned by [`TrainConfig::validate`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Learning rate must be finite and positive.
    #[error("Learning rate must be finite and > 0, got {0}")]
    InvalidLearnRate(f32),

    /// Regularization term must be finite and non-negative.
    #[error("Regularization term must be finite and >= 0, got {0}")]
    InvalidRegTerm(f32),

    /// Weight scale must be finite and non-zero.
    #[error("Weight scale must be finite and non-zero, got {0}")]
    InvalidWeightScale(f32),
}
