//! Cost reduction used by the training engine.
//!
//! The cost is computed from the output layer's error signal rather than from
//! predictions and labels, so it can run after the labels have been consumed
//! by backpropagation:
//!
//! - [`error_signal_loss`] - per-example loss term from `dZ = A - Y`
//! - [`sum_squares`] - L2 penalty contribution of one weight tensor
//! - [`cost_from_parts`] - the combined scalar stored in the cache
//!
//! For binary labels with a sigmoid output, `-ln(1 - |dZ|)` is exactly the
//! binary cross-entropy of that example.
//!
//! # Example
//!
//! ```rust
//! use nettrain::loss::{binary_cross_entropy, error_signal_loss};
//!
//! let predictions = vec![0.8, 0.3];
//! let targets = vec![1.0, 0.0];
//! let errors: Vec<f32> = predictions.iter().zip(&targets).map(|(p, t)| p - t).collect();
//!
//! let from_errors = error_signal_loss(&errors);
//! let reference = binary_cross_entropy(&predictions, &targets);
//! assert!((from_errors - reference).abs() < 1e-5);
//! ```

/// Floor applied inside the logarithm to avoid `ln(0)`.
pub const LOG_FLOOR: f32 = 1e-7;

/// Weight of the squared-weight sum in the cost, relative to `reg_mult`.
///
/// The weight gradient adds `0.5 * reg_mod * W`, which is the derivative of
/// `0.25 * reg_mod * Σ W²`.
pub const REG_COST_SCALE: f32 = 0.25;

/// Sums `-ln(1 - |e|)` over an error signal.
pub fn error_signal_loss(errors: &[f32]) -> f32 {
    errors
        .iter()
        .map(|e| -(1.0 - e.abs()).max(LOG_FLOOR).ln())
        .sum()
}

/// Sums the squares of a tensor.
pub fn sum_squares(values: &[f32]) -> f32 {
    values.iter().map(|v| v * v).sum()
}

/// Combines the reduced parts into the scalar cost.
///
/// # Arguments
///
/// * `loss_sum` - Output of [`error_signal_loss`] over the whole batch
/// * `weight_sq_sum` - Output of [`sum_squares`] summed over every layer
/// * `coefficiant` - `1 / example_count`
/// * `reg_mult` - `reg_term / node_count`
#[inline]
pub fn cost_from_parts(loss_sum: f32, weight_sq_sum: f32, coefficiant: f32, reg_mult: f32) -> f32 {
    coefficiant * loss_sum + REG_COST_SCALE * reg_mult * weight_sq_sum
}

/// Mean binary cross-entropy of predictions against targets.
///
/// Reference implementation used to check the error-signal formulation.
/// Predictions are clamped to `[LOG_FLOOR, 1 - LOG_FLOOR]`.
pub fn binary_cross_entropy(predictions: &[f32], targets: &[f32]) -> f32 {
    debug_assert_eq!(predictions.len(), targets.len());
    if predictions.is_empty() {
        return 0.0;
    }
    let sum: f32 = predictions
        .iter()
        .zip(targets)
        .map(|(&p, &t)| {
            let p = p.clamp(LOG_FLOOR, 1.0 - LOG_FLOOR);
            -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
        })
        .sum();
    sum / predictions.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_signal_matches_bce() {
        let predictions = [0.5f32, 0.455, 0.627, 0.532];
        let targets = [0.0f32, 1.0, 1.0, 0.0];
        let errors: Vec<f32> = predictions
            .iter()
            .zip(&targets)
            .map(|(p, t)| p - t)
            .collect();

        let mean = error_signal_loss(&errors) / errors.len() as f32;
        let reference = binary_cross_entropy(&predictions, &targets);
        assert!((mean - reference).abs() < 1e-5, "{mean} vs {reference}");
    }

    #[test]
    fn test_error_signal_floor() {
        // |e| = 1 would be ln(0); the floor keeps it finite.
        let loss = error_signal_loss(&[1.0]);
        assert!(loss.is_finite());
        assert!(loss > 15.0);
    }

    #[test]
    fn test_cost_from_parts() {
        let cost = cost_from_parts(2.0, 4.0, 0.5, 0.1);
        assert!((cost - (1.0 + 0.25 * 0.1 * 4.0)).abs() < 1e-6);
    }

    #[test]
    fn test_sum_squares() {
        assert_eq!(sum_squares(&[1.0, -2.0, 3.0]), 14.0);
        assert_eq!(sum_squares(&[]), 0.0);
    }
}
