//! Unified error types for nettrain.
//!
//! This module provides [`TrainError`], the error type shared by the host
//! reference device and the GPU backend. It uses the `thiserror` crate for
//! ergonomic error handling.
//!
//! Two classes of failure exist:
//!
//! - **Precondition violations** (mismatched shapes, invalid configuration)
//!   are returned as `Err` from constructors so callers and tests can see them.
//! - **Device faults** (allocation, copy or kernel failures) inside the
//!   training pipeline are unrecoverable. They go through [`device_check!`],
//!   which logs the location and terminates the process.
//!
//! # Example
//!
//! ```rust
//! use nettrain::TrainError;
//!
//! fn validate_shape(expected: &[usize], got: &[usize]) -> Result<(), TrainError> {
//!     if expected != got {
//!         return Err(TrainError::shape_mismatch(expected, got));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::config::ConfigError;

/// Unified error type for nettrain operations.
#[derive(Error, Debug)]
pub enum TrainError {
    /// Shape mismatch between expected and actual matrix shapes.
    ///
    /// Raised when the network description, training data and labels do not
    /// agree on layer widths or example counts.
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape received.
        got: Vec<usize>,
    },

    /// Host-side matrix construction failed.
    #[error("Host matrix error: {0}")]
    HostShape(#[from] ndarray::ShapeError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Network description is inconsistent (depth, activations, layer count).
    #[error("Invalid network description: {0}")]
    InvalidNetwork(String),

    /// Visualization target does not match the screen matrix.
    #[error("Visualization target {m}x{k} does not match {pixels} screen columns")]
    VisualizationTarget {
        /// Target rows.
        m: usize,
        /// Target columns.
        k: usize,
        /// Columns (pixels) in the screen matrix.
        pixels: usize,
    },

    /// Visualization was rendered before being built.
    #[error("Visualization buffers have not been built")]
    VisualizationNotBuilt,

    /// Integer overflow in size calculations.
    #[error("Integer overflow: {0}")]
    Overflow(String),

    /// I/O error during matrix interchange.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reader or writer failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed matrix file (binary header or CSV cell).
    #[error("Malformed matrix data: {0}")]
    Parse(String),

    /// GPU device lost or validation failure reported by wgpu.
    #[cfg(feature = "gpu")]
    #[error("GPU device error: {0}")]
    DeviceError(#[from] wgpu::Error),

    /// GPU device request failed.
    #[cfg(feature = "gpu")]
    #[error("Failed to create GPU device: {0}")]
    DeviceRequestFailed(#[from] wgpu::RequestDeviceError),

    /// No suitable GPU adapter was found.
    #[cfg(feature = "gpu")]
    #[error("Failed to find suitable GPU adapter: {0}")]
    AdapterNotFound(String),

    /// GPU hardware doesn't support required limits.
    #[cfg(feature = "gpu")]
    #[error("Unsupported GPU limits: {0}")]
    UnsupportedLimits(String),

    /// Buffer allocation, copy or mapping failed.
    #[cfg(feature = "gpu")]
    #[error("Buffer operation failed: {0}")]
    BufferError(String),
}

/// Result type alias for nettrain operations.
pub type TrainResult<T> = Result<T, TrainError>;

impl TrainError {
    /// Creates a shape mismatch error.
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        TrainError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Creates an invalid network error.
    pub fn invalid_network<S: Into<String>>(msg: S) -> Self {
        TrainError::InvalidNetwork(msg.into())
    }

    /// Creates an overflow error.
    pub fn overflow<S: Into<String>>(msg: S) -> Self {
        TrainError::Overflow(msg.into())
    }

    /// Creates a parse error.
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        TrainError::Parse(msg.into())
    }

    /// Creates a GPU buffer error.
    #[cfg(feature = "gpu")]
    pub fn buffer<S: Into<String>>(msg: S) -> Self {
        TrainError::BufferError(msg.into())
    }

    /// Creates a GPU unsupported limits error.
    #[cfg(feature = "gpu")]
    pub fn unsupported_limits<S: Into<String>>(msg: S) -> Self {
        TrainError::UnsupportedLimits(msg.into())
    }

    /// Creates an adapter not found error.
    #[cfg(feature = "gpu")]
    pub fn adapter_not_found<S: Into<String>>(msg: S) -> Self {
        TrainError::AdapterNotFound(msg.into())
    }
}

/// Reports an unrecoverable device fault and terminates the process.
///
/// Called by [`device_check!`]; the device context is unusable after any
/// allocation, copy or kernel failure, so nothing is retried.
#[cold]
pub fn fatal(file: &str, line: u32, err: &dyn std::fmt::Display) -> ! {
    log::error!("device check failed at {} ({}): {}", file, line, err);
    eprintln!("#DEVICE ERROR::device_check() failed at {} ({}) : {}", file, line, err);
    std::process::exit(-1)
}

/// Unwraps a device result or aborts with file/line diagnostics.
///
/// ```rust,ignore
/// let host = device_check!(matrix.to_host(&device));
/// ```
#[macro_export]
macro_rules! device_check {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(err) => $crate::error::fatal(file!(), line!(), &err),
        }
    };
}
