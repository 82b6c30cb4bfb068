//! # nettrain - Device-Resident Dense Network Training
//!
//! Trains a fully connected feed-forward network on a fixed batch whose
//! parameters, activations, gradients and optimizer moments all live on a
//! compute device. The host only uploads the network once, reads back a
//! scalar cost per step, and copies the trained weights back on request.
//!
//! ## Architecture
//! - Column-major device buffers, one column per example
//! - A [`Device`] trait with a host reference implementation ([`CpuDevice`])
//!   and a wgpu implementation (`gpu::WgpuDevice`, feature `gpu`)
//! - ADAM with bias correction, plain gradient descent, L2 regularization
//! - Optional per-stage timing and a decision-surface raster
//!
//! ## Usage
//! ```rust
//! use ndarray::array;
//! use nettrain::{Activation, CpuDevice, NetTrainer, Network, TrainConfig};
//!
//! let mut network = Network::new(&[2, 3, 1], &[Activation::ReLU, Activation::Sigmoid], Some(1)).unwrap();
//! let x = array![[0.0, 0.0, 1.0, 1.0], [0.0, 1.0, 0.0, 1.0]];
//! let y = array![[0.0, 1.0, 1.0, 0.0]];
//!
//! let mut trainer = NetTrainer::new(CpuDevice::new(), &network, &x, &y, &TrainConfig::default()).unwrap();
//! trainer.update_single_step();
//! trainer.update_host_network(&mut network).unwrap();
//! ```

pub mod activation;
pub mod cache;
pub mod color;
pub mod config;
pub mod device;
pub mod error;
pub mod io;
pub mod loss;
pub mod matrix;
pub mod network;
pub mod optimizer;
pub mod params;
pub mod profiler;
pub mod trainer;
pub mod visual;

#[cfg(feature = "gpu")]
pub mod gpu;

// Re-exports
pub use activation::Activation;
pub use cache::NetCache;
pub use color::{Color, PALETTE};
pub use config::{ConfigError, TrainConfig, MIN_LEARN_RATE, MIN_REG_TERM};
pub use device::{CpuDevice, Device};
pub use error::{TrainError, TrainResult};
pub use io::{read_binary, read_csv, remove_column, split_labels, write_binary, write_csv};
pub use matrix::DeviceMatrix;
pub use network::Network;
pub use optimizer::{AdamMoments, AdamStep, GradientStore, ADAM_BETA1, ADAM_BETA2, ADAM_EPSILON};
pub use params::TrainParams;
pub use profiler::{Profiler, Stage};
pub use trainer::NetTrainer;
pub use visual::Visualization;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
