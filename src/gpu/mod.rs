//! wgpu compute backend.
//!
//! Available with the `gpu` feature. [`WgpuDevice`] implements
//! [`Device`](crate::Device) with WGSL compute kernels, so a
//! [`NetTrainer`](crate::NetTrainer) runs unchanged on it.
//!
//! # Example
//!
//! ```rust,no_run
//! use ndarray::array;
//! use nettrain::gpu::{WgpuDevice, WgpuOptions};
//! use nettrain::{Activation, NetTrainer, Network, TrainConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let device = WgpuDevice::new(WgpuOptions::default())?;
//! let network = Network::new(&[2, 4, 1], &[Activation::Tanh, Activation::Sigmoid], Some(7))?;
//! let x = array![[0.0, 0.0, 1.0, 1.0], [0.0, 1.0, 0.0, 1.0]];
//! let y = array![[0.0, 1.0, 1.0, 0.0]];
//!
//! let mut trainer = NetTrainer::new(device, &network, &x, &y, &TrainConfig::default())?;
//! let cost = trainer.update_single_step();
//! # let _ = cost;
//! # Ok(())
//! # }
//! ```
//!
//! # Memory
//!
//! Every matrix is one storage buffer. Allocations above
//! [`MAX_VRAM_ALLOC`] are refused with
//! [`TrainError::BufferError`](crate::TrainError::BufferError).

mod backend;
mod kernels;
pub mod optimizer;
mod pipeline;
pub mod shaders;
mod tensor;
mod uniforms;

pub use backend::{PowerPreference, WgpuDevice, WgpuOptions};
pub use optimizer::AdamUniforms;
pub use pipeline::{dispatch_size, workgroup_count, Kernel, WORKGROUP_SIZE};
pub use tensor::{GpuBuffer, GpuPixels, GpuTensor};
pub use uniforms::KernelUniforms;

/// Maximum VRAM allocation per buffer (2GB).
pub const MAX_VRAM_ALLOC: u64 = 2 * 1024 * 1024 * 1024;

/// Checks if a size in bytes exceeds the maximum VRAM allocation limit.
#[inline]
pub fn exceeds_vram_limit(size_bytes: u64) -> bool {
    size_bytes > MAX_VRAM_ALLOC
}
