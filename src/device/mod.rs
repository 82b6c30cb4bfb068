//! Device abstraction: the numeric kernel library consumed by the trainer.
//!
//! The trainer never touches device memory directly. It owns
//! [`DeviceMatrix`] handles and asks a [`Device`] to run kernels on them,
//! in program order, on a single ordered stream.
//!
//! Two implementations exist:
//!
//! - [`CpuDevice`] - host-memory reference kernels, always available
//! - `WgpuDevice` - WGSL compute kernels (feature `gpu`)
//!
//! # Layout
//!
//! Every device buffer is column-major: element `(r, c)` of a matrix with
//! `rows` rows lives at `c * rows + r`. Host matrices are converted on
//! transfer by [`DeviceMatrix::to_device`] and [`DeviceMatrix::to_host`].
//!
//! # Borrowing contract
//!
//! Kernels take exclusive borrows of the matrices they write and shared
//! borrows of everything they only read, so a stage's read/write set is
//! visible in its signature.

mod cpu;

pub use cpu::CpuDevice;

use crate::activation::Activation;
use crate::error::TrainResult;
use crate::matrix::DeviceMatrix;
use crate::optimizer::AdamStep;

/// The primitive kernel API of an accelerator.
pub trait Device: Sized {
    /// Owning f32 buffer resident on the device.
    type Buffer;

    /// Owning i32 buffer used as the visualization render target.
    type PixelBuffer;

    /// Human-readable name of the device, for logging.
    fn name(&self) -> String;

    /// Allocates a buffer holding a copy of `data`.
    fn upload(&self, data: &[f32]) -> TrainResult<Self::Buffer>;

    /// Allocates a zero-filled buffer of `len` elements.
    fn zeros(&self, len: usize) -> TrainResult<Self::Buffer>;

    /// Copies a whole buffer back into `out`. Blocks until the copy lands.
    fn download(&self, buffer: &Self::Buffer, out: &mut [f32]) -> TrainResult<()>;

    /// Allocates a zero-filled pixel buffer of `len` elements.
    fn alloc_pixels(&self, len: usize) -> TrainResult<Self::PixelBuffer>;

    /// Copies a pixel buffer back into `out`. Blocks until the copy lands.
    fn download_pixels(&self, pixels: &Self::PixelBuffer, out: &mut [i32]) -> TrainResult<()>;

    /// Waits until every previously enqueued operation has finished.
    fn synchronize(&self) -> TrainResult<()>;

    /// `out = activation(w · input + b)`, with `b` broadcast over columns.
    fn forward_layer(
        &self,
        out: &mut DeviceMatrix<Self>,
        w: &DeviceMatrix<Self>,
        input: &DeviceMatrix<Self>,
        b: &DeviceMatrix<Self>,
        activation: Activation,
    ) -> TrainResult<()>;

    /// `out = lhs - rhs`, element-wise.
    fn subtract(
        &self,
        out: &mut DeviceMatrix<Self>,
        lhs: &DeviceMatrix<Self>,
        rhs: &DeviceMatrix<Self>,
    ) -> TrainResult<()>;

    /// `dz = (w_nextᵀ · dz_next) ⊙ activation'(a)`.
    fn back_activation(
        &self,
        dz: &mut DeviceMatrix<Self>,
        w_next: &DeviceMatrix<Self>,
        dz_next: &DeviceMatrix<Self>,
        a: &DeviceMatrix<Self>,
        activation: Activation,
    ) -> TrainResult<()>;

    /// `dw = coefficiant · dz · a_prevᵀ + reg · w`.
    fn set_dw(
        &self,
        dw: &mut DeviceMatrix<Self>,
        dz: &DeviceMatrix<Self>,
        a_prev: &DeviceMatrix<Self>,
        w: &DeviceMatrix<Self>,
        coefficiant: f32,
        reg: f32,
    ) -> TrainResult<()>;

    /// `db = coefficiant · rowSum(dz)`.
    fn set_db(
        &self,
        db: &mut DeviceMatrix<Self>,
        dz: &DeviceMatrix<Self>,
        coefficiant: f32,
    ) -> TrainResult<()>;

    /// `param -= learn_mult · grad`.
    fn update_parameter(
        &self,
        param: &mut DeviceMatrix<Self>,
        grad: &DeviceMatrix<Self>,
        learn_mult: f32,
    ) -> TrainResult<()>;

    /// One ADAM update of `param`, evolving the moment tensors in place.
    fn update_parameter_adam(
        &self,
        param: &mut DeviceMatrix<Self>,
        grad: &DeviceMatrix<Self>,
        first: &mut DeviceMatrix<Self>,
        second: &mut DeviceMatrix<Self>,
        step: &AdamStep,
    ) -> TrainResult<()>;

    /// Reduces the output error signal and the weight stack into the cost.
    ///
    /// See [`loss::cost_from_parts`](crate::loss::cost_from_parts) for the formula.
    fn calc_cost(
        &self,
        dz_out: &DeviceMatrix<Self>,
        weights: &[DeviceMatrix<Self>],
        coefficiant: f32,
        reg_mult: f32,
    ) -> TrainResult<f32>;

    /// Rasterizes the columns of `out` into an `m × k` pixel buffer.
    fn draw_pixels(
        &self,
        pixels: &mut Self::PixelBuffer,
        m: usize,
        k: usize,
        out: &DeviceMatrix<Self>,
        discrete: bool,
    ) -> TrainResult<()>;
}
