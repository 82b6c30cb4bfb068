//! Rendering of network outputs over a grid of sample points.
//!
//! The visualization owns its own activation stack, seeded with a "screen"
//! matrix whose columns are the input points of an `m × k` raster. Rendering
//! reads the trainer's parameters but never writes the training cache, the
//! parameters or the cost.

use ndarray::Array2;

use crate::activation::Activation;
use crate::device::Device;
use crate::error::{TrainError, TrainResult};
use crate::matrix::DeviceMatrix;
use crate::params::TrainParams;

/// Device buffers for rendering one `m × k` raster.
pub struct Visualization<D: Device> {
    stack: Vec<DeviceMatrix<D>>,
    pixels: D::PixelBuffer,
    m: usize,
    k: usize,
}

impl<D: Device> Visualization<D> {
    /// Uploads the screen matrix and allocates the activation stack and
    /// pixel buffer.
    ///
    /// `layer_sizes` must match `params`. The screen must have one row per
    /// input node and exactly `m * k` columns.
    pub fn build(
        device: &D,
        screen: &Array2<f32>,
        layer_sizes: &[usize],
        m: usize,
        k: usize,
    ) -> TrainResult<Self> {
        let pixels = Self::check_target(screen, layer_sizes, m, k)?;

        let mut stack = Vec::with_capacity(layer_sizes.len());
        stack.push(DeviceMatrix::to_device(device, screen)?);
        for &rows in &layer_sizes[1..] {
            stack.push(DeviceMatrix::zeros(device, rows, pixels)?);
        }
        let pixels_buf = device.alloc_pixels(pixels)?;

        log::debug!(
            "visualization built: {}x{} raster, {} layers",
            m,
            k,
            layer_sizes.len() - 1
        );

        Ok(Self {
            stack,
            pixels: pixels_buf,
            m,
            k,
        })
    }

    /// Checks the screen against the raster size and the input width.
    /// Returns the pixel count.
    pub fn check_target(
        screen: &Array2<f32>,
        layer_sizes: &[usize],
        m: usize,
        k: usize,
    ) -> TrainResult<usize> {
        let pixels = m
            .checked_mul(k)
            .ok_or_else(|| TrainError::overflow(format!("{} x {} raster", m, k)))?;
        if screen.ncols() != pixels {
            return Err(TrainError::VisualizationTarget {
                m,
                k,
                pixels: screen.ncols(),
            });
        }
        if screen.nrows() != layer_sizes[0] {
            return Err(TrainError::shape_mismatch(
                &[layer_sizes[0], pixels],
                &[screen.nrows(), screen.ncols()],
            ));
        }
        Ok(pixels)
    }

    /// Raster height.
    #[inline]
    pub fn m(&self) -> usize {
        self.m
    }

    /// Raster width.
    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    /// Number of pixels.
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.m * self.k
    }

    /// Forward pass over the screen, rasterization, and copy into `out`.
    pub fn render(
        &mut self,
        device: &D,
        params: &TrainParams<D>,
        activations: &[Activation],
        discrete: bool,
        out: &mut [i32],
    ) -> TrainResult<()> {
        params.forward_into(device, &mut self.stack, activations)?;
        let last = self.stack.len() - 1;
        device.draw_pixels(&mut self.pixels, self.m, self.k, &self.stack[last], discrete)?;
        device.download_pixels(&self.pixels, out)
    }
}
