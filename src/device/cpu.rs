//! Host-memory reference device.
//!
//! Runs every kernel synchronously on the calling thread. Buffers are plain
//! `Vec`s in the same column-major layout the GPU kernels use, so results are
//! directly comparable.

use crate::activation::Activation;
use crate::color;
use crate::device::Device;
use crate::error::TrainResult;
use crate::loss;
use crate::matrix::DeviceMatrix;
use crate::optimizer::AdamStep;

/// Reference device backed by host memory.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuDevice;

impl CpuDevice {
    /// Creates the host device.
    pub fn new() -> Self {
        Self
    }
}

impl Device for CpuDevice {
    type Buffer = Vec<f32>;
    type PixelBuffer = Vec<i32>;

    fn name(&self) -> String {
        "cpu".to_string()
    }

    fn upload(&self, data: &[f32]) -> TrainResult<Vec<f32>> {
        Ok(data.to_vec())
    }

    fn zeros(&self, len: usize) -> TrainResult<Vec<f32>> {
        Ok(vec![0.0; len])
    }

    fn download(&self, buffer: &Vec<f32>, out: &mut [f32]) -> TrainResult<()> {
        out.copy_from_slice(buffer);
        Ok(())
    }

    fn alloc_pixels(&self, len: usize) -> TrainResult<Vec<i32>> {
        Ok(vec![0; len])
    }

    fn download_pixels(&self, pixels: &Vec<i32>, out: &mut [i32]) -> TrainResult<()> {
        out.copy_from_slice(pixels);
        Ok(())
    }

    fn synchronize(&self) -> TrainResult<()> {
        Ok(())
    }

    fn forward_layer(
        &self,
        out: &mut DeviceMatrix<Self>,
        w: &DeviceMatrix<Self>,
        input: &DeviceMatrix<Self>,
        b: &DeviceMatrix<Self>,
        activation: Activation,
    ) -> TrainResult<()> {
        let rows = w.rows();
        let inner = w.cols();
        debug_assert_eq!(input.rows(), inner);
        debug_assert_eq!(out.shape(), [rows, input.cols()]);
        debug_assert_eq!(b.shape(), [rows, 1]);

        let w = w.buffer();
        let x = input.buffer();
        let bias = b.buffer();

        for (c, col) in out.buffer_mut().chunks_exact_mut(rows).enumerate() {
            col.copy_from_slice(bias);
            let x_col = &x[c * inner..(c + 1) * inner];
            for (k, &xv) in x_col.iter().enumerate() {
                let w_col = &w[k * rows..(k + 1) * rows];
                for (acc, &wv) in col.iter_mut().zip(w_col) {
                    *acc += wv * xv;
                }
            }
            for v in col.iter_mut() {
                *v = activation.apply(*v);
            }
        }
        Ok(())
    }

    fn subtract(
        &self,
        out: &mut DeviceMatrix<Self>,
        lhs: &DeviceMatrix<Self>,
        rhs: &DeviceMatrix<Self>,
    ) -> TrainResult<()> {
        debug_assert_eq!(lhs.shape(), rhs.shape());
        debug_assert_eq!(out.shape(), lhs.shape());

        for ((o, &l), &r) in out
            .buffer_mut()
            .iter_mut()
            .zip(lhs.buffer())
            .zip(rhs.buffer())
        {
            *o = l - r;
        }
        Ok(())
    }

    fn back_activation(
        &self,
        dz: &mut DeviceMatrix<Self>,
        w_next: &DeviceMatrix<Self>,
        dz_next: &DeviceMatrix<Self>,
        a: &DeviceMatrix<Self>,
        activation: Activation,
    ) -> TrainResult<()> {
        let rows = dz.rows();
        let inner = w_next.rows();
        debug_assert_eq!(w_next.cols(), rows);
        debug_assert_eq!(dz_next.shape(), [inner, dz.cols()]);
        debug_assert_eq!(a.shape(), dz.shape());

        let w = w_next.buffer();
        let next = dz_next.buffer();
        let act = a.buffer();

        for (c, col) in dz.buffer_mut().chunks_exact_mut(rows).enumerate() {
            let next_col = &next[c * inner..(c + 1) * inner];
            let act_col = &act[c * rows..(c + 1) * rows];
            for (r, v) in col.iter_mut().enumerate() {
                // Column r of w_next is row r of its transpose.
                let w_col = &w[r * inner..(r + 1) * inner];
                let sum: f32 = w_col.iter().zip(next_col).map(|(wv, dv)| wv * dv).sum();
                *v = sum * activation.derivative(act_col[r]);
            }
        }
        Ok(())
    }

    fn set_dw(
        &self,
        dw: &mut DeviceMatrix<Self>,
        dz: &DeviceMatrix<Self>,
        a_prev: &DeviceMatrix<Self>,
        w: &DeviceMatrix<Self>,
        coefficiant: f32,
        reg: f32,
    ) -> TrainResult<()> {
        let rows = dw.rows();
        let cols = dw.cols();
        let examples = dz.cols();
        debug_assert_eq!(dz.rows(), rows);
        debug_assert_eq!(a_prev.shape(), [cols, examples]);
        debug_assert_eq!(w.shape(), dw.shape());

        let dz = dz.buffer();
        let a = a_prev.buffer();
        let out = dw.buffer_mut();
        out.iter_mut().for_each(|v| *v = 0.0);

        for c in 0..examples {
            let dz_col = &dz[c * rows..(c + 1) * rows];
            let a_col = &a[c * cols..(c + 1) * cols];
            for (k, &av) in a_col.iter().enumerate() {
                let out_col = &mut out[k * rows..(k + 1) * rows];
                for (o, &d) in out_col.iter_mut().zip(dz_col) {
                    *o += d * av;
                }
            }
        }
        for (o, &wv) in out.iter_mut().zip(w.buffer()) {
            *o = coefficiant * *o + reg * wv;
        }
        Ok(())
    }

    fn set_db(
        &self,
        db: &mut DeviceMatrix<Self>,
        dz: &DeviceMatrix<Self>,
        coefficiant: f32,
    ) -> TrainResult<()> {
        let rows = dz.rows();
        debug_assert_eq!(db.shape(), [rows, 1]);

        let out = db.buffer_mut();
        out.iter_mut().for_each(|v| *v = 0.0);
        for col in dz.buffer().chunks_exact(rows) {
            for (o, &d) in out.iter_mut().zip(col) {
                *o += d;
            }
        }
        out.iter_mut().for_each(|v| *v *= coefficiant);
        Ok(())
    }

    fn update_parameter(
        &self,
        param: &mut DeviceMatrix<Self>,
        grad: &DeviceMatrix<Self>,
        learn_mult: f32,
    ) -> TrainResult<()> {
        debug_assert_eq!(param.shape(), grad.shape());

        for (p, &g) in param.buffer_mut().iter_mut().zip(grad.buffer()) {
            *p -= learn_mult * g;
        }
        Ok(())
    }

    fn update_parameter_adam(
        &self,
        param: &mut DeviceMatrix<Self>,
        grad: &DeviceMatrix<Self>,
        first: &mut DeviceMatrix<Self>,
        second: &mut DeviceMatrix<Self>,
        step: &AdamStep,
    ) -> TrainResult<()> {
        debug_assert_eq!(param.shape(), grad.shape());
        debug_assert_eq!(param.shape(), first.shape());
        debug_assert_eq!(param.shape(), second.shape());

        for (((p, &g), m), v) in param
            .buffer_mut()
            .iter_mut()
            .zip(grad.buffer())
            .zip(first.buffer_mut().iter_mut())
            .zip(second.buffer_mut().iter_mut())
        {
            step.apply(p, g, m, v);
        }
        Ok(())
    }

    fn calc_cost(
        &self,
        dz_out: &DeviceMatrix<Self>,
        weights: &[DeviceMatrix<Self>],
        coefficiant: f32,
        reg_mult: f32,
    ) -> TrainResult<f32> {
        let loss_sum = loss::error_signal_loss(dz_out.buffer());
        let weight_sq: f32 = weights.iter().map(|w| loss::sum_squares(w.buffer())).sum();
        Ok(loss::cost_from_parts(loss_sum, weight_sq, coefficiant, reg_mult))
    }

    fn draw_pixels(
        &self,
        pixels: &mut Vec<i32>,
        m: usize,
        k: usize,
        out: &DeviceMatrix<Self>,
        discrete: bool,
    ) -> TrainResult<()> {
        let rows = out.rows();
        debug_assert_eq!(out.cols(), m * k);
        debug_assert_eq!(pixels.len(), m * k);

        for (pixel, col) in pixels.iter_mut().zip(out.buffer().chunks_exact(rows)) {
            *pixel = color::shade(col, discrete);
        }
        Ok(())
    }
}
