//! [`Device`] implementation for [`WgpuDevice`].
//!
//! Each kernel validates nothing beyond what the trainer already checked: it
//! packs a [`KernelUniforms`] block and enqueues one dispatch. Shapes are
//! asserted in debug builds only, matching the host reference device.

use crate::activation::Activation;
use crate::device::Device;
use crate::error::{TrainError, TrainResult};
use crate::gpu::backend::WgpuDevice;
use crate::gpu::optimizer::AdamUniforms;
use crate::gpu::pipeline::{Grid, Kernel};
use crate::gpu::tensor::{GpuPixels, GpuTensor};
use crate::gpu::uniforms::KernelUniforms;
use crate::loss;
use crate::matrix::DeviceMatrix;
use crate::optimizer::AdamStep;

/// Reduction modes of `reduce_sum`.
const REDUCE_LOSS: u32 = 0;
const REDUCE_SQUARES: u32 = 1;

impl WgpuDevice {
    fn run(&self, kernel: Kernel, buffers: &[&wgpu::Buffer], uniforms: &KernelUniforms, grid: Grid) {
        self.pipelines
            .dispatch(&self.queue, kernel, buffers, bytemuck::bytes_of(uniforms), grid);
    }
}

impl Device for WgpuDevice {
    type Buffer = GpuTensor;
    type PixelBuffer = GpuPixels;

    fn name(&self) -> String {
        let info = self.adapter_info();
        format!("{} ({:?})", info.name, info.backend)
    }

    fn upload(&self, data: &[f32]) -> TrainResult<GpuTensor> {
        GpuTensor::upload(&self.device, data)
    }

    fn zeros(&self, len: usize) -> TrainResult<GpuTensor> {
        GpuTensor::zeros(&self.device, len)
    }

    fn download(&self, buffer: &GpuTensor, out: &mut [f32]) -> TrainResult<()> {
        buffer.download(&self.device, &self.queue, out)
    }

    fn alloc_pixels(&self, len: usize) -> TrainResult<GpuPixels> {
        GpuPixels::zeros(&self.device, len)
    }

    fn download_pixels(&self, pixels: &GpuPixels, out: &mut [i32]) -> TrainResult<()> {
        pixels.download(&self.device, &self.queue, out)
    }

    fn synchronize(&self) -> TrainResult<()> {
        if self.device.poll(wgpu::Maintain::Wait).is_queue_empty() {
            Ok(())
        } else {
            Err(TrainError::buffer("queue still busy after wait"))
        }
    }

    fn forward_layer(
        &self,
        out: &mut DeviceMatrix<Self>,
        w: &DeviceMatrix<Self>,
        input: &DeviceMatrix<Self>,
        b: &DeviceMatrix<Self>,
        activation: Activation,
    ) -> TrainResult<()> {
        debug_assert_eq!(input.rows(), w.cols());
        debug_assert_eq!(out.shape(), [w.rows(), input.cols()]);

        let uniforms = KernelUniforms::elements(out.len())?
            .with_dims(out.rows(), out.cols(), w.cols())?
            .with_mode(activation.tag());
        self.run(
            Kernel::Forward,
            &[
                &w.buffer().buffer,
                &input.buffer().buffer,
                &b.buffer().buffer,
                &out.buffer().buffer,
            ],
            &uniforms,
            Grid::Elements(out.len()),
        );
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

        let uniforms = KernelUniforms::elements(out.len())?;
        self.run(
            Kernel::Subtract,
            &[&lhs.buffer().buffer, &rhs.buffer().buffer, &out.buffer().buffer],
            &uniforms,
            Grid::Elements(out.len()),
        );
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
        debug_assert_eq!(w_next.cols(), dz.rows());
        debug_assert_eq!(a.shape(), dz.shape());

        let uniforms = KernelUniforms::elements(dz.len())?
            .with_dims(dz.rows(), dz.cols(), w_next.rows())?
            .with_mode(activation.tag());
        self.run(
            Kernel::BackActivation,
            &[
                &w_next.buffer().buffer,
                &dz_next.buffer().buffer,
                &a.buffer().buffer,
                &dz.buffer().buffer,
            ],
            &uniforms,
            Grid::Elements(dz.len()),
        );
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
        debug_assert_eq!(a_prev.shape(), [dw.cols(), dz.cols()]);
        debug_assert_eq!(w.shape(), dw.shape());

        let uniforms = KernelUniforms::elements(dw.len())?
            .with_dims(dw.rows(), dw.cols(), dz.cols())?
            .with_scale(coefficiant, reg);
        self.run(
            Kernel::SetDw,
            &[
                &dz.buffer().buffer,
                &a_prev.buffer().buffer,
                &w.buffer().buffer,
                &dw.buffer().buffer,
            ],
            &uniforms,
            Grid::Elements(dw.len()),
        );
        Ok(())
    }

    fn set_db(
        &self,
        db: &mut DeviceMatrix<Self>,
        dz: &DeviceMatrix<Self>,
        coefficiant: f32,
    ) -> TrainResult<()> {
        debug_assert_eq!(db.shape(), [dz.rows(), 1]);

        let uniforms = KernelUniforms::elements(db.len())?
            .with_dims(dz.rows(), dz.cols(), 0)?
            .with_scale(coefficiant, 0.0);
        self.run(
            Kernel::SetDb,
            &[&dz.buffer().buffer, &db.buffer().buffer],
            &uniforms,
            Grid::Elements(db.len()),
        );
        Ok(())
    }

    fn update_parameter(
        &self,
        param: &mut DeviceMatrix<Self>,
        grad: &DeviceMatrix<Self>,
        learn_mult: f32,
    ) -> TrainResult<()> {
        debug_assert_eq!(param.shape(), grad.shape());

        let uniforms = KernelUniforms::elements(param.len())?.with_scale(learn_mult, 0.0);
        self.run(
            Kernel::Update,
            &[&grad.buffer().buffer, &param.buffer().buffer],
            &uniforms,
            Grid::Elements(param.len()),
        );
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

        let uniforms = AdamUniforms::new(step, param.len())?;
        self.pipelines.dispatch(
            &self.queue,
            Kernel::Adam,
            &[
                &grad.buffer().buffer,
                &param.buffer().buffer,
                &first.buffer().buffer,
                &second.buffer().buffer,
            ],
            bytemuck::bytes_of(&uniforms),
            Grid::Elements(param.len()),
        );
        Ok(())
    }

    fn calc_cost(
        &self,
        dz_out: &DeviceMatrix<Self>,
        weights: &[DeviceMatrix<Self>],
        coefficiant: f32,
        reg_mult: f32,
    ) -> TrainResult<f32> {
        // Slot 0 holds the loss sum, slot i + 1 the squared sum of weights[i].
        let sums = GpuTensor::zeros(&self.device, weights.len() + 1)?;

        let uniforms = KernelUniforms::elements(dz_out.len())?.with_mode(REDUCE_LOSS);
        self.run(
            Kernel::Reduce,
            &[&dz_out.buffer().buffer, &sums.buffer],
            &uniforms,
            Grid::Single,
        );
        for (i, w) in weights.iter().enumerate() {
            let uniforms = KernelUniforms::elements(w.len())?
                .with_mode(REDUCE_SQUARES)
                .with_slot(i + 1)?;
            self.run(
                Kernel::Reduce,
                &[&w.buffer().buffer, &sums.buffer],
                &uniforms,
                Grid::Single,
            );
        }

        let mut host = vec![0.0f32; sums.len()];
        sums.download(&self.device, &self.queue, &mut host)?;
        let weight_sq: f32 = host[1..].iter().sum();
        Ok(loss::cost_from_parts(host[0], weight_sq, coefficiant, reg_mult))
    }

    fn draw_pixels(
        &self,
        pixels: &mut GpuPixels,
        m: usize,
        k: usize,
        out: &DeviceMatrix<Self>,
        discrete: bool,
    ) -> TrainResult<()> {
        let count = m * k;
        debug_assert_eq!(out.cols(), count);
        debug_assert_eq!(pixels.len(), count);

        let uniforms = KernelUniforms::elements(count)?
            .with_dims(out.rows(), out.cols(), 0)?
            .with_mode(u32::from(discrete));
        self.run(
            Kernel::DrawPixels,
            &[&out.buffer().buffer, &pixels.buffer],
            &uniforms,
            Grid::Elements(count),
        );
        Ok(())
    }
}
