//! GPU storage buffers with upload/download helpers.
//!
//! [`GpuBuffer`] wraps a wgpu storage buffer holding `len` elements of a
//! plain-old-data scalar. Matrices use [`GpuTensor`] (f32); the
//! visualization render target uses [`GpuPixels`] (i32).

use std::marker::PhantomData;

use bytemuck::Pod;
use wgpu::util::DeviceExt;

use crate::error::{TrainError, TrainResult};
use crate::gpu::{exceeds_vram_limit, MAX_VRAM_ALLOC};

/// f32 storage buffer.
pub type GpuTensor = GpuBuffer<f32>;

/// i32 storage buffer.
pub type GpuPixels = GpuBuffer<i32>;

/// A GPU-resident array of `T`.
pub struct GpuBuffer<T: Pod> {
    /// The underlying wgpu buffer.
    pub buffer: wgpu::Buffer,
    len: usize,
    _marker: PhantomData<T>,
}

impl<T: Pod> GpuBuffer<T> {
    /// Creates a buffer holding a copy of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::BufferError`] if the size exceeds [`MAX_VRAM_ALLOC`].
    pub fn upload(device: &wgpu::Device, data: &[T]) -> TrainResult<Self> {
        Self::check_size(data.len())?;
        if data.is_empty() {
            return Self::zeros(device, 0);
        }

        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("nettrain storage"),
            contents: bytemuck::cast_slice(data),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
        });

        Ok(Self {
            buffer,
            len: data.len(),
            _marker: PhantomData,
        })
    }

    /// Creates a zero-filled buffer of `len` elements.
    pub fn zeros(device: &wgpu::Device, len: usize) -> TrainResult<Self> {
        let size_bytes = Self::check_size(len)?;

        // wgpu zero-initializes new buffers. Empty buffers still get one
        // element so they can be bound.
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("nettrain storage (zeroed)"),
            size: size_bytes.max(std::mem::size_of::<T>() as u64),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        Ok(Self {
            buffer,
            len,
            _marker: PhantomData,
        })
    }

    /// Copies the buffer into `out`, blocking until the transfer completes.
    ///
    /// # Errors
    ///
    /// Returns [`TrainError::BufferError`] if `out` has the wrong length or
    /// the staging buffer cannot be mapped.
    pub fn download(&self, device: &wgpu::Device, queue: &wgpu::Queue, out: &mut [T]) -> TrainResult<()> {
        if out.len() != self.len {
            return Err(TrainError::buffer(format!(
                "download into {} elements from a buffer of {}",
                out.len(),
                self.len
            )));
        }
        if self.len == 0 {
            return Ok(());
        }
        let size_bytes = self.size_bytes();

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("nettrain staging (download)"),
            size: size_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("nettrain download encoder"),
        });
        encoder.copy_buffer_to_buffer(&self.buffer, 0, &staging, 0, size_bytes);
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            // The receiver outlives the poll below.
            let _ = tx.send(result);
        });
        device.poll(wgpu::Maintain::Wait);

        rx.recv()
            .map_err(|e| TrainError::buffer(format!("Failed to receive map result: {}", e)))?
            .map_err(|e| TrainError::buffer(format!("Buffer mapping failed: {:?}", e)))?;

        {
            let mapped = slice.get_mapped_range();
            out.copy_from_slice(bytemuck::cast_slice(&mapped));
        }
        staging.unmap();
        Ok(())
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Logical size in bytes.
    #[inline]
    pub fn size_bytes(&self) -> u64 {
        (self.len * std::mem::size_of::<T>()) as u64
    }

    fn check_size(len: usize) -> TrainResult<u64> {
        let size_bytes = len
            .checked_mul(std::mem::size_of::<T>())
            .map(|b| b as u64)
            .ok_or_else(|| TrainError::overflow(format!("{} element buffer", len)))?;
        if exceeds_vram_limit(size_bytes) {
            return Err(TrainError::buffer(format!(
                "{} bytes exceeds the {} byte allocation limit",
                size_bytes, MAX_VRAM_ALLOC
            )));
        }
        Ok(size_bytes)
    }
}

impl<T: Pod> std::fmt::Debug for GpuBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("len", &self.len)
            .field("size_bytes", &self.size_bytes())
            .finish()
    }
}
