//! Device-resident dense matrices.
//!
//! A [`DeviceMatrix`] is an owning handle to a column-major f32 buffer on a
//! [`Device`]. It carries its shape and nothing else: every computation goes
//! through the device's kernels.

use ndarray::{Array2, ShapeBuilder};

use crate::device::Device;
use crate::error::{TrainError, TrainResult};

/// A `rows × cols` matrix stored column-major on a device.
pub struct DeviceMatrix<D: Device> {
    buffer: D::Buffer,
    rows: usize,
    cols: usize,
}

impl<D: Device> DeviceMatrix<D> {
    /// Copies a host matrix to the device.
    ///
    /// The host matrix may be in any memory order; it is written to the
    /// device in column-major order.
    pub fn to_device(device: &D, host: &Array2<f32>) -> TrainResult<Self> {
        let (rows, cols) = host.dim();
        let column_major: Vec<f32> = host.t().iter().copied().collect();
        let buffer = device.upload(&column_major)?;
        Ok(Self { buffer, rows, cols })
    }

    /// Allocates a zero-filled matrix.
    pub fn zeros(device: &D, rows: usize, cols: usize) -> TrainResult<Self> {
        let len = checked_len(rows, cols)?;
        let buffer = device.zeros(len)?;
        Ok(Self { buffer, rows, cols })
    }

    /// Copies the matrix back into a standard-layout host matrix.
    ///
    /// Blocks until all previously enqueued work touching this buffer is done.
    pub fn to_host(&self, device: &D) -> TrainResult<Array2<f32>> {
        let mut data = vec![0.0f32; self.len()];
        device.download(&self.buffer, &mut data)?;
        let host = Array2::from_shape_vec((self.rows, self.cols).f(), data)?;
        Ok(host.as_standard_layout().into_owned())
    }

    /// Number of rows.
    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `[rows, cols]`.
    #[inline]
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    /// Returns true if the matrix has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer size in bytes.
    #[inline]
    pub fn mem_size(&self) -> usize {
        self.len() * std::mem::size_of::<f32>()
    }

    /// The underlying device buffer.
    #[inline]
    pub fn buffer(&self) -> &D::Buffer {
        &self.buffer
    }

    /// The underlying device buffer, mutably.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut D::Buffer {
        &mut self.buffer
    }

    /// Checks the matrix has the given shape.
    pub fn expect_shape(&self, rows: usize, cols: usize) -> TrainResult<()> {
        if self.rows != rows || self.cols != cols {
            return Err(TrainError::shape_mismatch(&[rows, cols], &self.shape()));
        }
        Ok(())
    }
}

impl<D: Device> std::fmt::Debug for DeviceMatrix<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceMatrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .finish()
    }
}

/// `rows * cols`, rejecting overflow.
pub(crate) fn checked_len(rows: usize, cols: usize) -> TrainResult<usize> {
    rows.checked_mul(cols)
        .ok_or_else(|| TrainError::overflow(format!("{} x {} matrix", rows, cols)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::CpuDevice;
    use ndarray::array;

    #[test]
    fn test_column_major_layout() {
        let device = CpuDevice::new();
        let host = array![[1.0f32, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let m = DeviceMatrix::to_device(&device, &host).unwrap();

        assert_eq!(m.shape(), [2, 3]);
        assert_eq!(m.buffer(), &vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
        assert_eq!(m.mem_size(), 24);
    }

    #[test]
    fn test_roundtrip_fortran_order_input() {
        let device = CpuDevice::new();
        let host = array![[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let fortran = host.t().as_standard_layout().t().to_owned();

        let m = DeviceMatrix::to_device(&device, &fortran).unwrap();
        assert_eq!(m.to_host(&device).unwrap(), host);
    }

    #[test]
    fn test_zeros_and_expect_shape() {
        let device = CpuDevice::new();
        let m = DeviceMatrix::zeros(&device, 4, 2).unwrap();
        assert_eq!(m.len(), 8);
        assert!(m.expect_shape(4, 2).is_ok());
        assert!(m.expect_shape(2, 4).is_err());
    }

    #[test]
    fn test_zeros_overflow() {
        let device = CpuDevice::new();
        assert!(matches!(
            DeviceMatrix::zeros(&device, usize::MAX, 2),
            Err(TrainError::Overflow(_))
        ));
    }
}
