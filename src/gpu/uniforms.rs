//! Uniform buffer structures for the GPU kernels.
//!
//! `#[repr(C)]` structures matching the `Dims` struct declared in
//! [`shaders::COMMON`](super::shaders::COMMON). All fields are 4 bytes wide,
//! so the layout has no implicit padding.

use bytemuck::{Pod, Zeroable};

use crate::error::{TrainError, TrainResult};

/// Per-dispatch kernel parameters.
///
/// # Layout
///
/// Total size: 32 bytes (2 × vec4).
///
/// ```text
/// Offset  Size  Field
/// 0       4     rows
/// 4       4     cols
/// 8       4     inner
/// 12      4     mode
/// 16      4     scale
/// 20      4     reg
/// 24      4     count
/// 28      4     slot
/// ```
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct KernelUniforms {
    /// Rows of the primary matrix.
    pub rows: u32,
    /// Columns of the primary matrix.
    pub cols: u32,
    /// Length of the contracted dimension.
    pub inner: u32,
    /// Activation tag, reduction mode or discrete flag.
    pub mode: u32,
    /// Multiplier (coefficiant or learn_mult).
    pub scale: f32,
    /// Regularization blend.
    pub reg: f32,
    /// Number of invocations that do work.
    pub count: u32,
    /// Output slot of a reduction.
    pub slot: u32,
}

impl KernelUniforms {
    /// Uniforms for `count` element-wise invocations.
    pub fn elements(count: usize) -> TrainResult<Self> {
        Ok(Self {
            count: to_u32(count)?,
            ..Self::zeroed()
        })
    }

    /// Sets the matrix dimensions.
    pub fn with_dims(mut self, rows: usize, cols: usize, inner: usize) -> TrainResult<Self> {
        self.rows = to_u32(rows)?;
        self.cols = to_u32(cols)?;
        self.inner = to_u32(inner)?;
        Ok(self)
    }

    /// Sets the mode field.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the scale and regularization multipliers.
    pub fn with_scale(mut self, scale: f32, reg: f32) -> Self {
        self.scale = scale;
        self.reg = reg;
        self
    }

    /// Sets the reduction output slot.
    pub fn with_slot(mut self, slot: usize) -> TrainResult<Self> {
        self.slot = to_u32(slot)?;
        Ok(self)
    }

    /// Returns the size in bytes.
    pub const fn size_bytes() -> usize {
        std::mem::size_of::<Self>()
    }
}

/// Narrows a host size to the 32-bit index space of the shaders.
pub(crate) fn to_u32(value: usize) -> TrainResult<u32> {
    u32::try_from(value).map_err(|_| TrainError::overflow(format!("{} exceeds u32 index range", value)))
}
