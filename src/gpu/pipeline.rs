//! Compute pipeline management and kernel dispatch.
//!
//! Every kernel is compiled once, when the device is created. Each dispatch
//! builds a fresh bind group over the caller's buffers plus a uniform
//! buffer, records one compute pass and submits it to the queue. Submission
//! order on the single queue is the execution order.

use std::collections::HashMap;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use crate::gpu::shaders;

/// Default workgroup size for element-wise compute shaders.
pub const WORKGROUP_SIZE: usize = 64;

/// Maximum workgroups per dispatch dimension guaranteed by wgpu.
pub const MAX_GROUPS_PER_DIM: u32 = 65_535;

/// The compiled kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    Forward,
    Subtract,
    BackActivation,
    SetDw,
    SetDb,
    Update,
    Adam,
    Reduce,
    DrawPixels,
}

/// How a storage binding is accessed by the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    ReadWrite,
}

use Access::{Read, ReadWrite};

impl Kernel {
    const ALL: [Kernel; 9] = [
        Kernel::Forward,
        Kernel::Subtract,
        Kernel::BackActivation,
        Kernel::SetDw,
        Kernel::SetDb,
        Kernel::Update,
        Kernel::Adam,
        Kernel::Reduce,
        Kernel::DrawPixels,
    ];

    fn entry_point(self) -> &'static str {
        match self {
            Kernel::Forward => "forward_layer",
            Kernel::Subtract => "subtract",
            Kernel::BackActivation => "back_activation",
            Kernel::SetDw => "set_dw",
            Kernel::SetDb => "set_db",
            Kernel::Update => "update_parameter",
            Kernel::Adam => "update_parameter_adam",
            Kernel::Reduce => "reduce_sum",
            Kernel::DrawPixels => "draw_pixels",
        }
    }

    fn source(self) -> String {
        let body = match self {
            Kernel::Forward => shaders::FORWARD_SHADER,
            Kernel::Subtract => shaders::SUBTRACT_SHADER,
            Kernel::BackActivation => shaders::BACK_ACTIVATION_SHADER,
            Kernel::SetDw => shaders::SET_DW_SHADER,
            Kernel::SetDb => shaders::SET_DB_SHADER,
            Kernel::Update => shaders::UPDATE_SHADER,
            Kernel::Adam => return shaders::ADAM_SHADER.to_string(),
            Kernel::Reduce => shaders::REDUCE_SHADER,
            Kernel::DrawPixels => shaders::DRAW_PIXELS_SHADER,
        };
        format!("{}{}", shaders::COMMON, body)
    }

    /// Storage bindings in binding order. The uniform follows them.
    fn storage(self) -> &'static [Access] {
        match self {
            Kernel::Forward => &[Read, Read, Read, ReadWrite],
            Kernel::Subtract => &[Read, Read, ReadWrite],
            Kernel::BackActivation => &[Read, Read, Read, ReadWrite],
            Kernel::SetDw => &[Read, Read, Read, ReadWrite],
            Kernel::SetDb => &[Read, ReadWrite],
            Kernel::Update => &[Read, ReadWrite],
            Kernel::Adam => &[Read, ReadWrite, ReadWrite, ReadWrite],
            Kernel::Reduce => &[Read, ReadWrite],
            Kernel::DrawPixels => &[Read, ReadWrite],
        }
    }
}

/// Workgroup grid for a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grid {
    /// One invocation per element, 64 per workgroup, folded into 2D.
    Elements(usize),
    /// A single workgroup.
    Single,
}

struct CompiledKernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

/// Compiled compute pipelines for every [`Kernel`].
pub struct PipelineCache {
    device: Arc<wgpu::Device>,
    kernels: HashMap<Kernel, CompiledKernel>,
}

impl PipelineCache {
    /// Compiles every kernel.
    pub fn new(device: Arc<wgpu::Device>) -> Self {
        let kernels = Kernel::ALL
            .iter()
            .map(|&kernel| (kernel, Self::compile(&device, kernel)))
            .collect();
        Self { device, kernels }
    }

    fn compile(device: &wgpu::Device, kernel: Kernel) -> CompiledKernel {
        let label = kernel.entry_point();
        let source = kernel.source();
        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let storage = kernel.storage();
        let mut entries: Vec<wgpu::BindGroupLayoutEntry> = storage
            .iter()
            .enumerate()
            .map(|(binding, access)| wgpu::BindGroupLayoutEntry {
                binding: binding as u32,
                visibility: wgpu::ShaderStages::COMPUTE,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage {
                        read_only: *access == Read,
                    },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            })
            .collect();
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: storage.len() as u32,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(kernel.entry_point()),
            compilation_options: Default::default(),
            cache: None,
        });

        CompiledKernel { pipeline, layout }
    }

    /// Binds `buffers` then `uniforms` and enqueues one dispatch of `kernel`.
    ///
    /// Empty element grids are skipped.
    pub fn dispatch(
        &self,
        queue: &wgpu::Queue,
        kernel: Kernel,
        buffers: &[&wgpu::Buffer],
        uniforms: &[u8],
        grid: Grid,
    ) {
        let (x, y) = match grid {
            Grid::Elements(0) => return,
            Grid::Elements(total) => dispatch_size(total),
            Grid::Single => (1, 1),
        };
        debug_assert_eq!(buffers.len(), kernel.storage().len());
        let compiled = &self.kernels[&kernel];

        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("nettrain uniforms"),
            contents: uniforms,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let mut entries: Vec<wgpu::BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(binding, buffer)| wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();
        entries.push(wgpu::BindGroupEntry {
            binding: buffers.len() as u32,
            resource: uniform_buffer.as_entire_binding(),
        });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.entry_point()),
            layout: &compiled.layout,
            entries: &entries,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some(kernel.entry_point()),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.entry_point()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&compiled.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(x, y, 1);
        }
        queue.submit(std::iter::once(encoder.finish()));
    }
}

impl std::fmt::Debug for PipelineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineCache")
            .field("kernels", &self.kernels.len())
            .finish()
    }
}

/// Computes the workgroup count for a given number of elements.
#[inline]
pub fn workgroup_count(total: usize, workgroup_size: usize) -> u32 {
    ((total + workgroup_size - 1) / workgroup_size) as u32
}

/// Folds the workgroup count for `total` elements into an `(x, y)` grid
/// that respects the per-dimension limit.
///
/// Shaders recover the flat index as `gid.x + gid.y * groups.x * 64`.
pub fn dispatch_size(total: usize) -> (u32, u32) {
    let groups = workgroup_count(total, WORKGROUP_SIZE);
    if groups <= MAX_GROUPS_PER_DIM {
        (groups, 1)
    } else {
        (MAX_GROUPS_PER_DIM, (groups + MAX_GROUPS_PER_DIM - 1) / MAX_GROUPS_PER_DIM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_count() {
        assert_eq!(workgroup_count(1, 64), 1);
        assert_eq!(workgroup_count(64, 64), 1);
        assert_eq!(workgroup_count(65, 64), 2);
        assert_eq!(workgroup_count(129, 64), 3);
    }

    #[test]
    fn test_dispatch_size_folds_large_grids() {
        assert_eq!(dispatch_size(100), (2, 1));
        let total = 64 * 65_535 + 1;
        let (x, y) = dispatch_size(total);
        assert_eq!((x, y), (65_535, 2));
        assert!((x as usize) * (y as usize) * 64 >= total);
    }

    #[test]
    fn test_every_kernel_has_distinct_entry_point() {
        let mut names: Vec<_> = Kernel::ALL.iter().map(|k| k.entry_point()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Kernel::ALL.len());
    }

    #[test]
    fn test_sources_declare_bindings() {
        for kernel in Kernel::ALL {
            let source = kernel.source();
            assert!(source.contains(&format!("fn {}", kernel.entry_point())));
            let uniform_binding = format!("@binding({}) var<uniform>", kernel.storage().len());
            assert!(source.contains(&uniform_binding), "{:?}", kernel);
        }
    }
}
