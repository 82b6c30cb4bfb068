//! wgpu adapter selection and device ownership.
//!
//! [`WgpuDevice`] owns one wgpu device and its queue. The queue is the
//! ordered execution stream: every transfer and kernel of a trainer is
//! submitted to it in program order.

use std::sync::Arc;

use crate::error::{TrainError, TrainResult};
use crate::gpu::pipeline::PipelineCache;

/// Power preference for GPU adapter selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPreference {
    /// Prefer low power consumption (integrated GPU).
    LowPower,
    /// Prefer high performance (discrete GPU).
    #[default]
    HighPerformance,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(pref: PowerPreference) -> Self {
        match pref {
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
        }
    }
}

/// Options for opening a [`WgpuDevice`].
#[derive(Debug, Clone)]
pub struct WgpuOptions {
    /// Power preference for adapter selection.
    pub power_preference: PowerPreference,
    /// Restrict to one backend (Vulkan, DX12, Metal, ...). `None` tries all.
    pub backend: Option<wgpu::Backends>,
    /// Pick the first adapter whose name contains this (case-insensitive).
    pub force_adapter_name: Option<String>,
    /// Required limits (minimum).
    pub required_limits: wgpu::Limits,
}

impl Default for WgpuOptions {
    fn default() -> Self {
        Self {
            power_preference: PowerPreference::HighPerformance,
            backend: None,
            force_adapter_name: None,
            required_limits: wgpu::Limits::default(),
        }
    }
}

impl WgpuOptions {
    /// Options for large training batches: 1 GiB storage bindings.
    pub fn compute() -> Self {
        Self {
            required_limits: wgpu::Limits {
                max_storage_buffer_binding_size: 1 << 30,
                max_buffer_size: 1 << 30,
                ..wgpu::Limits::default()
            },
            ..Self::default()
        }
    }

    /// Options for integrated or constrained adapters.
    pub fn low_memory() -> Self {
        Self {
            power_preference: PowerPreference::LowPower,
            required_limits: wgpu::Limits::downlevel_defaults(),
            ..Self::default()
        }
    }
}

/// A wgpu device running the training kernels.
///
/// ```rust,no_run
/// use nettrain::gpu::{WgpuDevice, WgpuOptions};
/// use nettrain::Device;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let device = WgpuDevice::new(WgpuOptions::default())?;
/// println!("training on {}", device.name());
/// # Ok(())
/// # }
/// ```
pub struct WgpuDevice {
    pub(crate) device: Arc<wgpu::Device>,
    pub(crate) queue: Arc<wgpu::Queue>,
    pub(crate) pipelines: PipelineCache,
    adapter_info: wgpu::AdapterInfo,
    limits: wgpu::Limits,
}

impl WgpuDevice {
    /// Selects an adapter, opens a device and compiles every kernel.
    ///
    /// Validation errors raised later by wgpu (for example a failed kernel
    /// launch) are routed to [`fatal`](crate::error::fatal).
    ///
    /// # Errors
    ///
    /// - [`TrainError::AdapterNotFound`] - no adapter, or none matching the name filter
    /// - [`TrainError::UnsupportedLimits`] - the adapter is below `required_limits`
    /// - [`TrainError::DeviceRequestFailed`] - wgpu refused the device request
    pub fn new(options: WgpuOptions) -> TrainResult<Self> {
        let backends = options.backend.unwrap_or(wgpu::Backends::all());
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = pollster::block_on(Self::request_adapter(&instance, &options))?;
        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU adapter: {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        Self::check_limits(&adapter.limits(), &options.required_limits)?;

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("nettrain device"),
                required_features: wgpu::Features::empty(),
                required_limits: options.required_limits.clone(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))?;

        device.on_uncaptured_error(Box::new(|err| {
            crate::error::fatal(file!(), line!(), &err);
        }));

        let device = Arc::new(device);
        let limits = device.limits();
        let pipelines = PipelineCache::new(Arc::clone(&device));

        Ok(Self {
            device,
            queue: Arc::new(queue),
            pipelines,
            adapter_info,
            limits,
        })
    }

    async fn request_adapter(
        instance: &wgpu::Instance,
        options: &WgpuOptions,
    ) -> TrainResult<wgpu::Adapter> {
        if let Some(ref filter) = options.force_adapter_name {
            let filter = filter.to_lowercase();
            return instance
                .enumerate_adapters(options.backend.unwrap_or(wgpu::Backends::all()))
                .into_iter()
                .find(|a| a.get_info().name.to_lowercase().contains(&filter))
                .ok_or_else(|| {
                    TrainError::adapter_not_found(format!("No adapter matching '{}' found", filter))
                });
        }

        let preferred = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: options.power_preference.into(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await;
        if let Some(adapter) = preferred {
            return Ok(adapter);
        }

        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::None,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| {
                TrainError::adapter_not_found(
                    "No GPU adapters available. Ensure GPU drivers are installed.",
                )
            })
    }

    fn check_limits(adapter: &wgpu::Limits, required: &wgpu::Limits) -> TrainResult<()> {
        if adapter.max_storage_buffer_binding_size < required.max_storage_buffer_binding_size {
            return Err(TrainError::unsupported_limits(format!(
                "max_storage_buffer_binding_size: adapter has {}, required {}",
                adapter.max_storage_buffer_binding_size, required.max_storage_buffer_binding_size
            )));
        }
        if adapter.max_buffer_size < required.max_buffer_size {
            return Err(TrainError::unsupported_limits(format!(
                "max_buffer_size: adapter has {}, required {}",
                adapter.max_buffer_size, required.max_buffer_size
            )));
        }
        if adapter.max_compute_invocations_per_workgroup < 256 {
            return Err(TrainError::unsupported_limits(format!(
                "max_compute_invocations_per_workgroup: adapter has {}, the reduction kernel needs 256",
                adapter.max_compute_invocations_per_workgroup
            )));
        }
        Ok(())
    }

    /// Information about the selected adapter.
    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    /// The device limits.
    pub fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    /// Whether a single storage binding of `size_bytes` is supported.
    pub fn supports_buffer_size(&self, size_bytes: u64) -> bool {
        size_bytes <= self.limits.max_storage_buffer_binding_size as u64
    }
}

impl std::fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("adapter", &self.adapter_info.name)
            .field("backend", &self.adapter_info.backend)
            .field("device_type", &self.adapter_info.device_type)
            .field(
                "max_storage_buffer",
                &self.limits.max_storage_buffer_binding_size,
            )
            .finish()
    }
}
