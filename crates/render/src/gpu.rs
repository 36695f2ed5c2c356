//! GPU device ownership
//!
//! [`GpuContext`] is the explicit rendering context handed to every pass. It
//! owns the device and queue and the [`ResourceTracker`] that accounts for the
//! render targets created on them. Exactly one thread issues commands through
//! it.

use std::sync::Arc;

use thiserror::Error;

use crate::resources::ResourceTracker;

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("no compatible graphics adapter found")]
    NoAdapter,
    #[error("failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
}

/// Device, queue and resource bookkeeping shared by all passes.
pub struct GpuContext {
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: wgpu::AdapterInfo,
    resources: Arc<ResourceTracker>,
}

impl GpuContext {
    /// Requests a high-performance adapter and a device with downlevel limits
    /// raised to the adapter's texture resolution.
    ///
    /// When `compatible_surface` is given the adapter must be able to present
    /// to it.
    pub async fn new(
        instance: &wgpu::Instance,
        compatible_surface: Option<&wgpu::Surface<'_>>,
    ) -> Result<Self, GpuError> {
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Hybrid Renderer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::downlevel_defaults()
                        .using_resolution(adapter.limits()),
                },
                None,
            )
            .await?;

        let adapter_info = adapter.get_info();
        tracing::info!(
            "Using adapter {} ({:?}, {:?})",
            adapter_info.name,
            adapter_info.device_type,
            adapter_info.backend
        );

        Ok(Self {
            adapter,
            device,
            queue,
            adapter_info,
            resources: Arc::new(ResourceTracker::default()),
        })
    }

    /// Creates a context without a presentation surface.
    pub fn headless() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        pollster::block_on(Self::new(&instance, None))
    }

    pub fn resources(&self) -> &Arc<ResourceTracker> {
        &self.resources
    }

    /// Whether depth textures can be copied into buffers on this adapter.
    ///
    /// Downlevel adapters such as GL software renderers lack this, so depth
    /// readback is unavailable there even for copyable formats.
    pub fn can_copy_depth(&self) -> bool {
        self.adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::DEPTH_TEXTURE_AND_BUFFER_COPIES)
    }

    /// Runs `f` inside validation and out-of-memory error scopes.
    ///
    /// Returns the value produced by `f`, or the message of the first GPU
    /// error raised while it ran.
    pub fn check<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        match validation.or(out_of_memory) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }
}
