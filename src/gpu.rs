//! Shared wgpu device and queue

use std::sync::Arc;

use log::info;

/// Device and queue owned by the host's graphics context. Every GPU
/// resource of the VR subsystem is created from these and must be dropped
/// before the host tears them down.
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        Self { device, queue }
    }

    /// Device without a presentation surface, for hosts that only submit
    /// to the compositor.
    pub fn new_headless() -> Result<Self, String> {
        pollster::block_on(Self::request_headless())
    }

    async fn request_headless() -> Result<Self, String> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| "Failed to find GPU adapter".to_string())?;
        info!("Using adapter {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Stereo VR Device"),
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| format!("Failed to create device: {}", e))?;
        Ok(Self::new(Arc::new(device), Arc::new(queue)))
    }
}
