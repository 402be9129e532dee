//! GPU context management - wgpu device and queue initialization.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::InitError;

/// Owns the wgpu device and queue for one viewer instance.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    /// Set by the uncaptured-error handler. A raised flag means the device
    /// can no longer be trusted and the viewer must tear down.
    fatal_error: Arc<AtomicBool>,
}

impl GpuContext {
    /// Initialize the GPU context asynchronously.
    ///
    /// Selects the first available adapter; rendering is offscreen, so no
    /// window surface is required.
    pub async fn new() -> Result<Self, InitError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or(InitError::NoAdapter)?;

        let info = adapter.get_info();
        tracing::info!("GPU adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("avatarview_device"),
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| InitError::Device(e.to_string()))?;

        let fatal_error = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fatal_error);
        device.on_uncaptured_error(Box::new(move |e| {
            tracing::error!("wgpu uncaptured error: {e}");
            flag.store(true, Ordering::Relaxed);
        }));

        Ok(Self {
            device,
            queue,
            fatal_error,
        })
    }

    /// Synchronous wrapper using pollster, for CLI paths where async is not
    /// worth the complexity.
    pub fn new_blocking() -> Result<Self, InitError> {
        pollster::block_on(Self::new())
    }

    /// Whether the device has reported an unrecoverable error.
    pub fn is_poisoned(&self) -> bool {
        self.fatal_error.load(Ordering::Relaxed)
    }
}
