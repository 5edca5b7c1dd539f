//! Device-facing code: context acquisition, field layers, compute kernels.

mod kernel;
mod layer;

use std::sync::Arc;

use winit::window::Window;

pub use kernel::Kernel;
pub use layer::Layer;

use crate::error::GpuError;

/// Workgroup side length for 2D field kernels.
pub const WORKGROUP_SIZE_2D: u32 = 8;
/// Workgroup size for 1D particle kernels.
pub const WORKGROUP_SIZE_1D: u32 = 256;

/// Owned GPU handles plus the configured surface.
pub struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    pub async fn new(window: Arc<Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                ..Default::default()
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(Self {
            surface,
            device,
            queue,
            config,
        })
    }

    /// Reconfigure the surface for a new window size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.config.width = width.max(1);
        self.config.height = height.max(1);
        self.surface.configure(&self.device, &self.config);
    }
}

/// Dispatch size for a 2D grid kernel.
pub fn workgroups_2d(width: u32, height: u32) -> (u32, u32, u32) {
    (
        width.div_ceil(WORKGROUP_SIZE_2D),
        height.div_ceil(WORKGROUP_SIZE_2D),
        1,
    )
}

/// Dispatch size for a 1D kernel over `count` items.
pub fn workgroups_1d(count: u32) -> (u32, u32, u32) {
    (count.div_ceil(WORKGROUP_SIZE_1D), 1, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroups_2d_round_up() {
        assert_eq!(workgroups_2d(240, 135), (30, 17, 1));
        assert_eq!(workgroups_2d(1, 1), (1, 1, 1));
        assert_eq!(workgroups_2d(8, 16), (1, 2, 1));
    }

    #[test]
    fn test_workgroups_1d_round_up() {
        assert_eq!(workgroups_1d(10_000), (40, 1, 1));
        assert_eq!(workgroups_1d(1), (1, 1, 1));
        assert_eq!(workgroups_1d(256), (1, 1, 1));
        assert_eq!(workgroups_1d(257), (2, 1, 1));
    }
}
