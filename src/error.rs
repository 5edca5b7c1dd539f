//! Error types for inkflow.
//!
//! Layered enums: `GpuError` for device acquisition and readback,
//! `CaptureError` for PNG export, `SimulationError` for everything the
//! binary can die of. `From` impls chain them upward.

use std::fmt;

/// Failures while bringing up the GPU or reading buffers back.
#[derive(Debug)]
pub enum GpuError {
    /// The window could not back a rendering surface.
    SurfaceCreation(wgpu::CreateSurfaceError),
    /// No adapter accepted the surface.
    NoAdapter,
    /// The adapter refused the requested device.
    DeviceCreation(wgpu::RequestDeviceError),
    /// A readback buffer could not be mapped.
    BufferMapping(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => {
                write!(f, "Failed to create a rendering surface for the window: {}", e)
            }
            GpuError::NoAdapter => write!(
                f,
                "No GPU adapter accepted the surface. A Vulkan, Metal, or DX12 capable device is required."
            ),
            GpuError::DeviceCreation(e) => write!(f, "GPU device request failed: {}", e),
            GpuError::BufferMapping(msg) => write!(f, "Failed to map readback buffer: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Errors that can occur when capturing a frame to disk.
#[derive(Debug)]
pub enum CaptureError {
    /// Failed to read the trail field back from the GPU.
    Gpu(GpuError),
    /// Failed to encode or write the PNG.
    Image(image::ImageError),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::Gpu(e) => write!(f, "Failed to read frame from GPU: {}", e),
            CaptureError::Image(e) => write!(f, "Failed to write PNG: {}", e),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Gpu(e) => Some(e),
            CaptureError::Image(e) => Some(e),
        }
    }
}

impl From<GpuError> for CaptureError {
    fn from(e: GpuError) -> Self {
        CaptureError::Gpu(e)
    }
}

impl From<image::ImageError> for CaptureError {
    fn from(e: image::ImageError) -> Self {
        CaptureError::Image(e)
    }
}

/// Errors that can occur when running the simulation.
#[derive(Debug)]
pub enum SimulationError {
    /// Failed to create event loop.
    EventLoop(winit::error::EventLoopError),
    /// Failed to create window.
    Window(winit::error::OsError),
    /// GPU initialization failed.
    Gpu(GpuError),
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::EventLoop(e) => write!(f, "Failed to create event loop: {}", e),
            SimulationError::Window(e) => write!(f, "Failed to create window: {}", e),
            SimulationError::Gpu(e) => write!(f, "GPU error: {}", e),
        }
    }
}

impl std::error::Error for SimulationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SimulationError::EventLoop(e) => Some(e),
            SimulationError::Window(e) => Some(e),
            SimulationError::Gpu(e) => Some(e),
        }
    }
}

impl From<winit::error::EventLoopError> for SimulationError {
    fn from(e: winit::error::EventLoopError) -> Self {
        SimulationError::EventLoop(e)
    }
}

impl From<winit::error::OsError> for SimulationError {
    fn from(e: winit::error::OsError) -> Self {
        SimulationError::Window(e)
    }
}

impl From<GpuError> for SimulationError {
    fn from(e: GpuError) -> Self {
        SimulationError::Gpu(e)
    }
}
