//! Structured error types for the viewer
//!
//! Using thiserror for automatic Display implementation and error chaining.

use strobe_common::ChannelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("GPU initialisation failed: {0}")]
    Gpu(String),

    #[error("Window error: {0}")]
    Window(String),

    #[error("Surface error: {0}")]
    Surface(String),
}

impl From<wgpu::RequestDeviceError> for ViewerError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        ViewerError::Gpu(e.to_string())
    }
}

impl From<wgpu::CreateSurfaceError> for ViewerError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        ViewerError::Surface(e.to_string())
    }
}

impl From<winit::error::EventLoopError> for ViewerError {
    fn from(e: winit::error::EventLoopError) -> Self {
        ViewerError::Window(e.to_string())
    }
}

impl From<winit::error::OsError> for ViewerError {
    fn from(e: winit::error::OsError) -> Self {
        ViewerError::Window(e.to_string())
    }
}
