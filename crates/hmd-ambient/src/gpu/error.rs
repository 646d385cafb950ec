use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no compatible GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),

    #[error("GPU device creation failed: {0}")]
    Device(#[from] wgpu::RequestDeviceError),

    #[error("compute kernel '{kernel}' failed validation: {message}")]
    Kernel { kernel: &'static str, message: String },

    #[error("eye frame unavailable: {0}")]
    Capture(#[from] crate::capture::CaptureError),

    #[error("readback failed: {0}")]
    Readback(String),
}
