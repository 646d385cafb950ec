pub mod test_pattern;

use std::time::Duration;

use thiserror::Error;

use crate::gpu::GpuContext;

pub use test_pattern::TestPatternSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eye {
    Left,
    Right,
}

/// Headset activity as reported by the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum HmdActivity {
    Unknown,
    Idle,
    UserInteraction,
    UserInteractionTimeout,
    Standby,
    IdleTimeout,
}

impl HmdActivity {
    /// Whether the headset is presenting frames worth sampling.
    pub fn is_presenting(self) -> bool {
        !matches!(self, Self::Unknown | Self::Standby | Self::IdleTimeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSync {
    Ready,
    TimedOut,
}

/// The current left and right eye images, resident on the renderer's device.
/// Textures must allow `TEXTURE_BINDING` and hold a float-sampled format.
#[derive(Debug, Clone)]
pub struct EyeFrames {
    pub left: wgpu::Texture,
    pub right: wgpu::Texture,
}

impl EyeFrames {
    /// Size shared by both eye images. Zones are laid out once for both, so
    /// mismatched eyes cannot be sampled.
    pub fn frame_size(&self) -> Result<(u32, u32), CaptureError> {
        let left = (self.left.width(), self.left.height());
        let right = (self.right.width(), self.right.height());
        if left != right {
            return Err(CaptureError::Unavailable {
                eye: Eye::Right,
                reason: format!(
                    "{}x{} does not match the left eye's {}x{}",
                    right.0, right.1, left.0, left.1
                ),
            });
        }
        Ok(left)
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("{eye:?} eye image unavailable: {reason}")]
    Unavailable { eye: Eye, reason: String },

    #[cfg(test)]
    #[error("pattern data is {actual} bytes, expected {expected}")]
    PatternSize { expected: usize, actual: usize },
}

/// Source of stereo mirror images, normally the VR compositor.
///
/// Owned by the sampling thread for its whole lifetime.
pub trait FrameSource: Send {
    fn activity(&mut self) -> HmdActivity;

    /// Block until the compositor has a new frame or `timeout` elapses.
    fn wait_frame_sync(&mut self, timeout: Duration) -> FrameSync;

    /// Fetch GPU views of both eye images for this frame. A failure skips
    /// the frame and is not fatal.
    fn acquire_eyes(&mut self, gpu: &GpuContext) -> Result<EyeFrames, CaptureError>;
}
