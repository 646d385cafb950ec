use std::thread;
use std::time::{Duration, Instant};

use wgpu::{
    Extent3d, Origin3d, TexelCopyBufferLayout, TexelCopyTextureInfo, TextureAspect,
    TextureDescriptor, TextureDimension, TextureFormat, TextureUsages,
};

use super::{CaptureError, EyeFrames, FrameSource, FrameSync, HmdActivity};
use crate::gpu::GpuContext;

const DEFAULT_REFRESH_HZ: f32 = 90.0;

/// Synthetic stereo mirror: fixed or hue-cycling images for each eye,
/// paced like a headset running at `refresh_hz`.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    left: Vec<u8>,
    right: Vec<u8>,
    frame_interval: Duration,
    last_frame: Option<Instant>,
    hue_period: Option<Duration>,
    started: Instant,
    activity: HmdActivity,
    frames: Option<EyeFrames>,
}

impl TestPatternSource {
    /// Each eye filled with a single RGBA color.
    pub fn solid(left: [u8; 4], right: [u8; 4], width: u32, height: u32) -> Self {
        let texels = (width * height) as usize;
        Self::build(
            width,
            height,
            left.repeat(texels),
            right.repeat(texels),
        )
    }

    /// Tightly packed RGBA8 images, one per eye.
    #[cfg(test)]
    pub fn from_rgba(
        left: Vec<u8>,
        right: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Result<Self, CaptureError> {
        let expected = (width * height * 4) as usize;
        for data in [&left, &right] {
            if data.len() != expected {
                return Err(CaptureError::PatternSize {
                    expected,
                    actual: data.len(),
                });
            }
        }
        Ok(Self::build(width, height, left, right))
    }

    fn build(width: u32, height: u32, left: Vec<u8>, right: Vec<u8>) -> Self {
        Self {
            width,
            height,
            left,
            right,
            frame_interval: Duration::from_secs_f32(1.0 / DEFAULT_REFRESH_HZ),
            last_frame: None,
            hue_period: None,
            started: Instant::now(),
            activity: HmdActivity::UserInteraction,
            frames: None,
        }
    }

    pub fn with_refresh_rate(mut self, hz: f32) -> Self {
        self.frame_interval = Duration::from_secs_f32(1.0 / hz.max(1.0));
        self
    }

    /// Sweep both eyes around the hue wheel, half a turn apart.
    pub fn with_hue_cycle(mut self, period: Duration) -> Self {
        self.hue_period = Some(period);
        self
    }

    pub fn with_activity(mut self, activity: HmdActivity) -> Self {
        self.activity = activity;
        self
    }

    fn refresh_hue(&mut self) {
        let Some(period) = self.hue_period else {
            return;
        };
        let phase = self.started.elapsed().as_secs_f32() / period.as_secs_f32().max(0.001);
        let left = hue_to_rgba(phase.fract());
        let right = hue_to_rgba((phase + 0.5).fract());
        for (dst, color) in [(&mut self.left, left), (&mut self.right, right)] {
            for texel in dst.chunks_exact_mut(4) {
                texel.copy_from_slice(&color);
            }
        }
    }

    fn upload(&self, gpu: &GpuContext, texture: &wgpu::Texture, data: &[u8]) {
        gpu.queue.write_texture(
            TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            data,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * 4),
                rows_per_image: Some(self.height),
            },
            self.extent(),
        );
    }

    fn extent(&self) -> Extent3d {
        Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }

    fn create_eye_texture(&self, gpu: &GpuContext, label: &str) -> wgpu::Texture {
        gpu.device.create_texture(&TextureDescriptor {
            label: Some(label),
            size: self.extent(),
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }
}

impl FrameSource for TestPatternSource {
    fn activity(&mut self) -> HmdActivity {
        self.activity
    }

    fn wait_frame_sync(&mut self, timeout: Duration) -> FrameSync {
        let now = Instant::now();
        let due = self
            .last_frame
            .map_or(now, |last| last + self.frame_interval);

        if due > now + timeout {
            thread::sleep(timeout);
            return FrameSync::TimedOut;
        }
        if due > now {
            thread::sleep(due - now);
        }
        self.last_frame = Some(Instant::now());
        FrameSync::Ready
    }

    fn acquire_eyes(&mut self, gpu: &GpuContext) -> Result<EyeFrames, CaptureError> {
        let fresh = self.frames.is_none();
        if fresh {
            self.frames = Some(EyeFrames {
                left: self.create_eye_texture(gpu, "test-pattern-left"),
                right: self.create_eye_texture(gpu, "test-pattern-right"),
            });
        }

        if fresh || self.hue_period.is_some() {
            self.refresh_hue();
            if let Some(frames) = &self.frames {
                self.upload(gpu, &frames.left, &self.left);
                self.upload(gpu, &frames.right, &self.right);
            }
        }

        self.frames
            .clone()
            .ok_or_else(|| CaptureError::Unavailable {
                eye: super::Eye::Left,
                reason: "test pattern textures missing".into(),
            })
    }
}

/// Fully saturated color at `hue` in `[0,1)`.
fn hue_to_rgba(hue: f32) -> [u8; 4] {
    let h = hue * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8, 255]
}
