use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

/// Status surface written by the sampling thread and read by anyone.
#[derive(Debug, Default)]
pub struct SamplerStatus {
    connected: AtomicBool,
    active: AtomicBool,
    preview_active: AtomicBool,
    device_init_failed: AtomicBool,
    lights_disconnected: AtomicBool,
    // f32 bit patterns
    render_ms: AtomicU32,
    output_ms: AtomicU32,
    frame_interval_ms: AtomicU32,
    frames: AtomicU64,
    dropped_writes: AtomicU64,
}

/// Point-in-time copy of [`SamplerStatus`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatusSnapshot {
    /// The LED strip is open.
    pub connected: bool,
    /// Frames are being captured and sent.
    pub active: bool,
    pub preview_active: bool,
    pub device_init_failed: bool,
    /// The strip went away mid-session and the sampler stopped.
    pub lights_disconnected: bool,
    pub render_ms: f32,
    pub output_ms: f32,
    pub frame_interval_ms: f32,
    pub frames: u64,
    /// Strip writes lost to timeouts; nonzero means a degraded link.
    pub dropped_writes: u64,
}

impl SamplerStatus {
    pub fn set_connected(&self, value: bool) {
        self.connected.store(value, Ordering::Relaxed);
    }

    pub fn set_active(&self, value: bool) {
        self.active.store(value, Ordering::Relaxed);
    }

    pub fn set_preview_active(&self, value: bool) {
        self.preview_active.store(value, Ordering::Relaxed);
    }

    pub fn set_device_init_failed(&self, value: bool) {
        self.device_init_failed.store(value, Ordering::Relaxed);
    }

    pub fn set_lights_disconnected(&self, value: bool) {
        self.lights_disconnected.store(value, Ordering::Relaxed);
    }

    pub fn record_frame(&self, render_ms: f32, output_ms: f32, frame_interval_ms: f32) {
        self.render_ms.store(render_ms.to_bits(), Ordering::Relaxed);
        self.output_ms.store(output_ms.to_bits(), Ordering::Relaxed);
        self.frame_interval_ms
            .store(frame_interval_ms.to_bits(), Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_dropped_writes(&self, count: u64) {
        self.dropped_writes.store(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            connected: self.connected.load(Ordering::Relaxed),
            active: self.active.load(Ordering::Relaxed),
            preview_active: self.preview_active.load(Ordering::Relaxed),
            device_init_failed: self.device_init_failed.load(Ordering::Relaxed),
            lights_disconnected: self.lights_disconnected.load(Ordering::Relaxed),
            render_ms: f32::from_bits(self.render_ms.load(Ordering::Relaxed)),
            output_ms: f32::from_bits(self.output_ms.load(Ordering::Relaxed)),
            frame_interval_ms: f32::from_bits(self.frame_interval_ms.load(Ordering::Relaxed)),
            frames: self.frames.load(Ordering::Relaxed),
            dropped_writes: self.dropped_writes.load(Ordering::Relaxed),
        }
    }
}
