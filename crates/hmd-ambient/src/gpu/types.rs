use bytemuck::{Pod, Zeroable};

/// Edge length of one gather tile in pixels.
pub const TILE_SIZE: u32 = 32;

/// One zone as the gather/combine kernels see it.
/// Must be kept in sync with the WGSL `Zone` struct.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct GpuZone {
    /// Pixel bounds `[x_min, y_min, x_max, y_max)` in the eye image.
    pub bounds: [u32; 4],
    pub tiles_x: u32,
    pub tiles_y: u32,
    /// First slot of this zone in the intermediate tile buffer.
    pub tile_offset: u32,
    pub _pad: u32,
}

impl GpuZone {
    pub fn tile_count(&self) -> u32 {
        self.tiles_x * self.tiles_y
    }
}

/// Per-eye dispatch parameters (16 bytes).
/// Must be kept in sync with the WGSL `Params` struct.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, Pod, Zeroable)]
pub struct ReduceUniforms {
    pub frame_size: [u32; 2],
    /// Zones handled by this dispatch (one eye's worth).
    pub zone_count: u32,
    /// Index of the first zone of this eye in the zone and result buffers.
    pub zone_start: u32,
}

/// Partial or final sum: rgb plus the number of texels that went into it.
/// Matches a WGSL `vec4<f32>`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Pod, Zeroable)]
pub struct ZoneSum {
    pub rgb: [f32; 3],
    pub count: f32,
}
