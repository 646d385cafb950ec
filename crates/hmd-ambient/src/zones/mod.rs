pub mod layout;

pub use layout::{LayoutConfig, compute_layout};

/// Normalized UV rectangle inside one eye image, assigned to a single LED.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SampleRect {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl SampleRect {
    #[cfg(test)]
    pub fn center_x(&self) -> f32 {
        (self.x_min + self.x_max) * 0.5
    }

    #[cfg(test)]
    pub fn center_y(&self) -> f32 {
        (self.y_min + self.y_max) * 0.5
    }

    /// Pixel bounds `[x_min, y_min, x_max, y_max)` for a `width`x`height` image.
    /// Edges are widened outward (floor/ceil) and clipped to the image.
    pub fn to_pixels(&self, width: u32, height: u32) -> [u32; 4] {
        let w = width as f32;
        let h = height as f32;
        let x0 = (self.x_min * w).floor().clamp(0.0, w) as u32;
        let y0 = (self.y_min * h).floor().clamp(0.0, h) as u32;
        let x1 = (self.x_max * w).ceil().clamp(0.0, w) as u32;
        let y1 = (self.y_max * h).ceil().clamp(0.0, h) as u32;
        [x0, y0, x1.max(x0), y1.max(y0)]
    }
}

/// Average linear-light color of a zone, as read back from the GPU.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl RawColor {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }
}

/// Display-ready 8-bit color, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GradedColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl GradedColor {
    pub const OFF: Self = Self { r: 0, g: 0, b: 0 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Per-LED sample rectangles and their latest raw colors.
///
/// The first half of the zones belongs to the left eye image and the second
/// half to the right eye image. `dirty` tells the renderer its GPU-side
/// buffers are stale.
#[derive(Debug, Clone, Default)]
pub struct ZoneCollection {
    rects: Vec<SampleRect>,
    colors: Vec<RawColor>,
    dirty: bool,
}

impl ZoneCollection {
    /// Create `count` zones (rounded down to an even number), all dirty.
    pub fn new(count: usize) -> Self {
        let count = count & !1;
        Self {
            rects: vec![SampleRect::default(); count],
            colors: vec![RawColor::BLACK; count],
            dirty: true,
        }
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Zones per eye.
    pub fn half(&self) -> usize {
        self.rects.len() / 2
    }

    pub fn rects(&self) -> &[SampleRect] {
        &self.rects
    }

    pub fn colors(&self) -> &[RawColor] {
        &self.colors
    }

    pub fn colors_mut(&mut self) -> &mut [RawColor] {
        &mut self.colors
    }

    /// Replace every rectangle and flag the GPU buffers for rebuild.
    /// A layout of a different length resizes the collection.
    pub fn set_rects(&mut self, rects: Vec<SampleRect>) {
        self.colors.resize(rects.len(), RawColor::BLACK);
        self.rects = rects;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}
