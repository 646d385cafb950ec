use serde::{Deserialize, Serialize};

use super::SampleRect;

/// Geometry of the sample rectangles along the left and right image edges.
///
/// All distances are fractions of one eye image. Changing any of these only
/// requires recomputing the layout, never reopening the device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub swap_left_right: bool,
    pub bottom_to_top_left: bool,
    pub bottom_to_top_right: bool,
    pub height_fraction: f32,
    pub width_fraction: f32,
    pub vertical_offset: f32,
    pub horizontal_offset: f32,
    pub vertical_area_size: f32,
    pub curvature: f32,
    pub curvature_shape: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            swap_left_right: false,
            bottom_to_top_left: false,
            bottom_to_top_right: true,
            height_fraction: 0.5,
            width_fraction: 0.35,
            vertical_offset: -0.02,
            horizontal_offset: 0.22,
            vertical_area_size: 1.0,
            curvature: 0.12,
            curvature_shape: 0.12,
        }
    }
}

impl LayoutConfig {
    /// Clamp every parameter into the range the settings editor allows.
    pub fn clamped(&self) -> Self {
        Self {
            height_fraction: self.height_fraction.clamp(0.0, 1.0),
            width_fraction: self.width_fraction.clamp(0.0, 1.0),
            vertical_offset: self.vertical_offset.clamp(-1.0, 1.0),
            horizontal_offset: self.horizontal_offset.clamp(0.0, 1.0),
            vertical_area_size: self.vertical_area_size.clamp(0.0, 2.0),
            curvature: self.curvature.clamp(0.0, 1.0),
            curvature_shape: self.curvature_shape.clamp(-1.0, 1.0),
            ..*self
        }
    }

    /// Physical LED index that receives the left-eye rectangle `i`.
    pub fn left_index(&self, i: usize, led_count: usize) -> usize {
        let half = led_count / 2;
        match (self.swap_left_right, self.bottom_to_top_left) {
            (true, true) => led_count - 1 - i,
            (true, false) => i + half,
            (false, true) => half - 1 - i,
            (false, false) => i,
        }
    }

    /// Physical LED index that receives the right-eye rectangle `i`.
    pub fn right_index(&self, i: usize, led_count: usize) -> usize {
        let half = led_count / 2;
        match (self.swap_left_right, self.bottom_to_top_right) {
            (true, true) => half - 1 - i,
            (true, false) => i,
            (false, true) => led_count - 1 - i,
            (false, false) => i + half,
        }
    }
}

/// Compute one sample rectangle per LED.
///
/// Rectangle `i` of each side is stacked top to bottom and pushed sideways
/// by a parabola centred on `curvature_halfway`, which bows the column of
/// zones to follow a curved lens edge. `led_count` is rounded down to even.
pub fn compute_layout(config: &LayoutConfig, led_count: usize) -> Vec<SampleRect> {
    let led_count = led_count & !1;
    let half = led_count / 2;
    if half == 0 {
        return Vec::new();
    }

    let count = led_count as f32;
    let vert_frac = config.height_fraction / half as f32;
    let vert_radius = config.height_fraction * config.vertical_area_size / half as f32 / 2.0;
    let curvature_factor = config.curvature / count;
    let curvature_halfway = config.curvature_shape * (count / 4.0) + (count / 4.0) - 0.5;
    let half_width = config.width_fraction / 2.0;

    let mut rects = vec![SampleRect::default(); led_count];

    for i in 0..half {
        let bow = curvature_factor * (i as f32 - curvature_halfway).abs().powi(2);
        let y_origin = vert_frac * (i as f32 + 0.5) - config.vertical_offset
            + (1.0 - config.height_fraction) / 2.0;

        let left_x = config.horizontal_offset + bow;
        rects[config.left_index(i, led_count)] =
            rect_around(left_x, y_origin, half_width, vert_radius);

        let right_x = 1.0 - config.horizontal_offset - bow;
        rects[config.right_index(i, led_count)] =
            rect_around(right_x, y_origin, half_width, vert_radius);
    }

    rects
}

fn rect_around(x: f32, y: f32, half_width: f32, half_height: f32) -> SampleRect {
    SampleRect {
        x_min: x - half_width,
        y_min: y - half_height,
        x_max: x + half_width,
        y_max: y + half_height,
    }
}
