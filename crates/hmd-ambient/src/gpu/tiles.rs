use crate::zones::SampleRect;

use super::types::{GpuZone, TILE_SIZE};

/// CPU-side partition of every zone into `TILE_SIZE` pixel tiles.
///
/// Bounds the gather dispatch to `max_tiles_x * max_tiles_y` workgroups per
/// zone; zones with a smaller grid skip the extra groups. Each zone owns a
/// contiguous run of `tiles_x * tiles_y` slots in the tile buffer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TilePlan {
    pub zones: Vec<GpuZone>,
    pub max_tiles_x: u32,
    pub max_tiles_y: u32,
    pub total_tiles: u32,
    pub frame_size: (u32, u32),
}

impl TilePlan {
    pub fn build(rects: &[SampleRect], width: u32, height: u32) -> Self {
        let mut zones = Vec::with_capacity(rects.len());
        let mut max_tiles_x = 1;
        let mut max_tiles_y = 1;
        let mut total_tiles = 0;

        for rect in rects {
            let bounds = rect.to_pixels(width, height);
            let tiles_x = (bounds[2] - bounds[0]).div_ceil(TILE_SIZE);
            let tiles_y = (bounds[3] - bounds[1]).div_ceil(TILE_SIZE);

            let zone = GpuZone {
                bounds,
                tiles_x,
                tiles_y,
                tile_offset: total_tiles,
                _pad: 0,
            };
            total_tiles += zone.tile_count();
            zones.push(zone);

            // empty zones must not widen the dispatch grid
            if zone.tile_count() > 0 {
                max_tiles_x = max_tiles_x.max(tiles_x);
                max_tiles_y = max_tiles_y.max(tiles_y);
            }
        }

        Self {
            zones,
            max_tiles_x,
            max_tiles_y,
            total_tiles,
            frame_size: (width, height),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> SampleRect {
        SampleRect {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    #[test]
    fn square_of_64_pixels_uses_four_tiles() {
        let plan = TilePlan::build(&[rect(0.25, 0.25, 0.5, 0.5)], 256, 256);
        let zone = plan.zones[0];
        assert_eq!(zone.bounds, [64, 64, 128, 128]);
        assert_eq!((zone.tiles_x, zone.tiles_y), (2, 2));
        assert_eq!(plan.total_tiles, 4);
    }

    #[test]
    fn partial_tiles_round_up() {
        // 70 x 10 pixels: three columns, the last one six pixels wide.
        let plan = TilePlan::build(&[rect(0.0, 0.0, 0.7, 0.1)], 100, 100);
        assert_eq!((plan.zones[0].tiles_x, plan.zones[0].tiles_y), (3, 1));
    }

    #[test]
    fn offsets_are_contiguous() {
        let rects = [
            rect(0.0, 0.0, 0.5, 0.5),
            rect(0.0, 0.0, 0.125, 0.125),
            rect(0.5, 0.5, 1.0, 1.0),
        ];
        let plan = TilePlan::build(&rects, 128, 128);
        assert_eq!(plan.zones[0].tile_offset, 0);
        assert_eq!(plan.zones[1].tile_offset, 4);
        assert_eq!(plan.zones[2].tile_offset, 5);
        assert_eq!(plan.total_tiles, 9);
        assert_eq!((plan.max_tiles_x, plan.max_tiles_y), (2, 2));
    }

    #[test]
    fn offscreen_zone_has_no_tiles() {
        let plan = TilePlan::build(&[rect(1.5, 0.0, 1.8, 1.0)], 64, 64);
        assert_eq!(plan.zones[0].tile_count(), 0);
        assert_eq!(plan.total_tiles, 0);
        assert_eq!((plan.max_tiles_x, plan.max_tiles_y), (1, 1));
    }

    #[test]
    fn clipped_zone_does_not_stretch_the_grid() {
        let rects = [rect(0.0, 0.0, 0.25, 0.25), rect(-0.5, 0.0, -0.1, 1.0)];
        let plan = TilePlan::build(&rects, 128, 128);
        assert_eq!(plan.zones[1].tile_count(), 0);
        assert_eq!((plan.max_tiles_x, plan.max_tiles_y), (1, 1));
        assert_eq!(plan.total_tiles, 1);
    }
}
