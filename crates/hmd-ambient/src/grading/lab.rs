//! CIE L*a*b* conversions for linear sRGB primaries under D65.

/// D65 reference white, normalized so that Y = 1.
const D65_X: f64 = 0.950489;
const D65_Y: f64 = 1.0;
const D65_Z: f64 = 1.08884;

/// (6/29)^3
const EPSILON: f64 = 0.008856;
/// 6/29, the same threshold on the cube-root side.
const EPSILON_ROOT: f64 = 0.206897;
const KAPPA: f64 = 7.787;
const OFFSET: f64 = 16.0 / 116.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lab {
    pub l: f64,
    pub a: f64,
    pub b: f64,
}

fn forward(t: f64) -> f64 {
    if t > EPSILON {
        t.cbrt()
    } else {
        KAPPA * t + OFFSET
    }
}

fn inverse(t: f64) -> f64 {
    if t > EPSILON_ROOT {
        t * t * t
    } else {
        (t - OFFSET) / KAPPA
    }
}

pub fn linear_rgb_to_lab(r: f64, g: f64, b: f64) -> Lab {
    let x = (r * 0.4124564 + g * 0.3575761 + b * 0.1804375) / D65_X;
    let y = (r * 0.2126729 + g * 0.7151522 + b * 0.0721750) / D65_Y;
    let z = (r * 0.0193339 + g * 0.1191920 + b * 0.9503041) / D65_Z;

    let (fx, fy, fz) = (forward(x), forward(y), forward(z));

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

pub fn lab_to_linear_rgb(lab: Lab) -> [f64; 3] {
    let fy = (lab.l + 16.0) / 116.0;
    let fx = lab.a / 500.0 + fy;
    let fz = fy - lab.b / 200.0;

    let x = inverse(fx) * D65_X;
    let y = inverse(fy) * D65_Y;
    let z = inverse(fz) * D65_Z;

    [
        x * 3.2404542 + y * -1.5371385 + z * -0.4985314,
        x * -0.9692660 + y * 1.8760108 + z * 0.0415560,
        x * 0.0556434 + y * -0.2040259 + z * 1.0572252,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_maps_to_l100() {
        let lab = linear_rgb_to_lab(1.0, 1.0, 1.0);
        assert!((lab.l - 100.0).abs() < 1e-3);
        assert!(lab.a.abs() < 0.01);
        assert!(lab.b.abs() < 0.01);
    }

    #[test]
    fn black_maps_to_l0() {
        let lab = linear_rgb_to_lab(0.0, 0.0, 0.0);
        assert!(lab.l.abs() < 1e-9);
    }

    #[test]
    fn mid_grey_is_neutral() {
        let lab = linear_rgb_to_lab(0.18, 0.18, 0.18);
        // 18% grey sits just under L* = 50
        assert!((lab.l - 49.5).abs() < 0.5);
        assert!(lab.a.abs() < 0.01);
        assert!(lab.b.abs() < 0.01);
    }

    #[test]
    fn round_trip_is_close() {
        for rgb in [[0.5, 0.5, 0.5], [1.0, 0.0, 0.0], [0.02, 0.3, 0.9], [0.001, 0.001, 0.001]] {
            let back = lab_to_linear_rgb(linear_rgb_to_lab(rgb[0], rgb[1], rgb[2]));
            for c in 0..3 {
                assert!((back[c] - rgb[c]).abs() < 1e-3, "{rgb:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn red_has_positive_a() {
        let lab = linear_rgb_to_lab(1.0, 0.0, 0.0);
        assert!(lab.a > 50.0);
    }
}
