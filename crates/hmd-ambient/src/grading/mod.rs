pub mod lab;

use serde::{Deserialize, Serialize};

use crate::zones::{GradedColor, RawColor};

use self::lab::{lab_to_linear_rgb, linear_rgb_to_lab};

/// Largest black level accepted before grading. A black level of exactly 1
/// would divide by zero; this keeps the channel usable but nearly dark.
pub const MAX_BLACK_LEVEL: f64 = 0.999;
const MIN_GAMMA: f64 = 0.1;

/// Per-channel levels: black point, white point and gamma.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelLevels {
    pub min: f32,
    pub max: f32,
    pub gamma: f32,
}

impl Default for ChannelLevels {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1.0,
            gamma: 2.2,
        }
    }
}

impl ChannelLevels {
    pub fn clamped(&self) -> Self {
        Self {
            min: self.min.clamp(0.0, 1.0),
            max: self.max.clamp(0.0, 1.0),
            gamma: self.gamma.clamp(0.1, 4.0),
        }
    }

    /// Map one linear channel value onto `[0,1]` output intensity.
    fn apply(&self, value: f64, brightness: f64) -> f64 {
        let min = f64::from(self.min).clamp(0.0, MAX_BLACK_LEVEL);
        let gamma = f64::from(self.gamma).max(MIN_GAMMA);
        let leveled = ((value - min) * brightness / (1.0 - min)).clamp(0.0, 1.0);
        (leveled.powf(1.0 / gamma) * f64::from(self.max)).clamp(0.0, 1.0)
    }
}

/// Color grading parameters. Read every frame; no precomputation needed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradingConfig {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub red: ChannelLevels,
    pub green: ChannelLevels,
    pub blue: ChannelLevels,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            red: ChannelLevels::default(),
            green: ChannelLevels::default(),
            blue: ChannelLevels::default(),
        }
    }
}

impl GradingConfig {
    /// Grading that leaves linear input untouched apart from quantization.
    #[cfg(test)]
    pub fn identity() -> Self {
        let flat = ChannelLevels {
            min: 0.0,
            max: 1.0,
            gamma: 1.0,
        };
        Self {
            red: flat,
            green: flat,
            blue: flat,
            ..Self::default()
        }
    }

    pub fn clamped(&self) -> Self {
        Self {
            brightness: self.brightness.clamp(0.0, 2.0),
            contrast: self.contrast.clamp(0.0, 2.0),
            saturation: self.saturation.clamp(0.0, 2.0),
            red: self.red.clamped(),
            green: self.green.clamped(),
            blue: self.blue.clamped(),
        }
    }

    /// Grade one raw zone color into display bytes.
    ///
    /// Contrast scales L* around 50 and saturation scales a*/b*, then each
    /// channel goes through black level, brightness, gamma and white level.
    pub fn grade(&self, input: RawColor) -> GradedColor {
        let mut lab = linear_rgb_to_lab(input.r, input.g, input.b);

        lab.l = ((lab.l - 50.0) * f64::from(self.contrast) + 50.0).clamp(0.0, 100.0);
        lab.a *= f64::from(self.saturation);
        lab.b *= f64::from(self.saturation);

        let [r, g, b] = lab_to_linear_rgb(lab);
        let brightness = f64::from(self.brightness);

        GradedColor::new(
            to_byte(self.red.apply(r, brightness)),
            to_byte(self.green.apply(g, brightness)),
            to_byte(self.blue.apply(b, brightness)),
        )
    }

    pub fn grade_into(&self, input: &[RawColor], output: &mut [GradedColor]) {
        for (raw, out) in input.iter().zip(output.iter_mut()) {
            *out = self.grade(*raw);
        }
    }
}

/// Truncating conversion; NaN lands on 0.
fn to_byte(value: f64) -> u8 {
    (value * 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn within_one(a: u8, b: u8) -> bool {
        a.abs_diff(b) <= 1
    }

    #[test]
    fn identity_grading_quantizes_linear_input() {
        let grading = GradingConfig::identity();
        let out = grading.grade(RawColor::new(0.5, 0.5, 0.5));
        for c in [out.r, out.g, out.b] {
            assert!(within_one(c, 127), "got {c}");
        }
        let white = grading.grade(RawColor::new(1.0, 1.0, 1.0));
        for c in [white.r, white.g, white.b] {
            assert!(within_one(c, 255), "got {c}");
        }
        assert_eq!(grading.grade(RawColor::BLACK), GradedColor::OFF);
    }

    #[test]
    fn identity_grading_keeps_primaries() {
        let grading = GradingConfig::identity();
        let red = grading.grade(RawColor::new(1.0, 0.0, 0.0));
        assert!(red.r >= 254);
        assert!(red.g <= 1 && red.b <= 1);
        let blue = grading.grade(RawColor::new(0.0, 0.0, 1.0));
        assert!(blue.b >= 254);
        assert!(blue.r <= 1 && blue.g <= 1);
    }

    #[test]
    fn default_gamma_brightens_midtones() {
        let out = GradingConfig::default().grade(RawColor::new(0.5, 0.5, 0.5));
        // 0.5^(1/2.2) = 0.7297
        assert!(within_one(out.r, 186), "got {}", out.r);
    }

    #[test]
    fn brightness_is_monotonic() {
        let inputs = [
            RawColor::new(0.1, 0.2, 0.3),
            RawColor::new(0.6, 0.05, 0.4),
            RawColor::new(0.9, 0.9, 0.2),
        ];
        for input in inputs {
            let mut previous = GradedColor::OFF;
            for step in 0..=20 {
                let grading = GradingConfig {
                    brightness: step as f32 * 0.1,
                    ..GradingConfig::default()
                };
                let out = grading.grade(input);
                assert!(out.r >= previous.r && out.g >= previous.g && out.b >= previous.b);
                previous = out;
            }
        }
    }

    #[test]
    fn zero_saturation_gives_grey() {
        let grading = GradingConfig {
            saturation: 0.0,
            ..GradingConfig::identity()
        };
        let out = grading.grade(RawColor::new(0.8, 0.2, 0.1));
        assert!(within_one(out.r, out.g) && within_one(out.g, out.b), "{out:?}");
    }

    #[test]
    fn zero_contrast_flattens_to_mid_lightness() {
        let grading = GradingConfig {
            contrast: 0.0,
            ..GradingConfig::identity()
        };
        let dark = grading.grade(RawColor::new(0.01, 0.01, 0.01));
        let bright = grading.grade(RawColor::new(0.9, 0.9, 0.9));
        assert_eq!(dark, bright);
    }

    #[test]
    fn black_level_of_one_does_not_divide_by_zero() {
        let grading = GradingConfig {
            red: ChannelLevels {
                min: 1.0,
                max: 1.0,
                gamma: 1.0,
            },
            ..GradingConfig::identity()
        };
        let out = grading.grade(RawColor::new(0.5, 0.5, 0.5));
        assert_eq!(out.r, 0);
        assert!(within_one(out.g, 127));
    }

    #[test]
    fn black_level_crushes_shadows() {
        let grading = GradingConfig {
            green: ChannelLevels {
                min: 0.2,
                max: 1.0,
                gamma: 1.0,
            },
            ..GradingConfig::identity()
        };
        let out = grading.grade(RawColor::new(0.1, 0.1, 0.1));
        assert_eq!(out.g, 0);
        assert!(out.r > 0);
    }

    #[test]
    fn white_level_caps_output() {
        let grading = GradingConfig {
            blue: ChannelLevels {
                min: 0.0,
                max: 0.5,
                gamma: 1.0,
            },
            ..GradingConfig::identity()
        };
        let out = grading.grade(RawColor::new(1.0, 1.0, 1.0));
        assert!(within_one(out.b, 127));
    }

    #[test]
    fn out_of_range_input_is_clamped() {
        let out = GradingConfig::default().grade(RawColor::new(4.0, -2.0, 0.0));
        assert_eq!(out.r, 255);
        assert_eq!(out.g, 0);
    }
}
