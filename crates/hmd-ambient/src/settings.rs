use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grading::GradingConfig;
use crate::zones::LayoutConfig;

const APP_DIR: &str = "hmd-ambient";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid device settings: {0}")]
    InvalidDevice(String),

    #[error("settings file I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no configuration directory on this system")]
    NoConfigDir,
}

/// LED strip connection. Fixed for the lifetime of one sampler; changing it
/// means a restart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub led_count: usize,
    pub port: String,
    pub baud_rate: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            led_count: 18,
            port: String::new(),
            baud_rate: 115_200,
        }
    }
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.port.trim().is_empty() {
            return Err(SettingsError::InvalidDevice("no serial port selected".into()));
        }
        if self.baud_rate == 0 {
            return Err(SettingsError::InvalidDevice("baud rate must be positive".into()));
        }
        if self.zone_count() < 2 {
            return Err(SettingsError::InvalidDevice(format!(
                "need at least 2 LEDs, got {}",
                self.led_count
            )));
        }
        Ok(())
    }

    /// Sampled zones, split evenly between both eyes. The strip itself is
    /// framed with the full `led_count`.
    pub fn zone_count(&self) -> usize {
        self.led_count & !1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub version: u32,
    /// Whether lights come on at launch.
    pub enable_lights_on_startup: bool,
    /// Runtime switch for the whole pipeline. Editing it while running stops
    /// or resumes the lights.
    pub enable_lights: bool,
    pub device: DeviceConfig,
    pub layout: LayoutConfig,
    pub grading: GradingConfig,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            version: 1,
            enable_lights_on_startup: true,
            enable_lights: true,
            device: DeviceConfig::default(),
            layout: LayoutConfig::default(),
            grading: GradingConfig::default(),
        }
    }
}

impl SettingsConfig {
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Load from the user config directory, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::path() else {
            return Self::default();
        };
        match Self::load_from(&path) {
            Ok(config) => {
                log::info!("Loaded settings from {}", path.display());
                config
            }
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::default()
            }
            Err(e) => {
                log::warn!("Ignoring settings at {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        let path = Self::path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        log::debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Copy with layout and grading clamped to the editor's ranges.
    pub fn clamped(&self) -> Self {
        Self {
            layout: self.layout.clamped(),
            grading: self.grading.clamped(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_preserves_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(SETTINGS_FILE);

        let mut config = SettingsConfig::default();
        config.device.port = "/dev/ttyUSB0".into();
        config.device.led_count = 24;
        config.layout.swap_left_right = true;
        config.grading.brightness = 0.6;

        config.save_to(&path).unwrap();
        let loaded = SettingsConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, r#"{ "device": { "port": "COM3" } }"#).unwrap();

        let loaded = SettingsConfig::load_from(&path).unwrap();
        assert_eq!(loaded.device.port, "COM3");
        assert_eq!(loaded.device.led_count, 18);
        assert_eq!(loaded.device.baud_rate, 115_200);
        assert!(loaded.enable_lights);
        assert_eq!(loaded.layout, LayoutConfig::default());
    }

    #[test]
    fn garbage_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            SettingsConfig::load_from(&path),
            Err(SettingsError::Parse(_))
        ));
    }

    #[test]
    fn device_validation() {
        let mut device = DeviceConfig::default();
        assert!(matches!(device.validate(), Err(SettingsError::InvalidDevice(_))));

        device.port = "COM4".into();
        assert!(device.validate().is_ok());

        device.baud_rate = 0;
        assert!(device.validate().is_err());

        device.baud_rate = 9600;
        device.led_count = 1;
        assert!(device.validate().is_err());
    }

    #[test]
    fn odd_led_counts_round_down() {
        let device = DeviceConfig {
            led_count: 19,
            ..DeviceConfig::default()
        };
        assert_eq!(device.zone_count(), 18);
    }

    #[test]
    fn clamped_limits_layout_and_grading() {
        let mut config = SettingsConfig::default();
        config.layout.curvature = 5.0;
        config.grading.saturation = -1.0;
        let clamped = config.clamped();
        assert_eq!(clamped.layout.curvature, 1.0);
        assert_eq!(clamped.grading.saturation, 0.0);
    }
}
