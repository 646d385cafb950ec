mod capture;
mod gpu;
mod grading;
mod output;
mod sampler;
mod settings;
mod watch;
mod zones;

use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::Parser;

use capture::{HmdActivity, TestPatternSource};
use sampler::{AmbientSampler, PreviewMode};
use settings::{SettingsConfig, SettingsError};
use watch::SettingsWatcher;

const STATUS_INTERVAL: Duration = Duration::from_secs(1);
const PATTERN_SIZE: u32 = 1024;
const PATTERN_HUE_PERIOD: Duration = Duration::from_secs(12);

/// Drive an AdaLight LED strip from the eye images of a VR headset.
#[derive(Debug, Parser)]
#[command(name = "hmd-ambient", version, about)]
struct CliArgs {
    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Serial port of the LED strip (saved to settings)
    #[arg(long)]
    port: Option<String>,

    /// Baud rate of the LED strip (saved to settings)
    #[arg(long)]
    baud: Option<u32>,

    /// Number of LEDs on the strip (saved to settings)
    #[arg(long)]
    leds: Option<usize>,

    /// Show a solid color on every LED instead of captured content
    #[arg(long, value_enum, ignore_case = true)]
    preview: Option<PreviewMode>,

    /// Preview intensity, 0 to 1
    #[arg(long, default_value_t = 1.0)]
    intensity: f32,

    /// Refresh rate of the synthetic mirror
    #[arg(long, default_value_t = 90.0)]
    refresh_hz: f32,

    /// Activity reported by the synthetic headset
    #[arg(long, value_enum, default_value_t = HmdActivity::UserInteraction)]
    headset: HmdActivity,

    /// Exit after this many seconds
    #[arg(long)]
    seconds: Option<u64>,
}

impl CliArgs {
    fn overrides_device(&self) -> bool {
        self.port.is_some() || self.baud.is_some() || self.leds.is_some()
    }

    fn apply(&self, settings: &mut SettingsConfig) {
        if let Some(port) = &self.port {
            settings.device.port.clone_from(port);
        }
        if let Some(baud) = self.baud {
            settings.device.baud_rate = baud;
        }
        if let Some(leds) = self.leds {
            settings.device.led_count = leds;
        }
    }

    fn preview(&self) -> Option<(PreviewMode, f32)> {
        self.preview
            .map(|mode| (mode, self.intensity.clamp(0.0, 1.0)))
    }

    fn test_pattern(&self) -> Box<TestPatternSource> {
        Box::new(
            TestPatternSource::solid([0, 0, 0, 255], [0, 0, 0, 255], PATTERN_SIZE, PATTERN_SIZE)
                .with_hue_cycle(PATTERN_HUE_PERIOD)
                .with_refresh_rate(self.refresh_hz)
                .with_activity(self.headset),
        )
    }
}

/// What an edited settings file means for the sampler.
#[derive(Debug, PartialEq, Eq)]
enum SettingsChange {
    /// Lights stay off.
    Idle,
    Stop,
    Start,
    /// Device changed under a running sampler.
    Restart,
    /// Layout and grading only.
    Update,
}

fn plan_change(
    running: bool,
    current: &SettingsConfig,
    fresh: &SettingsConfig,
) -> Result<SettingsChange, SettingsError> {
    if !fresh.enable_lights {
        return Ok(if running {
            SettingsChange::Stop
        } else {
            SettingsChange::Idle
        });
    }
    if running && fresh.device == current.device {
        return Ok(SettingsChange::Update);
    }
    fresh.device.validate()?;
    Ok(if running {
        SettingsChange::Restart
    } else {
        SettingsChange::Start
    })
}

/// Push edited settings to the sampler. Invalid device settings leave the
/// current state alone; a device that fails to open leaves the lights off
/// until the next edit.
fn apply_settings_change(
    lights: &mut Option<AmbientSampler>,
    current: &mut SettingsConfig,
    fresh: SettingsConfig,
    cli: &CliArgs,
) {
    let fresh = fresh.clamped();
    let change = match plan_change(lights.is_some(), current, &fresh) {
        Ok(change) => change,
        Err(e) => {
            log::warn!("Keeping current device: {e}");
            return;
        }
    };

    match change {
        SettingsChange::Idle => {}
        SettingsChange::Stop => {
            log::info!("Lights disabled");
            if let Some(mut sampler) = lights.take() {
                sampler.stop();
            }
        }
        SettingsChange::Start => {
            log::info!("Lights enabled");
            match AmbientSampler::start(&fresh, cli.test_pattern()) {
                Ok(sampler) => *lights = Some(sampler),
                Err(e) => log::error!("Failed to start ambient lighting: {e}"),
            }
        }
        SettingsChange::Restart => {
            log::info!("Device settings changed, restarting sampler");
            if let Some(sampler) = lights.as_mut() {
                if let Err(e) = sampler.restart(&fresh, cli.test_pattern()) {
                    log::error!("Failed to restart ambient lighting: {e}");
                    *lights = None;
                }
            }
        }
        SettingsChange::Update => {
            if let Some(sampler) = lights.as_ref() {
                sampler.set_layout(fresh.layout);
                sampler.set_grading(fresh.grading);
            }
        }
    }

    if let (Some(sampler), Some((mode, value))) = (lights.as_ref(), cli.preview()) {
        sampler.set_preview(mode, value);
    }
    *current = fresh;
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = CliArgs::parse();

    if cli.list_ports {
        let ports = output::list_ports()?;
        if ports.is_empty() {
            println!("No serial ports found");
        }
        for port in ports {
            println!("{port}");
        }
        return Ok(());
    }

    let mut settings = SettingsConfig::load();
    if cli.overrides_device() {
        cli.apply(&mut settings);
        if let Err(e) = settings.save() {
            log::warn!("Could not save settings: {e}");
        }
    }
    let mut settings = settings.clamped();

    let wanted = cli.preview.is_some()
        || (settings.enable_lights_on_startup && settings.enable_lights);
    let mut lights = if wanted {
        let sampler = AmbientSampler::start(&settings, cli.test_pattern())
            .context("failed to start ambient lighting")?;
        if let Some((mode, value)) = cli.preview() {
            sampler.set_preview(mode, value);
        }
        Some(sampler)
    } else {
        log::info!("Lights are off; set enable_lights in the settings file or pass --preview");
        None
    };

    let watcher = SettingsConfig::path().and_then(|path| match SettingsWatcher::new(&path) {
        Ok(watcher) => Some(watcher),
        Err(e) => {
            log::warn!("Settings edits will not be picked up: {e:#}");
            None
        }
    });

    let deadline = cli.seconds.map(|s| Instant::now() + Duration::from_secs(s));

    loop {
        std::thread::sleep(STATUS_INTERVAL);

        if let Some(sampler) = lights.as_mut() {
            let status = sampler.status();
            println!(
                "connected={} active={} preview={} frames={} dropped={} render={:.2}ms output={:.2}ms interval={:.2}ms",
                status.connected,
                status.active,
                status.preview_active,
                status.frames,
                status.dropped_writes,
                status.render_ms,
                status.output_ms,
                status.frame_interval_ms,
            );

            if !sampler.is_running() {
                sampler.stop();
                if sampler.status().lights_disconnected {
                    bail!("lights disconnected");
                }
                bail!("sampler stopped unexpectedly");
            }
        }

        if let Some(watcher) = watcher.as_ref().filter(|w| w.changed()) {
            match SettingsConfig::load_from(watcher.path()) {
                Ok(fresh) => apply_settings_change(&mut lights, &mut settings, fresh, &cli),
                Err(e) => log::warn!("Ignoring edited settings: {e}"),
            }
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
    }

    if let Some(mut sampler) = lights.take() {
        sampler.stop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("hmd-ambient").chain(args.iter().copied()))
    }

    fn enabled_device() -> SettingsConfig {
        let mut settings = SettingsConfig::default();
        settings.device.port = "COM3".into();
        settings
    }

    #[test]
    fn no_arguments_is_a_plain_run() {
        let cli = parse(&[]).unwrap();
        assert!(!cli.list_ports);
        assert!(!cli.overrides_device());
        assert_eq!(cli.preview(), None);
        assert_eq!(cli.refresh_hz, 90.0);
        assert_eq!(cli.headset, HmdActivity::UserInteraction);
        assert_eq!(cli.seconds, None);
    }

    #[test]
    fn device_overrides() {
        let cli = parse(&["--port", "COM5", "--baud", "500000", "--leds", "24"]).unwrap();
        assert!(cli.overrides_device());

        let mut settings = SettingsConfig::default();
        cli.apply(&mut settings);
        assert_eq!(settings.device.port, "COM5");
        assert_eq!(settings.device.baud_rate, 500_000);
        assert_eq!(settings.device.led_count, 24);
    }

    #[test]
    fn preview_with_and_without_intensity() {
        let cli = parse(&["--preview", "red", "--intensity", "0.25", "--seconds", "3"]).unwrap();
        assert_eq!(cli.preview(), Some((PreviewMode::Red, 0.25)));
        assert_eq!(cli.seconds, Some(3));

        let cli = parse(&["--preview", "White", "--list-ports"]).unwrap();
        assert_eq!(cli.preview(), Some((PreviewMode::White, 1.0)));
        assert!(cli.list_ports);

        let cli = parse(&["--preview", "blue", "--intensity", "4"]).unwrap();
        assert_eq!(cli.preview(), Some((PreviewMode::Blue, 1.0)));
    }

    #[test]
    fn synthetic_headset_options() {
        let cli = parse(&["--refresh-hz", "120", "--headset", "standby"]).unwrap();
        assert_eq!(cli.refresh_hz, 120.0);
        assert_eq!(cli.headset, HmdActivity::Standby);

        let cli = parse(&["--headset", "idle-timeout"]).unwrap();
        assert!(!cli.headset.is_presenting());
    }

    #[test]
    fn bad_arguments_are_errors() {
        assert!(parse(&["--baud"]).is_err());
        assert!(parse(&["--baud", "fast"]).is_err());
        assert!(parse(&["--preview", "purple"]).is_err());
        assert!(parse(&["--headset", "asleep"]).is_err());
        assert!(parse(&["--frobnicate"]).is_err());
    }

    #[test]
    fn disabling_stops_running_lights() {
        let current = enabled_device();
        let mut fresh = current.clone();
        fresh.enable_lights = false;
        assert_eq!(plan_change(true, &current, &fresh).unwrap(), SettingsChange::Stop);
        assert_eq!(plan_change(false, &current, &fresh).unwrap(), SettingsChange::Idle);
    }

    #[test]
    fn enabling_starts_stopped_lights() {
        let mut current = enabled_device();
        current.enable_lights = false;
        let fresh = enabled_device();
        assert_eq!(plan_change(false, &current, &fresh).unwrap(), SettingsChange::Start);
    }

    #[test]
    fn enabling_without_a_device_is_rejected() {
        let mut current = SettingsConfig::default();
        current.enable_lights = false;
        let fresh = SettingsConfig::default();
        assert!(matches!(
            plan_change(false, &current, &fresh),
            Err(SettingsError::InvalidDevice(_))
        ));
    }

    #[test]
    fn running_lights_follow_edits() {
        let current = enabled_device();

        let mut fresh = current.clone();
        fresh.layout.swap_left_right = true;
        fresh.grading.brightness = 0.5;
        assert_eq!(plan_change(true, &current, &fresh).unwrap(), SettingsChange::Update);

        fresh.device.led_count = 24;
        assert_eq!(plan_change(true, &current, &fresh).unwrap(), SettingsChange::Restart);

        fresh.device.port.clear();
        assert!(plan_change(true, &current, &fresh).is_err());
    }

    #[test]
    fn disabled_edit_is_recorded_without_a_sampler() {
        let cli = parse(&[]).unwrap();
        let mut lights = None;
        let mut current = enabled_device();
        current.enable_lights = false;

        let mut fresh = current.clone();
        fresh.grading.contrast = 1.5;
        apply_settings_change(&mut lights, &mut current, fresh, &cli);

        assert!(lights.is_none());
        assert_eq!(current.grading.contrast, 1.5);
    }
}
