use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;

use super::status::SamplerStatus;
use super::timing::RollingAverage;
use super::{PreviewMode, SamplerCommand, SamplerError};
use crate::capture::{FrameSource, FrameSync};
use crate::gpu::TileReducer;
use crate::grading::GradingConfig;
use crate::output::AdaLight;
use crate::settings::SettingsConfig;
use crate::zones::{GradedColor, LayoutConfig, RawColor, ZoneCollection, compute_layout};

const FRAME_SYNC_TIMEOUT: Duration = Duration::from_millis(100);
const PREVIEW_INTERVAL: Duration = Duration::from_millis(10);
const IDLE_INTERVAL: Duration = Duration::from_millis(10);

/// State owned by the sampling thread. Field order matters: the strip is
/// blanked and closed in `Drop` and dropped before the GPU reducer.
pub(super) struct Worker<W: Write> {
    strip: AdaLight<W>,
    reducer: TileReducer,
    source: Box<dyn FrameSource>,
    zones: ZoneCollection,
    graded: Vec<GradedColor>,

    led_count: usize,
    layout: LayoutConfig,
    grading: GradingConfig,
    preview: PreviewMode,
    preview_value: f32,
    geometry_dirty: bool,

    commands: Receiver<SamplerCommand>,
    status: Arc<SamplerStatus>,
    stop: Arc<AtomicBool>,

    render_time: RollingAverage,
    output_time: RollingAverage,
    frame_interval: RollingAverage,
    last_frame: Option<Instant>,
    sync_stalled: bool,
}

pub(super) struct WorkerShared {
    pub commands: Receiver<SamplerCommand>,
    pub status: Arc<SamplerStatus>,
    pub stop: Arc<AtomicBool>,
}

impl<W: Write> Worker<W> {
    /// GPU first, then the strip, then the initial layout.
    pub fn init(
        settings: &SettingsConfig,
        source: Box<dyn FrameSource>,
        open_strip: impl FnOnce() -> Result<AdaLight<W>, crate::output::TransportError>,
        shared: WorkerShared,
    ) -> Result<Self, SamplerError> {
        let reducer = TileReducer::new()?;
        let strip = open_strip()?;

        let led_count = settings.device.zone_count();
        let layout = settings.layout.clamped();
        let mut zones = ZoneCollection::new(led_count);
        zones.set_rects(compute_layout(&layout, led_count));

        log::info!(
            "Sampler initialized: {} LEDs on {}",
            strip.led_count(),
            reducer.gpu().adapter.get_info().name
        );

        Ok(Self {
            strip,
            reducer,
            source,
            graded: vec![GradedColor::OFF; zones.len()],
            zones,
            led_count,
            layout,
            grading: settings.grading.clamped(),
            preview: PreviewMode::Off,
            preview_value: 1.0,
            geometry_dirty: false,
            commands: shared.commands,
            status: shared.status,
            stop: shared.stop,
            render_time: RollingAverage::default(),
            output_time: RollingAverage::default(),
            frame_interval: RollingAverage::default(),
            last_frame: None,
            sync_stalled: false,
        })
    }

    pub fn run(&mut self) {
        self.status.set_connected(true);

        while !self.stop.load(Ordering::Relaxed) {
            self.drain_commands();

            if !self.strip.is_open() {
                log::error!("LED strip disconnected, stopping sampler");
                self.status.set_lights_disconnected(true);
                break;
            }

            if let Some(color) = self.preview.color(self.preview_value) {
                self.status.set_preview_active(true);
                self.status.set_active(false);
                self.show_preview(color);
                thread::sleep(PREVIEW_INTERVAL);
                continue;
            }
            self.status.set_preview_active(false);

            let activity = self.source.activity();
            if !activity.is_presenting() {
                self.status.set_active(false);
                self.last_frame = None;
                self.strip.turn_off();
                thread::sleep(IDLE_INTERVAL);
                continue;
            }

            match self.source.wait_frame_sync(FRAME_SYNC_TIMEOUT) {
                FrameSync::TimedOut => {
                    if self.sync_stalled {
                        log::debug!("Frame sync timed out again");
                    } else {
                        log::warn!("Timed out waiting for frame sync, lights off until frames resume");
                        self.sync_stalled = true;
                    }
                    self.status.set_active(false);
                    self.last_frame = None;
                    self.strip.turn_off();
                    continue;
                }
                FrameSync::Ready => {
                    if self.sync_stalled {
                        log::info!("Frame sync resumed");
                        self.sync_stalled = false;
                    }
                }
            }

            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            self.sample_frame();
        }

        self.status.set_active(false);
        self.status.set_preview_active(false);
        self.status.set_connected(false);
        log::info!("Sampler stopped");
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                SamplerCommand::SetLayout(layout) => {
                    self.layout = layout.clamped();
                    self.geometry_dirty = true;
                }
                SamplerCommand::SetGrading(grading) => {
                    self.grading = grading.clamped();
                }
                SamplerCommand::SetPreview(mode, value) => {
                    if mode != self.preview {
                        log::info!("Preview mode: {mode:?}");
                    }
                    self.preview = mode;
                    self.preview_value = value.clamp(0.0, 1.0);
                }
            }
        }
    }

    fn show_preview(&mut self, color: RawColor) {
        let graded = self.grading.grade(color);
        self.graded.fill(graded);
        self.strip.set_colors(&self.graded);
    }

    fn sample_frame(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_frame.replace(now) {
            self.frame_interval.push_duration(now - last);
        }

        if self.geometry_dirty {
            self.zones
                .set_rects(compute_layout(&self.layout, self.led_count));
            self.graded.resize(self.zones.len(), GradedColor::OFF);
            self.geometry_dirty = false;
        }

        let render_start = Instant::now();
        if let Err(e) = self.reducer.render(&mut self.zones, self.source.as_mut()) {
            log::debug!("Skipping frame {}: {e}", self.reducer.frame_index());
            return;
        }
        self.grading.grade_into(self.zones.colors(), &mut self.graded);
        self.render_time.push_duration(render_start.elapsed());

        let output_start = Instant::now();
        self.strip.set_colors(&self.graded);
        self.output_time.push_duration(output_start.elapsed());

        self.status.set_active(true);
        self.status.set_dropped_writes(self.strip.dropped_writes());
        self.status.record_frame(
            self.render_time.average(),
            self.output_time.average(),
            self.frame_interval.average(),
        );
    }
}

impl<W: Write> Drop for Worker<W> {
    fn drop(&mut self) {
        self.strip.turn_off();
        self.strip.close();
    }
}
