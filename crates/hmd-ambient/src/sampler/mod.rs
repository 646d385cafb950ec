//! The sampling thread: capture, reduce, grade and send, once per headset
//! frame.
//!
//! [`AmbientSampler`] owns one worker generation at a time. Configuration
//! edits reach the worker through a command channel; the worker reports
//! back only through the atomic [`SamplerStatus`].

pub mod status;
pub mod timing;
mod worker;

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use thiserror::Error;

use crate::capture::FrameSource;
use crate::gpu::RenderError;
use crate::grading::GradingConfig;
use crate::output::{AdaLight, TransportError};
use crate::settings::{SettingsConfig, SettingsError};
use crate::zones::{LayoutConfig, RawColor};

pub use status::{SamplerStatus, StatusSnapshot};

use self::worker::{Worker, WorkerShared};

#[derive(Debug, Error)]
pub enum SamplerError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("failed to spawn sampler thread: {0}")]
    Spawn(std::io::Error),

    #[error("sampler thread exited during startup")]
    WorkerDied,
}

/// Synthetic color shown on every LED instead of captured content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PreviewMode {
    #[default]
    Off,
    White,
    Red,
    Green,
    Blue,
}

impl PreviewMode {
    /// Raw color for intensity `value`, or `None` when previewing is off.
    pub fn color(self, value: f32) -> Option<RawColor> {
        let v = f64::from(value.clamp(0.0, 1.0));
        match self {
            Self::Off => None,
            Self::White => Some(RawColor::new(v, v, v)),
            Self::Red => Some(RawColor::new(v, 0.0, 0.0)),
            Self::Green => Some(RawColor::new(0.0, v, 0.0)),
            Self::Blue => Some(RawColor::new(0.0, 0.0, v)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum SamplerCommand {
    SetLayout(LayoutConfig),
    SetGrading(GradingConfig),
    SetPreview(PreviewMode, f32),
}

/// Handle to a running sampling thread. Dropping it stops the thread.
pub struct AmbientSampler {
    commands: Sender<SamplerCommand>,
    stop: Arc<AtomicBool>,
    status: Arc<SamplerStatus>,
    thread: Option<JoinHandle<()>>,
}

impl AmbientSampler {
    /// Validate the device settings, spawn the worker and block until it has
    /// acquired the GPU and opened the LED strip, or failed to.
    pub fn start(
        settings: &SettingsConfig,
        source: Box<dyn FrameSource>,
    ) -> Result<Self, SamplerError> {
        settings.device.validate()?;
        let device = settings.device.clone();
        Self::spawn(settings, source, move || AdaLight::open(&device))
    }

    /// Stop and join the current worker, then start a fresh one.
    pub fn restart(
        &mut self,
        settings: &SettingsConfig,
        source: Box<dyn FrameSource>,
    ) -> Result<(), SamplerError> {
        self.stop();
        *self = Self::start(settings, source)?;
        Ok(())
    }

    fn spawn<W, F>(
        settings: &SettingsConfig,
        source: Box<dyn FrameSource>,
        open_strip: F,
    ) -> Result<Self, SamplerError>
    where
        W: Write + 'static,
        F: FnOnce() -> Result<AdaLight<W>, TransportError> + Send + 'static,
    {
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (init_tx, init_rx) = crossbeam_channel::bounded::<Result<(), SamplerError>>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let status = Arc::new(SamplerStatus::default());

        let shared = WorkerShared {
            commands: command_rx,
            status: status.clone(),
            stop: stop.clone(),
        };
        let settings = settings.clone();
        let thread_status = status.clone();

        let handle = std::thread::Builder::new()
            .name("ambient-sampler".into())
            .spawn(move || {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    let mut worker = match Worker::init(&settings, source, open_strip, shared) {
                        Ok(worker) => worker,
                        Err(e) => {
                            report_init_failure(&thread_status, &e);
                            let _ = init_tx.send(Err(e));
                            return;
                        }
                    };
                    let _ = init_tx.send(Ok(()));
                    worker.run();
                }));
                if let Err(e) = outcome {
                    let msg = if let Some(s) = e.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = e.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "unknown panic".into()
                    };
                    log::error!("Sampler thread panicked: {msg}");
                    thread_status.set_connected(false);
                    thread_status.set_active(false);
                }
            })
            .map_err(SamplerError::Spawn)?;

        let mut sampler = Self {
            commands: command_tx,
            stop,
            status,
            thread: Some(handle),
        };

        match init_rx.recv() {
            Ok(Ok(())) => Ok(sampler),
            Ok(Err(e)) => {
                sampler.stop();
                Err(e)
            }
            Err(_) => {
                sampler.stop();
                Err(SamplerError::WorkerDied)
            }
        }
    }

    pub fn set_layout(&self, layout: LayoutConfig) {
        self.send(SamplerCommand::SetLayout(layout));
    }

    pub fn set_grading(&self, grading: GradingConfig) {
        self.send(SamplerCommand::SetGrading(grading));
    }

    pub fn set_preview(&self, mode: PreviewMode, value: f32) {
        self.send(SamplerCommand::SetPreview(mode, value));
    }

    fn send(&self, command: SamplerCommand) {
        if self.commands.send(command).is_err() {
            log::debug!("Sampler thread gone, dropping command");
        }
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    /// Whether the worker thread is still looping.
    pub fn is_running(&self) -> bool {
        if self.stop.load(Ordering::Relaxed) {
            return false;
        }
        match &self.thread {
            Some(h) => !h.is_finished(),
            None => false,
        }
    }

    /// Request a stop and join. The current iteration finishes first.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AmbientSampler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Only a strip that failed to open counts as a device init failure.
fn report_init_failure(status: &SamplerStatus, error: &SamplerError) {
    log::error!("Sampler failed to start: {error}");
    if matches!(error, SamplerError::Transport(_)) {
        status.set_device_init_failed(true);
    }
}
