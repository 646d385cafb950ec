use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender};
use notify_debouncer_mini::{DebouncedEventKind, Debouncer, new_debouncer};

const DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches the settings file so edits made while running are picked up.
///
/// The parent directory is watched rather than the file, since editors
/// usually replace the file instead of writing it in place.
pub struct SettingsWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher>,
    receiver: Receiver<PathBuf>,
    path: PathBuf,
}

impl SettingsWatcher {
    pub fn new(path: &Path) -> Result<Self> {
        let dir = path
            .parent()
            .with_context(|| format!("{} has no parent directory", path.display()))?;
        let file_name: OsString = path
            .file_name()
            .with_context(|| format!("{} is not a file path", path.display()))?
            .to_os_string();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let (tx, rx): (Sender<PathBuf>, Receiver<PathBuf>) = crossbeam_channel::unbounded();

        let mut debouncer = new_debouncer(
            DEBOUNCE,
            move |res: Result<Vec<notify_debouncer_mini::DebouncedEvent>, notify::Error>| {
                match res {
                    Ok(events) => {
                        for event in events {
                            if event.kind == DebouncedEventKind::Any
                                && event.path.file_name() == Some(file_name.as_os_str())
                            {
                                let _ = tx.send(event.path);
                            }
                        }
                    }
                    Err(e) => log::warn!("Settings watcher error: {e}"),
                }
            },
        )?;

        debouncer
            .watcher()
            .watch(dir, notify::RecursiveMode::NonRecursive)?;
        log::info!("Watching {} for settings changes", path.display());

        Ok(Self {
            _debouncer: debouncer,
            receiver: rx,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Drain pending events; true if the settings file changed since the
    /// last call.
    pub fn changed(&self) -> bool {
        let mut changed = false;
        while self.receiver.try_recv().is_ok() {
            changed = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn wait_for_change(watcher: &SettingsWatcher) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if watcher.changed() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hmd-ambient").join("settings.json");
        let watcher = SettingsWatcher::new(&path).unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert_eq!(watcher.path(), path);
        assert!(!watcher.changed());
    }

    #[test]
    fn reports_writes_to_the_settings_file_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let watcher = SettingsWatcher::new(&path).unwrap();

        std::fs::write(dir.path().join("other.json"), "{}").unwrap();
        std::thread::sleep(DEBOUNCE * 3);
        assert!(!watcher.changed());

        std::fs::write(&path, "{}").unwrap();
        assert!(wait_for_change(&watcher));
    }
}
