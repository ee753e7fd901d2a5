//! Config file watcher for hot reload.
//!
//! Editors often write through temp files and fire several events per save,
//! so events are filtered to the watched file and a reload is only sent when
//! the file content actually changed.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::LbConfig;

pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<LbConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for validated configs.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<LbConfig>) {
        let (updates, rx) = mpsc::unbounded_channel();
        (Self { path: path.to_path_buf(), updates }, rx)
    }

    /// Start watching. Updates flow only while the returned handle is alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let updates = self.updates;
        let last_seen = Mutex::new(std::fs::read_to_string(&path).ok());

        // Watch the directory: atomic saves replace the file's inode.
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if concerns(&event, &path) => {
                    let current = std::fs::read_to_string(&path).ok();
                    {
                        let mut last = last_seen.lock().unwrap_or_else(|p| p.into_inner());
                        if current.is_none() || *last == current {
                            return;
                        }
                        *last = current;
                    }

                    tracing::info!(path = %path.display(), "Config file changed, reloading");
                    match load_config(&path) {
                        Ok(config) => {
                            if updates.send(config).is_err() {
                                tracing::debug!("Config receiver dropped, ignoring reload");
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "Rejected config reload, keeping current configuration"),
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// Whether `event` may have changed the file at `path`.
fn concerns(event: &Event, path: &Path) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
        && event.paths.iter().any(|p| p.file_name() == path.file_name())
}
