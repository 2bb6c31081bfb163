//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::cli::Cli;
use crate::config::loader::{load, ConfigError};
use crate::config::schema::EchoConfig;

/// A watcher that monitors the configuration file for changes.
///
/// Each change is re-run through the full load path (file, then flags, then
/// validation) so flags keep precedence over reloaded file values.
pub struct ConfigWatcher {
    path: PathBuf,
    cli: Cli,
    update_tx: mpsc::UnboundedSender<EchoConfig>,
}

impl ConfigWatcher {
    /// Create a new ConfigWatcher for the file named by `cli.config`.
    ///
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path, cli: Cli) -> (Self, mpsc::UnboundedReceiver<EchoConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                cli,
                update_tx,
            },
            update_rx,
        )
    }

    /// Reload once, as the watcher does on a change event.
    pub fn reload(&self) -> Result<EchoConfig, ConfigError> {
        let mut cli = self.cli.clone();
        cli.config = Some(self.path.clone());
        load(&cli)
    }

    /// Start watching the file in a background thread. The returned watcher
    /// must be kept alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?self.path, "Config file change detected, reloading");
                        match self.reload() {
                            Ok(new_config) => {
                                let _ = self.update_tx.send(new_config);
                            }
                            Err(e) => {
                                tracing::error!(
                                    error = %e,
                                    "Failed to reload config, keeping current configuration"
                                );
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
