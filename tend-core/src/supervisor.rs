//! Supervisor: the public entry point of tend-core

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::controller::{Controller, RestartOptions, StartOptions, StopOptions};
use crate::daemon::{DaemonConfig, DaemonRecord};
use crate::error::Result;
use crate::events::DaemonEvent;
use crate::logs::{self, LogOptions};

/// Supervisor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// Root of persisted configs, PID files and logs.
    pub data_dir: PathBuf,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            data_dir: tend_paths::data_dir(),
        }
    }
}

impl SupervisorConfig {
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }
}

/// Supervises any number of named daemons.
///
/// Dropping the supervisor cancels its timers but leaves attached processes
/// running; call [`Supervisor::shutdown`] to stop them.
#[derive(Debug)]
pub struct Supervisor {
    config: SupervisorConfig,
    controller: Arc<Controller>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        info!(data_dir = %config.data_dir.display(), "Creating supervisor");
        let controller = Arc::new(Controller::new(config.data_dir.clone()));
        Self { config, controller }
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Register every persisted daemon as `stopped`; returns how many were
    /// added.
    pub async fn load(&self) -> Result<usize> {
        self.controller.registry.load().await
    }

    /// Persist and register a daemon; returns the config with its default
    /// paths filled in.
    pub async fn create(&self, config: DaemonConfig) -> Result<DaemonConfig> {
        self.controller.registry.create(config).await
    }

    pub async fn remove(&self, name: &str, force: bool) -> Result<()> {
        self.controller.remove(name, force).await
    }

    pub async fn start(&self, name: &str, options: StartOptions) -> Result<()> {
        self.controller.start(name, options).await
    }

    /// Stopping a daemon that is not running succeeds without side effects.
    pub async fn stop(&self, name: &str, options: StopOptions) -> Result<()> {
        self.controller.stop(name, options).await
    }

    pub async fn restart(&self, name: &str, options: RestartOptions) -> Result<()> {
        self.controller.restart(name, options).await
    }

    /// Snapshot of one daemon's runtime record.
    pub async fn status(&self, name: &str) -> Result<DaemonRecord> {
        self.controller.registry.get(name).await
    }

    /// Snapshots of every daemon, sorted by name.
    pub async fn list(&self) -> Vec<DaemonRecord> {
        self.controller.registry.list().await
    }

    pub async fn config(&self, name: &str) -> Result<DaemonConfig> {
        Ok(self.controller.registry.entry(name).await?.config.clone())
    }

    pub async fn logs(&self, name: &str, options: LogOptions) -> Result<Vec<String>> {
        let entry = self.controller.registry.entry(name).await?;
        logs::read_logs(&entry.config, options).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.controller.subscribe()
    }

    /// Cancel all timers and stop every daemon, each bounded by its
    /// `stopTimeout`.
    pub async fn shutdown(&self) {
        self.controller.shutdown().await;
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        self.controller.shutdown.cancel();
    }
}
