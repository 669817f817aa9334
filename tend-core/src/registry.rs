//! Daemon registry
//!
//! Maps daemon names to their persisted config and in-memory runtime record.
//! Each entry carries two locks:
//!
//! - `op_lock` serializes lifecycle operations (start/stop/restart/remove)
//!   for one name. It is held across awaits, never across daemons.
//! - `runtime` guards the record itself and is only held for short,
//!   non-blocking critical sections. When both are needed, `op_lock` is
//!   always taken first.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tend_paths::DataLayout;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::daemon::{DaemonConfig, DaemonRecord};
use crate::error::{Result, SupervisorError};
use crate::launcher::ProcessHandle;
use crate::store::ConfigStore;
use crate::timer::TimerHandle;

/// Mutable runtime state of one daemon.
#[derive(Debug)]
pub(crate) struct Runtime {
    pub record: DaemonRecord,
    /// Present exactly while an OS process is attached.
    pub process: Option<ProcessHandle>,
    /// Bumped on every launch; exit notifications carry the value they were
    /// launched with so stale ones can be dropped.
    pub generation: u64,
    pub restart_timer: Option<TimerHandle>,
    pub health_timer: Option<TimerHandle>,
}

impl Runtime {
    fn new(name: &str) -> Self {
        Self {
            record: DaemonRecord::new(name),
            process: None,
            generation: 0,
            restart_timer: None,
            health_timer: None,
        }
    }

    /// Cancel the pending restart and health timers, if any.
    pub fn cancel_timers(&mut self) {
        if let Some(timer) = self.restart_timer.take() {
            timer.cancel();
        }
        if let Some(timer) = self.health_timer.take() {
            timer.cancel();
        }
    }
}

/// A registered daemon.
#[derive(Debug)]
pub(crate) struct DaemonEntry {
    pub config: DaemonConfig,
    pub op_lock: Mutex<()>,
    pub runtime: Mutex<Runtime>,
}

impl DaemonEntry {
    fn new(config: DaemonConfig) -> Self {
        let runtime = Runtime::new(&config.name);
        Self {
            config,
            op_lock: Mutex::new(()),
            runtime: Mutex::new(runtime),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Copy of the current runtime record.
    pub async fn snapshot(&self) -> DaemonRecord {
        self.runtime.lock().await.record.clone()
    }
}

/// Durable store plus in-memory index of daemons.
#[derive(Debug)]
pub(crate) struct DaemonRegistry {
    store: ConfigStore,
    data_dir: PathBuf,
    entries: RwLock<HashMap<String, Arc<DaemonEntry>>>,
}

impl DaemonRegistry {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            store: ConfigStore::new(DataLayout::new(&data_dir).daemons_dir()),
            data_dir,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register every persisted config that is not registered yet.
    ///
    /// Loaded daemons always start out `stopped`; PID files left behind by a
    /// previous supervisor are not consulted.
    pub async fn load(&self) -> Result<usize> {
        let configs = self.store.load_all().await?;
        let mut entries = self.entries.write().await;

        let mut loaded = 0;
        for config in configs {
            if entries.contains_key(&config.name) {
                debug!(daemon = %config.name, "Already registered, skipping");
                continue;
            }
            entries.insert(config.name.clone(), Arc::new(DaemonEntry::new(config)));
            loaded += 1;
        }

        info!(count = loaded, "Loaded daemons from {}", self.store.dir().display());
        Ok(loaded)
    }

    /// Persist and register a new daemon.
    pub async fn create(&self, mut config: DaemonConfig) -> Result<DaemonConfig> {
        config.validate()?;
        config.fill_default_paths(&self.data_dir);

        let mut entries = self.entries.write().await;
        if entries.contains_key(&config.name) {
            return Err(SupervisorError::DuplicateName(config.name));
        }

        self.store.save(&config).await?;
        entries.insert(config.name.clone(), Arc::new(DaemonEntry::new(config.clone())));

        info!(daemon = %config.name, "Daemon created");
        Ok(config)
    }

    /// Drop `entry` from the store and the index.
    ///
    /// Only removes the exact entry given, so a racing re-create under the
    /// same name is left alone.
    pub async fn remove(&self, entry: &Arc<DaemonEntry>) -> Result<()> {
        let mut entries = self.entries.write().await;
        match entries.get(entry.name()) {
            Some(current) if Arc::ptr_eq(current, entry) => {}
            _ => return Err(SupervisorError::NotFound(entry.name().to_string())),
        }

        self.store.delete(entry.name()).await?;
        entries.remove(entry.name());

        info!(daemon = %entry.name(), "Daemon removed");
        Ok(())
    }

    pub async fn entry(&self, name: &str) -> Result<Arc<DaemonEntry>> {
        self.entries
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| SupervisorError::NotFound(name.to_string()))
    }

    /// All entries, sorted by name.
    pub async fn entries(&self) -> Vec<Arc<DaemonEntry>> {
        let mut entries: Vec<_> = self.entries.read().await.values().cloned().collect();
        entries.sort_by(|a, b| a.name().cmp(b.name()));
        entries
    }

    pub async fn get(&self, name: &str) -> Result<DaemonRecord> {
        Ok(self.entry(name).await?.snapshot().await)
    }

    pub async fn list(&self) -> Vec<DaemonRecord> {
        let mut records = Vec::new();
        for entry in self.entries().await {
            records.push(entry.snapshot().await);
        }
        records
    }
}
