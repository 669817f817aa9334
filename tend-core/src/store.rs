//! On-disk storage of daemon configs
//!
//! One pretty-printed JSON document per daemon, at `<dir>/<name>.json`.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};

use crate::daemon::DaemonConfig;
use crate::error::Result;

/// Directory-backed config store
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for `name`
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Read every stored config.
    ///
    /// Unreadable or corrupt documents are logged and skipped.
    pub async fn load_all(&self) -> Result<Vec<DaemonConfig>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut configs = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }

            match Self::read_config(&path).await {
                Ok(config) => configs.push(config),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable daemon config");
                }
            }
        }

        configs.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(dir = %self.dir.display(), count = configs.len(), "Loaded daemon configs");
        Ok(configs)
    }

    async fn read_config(path: &Path) -> Result<DaemonConfig> {
        let content = fs::read_to_string(path).await?;
        let config: DaemonConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write `config`, creating the directory if needed.
    pub async fn save(&self, config: &DaemonConfig) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let content = serde_json::to_string_pretty(config)?;
        fs::write(self.path_for(&config.name), content).await?;
        Ok(())
    }

    /// Delete the document for `name`; a missing document is not an error.
    pub async fn delete(&self, name: &str) -> Result<()> {
        match fs::remove_file(self.path_for(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
