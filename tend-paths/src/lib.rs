//! Filesystem layout for tend.
//!
//! Base directories follow XDG on every platform. Everything the supervisor
//! writes lives under a single data directory:
//!
//! ```text
//! <data_dir>/
//!   daemons/<name>.json     persisted daemon configs
//!   run/<name>.pid          PID of the attached process
//!   logs/<name>.log         captured stdout
//!   logs/<name>.error.log   captured stderr
//! ```

use std::path::{Path, PathBuf};

const APP_DIR: &str = "tend";

/// `$XDG_CONFIG_HOME/tend`, falling back to `~/.config/tend`.
pub fn config_dir() -> PathBuf {
    xdg_dir("XDG_CONFIG_HOME", ".config")
}

/// `$XDG_DATA_HOME/tend`, falling back to `~/.local/share/tend`.
///
/// ```
/// let layout = tend_paths::DataLayout::new(tend_paths::data_dir());
/// assert!(layout.pid_file("web").ends_with("run/web.pid"));
/// ```
pub fn data_dir() -> PathBuf {
    xdg_dir("XDG_DATA_HOME", ".local/share")
}

/// An empty variable counts as unset, as the XDG spec requires.
fn xdg_dir(var: &str, home_relative: &str) -> PathBuf {
    let base = match std::env::var_os(var) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir().unwrap_or_default().join(home_relative),
    };
    base.join(APP_DIR)
}

/// Name-derived paths under a data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one config document per daemon.
    pub fn daemons_dir(&self) -> PathBuf {
        self.root.join("daemons")
    }

    pub fn pid_file(&self, name: &str) -> PathBuf {
        self.root.join("run").join(format!("{name}.pid"))
    }

    pub fn log_file(&self, name: &str) -> PathBuf {
        self.root.join("logs").join(format!("{name}.log"))
    }

    pub fn error_file(&self, name: &str) -> PathBuf {
        self.root.join("logs").join(format!("{name}.error.log"))
    }
}
