//! Persisted daemon configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tend_paths::DataLayout;

use crate::error::{Result, SupervisorError};

/// Configuration of a single supervised daemon.
///
/// Stored as one JSON document per daemon, keyed by `name`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Unique identifier, also used to derive file names.
    pub name: String,

    /// Executable to launch.
    pub command: String,

    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory of the child process.
    #[serde(default = "default_working_directory")]
    pub working_directory: PathBuf,

    /// Variables merged over the supervisor's own environment.
    #[serde(default)]
    pub environment: HashMap<String, String>,

    /// Where the PID of the attached process is written.
    #[serde(default)]
    pub pid_file: PathBuf,

    /// Append-only capture of the child's stdout.
    #[serde(default)]
    pub log_file: PathBuf,

    /// Append-only capture of the child's stderr.
    #[serde(default)]
    pub error_file: PathBuf,

    /// Restart automatically after abnormal exits and failed health checks.
    #[serde(default)]
    pub auto_restart: bool,

    /// Delay before a restart attempt, in milliseconds.
    #[serde(default = "default_restart_delay")]
    pub restart_delay: u64,

    /// Cap on consecutive abnormal-exit restarts.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Readiness deadline for `start` with `wait`, in milliseconds.
    #[serde(default = "default_start_timeout")]
    pub start_timeout: u64,

    /// Graceful stop deadline before escalating to a kill, in milliseconds.
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout: u64,

    /// Optional liveness probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheckConfig>,
}

/// Liveness probe settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheckConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay between probes, in milliseconds.
    #[serde(default = "default_health_interval")]
    pub interval: u64,

    /// Deadline of a single probe, in milliseconds.
    #[serde(default = "default_health_timeout")]
    pub timeout: u64,

    /// Probe attempts per tick, all within one `timeout`; the tick fails
    /// only when every attempt fails.
    #[serde(default = "default_health_retries")]
    pub retries: u32,

    /// Shell command; healthy iff it exits with status 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// HTTP GET probe; healthy iff the status matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpProbeConfig>,
}

/// HTTP probe target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HttpProbeConfig {
    pub url: String,

    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
}

fn default_working_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_restart_delay() -> u64 {
    1000
}

fn default_max_restarts() -> u32 {
    3
}

fn default_start_timeout() -> u64 {
    30_000
}

fn default_stop_timeout() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_health_interval() -> u64 {
    30_000
}

fn default_health_timeout() -> u64 {
    5_000
}

fn default_health_retries() -> u32 {
    3
}

fn default_expected_status() -> u16 {
    200
}

impl DaemonConfig {
    /// Create a config for `command` with default policy values.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            working_directory: default_working_directory(),
            environment: HashMap::new(),
            pid_file: PathBuf::new(),
            log_file: PathBuf::new(),
            error_file: PathBuf::new(),
            auto_restart: false,
            restart_delay: default_restart_delay(),
            max_restarts: default_max_restarts(),
            start_timeout: default_start_timeout(),
            stop_timeout: default_stop_timeout(),
            health_check: None,
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_working_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_directory = dir.into();
        self
    }

    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_auto_restart(mut self, enabled: bool) -> Self {
        self.auto_restart = enabled;
        self
    }

    /// Set the restart delay in milliseconds.
    #[must_use]
    pub fn with_restart_delay(mut self, millis: u64) -> Self {
        self.restart_delay = millis;
        self
    }

    #[must_use]
    pub fn with_max_restarts(mut self, max: u32) -> Self {
        self.max_restarts = max;
        self
    }

    /// Set the graceful stop deadline in milliseconds.
    #[must_use]
    pub fn with_stop_timeout(mut self, millis: u64) -> Self {
        self.stop_timeout = millis;
        self
    }

    /// Set the readiness deadline in milliseconds.
    #[must_use]
    pub fn with_start_timeout(mut self, millis: u64) -> Self {
        self.start_timeout = millis;
        self
    }

    #[must_use]
    pub fn with_health_check(mut self, health_check: HealthCheckConfig) -> Self {
        self.health_check = Some(health_check);
        self
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout)
    }

    /// The health check, if one is configured and enabled.
    pub fn active_health_check(&self) -> Option<&HealthCheckConfig> {
        self.health_check.as_ref().filter(|hc| hc.enabled)
    }

    /// Reject configs that cannot be stored or launched.
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.command.trim().is_empty() {
            return Err(SupervisorError::InvalidConfig(format!(
                "daemon '{}' has an empty command",
                self.name
            )));
        }
        Ok(())
    }

    /// Fill empty PID/log/error paths with name-derived paths under `data_dir`.
    pub fn fill_default_paths(&mut self, data_dir: &Path) {
        let layout = DataLayout::new(data_dir);
        if self.pid_file.as_os_str().is_empty() {
            self.pid_file = layout.pid_file(&self.name);
        }
        if self.log_file.as_os_str().is_empty() {
            self.log_file = layout.log_file(&self.name);
        }
        if self.error_file.as_os_str().is_empty() {
            self.error_file = layout.error_file(&self.name);
        }
    }
}

impl HealthCheckConfig {
    /// Probe by running `command` through the shell.
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }

    /// Probe by issuing a GET to `url` and expecting `200`.
    pub fn http(url: impl Into<String>) -> Self {
        Self {
            http: Some(HttpProbeConfig {
                url: url.into(),
                expected_status: default_expected_status(),
            }),
            ..Self::default()
        }
    }

    /// Set the probe interval in milliseconds.
    #[must_use]
    pub fn with_interval(mut self, millis: u64) -> Self {
        self.interval = millis;
        self
    }

    /// Set the per-probe timeout in milliseconds.
    #[must_use]
    pub fn with_timeout(mut self, millis: u64) -> Self {
        self.timeout = millis;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    /// Attempts made per tick; never less than one.
    pub fn attempts(&self) -> u32 {
        self.retries.max(1)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_health_interval(),
            timeout: default_health_timeout(),
            retries: default_health_retries(),
            command: None,
            http: None,
        }
    }
}

/// Daemon names become file names, so keep them to a safe alphabet.
fn validate_name(name: &str) -> Result<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if name.is_empty() || name.starts_with('.') || !valid_chars {
        return Err(SupervisorError::InvalidConfig(format!(
            "invalid daemon name '{name}': use ASCII letters, digits, '-', '_' or '.'"
        )));
    }
    Ok(())
}
