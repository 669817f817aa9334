//! Runtime state of supervised daemons

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonStatus {
    /// No process attached.
    #[default]
    Stopped,
    /// A launch is in progress.
    Starting,
    /// A process is attached.
    Running,
    /// A stop is in progress.
    Stopping,
    /// The last process exited abnormally or could not be launched.
    Failed,
}

impl std::fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Result of the most recent health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Unhealthy => write!(f, "unhealthy"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Snapshot of a daemon's runtime record.
///
/// Always a copy; mutating it has no effect on the supervisor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonRecord {
    pub name: String,
    pub status: DaemonStatus,
    pub pid: Option<u32>,
    pub restart_count: u32,
    pub last_started: Option<DateTime<Utc>>,
    pub last_stopped: Option<DateTime<Utc>>,
    pub health_status: Option<HealthStatus>,
    pub last_error: Option<String>,
}

impl DaemonRecord {
    /// A fresh record: stopped, no restarts.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == DaemonStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_display() {
        assert_eq!(DaemonStatus::Stopped.to_string(), "stopped");
        assert_eq!(DaemonStatus::Starting.to_string(), "starting");
        assert_eq!(DaemonStatus::Running.to_string(), "running");
        assert_eq!(DaemonStatus::Stopping.to_string(), "stopping");
        assert_eq!(DaemonStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn new_record_is_stopped() {
        let record = DaemonRecord::new("web");
        assert_eq!(record.status, DaemonStatus::Stopped);
        assert_eq!(record.restart_count, 0);
        assert!(record.pid.is_none());
        assert!(!record.is_running());
    }

    #[test]
    fn record_serializes_lowercase_status() {
        let mut record = DaemonRecord::new("web");
        record.status = DaemonStatus::Running;
        record.pid = Some(42);
        record.health_status = Some(HealthStatus::Healthy);

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"status\":\"running\""));
        assert!(json.contains("\"healthStatus\":\"healthy\""));
        assert!(json.contains("\"restartCount\":0"));
    }
}
