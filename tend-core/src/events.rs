//! Events emitted by the supervisor

use serde::{Deserialize, Serialize};

use crate::daemon::HealthStatus;

/// Something that happened to a supervised daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DaemonEvent {
    /// A process was spawned and attached
    Started { name: String, pid: u32 },
    /// The OS refused to launch the process
    SpawnFailed { name: String, error: String },
    /// The attached process exited on its own
    Exited {
        name: String,
        code: Option<i32>,
        signal: Option<i32>,
    },
    /// An automatic restart was armed
    RestartScheduled {
        name: String,
        attempt: u32,
        delay_ms: u64,
    },
    /// The restart budget is exhausted
    GaveUp { name: String },
    /// A health probe changed the health status
    HealthChanged { name: String, status: HealthStatus },
    /// A restart cycle began
    Restarting { name: String },
    /// The daemon was stopped
    Stopped { name: String },
}

impl DaemonEvent {
    /// Name of the daemon the event refers to.
    pub fn name(&self) -> &str {
        match self {
            Self::Started { name, .. }
            | Self::SpawnFailed { name, .. }
            | Self::Exited { name, .. }
            | Self::RestartScheduled { name, .. }
            | Self::GaveUp { name }
            | Self::HealthChanged { name, .. }
            | Self::Restarting { name }
            | Self::Stopped { name } => name,
        }
    }
}
