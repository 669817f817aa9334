//! Error types for tend-core

use std::time::Duration;

use thiserror::Error;

/// `lastError` recorded when the restart budget of a daemon is exhausted.
///
/// This is a terminal state (`status=failed`), never returned as an error.
pub const MAX_RESTARTS_EXCEEDED: &str = "Max restart attempts exceeded";

/// Errors surfaced by supervisor operations
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Daemon not found: {0}")]
    NotFound(String),

    #[error("Daemon already exists: {0}")]
    DuplicateName(String),

    #[error("Daemon is already running: {0}")]
    AlreadyRunning(String),

    #[error("Daemon '{name}' did not become ready within {timeout:?}")]
    StartTimeout { name: String, timeout: Duration },

    #[error("Daemon '{name}' failed to start: {reason}")]
    StartFailed { name: String, reason: String },

    #[error("Daemon '{name}' did not stop within {timeout:?} and was killed")]
    StopTimeout { name: String, timeout: Duration },

    #[error("Failed to spawn daemon '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid daemon config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for supervisor operations.
pub type Result<T> = std::result::Result<T, SupervisorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_name() {
        let error = SupervisorError::NotFound("web".to_string());
        assert!(error.to_string().contains("Daemon not found"));
        assert!(error.to_string().contains("web"));
    }

    #[test]
    fn start_failed_carries_reason() {
        let error = SupervisorError::StartFailed {
            name: "web".to_string(),
            reason: "Process exited with code 3".to_string(),
        };
        assert!(error.to_string().contains("failed to start"));
        assert!(error.to_string().contains("code 3"));
    }

    #[test]
    fn stop_timeout_mentions_kill() {
        let error = SupervisorError::StopTimeout {
            name: "web".to_string(),
            timeout: Duration::from_secs(10),
        };
        assert!(error.to_string().contains("killed"));
    }

    #[test]
    fn spawn_error_keeps_source() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = SupervisorError::Spawn {
            name: "web".to_string(),
            source: io_error,
        };
        assert!(std::error::Error::source(&error).is_some());
        assert!(error.to_string().contains("no such file"));
    }

    #[test]
    fn io_error_converts() {
        let io_error = std::io::Error::other("disk full");
        let error: SupervisorError = io_error.into();
        assert!(matches!(error, SupervisorError::Io(_)));
    }
}
