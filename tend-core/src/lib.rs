//! Process supervision core for tend.
//!
//! A [`Supervisor`] launches named background processes, restarts them after
//! abnormal exits, probes their health and tears them down on request.
//!
//! # Key Types
//!
//! - [`Supervisor`] - Public API: create/remove/start/stop/restart/status/logs
//! - [`DaemonConfig`] - Persisted configuration of one daemon
//! - [`DaemonRecord`] - Snapshot of a daemon's runtime state
//! - [`DaemonEvent`] - Notifications broadcast to subscribers
//! - [`RestartPolicy`] - Fixed-delay, capped restart decisions

mod controller;
pub mod daemon;
pub mod error;
pub mod events;
pub mod health;
pub mod launcher;
pub mod logs;
mod registry;
pub mod restart;
pub mod store;
pub mod supervisor;
mod timer;

// Re-exports
pub use controller::{READY_POLL_INTERVAL, RESTART_SETTLE_DELAY, RestartOptions, StartOptions, StopOptions};
pub use daemon::{DaemonConfig, DaemonRecord, DaemonStatus, HealthCheckConfig, HealthStatus, HttpProbeConfig};
pub use error::{MAX_RESTARTS_EXCEEDED, Result, SupervisorError};
pub use events::DaemonEvent;
pub use logs::{DEFAULT_LOG_LINES, LogOptions};
pub use restart::{RestartDecision, RestartPolicy};
pub use supervisor::{Supervisor, SupervisorConfig};
