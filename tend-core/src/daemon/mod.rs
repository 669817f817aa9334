//! Daemon configuration and runtime state types

pub mod config;
pub mod state;

pub use config::{DaemonConfig, HealthCheckConfig, HttpProbeConfig};
pub use state::{DaemonRecord, DaemonStatus, HealthStatus};
