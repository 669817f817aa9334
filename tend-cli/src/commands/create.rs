//! Register a new daemon

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::Args;
use tend_core::{DaemonConfig, HealthCheckConfig};

use crate::config::TendConfig;

/// Arguments for the create command
#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Unique daemon name
    pub name: String,

    /// Working directory of the daemon
    #[arg(long)]
    pub cwd: Option<PathBuf>,

    /// Environment variable for the daemon (KEY=VALUE, repeatable)
    #[arg(long = "env", value_parser = parse_env_pair)]
    pub env: Vec<(String, String)>,

    /// Restart after abnormal exits and failed health checks
    #[arg(long)]
    pub auto_restart: bool,

    /// Delay before an automatic restart, in milliseconds
    #[arg(long)]
    pub restart_delay: Option<u64>,

    /// Maximum consecutive automatic restarts
    #[arg(long)]
    pub max_restarts: Option<u32>,

    /// Readiness deadline for `run --wait`, in milliseconds
    #[arg(long)]
    pub start_timeout: Option<u64>,

    /// Graceful stop deadline before killing, in milliseconds
    #[arg(long)]
    pub stop_timeout: Option<u64>,

    /// Shell command probing health (exit 0 = healthy)
    #[arg(long, conflicts_with = "health_url")]
    pub health_command: Option<String>,

    /// URL probed with GET (200 = healthy)
    #[arg(long)]
    pub health_url: Option<String>,

    /// Delay between health probes, in milliseconds
    #[arg(long)]
    pub health_interval: Option<u64>,

    /// Probe attempts per health check before it counts as failed
    #[arg(long)]
    pub health_retries: Option<u32>,

    /// Command to run, followed by its arguments
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

impl CreateArgs {
    /// Build the daemon config described by these arguments.
    pub fn to_config(&self) -> Result<DaemonConfig> {
        let (command, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("No command given for daemon '{}'", self.name))?;

        let mut config = DaemonConfig::new(&self.name, command)
            .with_args(args.iter().cloned())
            .with_auto_restart(self.auto_restart);

        if let Some(cwd) = &self.cwd {
            config = config.with_working_directory(cwd);
        }
        for (key, value) in &self.env {
            config = config.with_env(key, value);
        }
        if let Some(delay) = self.restart_delay {
            config = config.with_restart_delay(delay);
        }
        if let Some(max) = self.max_restarts {
            config = config.with_max_restarts(max);
        }
        if let Some(timeout) = self.start_timeout {
            config = config.with_start_timeout(timeout);
        }
        if let Some(timeout) = self.stop_timeout {
            config = config.with_stop_timeout(timeout);
        }
        if let Some(health_check) = self.health_check() {
            config = config.with_health_check(health_check);
        }

        Ok(config)
    }

    fn health_check(&self) -> Option<HealthCheckConfig> {
        let mut health_check = match (&self.health_command, &self.health_url) {
            (Some(command), _) => HealthCheckConfig::command(command),
            (None, Some(url)) => HealthCheckConfig::http(url),
            (None, None) => return None,
        };
        if let Some(interval) = self.health_interval {
            health_check = health_check.with_interval(interval);
        }
        if let Some(retries) = self.health_retries {
            health_check = health_check.with_retries(retries);
        }
        Some(health_check)
    }
}

fn parse_env_pair(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

/// Run the create command
pub async fn run(args: CreateArgs, config: &TendConfig) -> Result<()> {
    let supervisor = super::open_supervisor(config).await?;
    let created = supervisor.create(args.to_config()?).await?;

    println!("Created daemon '{}'", created.name);
    println!("  stdout: {}", created.log_file.display());
    println!("  stderr: {}", created.error_file.display());
    Ok(())
}
