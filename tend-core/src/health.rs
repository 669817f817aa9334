//! Health monitor
//!
//! One probe loop per running daemon with an enabled health check. A probe
//! never overlaps the next tick: the interval sleep starts after the previous
//! probe has finished. Each tick makes up to `retries` attempts inside a
//! single `timeout` window, so a failed tick is already a sustained failure.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::{Controller, RESTART_SETTLE_DELAY};
use crate::daemon::{DaemonStatus, HealthCheckConfig, HealthStatus, HttpProbeConfig};
use crate::events::DaemonEvent;
use crate::registry::{DaemonEntry, Runtime};
use crate::timer::TimerHandle;

/// Run one probe. Any failure to run it counts as unhealthy.
///
/// A command probe takes precedence over an HTTP probe; with neither
/// configured the probe trivially passes.
pub async fn probe(check: &HealthCheckConfig) -> bool {
    probe_within(check, check.timeout()).await
}

/// One monitor tick: retry a failing probe until it passes, the attempts
/// run out or the tick's `timeout` is spent.
pub async fn probe_with_retries(check: &HealthCheckConfig) -> bool {
    let deadline = Instant::now() + check.timeout();
    for attempt in 1..=check.attempts() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        if probe_within(check, remaining).await {
            return true;
        }
        debug!(attempt, attempts = check.attempts(), "Health probe attempt failed");
    }
    false
}

async fn probe_within(check: &HealthCheckConfig, timeout: Duration) -> bool {
    if let Some(command) = &check.command {
        return probe_command(command, timeout).await;
    }
    if let Some(http) = &check.http {
        return probe_http(http, timeout).await;
    }
    true
}

fn shell_command(command: &str) -> Command {
    #[cfg(unix)]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
    #[cfg(not(unix))]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
}

async fn probe_command(command: &str, timeout: Duration) -> bool {
    let mut cmd = shell_command(command);
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    match tokio::time::timeout(timeout, cmd.status()).await {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            debug!(command, error = %e, "Health command could not run");
            false
        }
        Err(_) => {
            debug!(command, ?timeout, "Health command timed out");
            false
        }
    }
}

async fn probe_http(http: &HttpProbeConfig, timeout: Duration) -> bool {
    let client = match reqwest::Client::builder().timeout(timeout).build() {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Failed to build HTTP client for health probe");
            return false;
        }
    };

    match client.get(&http.url).send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            if status != http.expected_status {
                debug!(url = %http.url, status, expected = http.expected_status, "Unexpected health status");
            }
            status == http.expected_status
        }
        Err(e) => {
            debug!(url = %http.url, error = %e, "Health request failed");
            false
        }
    }
}

impl Controller {
    /// Arm the probe loop for launch `generation`. Caller holds both locks.
    pub(crate) fn arm_health_monitor(
        self: &Arc<Self>,
        entry: &Arc<DaemonEntry>,
        rt: &mut Runtime,
        generation: u64,
    ) {
        let Some(check) = entry.config.active_health_check().cloned() else {
            return;
        };

        if let Some(previous) = rt.health_timer.take() {
            previous.cancel();
        }
        rt.record.health_status = Some(HealthStatus::Unknown);

        let controller = Arc::clone(self);
        let entry = Arc::clone(entry);
        rt.health_timer = Some(TimerHandle::spawn(&self.shutdown, move |token| {
            controller.monitor(entry, check, generation, token)
        }));
    }

    async fn monitor(
        self: Arc<Self>,
        entry: Arc<DaemonEntry>,
        check: HealthCheckConfig,
        generation: u64,
        token: CancellationToken,
    ) {
        let name = entry.name();
        debug!(daemon = %name, interval = ?check.interval(), attempts = check.attempts(), "Health monitor armed");

        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(check.interval()) => {}
            }

            let healthy = tokio::select! {
                _ = token.cancelled() => return,
                healthy = probe_with_retries(&check) => healthy,
            };

            let mut rt = entry.runtime.lock().await;
            if token.is_cancelled()
                || rt.generation != generation
                || rt.record.status != DaemonStatus::Running
            {
                return;
            }

            let status = if healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            };
            if rt.record.health_status != Some(status) {
                rt.record.health_status = Some(status);
                info!(daemon = %name, %status, "Health status changed");
                self.emit(DaemonEvent::HealthChanged {
                    name: name.to_string(),
                    status,
                });
            }

            if !healthy && entry.config.auto_restart {
                warn!(daemon = %name, "Daemon is unhealthy, restarting");
                drop(rt);
                tokio::spawn(Arc::clone(&self).health_restart(Arc::clone(&entry), generation));
                return;
            }
        }
    }

    /// Restart cycle triggered by a failed health tick.
    ///
    /// The start half is armed as a restart timer, so a `stop` issued during
    /// the settle delay cancels it.
    async fn health_restart(self: Arc<Self>, entry: Arc<DaemonEntry>, generation: u64) {
        let name = entry.name();
        let _op = entry.op_lock.lock().await;

        {
            let rt = entry.runtime.lock().await;
            if self.shutdown.is_cancelled()
                || rt.generation != generation
                || rt.record.status != DaemonStatus::Running
            {
                debug!(daemon = %name, "Daemon changed before health restart, skipping");
                return;
            }
        }

        self.emit(DaemonEvent::Restarting {
            name: name.to_string(),
        });
        if let Err(e) = self
            .stop_locked(&entry, false, entry.config.stop_timeout())
            .await
        {
            warn!(daemon = %name, error = %e, "Stop failed during health restart");
        }

        let mut rt = entry.runtime.lock().await;
        self.arm_delayed_start(&entry, &mut rt, RESTART_SETTLE_DELAY);
    }
}
