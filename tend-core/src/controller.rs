//! Lifecycle controller
//!
//! Drives the per-daemon state machine:
//!
//! ```text
//!            start                 spawn ok
//!  stopped ─────────▶ starting ─────────────▶ running
//!  failed  ◀───────── (spawn error)              │
//!     ▲                                          │ stop
//!     │ abnormal exit                            ▼
//!  running ────────────────────────────────▶ stopping ──▶ stopped
//! ```
//!
//! Every operation on a daemon runs under that daemon's `op_lock`, so two
//! operations on one name never interleave while operations on different
//! names proceed independently.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::daemon::{DaemonStatus, HealthStatus};
use crate::error::{Result, SupervisorError};
use crate::events::DaemonEvent;
use crate::launcher::{self, ExitInfo};
use crate::registry::{DaemonEntry, DaemonRegistry};

/// Boxed future for tasks that re-enter the controller from the background.
pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// How often `start` with `wait` re-checks readiness.
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Pause between the stop and start halves of a restart.
pub const RESTART_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// How long to wait for a killed process to be reaped.
const KILL_GRACE: Duration = Duration::from_secs(5);

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Options for [`crate::Supervisor::start`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Replace a running process instead of failing.
    pub force: bool,
    /// Block until the daemon is running (and healthy, if probed).
    pub wait: bool,
    /// Readiness deadline; defaults to the daemon's `startTimeout`.
    pub timeout: Option<Duration>,
}

impl StartOptions {
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Options for [`crate::Supervisor::stop`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopOptions {
    /// Kill immediately, skipping the graceful phase.
    pub force: bool,
    /// Graceful deadline; defaults to the daemon's `stopTimeout`.
    pub timeout: Option<Duration>,
}

impl StopOptions {
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Options for [`crate::Supervisor::restart`]; forwarded to both halves.
///
/// `timeout` bounds the graceful stop and, when `wait` is set, the readiness
/// wait of the start. Unset, each half falls back to the daemon's own
/// `stopTimeout` and `startTimeout`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestartOptions {
    pub force: bool,
    pub wait: bool,
    pub timeout: Option<Duration>,
}

impl RestartOptions {
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn with_wait(mut self, wait: bool) -> Self {
        self.wait = wait;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn stop_options(&self) -> StopOptions {
        StopOptions {
            force: self.force,
            timeout: self.timeout,
        }
    }

    pub fn start_options(&self) -> StartOptions {
        StartOptions {
            force: self.force,
            wait: self.wait,
            timeout: self.timeout,
        }
    }
}

/// Owner of the registry, the event channel and the shutdown token.
#[derive(Debug)]
pub(crate) struct Controller {
    pub registry: DaemonRegistry,
    events: broadcast::Sender<DaemonEvent>,
    /// Parent of every timer token; cancelled on supervisor shutdown.
    pub shutdown: CancellationToken,
}

impl Controller {
    pub fn new(data_dir: PathBuf) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            registry: DaemonRegistry::new(data_dir),
            events,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.events.subscribe()
    }

    pub(crate) fn emit(&self, event: DaemonEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub async fn start(self: &Arc<Self>, name: &str, options: StartOptions) -> Result<()> {
        let entry = self.registry.entry(name).await?;
        {
            let _op = entry.op_lock.lock().await;
            self.start_locked(&entry, options.force).await?;
        }

        if options.wait {
            let timeout = options
                .timeout
                .unwrap_or_else(|| entry.config.start_timeout());
            self.wait_until_ready(&entry, timeout).await?;
        }
        Ok(())
    }

    /// Launch a process for `entry`. Caller holds `op_lock`.
    pub(crate) async fn start_locked(
        self: &Arc<Self>,
        entry: &Arc<DaemonEntry>,
        force: bool,
    ) -> Result<()> {
        let name = entry.name();

        let attached = {
            let rt = entry.runtime.lock().await;
            if rt.record.status == DaemonStatus::Running && !force {
                return Err(SupervisorError::AlreadyRunning(name.to_string()));
            }
            rt.process.is_some()
        };
        if attached {
            debug!(daemon = %name, "Replacing attached process");
            self.stop_locked(entry, true, entry.config.stop_timeout())
                .await?;
        }

        let mut rt = entry.runtime.lock().await;
        rt.cancel_timers();
        rt.generation += 1;
        let generation = rt.generation;
        rt.record.status = DaemonStatus::Starting;
        rt.record.last_started = Some(Utc::now());
        rt.record.last_error = None;
        rt.record.health_status = None;

        let controller = Arc::downgrade(self);
        let weak_entry = Arc::downgrade(entry);
        let on_exit = move |info: ExitInfo| -> BoxFuture {
            Box::pin(async move {
                let (Some(controller), Some(entry)) = (controller.upgrade(), weak_entry.upgrade())
                else {
                    return;
                };
                controller.handle_exit(&entry, generation, info).await;
            })
        };

        match launcher::launch(&entry.config, on_exit) {
            Ok(process) => {
                let pid = process.pid();
                rt.process = Some(process);
                rt.record.pid = Some(pid);
                rt.record.status = DaemonStatus::Running;
                info!(daemon = %name, pid, "Daemon started");
                self.emit(DaemonEvent::Started {
                    name: name.to_string(),
                    pid,
                });

                if entry.config.active_health_check().is_some() {
                    self.arm_health_monitor(entry, &mut rt, generation);
                }
                Ok(())
            }
            Err(e) => {
                rt.record.status = DaemonStatus::Failed;
                rt.record.last_error = Some(e.to_string());
                error!(daemon = %name, error = %e, "Failed to launch daemon");
                self.emit(DaemonEvent::SpawnFailed {
                    name: name.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Poll until the daemon is running (and healthy when probed), has
    /// failed, or `timeout` passes.
    async fn wait_until_ready(&self, entry: &DaemonEntry, timeout: Duration) -> Result<()> {
        let name = entry.name();
        let deadline = Instant::now() + timeout;
        let probed = entry.config.active_health_check().is_some();

        loop {
            let next_poll = (Instant::now() + READY_POLL_INTERVAL).min(deadline);
            tokio::time::sleep_until(next_poll).await;

            let record = entry.snapshot().await;
            match record.status {
                DaemonStatus::Running
                    if !probed || record.health_status == Some(HealthStatus::Healthy) =>
                {
                    debug!(daemon = %name, "Daemon is ready");
                    return Ok(());
                }
                DaemonStatus::Failed | DaemonStatus::Stopped => {
                    let reason = record
                        .last_error
                        .unwrap_or_else(|| format!("daemon is {}", record.status));
                    return Err(SupervisorError::StartFailed {
                        name: name.to_string(),
                        reason,
                    });
                }
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(SupervisorError::StartTimeout {
                    name: name.to_string(),
                    timeout,
                });
            }
        }
    }

    pub async fn stop(&self, name: &str, options: StopOptions) -> Result<()> {
        let entry = self.registry.entry(name).await?;
        let _op = entry.op_lock.lock().await;
        let timeout = options
            .timeout
            .unwrap_or_else(|| entry.config.stop_timeout());
        self.stop_locked(&entry, options.force, timeout).await
    }

    /// Tear down the attached process, if any. Caller holds `op_lock`.
    ///
    /// Timers are cancelled before any signal is sent, so nothing can
    /// resurrect the daemon once this returns.
    pub(crate) async fn stop_locked(
        &self,
        entry: &DaemonEntry,
        force: bool,
        timeout: Duration,
    ) -> Result<()> {
        let name = entry.name();

        let process = {
            let mut rt = entry.runtime.lock().await;
            rt.cancel_timers();
            match rt.process.clone() {
                Some(process) => {
                    rt.record.status = DaemonStatus::Stopping;
                    process
                }
                None => {
                    rt.record.status = DaemonStatus::Stopped;
                    debug!(daemon = %name, "Not attached to a process, nothing to stop");
                    return Ok(());
                }
            }
        };

        let pid = process.pid();
        info!(daemon = %name, pid, force, "Stopping daemon");

        let escalated = if force {
            process.kill();
            false
        } else {
            launcher::terminate_gracefully(&process, timeout).await
        };

        if tokio::time::timeout(KILL_GRACE, process.wait()).await.is_err() {
            warn!(daemon = %name, pid, "Process was not reaped after kill");
        }

        let mut rt = entry.runtime.lock().await;
        rt.process = None;
        rt.record.pid = None;
        rt.record.status = DaemonStatus::Stopped;
        rt.record.health_status = None;
        rt.record.last_stopped = Some(Utc::now());
        launcher::remove_pid_file(&entry.config.pid_file);

        if escalated {
            let warning = SupervisorError::StopTimeout {
                name: name.to_string(),
                timeout,
            };
            warn!(daemon = %name, pid, "{warning}");
            rt.record.last_error = Some(warning.to_string());
        }

        info!(daemon = %name, "Daemon stopped");
        self.emit(DaemonEvent::Stopped {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Stop, settle, start. A failed stop does not prevent the start.
    pub async fn restart(self: &Arc<Self>, name: &str, options: RestartOptions) -> Result<()> {
        self.registry.entry(name).await?;

        info!(daemon = %name, "Restarting daemon");
        self.emit(DaemonEvent::Restarting {
            name: name.to_string(),
        });

        if let Err(e) = self.stop(name, options.stop_options()).await {
            warn!(daemon = %name, error = %e, "Stop failed during restart, starting anyway");
        }
        tokio::time::sleep(RESTART_SETTLE_DELAY).await;
        self.start(name, options.start_options()).await
    }

    /// Unregister a daemon, stopping it first when `force` is set.
    pub async fn remove(&self, name: &str, force: bool) -> Result<()> {
        let entry = self.registry.entry(name).await?;
        let _op = entry.op_lock.lock().await;

        let running = entry.runtime.lock().await.record.status == DaemonStatus::Running;
        if running && !force {
            return Err(SupervisorError::AlreadyRunning(name.to_string()));
        }

        // Also cancels pending timers of a stopped or failed daemon.
        self.stop_locked(&entry, false, entry.config.stop_timeout())
            .await?;
        self.registry.remove(&entry).await
    }

    /// Exit notification from the launcher for launch `generation`.
    async fn handle_exit(self: &Arc<Self>, entry: &Arc<DaemonEntry>, generation: u64, info: ExitInfo) {
        let name = entry.name();
        let _op = entry.op_lock.lock().await;
        let mut rt = entry.runtime.lock().await;

        if rt.generation != generation || rt.process.is_none() {
            debug!(daemon = %name, generation, "Ignoring exit of a detached process");
            return;
        }

        rt.process = None;
        rt.record.pid = None;
        rt.record.last_stopped = Some(Utc::now());
        if let Some(timer) = rt.health_timer.take() {
            timer.cancel();
        }
        launcher::remove_pid_file(&entry.config.pid_file);

        self.emit(DaemonEvent::Exited {
            name: name.to_string(),
            code: info.code,
            signal: info.signal,
        });

        if info.success() {
            rt.record.status = DaemonStatus::Stopped;
            info!(daemon = %name, "Daemon exited cleanly");
            return;
        }

        rt.record.status = DaemonStatus::Failed;
        rt.record.last_error = Some(info.describe());
        warn!(daemon = %name, code = ?info.code, signal = ?info.signal, "Daemon exited abnormally");

        if entry.config.auto_restart && !self.shutdown.is_cancelled() {
            self.schedule_restart(entry, &mut rt);
        }
    }

    /// Cancel every timer, then stop all attached daemons concurrently.
    pub async fn shutdown(self: &Arc<Self>) {
        info!("Shutting down supervisor");
        self.shutdown.cancel();

        let entries = self.registry.entries().await;
        for entry in &entries {
            entry.runtime.lock().await.cancel_timers();
        }

        let mut stops = JoinSet::new();
        for entry in entries {
            let controller = Arc::clone(self);
            stops.spawn(async move {
                let _op = entry.op_lock.lock().await;
                let timeout = entry.config.stop_timeout();
                if let Err(e) = controller.stop_locked(&entry, false, timeout).await {
                    error!(daemon = %entry.name(), error = %e, "Failed to stop daemon during shutdown");
                }
            });
        }

        while let Some(result) = stops.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Stop task panicked during shutdown");
            }
        }
        info!("Supervisor shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restart_options_forward_to_both_halves() {
        let options = RestartOptions::default()
            .with_force(true)
            .with_wait(true);

        assert!(options.stop_options().force);
        assert_eq!(options.stop_options().timeout, None);
        assert!(options.start_options().force);
        assert!(options.start_options().wait);
    }

    #[test]
    fn restart_timeout_reaches_both_halves() {
        let options = RestartOptions::default().with_timeout(Duration::from_secs(2));

        assert_eq!(options.stop_options().timeout, Some(Duration::from_secs(2)));
        assert_eq!(options.start_options().timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn option_builders() {
        let start = StartOptions::default()
            .with_wait(true)
            .with_timeout(Duration::from_secs(3));
        assert!(start.wait);
        assert!(!start.force);
        assert_eq!(start.timeout, Some(Duration::from_secs(3)));

        let stop = StopOptions::default().with_force(true);
        assert!(stop.force);
        assert_eq!(stop.timeout, None);
    }

    #[tokio::test]
    async fn operations_on_unknown_daemon_are_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let controller = Arc::new(Controller::new(temp.path().to_path_buf()));

        assert!(matches!(
            controller.start("ghost", StartOptions::default()).await,
            Err(SupervisorError::NotFound(_))
        ));
        assert!(matches!(
            controller.stop("ghost", StopOptions::default()).await,
            Err(SupervisorError::NotFound(_))
        ));
        assert!(matches!(
            controller.restart("ghost", RestartOptions::default()).await,
            Err(SupervisorError::NotFound(_))
        ));
        assert!(matches!(
            controller.remove("ghost", true).await,
            Err(SupervisorError::NotFound(_))
        ));
    }
}
