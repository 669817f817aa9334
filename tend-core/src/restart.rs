//! Restart policy for abnormally exiting daemons

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::{BoxFuture, Controller};
use crate::daemon::{DaemonConfig, DaemonStatus};
use crate::error::MAX_RESTARTS_EXCEEDED;
use crate::events::DaemonEvent;
use crate::registry::{DaemonEntry, Runtime};
use crate::timer::TimerHandle;

/// Fixed-delay restart policy with an attempt cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    max_restarts: u32,
    delay: Duration,
}

/// What to do about an abnormal exit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restart after `delay`; `attempt` is the new restart count.
    Restart { attempt: u32, delay: Duration },
    /// The budget is spent; leave the daemon failed.
    GiveUp,
}

impl RestartPolicy {
    pub fn new(max_restarts: u32, delay: Duration) -> Self {
        Self {
            max_restarts,
            delay,
        }
    }

    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new(config.max_restarts, config.restart_delay())
    }

    /// Count one abnormal exit against `restart_count` and decide.
    ///
    /// The counter is never reset here.
    pub fn on_abnormal_exit(&self, restart_count: &mut u32) -> RestartDecision {
        *restart_count = restart_count.saturating_add(1);
        if *restart_count > self.max_restarts {
            RestartDecision::GiveUp
        } else {
            RestartDecision::Restart {
                attempt: *restart_count,
                delay: self.delay,
            }
        }
    }
}

impl Controller {
    /// Apply the restart policy after an abnormal exit. Caller holds both
    /// locks of `entry`.
    pub(crate) fn schedule_restart(self: &Arc<Self>, entry: &Arc<DaemonEntry>, rt: &mut Runtime) {
        let name = entry.name();
        let policy = RestartPolicy::from_config(&entry.config);

        match policy.on_abnormal_exit(&mut rt.record.restart_count) {
            RestartDecision::GiveUp => {
                rt.record.status = DaemonStatus::Failed;
                rt.record.last_error = Some(MAX_RESTARTS_EXCEEDED.to_string());
                warn!(
                    daemon = %name,
                    restarts = rt.record.restart_count,
                    "Giving up on daemon, {}",
                    MAX_RESTARTS_EXCEEDED.to_lowercase()
                );
                self.emit(DaemonEvent::GaveUp {
                    name: name.to_string(),
                });
            }
            RestartDecision::Restart { attempt, delay } => {
                let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                info!(daemon = %name, attempt, delay_ms, "Scheduling restart");
                self.emit(DaemonEvent::RestartScheduled {
                    name: name.to_string(),
                    attempt,
                    delay_ms,
                });
                self.arm_delayed_start(entry, rt, delay);
            }
        }
    }

    /// Arm the one-shot restart timer of `entry`.
    pub(crate) fn arm_delayed_start(
        self: &Arc<Self>,
        entry: &Arc<DaemonEntry>,
        rt: &mut Runtime,
        delay: Duration,
    ) {
        if let Some(previous) = rt.restart_timer.take() {
            previous.cancel();
        }

        let controller = Arc::clone(self);
        let entry = Arc::clone(entry);
        rt.restart_timer = Some(TimerHandle::spawn(&self.shutdown, move |token| async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            controller.fire_restart(entry, token).await;
        }));
    }

    fn fire_restart(self: Arc<Self>, entry: Arc<DaemonEntry>, token: CancellationToken) -> BoxFuture {
        Box::pin(async move {
            let name = entry.name();
            let _op = entry.op_lock.lock().await;

            {
                let mut rt = entry.runtime.lock().await;
                // Cancelled while waiting for the lock: a stop got there first.
                if token.is_cancelled() {
                    return;
                }
                if let Some(timer) = rt.restart_timer.take() {
                    timer.release();
                }
                if rt.process.is_some()
                    || !matches!(rt.record.status, DaemonStatus::Failed | DaemonStatus::Stopped)
                {
                    debug!(daemon = %name, status = %rt.record.status, "Skipping restart");
                    return;
                }
            }

            info!(daemon = %name, "Restarting daemon");
            if let Err(e) = self.start_locked(&entry, false).await {
                warn!(daemon = %name, error = %e, "Automatic restart failed");
            }
        })
    }
}
