//! Shared test utilities for tend-core integration tests

use std::path::Path;
use std::time::Duration;

use tend_core::{DaemonEvent, DaemonRecord, Supervisor, SupervisorConfig};
use tokio::sync::broadcast;
use tokio::time::Instant;

/// Shell loop that ignores SIGTERM and only dies to SIGKILL
#[allow(dead_code)]
pub const IGNORES_TERM: &str = "trap '' TERM; while true; do sleep 1; done";

/// Creates a supervisor rooted at `dir`
#[allow(dead_code)]
pub fn supervisor_in(dir: &Path) -> Supervisor {
    Supervisor::new(SupervisorConfig::default().with_data_dir(dir))
}

/// Polls `name` until `predicate` holds, panicking after `timeout`
#[allow(dead_code)]
pub async fn wait_for<F>(
    supervisor: &Supervisor,
    name: &str,
    timeout: Duration,
    predicate: F,
) -> DaemonRecord
where
    F: Fn(&DaemonRecord) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let record = supervisor.status(name).await.unwrap();
        if predicate(&record) {
            return record;
        }
        assert!(
            Instant::now() < deadline,
            "Timed out waiting for '{name}', last record: {record:?}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Drains events until `window` elapses
#[allow(dead_code)]
pub async fn collect_events(
    events: &mut broadcast::Receiver<DaemonEvent>,
    window: Duration,
) -> Vec<DaemonEvent> {
    let deadline = Instant::now() + window;
    let mut collected = Vec::new();
    while let Ok(Ok(event)) = tokio::time::timeout_at(deadline, events.recv()).await {
        collected.push(event);
    }
    collected
}

/// Sends SIGKILL to a single process, bypassing the supervisor
#[allow(dead_code)]
pub fn kill_externally(pid: u32) {
    // SAFETY: kill(2) has no memory-safety preconditions.
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
    assert_eq!(result, 0, "kill({pid}) failed");
}
