//! Process launcher
//!
//! Spawns one OS process per daemon launch, wires its output to the daemon's
//! log files, maintains the PID file and reports the exit through a callback.
//!
//! Children are placed in their own process group so they survive the
//! supervisor's terminal session and so signals reach their descendants too.

use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::{Notify, watch};
use tracing::{debug, warn};

use crate::daemon::DaemonConfig;
use crate::error::{Result, SupervisorError};

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitInfo {
    /// A clean exit: code 0 and no signal.
    pub fn success(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }

    /// Human-readable description for `lastError`.
    pub fn describe(&self) -> String {
        match (self.code, self.signal) {
            (_, Some(signal)) => format!("Process terminated by signal {signal}"),
            (Some(code), None) => format!("Process exited with code {code}"),
            (None, None) => "Process exited with unknown status".to_string(),
        }
    }
}

impl From<ExitStatus> for ExitInfo {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Handle to a launched process.
///
/// Cheap to clone; the child itself is owned by the exit watcher task.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: u32,
    exit_rx: watch::Receiver<Option<ExitInfo>>,
    kill: Arc<Notify>,
}

impl ProcessHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit information, if the process has already exited.
    pub fn exit_info(&self) -> Option<ExitInfo> {
        *self.exit_rx.borrow()
    }

    /// Ask the process group to terminate (SIGTERM).
    pub fn terminate(&self) {
        #[cfg(unix)]
        self.signal(libc::SIGTERM);
        #[cfg(not(unix))]
        self.kill.notify_one();
    }

    /// Unconditionally kill the process group (SIGKILL).
    pub fn kill(&self) {
        #[cfg(unix)]
        self.signal(libc::SIGKILL);
        self.kill.notify_one();
    }

    /// Signal the group unless the leader was already reaped, since its
    /// pid may since have been reused. Returns whether a signal was sent.
    #[cfg(unix)]
    fn signal(&self, signal: libc::c_int) -> bool {
        if self.exit_info().is_some() {
            debug!(pid = self.pid, signal, "Process already exited, not signalling");
            return false;
        }
        signal_group(self.pid, signal);
        true
    }

    /// Wait until the process has exited.
    pub async fn wait(&self) -> ExitInfo {
        let mut rx = self.exit_rx.clone();
        match rx.wait_for(Option::is_some).await {
            Ok(info) => (*info).unwrap_or(UNKNOWN_EXIT),
            // Watcher is gone without reporting; nothing left to wait for.
            Err(_) => UNKNOWN_EXIT,
        }
    }
}

const UNKNOWN_EXIT: ExitInfo = ExitInfo {
    code: None,
    signal: None,
};

/// Send `signal` to the process group led by `pid`, falling back to the
/// process itself. A process that is already gone is not an error.
#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    let Ok(raw) = libc::pid_t::try_from(pid) else {
        warn!(pid, "PID out of range, not signalling");
        return;
    };

    // SAFETY: kill(2) has no memory-safety preconditions.
    if unsafe { libc::kill(-raw, signal) } == 0 {
        return;
    }
    // SAFETY: as above.
    if unsafe { libc::kill(raw, signal) } != 0 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(pid, signal, error = %err, "Failed to signal process");
        }
    }
}

/// Graceful stop: terminate, then race the exit against `timeout`.
///
/// Returns `true` when the deadline won and the process was killed.
pub async fn terminate_gracefully(handle: &ProcessHandle, timeout: Duration) -> bool {
    handle.terminate();
    match tokio::time::timeout(timeout, handle.wait()).await {
        Ok(info) => {
            debug!(pid = handle.pid(), ?info, "Process exited after terminate");
            false
        }
        Err(_) => {
            handle.kill();
            true
        }
    }
}

/// Launch the daemon described by `config`.
///
/// `on_exit` runs once, after the process has exited and been reaped. Launch
/// failures (missing executable, permissions, unwritable log files) are
/// returned as [`SupervisorError::Spawn`].
pub fn launch<F, Fut>(config: &DaemonConfig, on_exit: F) -> Result<ProcessHandle>
where
    F: FnOnce(ExitInfo) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let spawn_error = |source: io::Error| SupervisorError::Spawn {
        name: config.name.clone(),
        source,
    };

    let stdout = open_append(&config.log_file).map_err(spawn_error)?;
    let stderr = open_append(&config.error_file).map_err(spawn_error)?;

    let mut cmd = Command::new(&config.command);
    cmd.args(&config.args)
        .envs(&config.environment)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));

    if !config.working_directory.as_os_str().is_empty() {
        cmd.current_dir(&config.working_directory);
    }

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = cmd.spawn().map_err(spawn_error)?;
    let pid = child
        .id()
        .ok_or_else(|| spawn_error(io::Error::other("process exited before its PID was read")))?;

    if let Err(e) = write_pid_file(&config.pid_file, pid) {
        warn!(daemon = %config.name, pid, error = %e, "Failed to write PID file");
    }

    let (exit_tx, exit_rx) = watch::channel(None);
    let kill = Arc::new(Notify::new());
    let kill_requested = Arc::clone(&kill);
    let name = config.name.clone();

    tokio::spawn(async move {
        let status = tokio::select! {
            status = child.wait() => status,
            _ = kill_requested.notified() => {
                if let Err(e) = child.start_kill() {
                    debug!(daemon = %name, error = %e, "start_kill failed");
                }
                child.wait().await
            }
        };

        let info = match status {
            Ok(status) => ExitInfo::from(status),
            Err(e) => {
                warn!(daemon = %name, error = %e, "Failed to wait for process");
                UNKNOWN_EXIT
            }
        };

        debug!(daemon = %name, pid, ?info, "Process exited");
        let _ = exit_tx.send(Some(info));
        on_exit(info).await;
    });

    Ok(ProcessHandle { pid, exit_rx, kill })
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Write `pid` as plain decimal text.
pub fn write_pid_file(path: &Path, pid: u32) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, pid.to_string())
}

/// Best-effort PID file removal.
pub fn remove_pid_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => debug!(path = %path.display(), error = %e, "Failed to remove PID file"),
    }
}
