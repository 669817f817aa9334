//! Foreground supervisor

use anyhow::{Result, bail};
use clap::Args;
use tend_core::{DaemonEvent, StartOptions, Supervisor};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

use crate::config::TendConfig;

/// Arguments for the run command
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Daemons to start (all registered daemons when omitted)
    pub names: Vec<String>,

    /// Wait for each daemon to become ready before starting the next
    #[arg(long)]
    pub wait: bool,
}

/// Run the run command
pub async fn run(args: RunArgs, config: &TendConfig) -> Result<()> {
    let supervisor = super::open_supervisor(config).await?;

    let names = if args.names.is_empty() {
        supervisor
            .list()
            .await
            .into_iter()
            .map(|record| record.name)
            .collect()
    } else {
        args.names.clone()
    };
    if names.is_empty() {
        bail!("No daemons registered; create one with 'tend create'");
    }

    tokio::spawn(print_events(supervisor.subscribe()));

    let started = start_all(&supervisor, &names, args.wait).await;
    if started == 0 {
        supervisor.shutdown().await;
        bail!("None of the requested daemons could be started");
    }

    println!("Supervising {started} daemon(s); press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    println!("Stopping daemons...");
    supervisor.shutdown().await;
    Ok(())
}

/// Start each daemon in turn; failures are reported and skipped.
async fn start_all(supervisor: &Supervisor, names: &[String], wait: bool) -> usize {
    let options = StartOptions::default().with_wait(wait);
    let mut started = 0;
    for name in names {
        match supervisor.start(name, options).await {
            Ok(()) => started += 1,
            Err(e) => error!(daemon = %name, error = %e, "Failed to start daemon"),
        }
    }
    started
}

async fn print_events(mut events: tokio::sync::broadcast::Receiver<DaemonEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => info!("{}", describe(&event)),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Dropped supervisor events"),
            Err(RecvError::Closed) => break,
        }
    }
}

/// One-line description of an event for the console.
fn describe(event: &DaemonEvent) -> String {
    match event {
        DaemonEvent::Started { name, pid } => format!("{name}: started (pid {pid})"),
        DaemonEvent::SpawnFailed { name, error } => format!("{name}: failed to launch: {error}"),
        DaemonEvent::Exited { name, code, signal } => match (code, signal) {
            (_, Some(signal)) => format!("{name}: killed by signal {signal}"),
            (Some(code), None) => format!("{name}: exited with code {code}"),
            (None, None) => format!("{name}: exited"),
        },
        DaemonEvent::RestartScheduled {
            name,
            attempt,
            delay_ms,
        } => format!("{name}: restart #{attempt} in {delay_ms}ms"),
        DaemonEvent::GaveUp { name } => format!("{name}: giving up, restart limit reached"),
        DaemonEvent::HealthChanged { name, status } => format!("{name}: {status}"),
        DaemonEvent::Restarting { name } => format!("{name}: restarting"),
        DaemonEvent::Stopped { name } => format!("{name}: stopped"),
    }
}
