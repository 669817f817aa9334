//! Health monitor tests against real processes

#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{collect_events, supervisor_in, wait_for};
use tend_core::{
    DaemonConfig, DaemonEvent, DaemonStatus, HealthCheckConfig, HealthStatus, StartOptions,
    StopOptions,
};
use tempfile::tempdir;

fn probed(name: &str, command: &str, auto_restart: bool) -> DaemonConfig {
    DaemonConfig::new(name, "sleep")
        .with_args(["1000"])
        .with_auto_restart(auto_restart)
        .with_health_check(
            HealthCheckConfig::command(command)
                .with_interval(300)
                .with_timeout(500),
        )
}

fn count_restarts(events: &[DaemonEvent]) -> usize {
    events
        .iter()
        .filter(|event| matches!(event, DaemonEvent::Restarting { .. }))
        .count()
}

#[tokio::test]
async fn failing_probe_triggers_exactly_one_restart_cycle() {
    let temp = tempdir().unwrap();
    let supervisor = supervisor_in(temp.path());
    supervisor.create(probed("web", "exit 1", true)).await.unwrap();
    let mut events = supervisor.subscribe();

    supervisor.start("web", StartOptions::default()).await.unwrap();
    let first_pid = supervisor.status("web").await.unwrap().pid.unwrap();

    // One interval + timeout window, plus scheduling slack
    let window = collect_events(&mut events, Duration::from_millis(1100)).await;
    assert_eq!(count_restarts(&window), 1, "events: {window:?}");

    let record = wait_for(&supervisor, "web", Duration::from_secs(5), |r| {
        r.status == DaemonStatus::Running && r.pid.is_some() && r.pid != Some(first_pid)
    })
    .await;
    // Health restarts do not consume the abnormal-exit budget
    assert_eq!(record.restart_count, 0);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn default_retries_restart_within_one_interval_and_timeout() {
    let temp = tempdir().unwrap();
    let supervisor = supervisor_in(temp.path());
    let health_check = HealthCheckConfig::command("exit 1")
        .with_interval(1000)
        .with_timeout(500);
    assert_eq!(health_check.retries, 3);
    supervisor
        .create(
            DaemonConfig::new("web", "sleep")
                .with_args(["1000"])
                .with_auto_restart(true)
                .with_health_check(health_check),
        )
        .await
        .unwrap();
    let mut events = supervisor.subscribe();

    supervisor.start("web", StartOptions::default()).await.unwrap();

    // interval + timeout, plus scheduling slack
    let window = collect_events(&mut events, Duration::from_millis(1800)).await;
    assert_eq!(count_restarts(&window), 1, "events: {window:?}");

    supervisor.shutdown().await;
}

#[tokio::test]
async fn failing_probe_without_auto_restart_only_marks_unhealthy() {
    let temp = tempdir().unwrap();
    let supervisor = supervisor_in(temp.path());
    supervisor.create(probed("web", "exit 1", false)).await.unwrap();
    let mut events = supervisor.subscribe();

    supervisor.start("web", StartOptions::default()).await.unwrap();
    let pid = supervisor.status("web").await.unwrap().pid;

    let window = collect_events(&mut events, Duration::from_millis(1000)).await;
    assert_eq!(count_restarts(&window), 0);

    let record = supervisor.status("web").await.unwrap();
    assert_eq!(record.status, DaemonStatus::Running);
    assert_eq!(record.health_status, Some(HealthStatus::Unhealthy));
    assert_eq!(record.pid, pid);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn passing_probe_marks_healthy() {
    let temp = tempdir().unwrap();
    let supervisor = supervisor_in(temp.path());
    supervisor.create(probed("web", "exit 0", true)).await.unwrap();

    supervisor.start("web", StartOptions::default()).await.unwrap();
    assert_eq!(
        supervisor.status("web").await.unwrap().health_status,
        Some(HealthStatus::Unknown)
    );

    wait_for(&supervisor, "web", Duration::from_secs(3), |r| {
        r.health_status == Some(HealthStatus::Healthy)
    })
    .await;

    supervisor.shutdown().await;
}

#[tokio::test]
async fn disabled_health_check_is_not_armed() {
    let temp = tempdir().unwrap();
    let supervisor = supervisor_in(temp.path());
    let mut health_check = HealthCheckConfig::command("exit 1").with_interval(100);
    health_check.enabled = false;
    supervisor
        .create(
            DaemonConfig::new("web", "sleep")
                .with_args(["1000"])
                .with_auto_restart(true)
                .with_health_check(health_check),
        )
        .await
        .unwrap();

    supervisor.start("web", StartOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    let record = supervisor.status("web").await.unwrap();
    assert_eq!(record.health_status, None);
    assert_eq!(record.status, DaemonStatus::Running);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn stop_during_health_restart_prevents_new_start() {
    let temp = tempdir().unwrap();
    let supervisor = supervisor_in(temp.path());
    supervisor.create(probed("web", "exit 1", true)).await.unwrap();
    let mut events = supervisor.subscribe();

    supervisor.start("web", StartOptions::default()).await.unwrap();
    loop {
        match events.recv().await.unwrap() {
            DaemonEvent::Restarting { .. } => break,
            _ => continue,
        }
    }

    supervisor.stop("web", StopOptions::default()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;

    let record = supervisor.status("web").await.unwrap();
    assert_eq!(record.status, DaemonStatus::Stopped);
    assert!(record.pid.is_none());
}

#[tokio::test]
async fn stop_cancels_health_monitor() {
    let temp = tempdir().unwrap();
    let supervisor = supervisor_in(temp.path());
    supervisor.create(probed("web", "exit 0", false)).await.unwrap();
    supervisor.start("web", StartOptions::default()).await.unwrap();
    wait_for(&supervisor, "web", Duration::from_secs(3), |r| {
        r.health_status == Some(HealthStatus::Healthy)
    })
    .await;
    let mut events = supervisor.subscribe();

    supervisor.stop("web", StopOptions::default()).await.unwrap();
    let window = collect_events(&mut events, Duration::from_millis(700)).await;

    assert!(
        !window
            .iter()
            .any(|event| matches!(event, DaemonEvent::HealthChanged { .. })),
        "events: {window:?}"
    );
    assert_eq!(supervisor.status("web").await.unwrap().health_status, None);
}
