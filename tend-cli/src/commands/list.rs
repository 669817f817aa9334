//! List registered daemons

use anyhow::Result;
use clap::Args;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use tend_core::DaemonConfig;

use crate::config::TendConfig;

/// Arguments for the list command
#[derive(Debug, Args)]
pub struct ListArgs {
    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Run the list command
pub async fn run(args: ListArgs, config: &TendConfig) -> Result<()> {
    let supervisor = super::open_supervisor(config).await?;

    let mut configs = Vec::new();
    for record in supervisor.list().await {
        configs.push(supervisor.config(&record.name).await?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&configs)?);
        return Ok(());
    }

    if configs.is_empty() {
        println!("No daemons registered.");
        println!();
        println!("Create one with: tend create <name> -- <command> [args...]");
        return Ok(());
    }

    println!("{}", build_table(&configs));
    Ok(())
}

fn build_table(configs: &[DaemonConfig]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Name").fg(Color::Cyan),
        Cell::new("Command").fg(Color::Cyan),
        Cell::new("Auto restart").fg(Color::Cyan),
        Cell::new("Health").fg(Color::Cyan),
    ]);

    for config in configs {
        table.add_row(vec![
            Cell::new(&config.name),
            Cell::new(command_line(config)),
            Cell::new(restart_summary(config)),
            Cell::new(health_summary(config)),
        ]);
    }
    table
}

fn command_line(config: &DaemonConfig) -> String {
    std::iter::once(config.command.as_str())
        .chain(config.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

fn restart_summary(config: &DaemonConfig) -> String {
    if config.auto_restart {
        format!("yes (max {}, {}ms)", config.max_restarts, config.restart_delay)
    } else {
        "no".to_string()
    }
}

fn health_summary(config: &DaemonConfig) -> String {
    match config.active_health_check() {
        Some(check) => match (&check.command, &check.http) {
            (Some(command), _) => format!("cmd: {command}"),
            (None, Some(http)) => format!("GET {}", http.url),
            (None, None) => "-".to_string(),
        },
        None => "-".to_string(),
    }
}
