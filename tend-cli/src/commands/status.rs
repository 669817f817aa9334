//! Show a daemon's configuration

use anyhow::Result;
use clap::Args;

use crate::config::TendConfig;

/// Arguments for the status command
#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Daemon name
    pub name: String,
}

/// Run the status command
pub async fn run(args: StatusArgs, config: &TendConfig) -> Result<()> {
    let supervisor = super::open_supervisor(config).await?;
    let daemon = supervisor.config(&args.name).await?;
    println!("{}", serde_json::to_string_pretty(&daemon)?);
    Ok(())
}
