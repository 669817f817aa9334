//! Unregister a daemon

use anyhow::Result;
use clap::Args;

use crate::config::TendConfig;

/// Arguments for the remove command
#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Daemon name
    pub name: String,

    /// Stop the daemon first if it is running
    #[arg(short, long)]
    pub force: bool,
}

/// Run the remove command
pub async fn run(args: RemoveArgs, config: &TendConfig) -> Result<()> {
    let supervisor = super::open_supervisor(config).await?;
    supervisor.remove(&args.name, args.force).await?;
    println!("Removed daemon '{}'", args.name);
    Ok(())
}
