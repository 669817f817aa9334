//! Print captured daemon output

use anyhow::Result;
use clap::Args;
use tend_core::{DEFAULT_LOG_LINES, LogOptions};

use crate::config::TendConfig;

/// Arguments for the logs command
#[derive(Debug, Args)]
pub struct LogsArgs {
    /// Daemon name
    pub name: String,

    /// Show stderr instead of stdout
    #[arg(short, long)]
    pub error: bool,

    /// Number of trailing lines to show
    #[arg(short = 'n', long, default_value_t = DEFAULT_LOG_LINES)]
    pub lines: usize,
}

impl LogsArgs {
    fn options(&self) -> LogOptions {
        LogOptions::default()
            .with_error(self.error)
            .with_lines(self.lines)
    }
}

/// Run the logs command
pub async fn run(args: LogsArgs, config: &TendConfig) -> Result<()> {
    let supervisor = super::open_supervisor(config).await?;
    for line in supervisor.logs(&args.name, args.options()).await? {
        println!("{line}");
    }
    Ok(())
}
