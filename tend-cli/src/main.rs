use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

use config::ConfigLoader;

#[derive(Parser)]
#[command(name = "tend", about = "Supervise named background processes")]
#[command(version, propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new daemon
    Create(commands::create::CreateArgs),
    /// Unregister a daemon
    Remove(commands::remove::RemoveArgs),
    /// List registered daemons
    List(commands::list::ListArgs),
    /// Show a daemon's configuration
    Status(commands::status::StatusArgs),
    /// Print a daemon's captured output
    Logs(commands::logs::LogsArgs),
    /// Start daemons and supervise them until Ctrl-C
    Run(commands::run::RunArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = ConfigLoader::load()?;

    let filter = if cli.verbose {
        "debug"
    } else {
        config.log_filter.as_str()
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Create(args) => commands::create::run(args, &config).await,
        Commands::Remove(args) => commands::remove::run(args, &config).await,
        Commands::List(args) => commands::list::run(args, &config).await,
        Commands::Status(args) => commands::status::run(args, &config).await,
        Commands::Logs(args) => commands::logs::run(args, &config).await,
        Commands::Run(args) => commands::run::run(args, &config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::parse_from(["tend", "list", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::List(_)));
    }

    #[test]
    fn test_subcommands_parse() {
        let cli = Cli::parse_from(["tend", "logs", "web", "--error"]);
        assert!(matches!(cli.command, Commands::Logs(args) if args.error));

        let cli = Cli::parse_from(["tend", "run", "web"]);
        assert!(matches!(cli.command, Commands::Run(args) if args.names == ["web"]));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
