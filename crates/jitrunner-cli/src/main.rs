//! jitrunner CLI tool.

use anyhow::Context;
use clap::{Parser, Subcommand};
use jitrunner_config::SystemConfig;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "jitrunner")]
#[command(about = "Ephemeral GitHub Actions runners on CodeBuild", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./jitrunner.kdl when present)
    #[arg(long, global = true, env = "JITRUNNER_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "JITRUNNER_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume queued webhook events and start runner builds
    Worker,
    /// Run the webhook intake server
    Serve {
        /// Use an in-process queue and run a worker alongside the server
        #[arg(long)]
        memory_queue: bool,
    },
    /// Dispatch one webhook event read from a file
    Dispatch {
        /// Path to the event JSON
        file: PathBuf,
    },
    /// Print the runner bootstrap buildspec
    Buildspec,
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    jitrunner_api::telemetry::init_tracing(cli.log_json);

    if let Commands::Validate { path } = &cli.command {
        return commands::validate(path.as_deref().or(cli.config.as_deref()));
    }

    let config = SystemConfig::load(cli.config.as_deref()).context("Failed to load config")?;

    match cli.command {
        Commands::Worker => commands::worker::run(&config).await?,
        Commands::Serve { memory_queue } => commands::serve::run(&config, memory_queue).await?,
        Commands::Dispatch { file } => commands::dispatch(&config, &file).await?,
        Commands::Buildspec => commands::buildspec(&config),
        Commands::Validate { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_dispatch() {
        let cli = Cli::try_parse_from(["jitrunner", "--config", "prod.kdl", "dispatch", "event.json"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("prod.kdl")));
        assert!(matches!(cli.command, Commands::Dispatch { file } if file == PathBuf::from("event.json")));
    }

    #[test]
    fn test_parse_serve_memory_queue() {
        let cli = Cli::try_parse_from(["jitrunner", "serve", "--memory-queue"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { memory_queue: true }));
    }
}
