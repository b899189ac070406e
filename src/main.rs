//! Ferry - content-addressed fetch-and-cache service
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use ferry::cli::{Cli, Commands};
use ferry::config::{Config, ConfigManager};
use ferry::error::FerryResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> FerryResult<ExitCode> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load().await?;
    if let Some(store) = cli.store {
        config.store.root = Some(store);
    }

    init_logging(cli.verbose, &config);

    match cli.command {
        Commands::Fetch(args) => ferry::cli::commands::fetch(args, &config).await,
        Commands::Exists(args) => ferry::cli::commands::exists(args, &config).await,
        Commands::List(args) => ferry::cli::commands::list(args, &config).await,
        Commands::Verify(args) => ferry::cli::commands::verify(args, &config).await,
        Commands::Config(args) => {
            ferry::cli::commands::config(args, &config_manager, &config).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("ferry=warn"),
        1 => EnvFilter::new("ferry=info"),
        _ => EnvFilter::new("ferry=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
