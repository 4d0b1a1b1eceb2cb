//! Zest CLI -- inspect, summarise and convert saved test reports.

mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::path::Path;

use anyhow::Result;
use clap::Parser;

use zest_core::config::{GeneralConfig, ZestConfig};
use zest_core::error::{ConfigError, ZestError};

use crate::cli::{Cli, Commands};
use crate::error::CliError;
use crate::output::OutputWriter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let general = logging_config(&cli.config).await;
    logging::init_tracing(&general, cli.log_level.as_deref())?;

    tracing::debug!(config = %cli.config.display(), "zest starting");

    let mut writer = OutputWriter::new(cli.output);
    if cli.no_color {
        writer = writer.with_color(false);
    }
    if let Err(e) = run(cli.command, &cli.config, &writer).await {
        tracing::debug!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }

    Ok(())
}

async fn run(command: Commands, config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    match command {
        Commands::Report(args) => commands::report::execute(args, writer),
        Commands::Stats(args) => commands::stats::execute(args, writer),
        Commands::Convert(args) => commands::convert::execute(args, writer),
        Commands::Config(args) => commands::config::execute(args, config_path, writer).await,
    }
}

/// Logging settings from the config file.
///
/// A missing or broken file falls back to the defaults so `config validate`
/// can still report what is wrong with it.
async fn logging_config(path: &Path) -> GeneralConfig {
    match ZestConfig::load(path).await {
        Ok(config) => config.general,
        Err(ZestError::Config(ConfigError::FileNotFound { .. })) => GeneralConfig::default(),
        Err(e) => {
            eprintln!("warning: ignoring configuration {}: {e}", path.display());
            GeneralConfig::default()
        }
    }
}
