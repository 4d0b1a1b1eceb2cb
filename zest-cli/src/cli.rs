//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Zest -- inspect and convert saved test reports.
///
/// Use `zest <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "zest", version, about, long_about = None)]
pub struct Cli {
    /// Path to the zest.toml configuration file.
    #[arg(short, long, default_value = "zest.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Disable colored text output.
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a saved report.
    Report(ReportArgs),

    /// Summarise a saved report.
    Stats(StatsArgs),

    /// Convert a saved report to another format.
    Convert(ConvertArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- report ----

/// Render a saved report the way the console backend does.
#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Report file, or a report directory (default: current directory).
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Only show failed tests.
    #[arg(short, long)]
    pub failed_only: bool,
}

// ---- stats ----

/// Display test and check counts of a saved report.
#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Report file, or a report directory (default: current directory).
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

// ---- convert ----

/// Load a report with any backend able to read it and save it with another.
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Source report file or directory.
    pub source: PathBuf,

    /// Destination file.
    pub destination: PathBuf,

    /// Destination format.
    #[arg(long, default_value = "json")]
    pub to: ReportFormat,
}

/// Report formats that can be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Json,
    Xml,
    Junit,
}

// ---- config ----

/// Manage zest configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, run, reporting).
        #[arg(long)]
        section: Option<String>,
    },
}
