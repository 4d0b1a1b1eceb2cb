//! `zest stats` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use zest_reporting::backends::console;
use zest_reporting::{Report, ReportStats, humanize_duration};

use crate::cli::StatsArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `stats` command.
pub fn execute(args: StatsArgs, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %args.path.display(), "computing report statistics");

    let bound = super::load(&args.path)?;
    let source = bound.path().unwrap_or(&args.path).display().to_string();
    let summary = StatsSummary::build(&bound, source);
    writer.render(&summary)
}

/// Report statistics.
#[derive(Serialize)]
pub struct StatsSummary {
    pub source: String,
    pub successful: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    pub success_percent: u32,
    #[serde(flatten)]
    pub stats: ReportStats,
}

impl StatsSummary {
    pub fn build(report: &Report, source: String) -> Self {
        let stats = report.stats();
        Self {
            source,
            successful: report.is_successful(),
            duration: stats.duration.map(humanize_duration),
            success_percent: stats.success_percent(),
            stats,
        }
    }
}

impl Render for StatsSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Report: {}", self.source.bold())?;
        if self.successful {
            writeln!(w, "  Result: {}", "SUCCESS".green().bold())?;
        } else {
            writeln!(w, "  Result: {}", "FAILURE".red().bold())?;
        }
        writeln!(w)?;
        write!(w, "{}", console::statistics(&self.stats))?;
        writeln!(
            w,
            " * Checks: {} (failed: {})",
            self.stats.checks, self.stats.check_failures
        )?;
        writeln!(
            w,
            " * Logged errors: {}, warnings: {}",
            self.stats.errors, self.stats.warnings
        )?;
        Ok(())
    }
}
