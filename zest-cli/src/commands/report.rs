//! `zest report` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use zest_core::types::TestStatus;
use zest_reporting::backends::console;
use zest_reporting::{Report, ReportStats};

use crate::cli::ReportArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `report` command.
pub fn execute(args: ReportArgs, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %args.path.display(), failed_only = args.failed_only, "rendering report");

    let bound = super::load(&args.path)?;
    let view = ReportView::build(
        &bound,
        bound.path().unwrap_or(&args.path).display().to_string(),
        bound.backend().map(|b| b.name().to_owned()),
        args.failed_only,
    );
    writer.render(&view)
}

/// A rendered report.
///
/// The `text` field holds the console rendering and is skipped in JSON output.
#[derive(Serialize)]
pub struct ReportView {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    pub failed_only: bool,
    pub tests: Vec<TestLine>,
    pub stats: ReportStats,
    #[serde(skip)]
    pub text: String,
}

/// One test of the report, addressed by its dotted path.
#[derive(Serialize)]
pub struct TestLine {
    pub path: String,
    pub status: Option<TestStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ReportView {
    pub fn build(
        report: &Report,
        source: String,
        backend: Option<String>,
        failed_only: bool,
    ) -> Self {
        let tests = report
            .all_tests()
            .into_iter()
            .filter(|(_, test)| !failed_only || test.status == Some(TestStatus::Failed))
            .map(|(path, test)| TestLine {
                path,
                status: test.status,
                details: test.status_details.clone(),
            })
            .collect();
        Self {
            source,
            backend,
            failed_only,
            tests,
            stats: report.stats(),
            text: console::render_report(report, failed_only),
        }
    }
}

impl Render for ReportView {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Report (source: {})", self.source.bold())?;
        writeln!(w)?;
        write!(w, "{}", self.text)
    }
}
