//! Command handlers -- one module per subcommand

pub mod config;
pub mod convert;
pub mod report;
pub mod stats;

use std::path::Path;

use tracing::debug;

use zest_reporting::{BoundReport, available_backends, load_report};

use crate::error::CliError;

/// Load a report file, or the first readable report of a directory.
///
/// Every built-in backend with load capability is tried.
pub(crate) fn load(path: &Path) -> Result<BoundReport, CliError> {
    debug!(path = %path.display(), "loading report");
    let report = load_report(path, &available_backends())?;
    debug!(
        path = %report.path().unwrap_or(path).display(),
        tests = report.test_count(),
        "report loaded"
    );
    Ok(report)
}
