//! CLI-specific error types and exit code mapping

use zest_core::error::{ReportError, ZestError};

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed.
    #[error("{0}")]
    Command(String),

    /// The given path holds no report any backend can read.
    #[error("report error: {0}")]
    Report(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (file read, stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from zest-core.
    #[error("{0}")]
    Core(ZestError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                     |
    /// |------|-----------------------------|
    /// | 0    | Success                     |
    /// | 1    | General / command error     |
    /// | 2    | Configuration error         |
    /// | 3    | Report missing or unreadable |
    /// | 10   | IO error                    |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Report(_) => 3,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}

impl From<ZestError> for CliError {
    fn from(e: ZestError) -> Self {
        match e {
            ZestError::Config(inner) => Self::Config(inner.to_string()),
            ZestError::Report(
                inner @ (ReportError::InvalidReport { .. }
                | ReportError::NoSuitableBackend { .. }
                | ReportError::NoReportInDirectory { .. }),
            ) => Self::Report(inner.to_string()),
            ZestError::Io(io) => Self::Io(io),
            other => Self::Core(other),
        }
    }
}
