//! Text vs JSON rendering of command results
//!
//! Command handlers build a payload and hand it to [`OutputWriter`]; they never
//! decide on a format themselves. Text output goes through [`Render`] and may be
//! colored, JSON output is the payload's `Serialize` form and never is.

use std::io::{IsTerminal, Write};

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command results in the selected format.
///
/// ```text
/// zest stats report/            -> Render::render_text (colored on a terminal)
/// zest stats report/ -o json    -> serde_json, pretty printed, trailing newline
/// ```
pub struct OutputWriter {
    format: OutputFormat,
    color: bool,
}

impl OutputWriter {
    /// Color is enabled only when stdout is a terminal.
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            color: std::io::stdout().is_terminal(),
        }
    }

    /// Force color on or off for text output.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(payload, &mut handle)?;
        handle.flush()?;
        Ok(())
    }

    /// Render a payload to `w`.
    pub fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => {
                if !self.color {
                    colored::control::set_override(false);
                }
                payload.render_text(w)?;
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Human-readable rendering of a command result.
///
/// Every payload passed to [`OutputWriter`] implements this next to
/// `serde::Serialize`. Fields only needed for text (pre-rendered report
/// bodies, TOML snippets) are `#[serde(skip)]` on the payload.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}
