//! `zest convert` command handler

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use zest_reporting::{JsonBackend, JunitBackend, ReportingBackend, XmlBackend, save_report};

use crate::cli::{ConvertArgs, ReportFormat};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `convert` command.
///
/// The source is loaded with whichever backend can read it, then saved
/// with the backend matching `--to`.
pub fn execute(args: ConvertArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let result = convert(&args)?;
    writer.render(&result)
}

/// Load, convert and save, without rendering.
pub fn convert(args: &ConvertArgs) -> Result<ConversionResult, CliError> {
    let bound = super::load(&args.source)?;
    let target = backend_for(args.to);
    info!(
        source = %args.source.display(),
        destination = %args.destination.display(),
        format = target.name(),
        "converting report"
    );

    if let Some(parent) = args
        .destination
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)?;
    }
    save_report(&args.destination, &bound, target.as_ref())?;

    Ok(ConversionResult {
        source: bound.path().unwrap_or(&args.source).display().to_string(),
        source_format: bound.backend().map(|b| b.name().to_owned()),
        destination: args.destination.display().to_string(),
        format: target.name().to_owned(),
        tests: bound.test_count(),
    })
}

fn backend_for(format: ReportFormat) -> Arc<dyn ReportingBackend> {
    match format {
        ReportFormat::Json => Arc::new(JsonBackend::default()),
        ReportFormat::Xml => Arc::new(XmlBackend::default()),
        ReportFormat::Junit => Arc::new(JunitBackend::default()),
    }
}

/// Outcome of a conversion.
#[derive(Debug, Serialize)]
pub struct ConversionResult {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_format: Option<String>,
    pub destination: String,
    pub format: String,
    pub tests: usize,
}

impl Render for ConversionResult {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} {} -> {} ({}, {} tests)",
            "Converted".green().bold(),
            self.source,
            self.destination.bold(),
            self.format,
            self.tests
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zest_reporting::Report;
    use zest_reporting::backends::json;

    fn args(source: &std::path::Path, destination: &std::path::Path, to: ReportFormat) -> ConvertArgs {
        ConvertArgs {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            to,
        }
    }

    #[test]
    fn test_convert_json_to_junit() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let source = dir.path().join("report.json");
        json::save(&source, &Report::new()).expect("should save source report");
        let destination = dir.path().join("out").join("junit.xml");

        let result = convert(&args(&source, &destination, ReportFormat::Junit))
            .expect("conversion should succeed");

        assert_eq!(result.format, "junit");
        assert_eq!(result.source_format.as_deref(), Some("json"));
        let xml = std::fs::read_to_string(&destination).expect("junit file should exist");
        assert!(xml.contains("<testsuites"));
    }

    #[test]
    fn test_convert_json_to_xml_and_back() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let source = dir.path().join("report.json");
        let report = Report {
            info: vec![("env".to_owned(), "ci".to_owned())],
            ..Report::new()
        };
        json::save(&source, &report).expect("should save source report");
        let xml_path = dir.path().join("report.xml");

        let result = convert(&args(&source, &xml_path, ReportFormat::Xml))
            .expect("conversion to xml should succeed");
        assert_eq!(result.format, "xml");

        let back = dir.path().join("back.json");
        let result = convert(&args(&xml_path, &back, ReportFormat::Json))
            .expect("xml report should load");
        assert_eq!(result.source_format.as_deref(), Some("xml"));
        assert_eq!(json::load(&back).expect("copy should load"), report);
    }

    #[test]
    fn test_convert_directory_source() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        json::save(&dir.path().join("report.json"), &Report::new())
            .expect("should save source report");
        let destination = dir.path().join("copy.json");

        let result = convert(&args(dir.path(), &destination, ReportFormat::Json))
            .expect("conversion should succeed");

        assert!(result.source.ends_with("report.json"));
        let copy = json::load(&destination).expect("copy should load");
        assert_eq!(copy, Report::new());
    }

    #[test]
    fn test_convert_missing_source_is_a_report_error() {
        let dir = tempfile::tempdir().expect("should create temp dir");
        let err = convert(&args(
            dir.path(),
            &dir.path().join("out.json"),
            ReportFormat::Json,
        ))
        .expect_err("an empty directory holds no report");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_conversion_result_render_text() {
        let result = ConversionResult {
            source: "report.json".to_owned(),
            source_format: Some("json".to_owned()),
            destination: "junit.xml".to_owned(),
            format: "junit".to_owned(),
            tests: 7,
        };
        let mut buffer = Vec::new();
        result.render_text(&mut buffer).expect("text rendering should succeed");
        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("junit.xml"));
        assert!(output.contains("7 tests"));
    }
}
