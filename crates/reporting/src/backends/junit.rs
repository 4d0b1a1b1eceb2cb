//! JUnit XML 리포트 백엔드 (세션, 저장)
//!
//! 스위트마다 하나의 `<testsuite>`를 만들고, 직접 속한 테스트를 `<testcase>`로 씁니다.
//! 실패한 테스트의 첫 실패 항목(에러 로그 또는 실패한 체크)이 `<failure>` 메시지가 됩니다.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use chrono::TimeDelta;
use tracing::debug;

use zest_core::bus::Listener;
use zest_core::error::{ReportError, ZestError};
use zest_core::types::TestStatus;

use crate::backend::{Capabilities, FileReportSession, ReportingBackend, SaveMode};
use crate::report::{Report, SharedReport, StepEntry, SuiteResult, TestResult};

pub const DEFAULT_FILENAME: &str = "report-junit.xml";

#[derive(Debug, Clone)]
pub struct JunitBackend {
    filename: String,
    save_mode: SaveMode,
}

impl JunitBackend {
    pub fn new(save_mode: SaveMode) -> Self {
        Self {
            filename: DEFAULT_FILENAME.to_owned(),
            save_mode,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = filename.into();
        self
    }
}

impl Default for JunitBackend {
    fn default() -> Self {
        Self::new(SaveMode::default())
    }
}

impl ReportingBackend for JunitBackend {
    fn name(&self) -> &str {
        "junit"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SESSION | Capabilities::SAVE
    }

    fn create_reporting_session(
        &self,
        report: SharedReport,
        report_dir: &Path,
    ) -> Result<Arc<dyn Listener>, ZestError> {
        Ok(Arc::new(FileReportSession::new(
            report_dir.join(&self.filename),
            report,
            save,
            self.save_mode,
        )))
    }

    fn save_report(&self, path: &Path, report: &Report) -> Result<(), ZestError> {
        save(path, report)
    }
}

pub fn save(path: &Path, report: &Report) -> Result<(), ZestError> {
    let xml = render(report);
    std::fs::write(path, &xml).map_err(|e| ReportError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    debug!(path = %path.display(), bytes = xml.len(), "junit report written");
    Ok(())
}

/// 리포트를 JUnit XML 문서로 만듭니다.
pub fn render(report: &Report) -> String {
    let stats = report.stats();
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        xml,
        "<testsuites name=\"zest\" tests=\"{}\" failures=\"{}\" skipped=\"{}\" time=\"{}\">",
        stats.tests,
        stats.failed,
        stats.skipped + stats.disabled,
        seconds(stats.duration),
    );
    for (path, suite) in report.all_suites() {
        if suite.tests.is_empty() {
            continue;
        }
        render_suite(&mut xml, &path, suite);
    }
    xml.push_str("</testsuites>\n");
    xml
}

fn render_suite(xml: &mut String, path: &str, suite: &SuiteResult) {
    let count = |status: TestStatus| suite.tests.iter().filter(|t| t.status == Some(status)).count();
    let duration = match (suite.start_time, suite.end_time) {
        (Some(start), Some(end)) => Some(end - start),
        _ => None,
    };
    let _ = write!(
        xml,
        "  <testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" skipped=\"{}\" time=\"{}\"",
        escape(path),
        suite.tests.len(),
        count(TestStatus::Failed),
        count(TestStatus::Skipped) + count(TestStatus::Disabled),
        seconds(duration),
    );
    if let Some(start) = suite.start_time {
        let _ = write!(xml, " timestamp=\"{}\"", start.format("%Y-%m-%dT%H:%M:%S"));
    }
    xml.push_str(">\n");

    if !suite.properties.is_empty() {
        xml.push_str("    <properties>\n");
        for (name, value) in &suite.properties {
            let _ = writeln!(
                xml,
                "      <property name=\"{}\" value=\"{}\"/>",
                escape(name),
                escape(value)
            );
        }
        xml.push_str("    </properties>\n");
    }

    for test in &suite.tests {
        render_test(xml, path, test);
    }
    xml.push_str("  </testsuite>\n");
}

fn render_test(xml: &mut String, classname: &str, test: &TestResult) {
    let _ = write!(
        xml,
        "    <testcase name=\"{}\" classname=\"{}\" time=\"{}\"",
        escape(&test.name),
        escape(classname),
        seconds(test.duration()),
    );
    match test.status {
        Some(TestStatus::Failed) => {
            let (message, details) = first_failure(test);
            let _ = writeln!(
                xml,
                ">\n      <failure message=\"{}\">{}</failure>\n    </testcase>",
                escape(&message),
                escape(&details)
            );
        }
        Some(TestStatus::Skipped | TestStatus::Disabled) => {
            let reason = test.status_details.as_deref().unwrap_or_default();
            let _ = writeln!(
                xml,
                ">\n      <skipped message=\"{}\"/>\n    </testcase>",
                escape(reason)
            );
        }
        Some(TestStatus::Passed) | None => xml.push_str("/>\n"),
    }
}

fn first_failure(test: &TestResult) -> (String, String) {
    test.steps
        .iter()
        .flat_map(|step| step.entries.iter().map(move |e| (step, e)))
        .find(|(_, entry)| entry.is_failure())
        .map(|(step, entry)| match entry {
            StepEntry::Check {
                description,
                details,
                ..
            } => (
                description.clone(),
                format!(
                    "{}: {}",
                    step.description,
                    details.as_deref().unwrap_or(description)
                ),
            ),
            StepEntry::Log { message, .. } => {
                (message.clone(), format!("{}: {message}", step.description))
            }
            StepEntry::Attachment { description, .. } | StepEntry::Url { description, .. } => {
                (description.clone(), String::new())
            }
        })
        .unwrap_or_else(|| ("test failed".to_owned(), String::new()))
}

fn seconds(duration: Option<TimeDelta>) -> String {
    let millis = duration.map_or(0, |d| d.num_milliseconds().max(0));
    format!("{:.3}", millis as f64 / 1000.0)
}

/// XML 속성/텍스트용 이스케이프
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c if c.is_control() && !matches!(c, '\n' | '\r' | '\t') => {}
            c => escaped.push(c),
        }
    }
    escaped
}
