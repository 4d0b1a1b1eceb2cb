//! 콘솔 리포팅 백엔드 (세션 전용)
//!
//! 실행 중에는 스위트 헤더와 테스트마다 `OK`/`KO` 한 줄을 출력하고,
//! 세션이 끝나면 통계 블록을 출력합니다.
//! 저장된 리포트를 같은 형식으로 보여 주는 [`render_report`]도 제공합니다.

use std::fmt::Write as _;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use colored::Colorize;
use tracing::warn;

use zest_core::bus::Listener;
use zest_core::error::ZestError;
use zest_core::event::EventType;
use zest_core::types::{TestInfo, TestStatus};

use crate::backend::{Capabilities, ReportingBackend};
use crate::report::{Report, ReportStats, SharedReport, StepEntry, TestResult, humanize_duration};

/// 스위트 헤더 최대 폭
const HEADER_WIDTH: usize = 80;

/// 출력 대상 생성 함수
pub type OutputFactory = fn() -> Box<dyn Write + Send>;

fn stdout_output() -> Box<dyn Write + Send> {
    Box::new(io::stdout())
}

#[derive(Debug, Clone)]
pub struct ConsoleBackend {
    output: OutputFactory,
}

impl ConsoleBackend {
    pub fn new() -> Self {
        Self {
            output: stdout_output,
        }
    }

    /// 표준 출력 대신 다른 대상으로 씁니다.
    pub fn with_output(output: OutputFactory) -> Self {
        Self { output }
    }
}

impl Default for ConsoleBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportingBackend for ConsoleBackend {
    fn name(&self) -> &str {
        "console"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::SESSION
    }

    fn create_reporting_session(
        &self,
        report: SharedReport,
        _report_dir: &Path,
    ) -> Result<Arc<dyn Listener>, ZestError> {
        Ok(Arc::new(ConsoleSession::new(report, (self.output)())))
    }
}

// ─── ConsoleSession ──────────────────────────────────────────────────

struct ConsoleState {
    out: Box<dyn Write + Send>,
    /// 헤더를 마지막으로 출력한 스위트
    current_suite: Option<String>,
    /// 현재 스위트 안에서의 테스트 번호 (1부터)
    test_index: usize,
}

pub struct ConsoleSession {
    report: SharedReport,
    state: Mutex<ConsoleState>,
}

impl ConsoleSession {
    pub fn new(report: SharedReport, out: Box<dyn Write + Send>) -> Self {
        Self {
            report,
            state: Mutex::new(ConsoleState {
                out,
                current_suite: None,
                test_index: 0,
            }),
        }
    }

    fn print_test_line(&self, test: &TestInfo, marker: String) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.current_suite.as_deref() != Some(test.suite_path.as_str()) {
            let header = suite_header(&test.suite_path, state.current_suite.is_some());
            write_logged(&mut state.out, &header);
            state.current_suite = Some(test.suite_path.clone());
            state.test_index = 0;
        }
        state.test_index += 1;
        let line = format!(" {marker} {:>2} # {}\n", state.test_index, test.path);
        write_logged(&mut state.out, &line);
    }
}

impl std::fmt::Debug for ConsoleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleSession").finish_non_exhaustive()
    }
}

impl Listener for ConsoleSession {
    fn subscriptions(&self) -> Vec<EventType> {
        vec![
            EventType::TestEnd,
            EventType::TestSkipped,
            EventType::TestDisabled,
            EventType::TestSessionEnd,
        ]
    }

    fn on_test_end(&self, _ts: DateTime<Utc>, test: &TestInfo) {
        let status = {
            let report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
            report.test(&test.path).and_then(|t| t.status)
        };
        self.print_test_line(test, status_marker(status));
    }

    fn on_test_skipped(&self, _ts: DateTime<Utc>, test: &TestInfo, _reason: &str) {
        self.print_test_line(test, status_marker(Some(TestStatus::Skipped)));
    }

    fn on_test_disabled(&self, _ts: DateTime<Utc>, test: &TestInfo, _reason: &str) {
        self.print_test_line(test, status_marker(Some(TestStatus::Disabled)));
    }

    fn on_test_session_end(&self, _ts: DateTime<Utc>) {
        let stats = {
            let report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
            report.stats()
        };
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let block = format!("\n{}", statistics(&stats));
        write_logged(&mut state.out, &block);
    }
}

fn write_logged(out: &mut Box<dyn Write + Send>, text: &str) {
    if let Err(e) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        warn!(error = %e, "console output failed");
    }
}

fn status_marker(status: Option<TestStatus>) -> String {
    match status {
        Some(TestStatus::Passed) => "OK".green().bold().to_string(),
        Some(TestStatus::Failed) | None => "KO".red().bold().to_string(),
        Some(TestStatus::Skipped | TestStatus::Disabled) => "--".yellow().bold().to_string(),
    }
}

/// `==== suite.path ====` 형식의 가운데 정렬 헤더
fn suite_header(path: &str, separate: bool) -> String {
    let padding = HEADER_WIDTH.saturating_sub(path.chars().count() + 2);
    let left = padding / 2;
    let right = padding - left;
    format!(
        "{}{} {} {}\n",
        if separate { "\n" } else { "" },
        "=".repeat(left),
        path.bold(),
        "=".repeat(right)
    )
}

/// 세션 종료 시 출력하는 통계 블록
pub fn statistics(stats: &ReportStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} :", "Statistics".bold());
    if let Some(duration) = stats.duration {
        let _ = writeln!(out, " * Duration: {}", humanize_duration(duration));
    }
    let _ = writeln!(out, " * Tests: {}", stats.tests);
    let _ = writeln!(
        out,
        " * Successes: {} ({}%)",
        stats.passed,
        stats.success_percent()
    );
    let _ = writeln!(out, " * Failures: {}", stats.failed);
    if stats.skipped + stats.disabled > 0 {
        let _ = writeln!(
            out,
            " * Skipped: {} (disabled: {})",
            stats.skipped + stats.disabled,
            stats.disabled
        );
    }
    out.push('\n');
    out
}

// ─── Static rendering ────────────────────────────────────────────────

/// 저장된 리포트를 콘솔 형식의 텍스트로 만듭니다.
///
/// `failed_only`이면 실패한 테스트만 표시합니다.
/// 실패한 테스트 아래에는 실패 항목(에러 로그, 실패한 체크)을 들여써서 보여 줍니다.
pub fn render_report(report: &Report, failed_only: bool) -> String {
    let mut out = String::new();
    let mut printed_suites = 0;

    for (path, suite) in report.all_suites() {
        let tests: Vec<&TestResult> = suite
            .tests
            .iter()
            .filter(|t| !failed_only || t.status == Some(TestStatus::Failed))
            .collect();
        if tests.is_empty() {
            continue;
        }
        out.push_str(&suite_header(&path, printed_suites > 0));
        printed_suites += 1;
        for (index, test) in tests.iter().enumerate() {
            let _ = writeln!(
                out,
                " {} {:>2} # {path}.{}",
                status_marker(test.status),
                index + 1,
                test.name
            );
            if test.status == Some(TestStatus::Failed) {
                render_failures(&mut out, test);
            }
            if let (Some(TestStatus::Skipped | TestStatus::Disabled), Some(reason)) =
                (test.status, test.status_details.as_deref())
            {
                let _ = writeln!(out, "      reason: {reason}");
            }
        }
    }

    if printed_suites == 0 && failed_only {
        out.push_str("No failed test.\n");
    }
    out.push('\n');
    out.push_str(&statistics(&report.stats()));
    out
}

fn render_failures(out: &mut String, test: &TestResult) {
    for step in &test.steps {
        for entry in step.entries.iter().filter(|e| e.is_failure()) {
            match entry {
                StepEntry::Check {
                    description,
                    details,
                    ..
                } => {
                    let _ = write!(out, "      [{}] {description}", step.description);
                    if let Some(details) = details {
                        let _ = write!(out, ": {details}");
                    }
                    out.push('\n');
                }
                StepEntry::Log { message, .. } => {
                    let _ = writeln!(out, "      [{}] {message}", step.description);
                }
                StepEntry::Attachment { .. } | StepEntry::Url { .. } => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::report::{Step, SuiteResult};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    fn test_result(name: &str, status: TestStatus, entries: Vec<StepEntry>) -> TestResult {
        TestResult {
            name: name.to_owned(),
            description: name.to_owned(),
            tags: Vec::new(),
            properties: BTreeMap::new(),
            links: Vec::new(),
            status: Some(status),
            status_details: None,
            start_time: ts(0),
            end_time: Some(ts(1)),
            steps: vec![Step {
                entries,
                ..Step::new("Check values", ts(0))
            }],
        }
    }

    fn report() -> Report {
        let failing = StepEntry::Check {
            time: ts(0),
            description: "Expect value to be equal to 2".to_owned(),
            outcome: Some(false),
            details: Some("got 1".to_owned()),
        };
        let suite = SuiteResult {
            name: "math".to_owned(),
            description: "Math".to_owned(),
            tags: Vec::new(),
            properties: BTreeMap::new(),
            links: Vec::new(),
            start_time: Some(ts(0)),
            end_time: Some(ts(3)),
            suite_setup: None,
            suite_teardown: None,
            tests: vec![
                test_result("add", TestStatus::Passed, Vec::new()),
                test_result("sub", TestStatus::Failed, vec![failing]),
            ],
            suites: Vec::new(),
        };
        Report {
            start_time: Some(ts(0)),
            end_time: Some(ts(3)),
            suites: vec![suite],
            ..Report::new()
        }
    }

    fn info(suite: &str, name: &str) -> TestInfo {
        TestInfo {
            path: format!("{suite}.{name}"),
            name: name.to_owned(),
            description: name.to_owned(),
            tags: Vec::new(),
            properties: BTreeMap::new(),
            links: Vec::new(),
            suite_path: suite.to_owned(),
        }
    }

    #[test]
    fn render_lists_tests_and_failures() {
        let text = render_report(&report(), false);
        assert!(text.contains(" 1 # math.add"));
        assert!(text.contains(" 2 # math.sub"));
        assert!(text.contains("[Check values] Expect value to be equal to 2: got 1"));
        assert!(text.contains(" * Tests: 2"));
        assert!(text.contains(" * Successes: 1 (50%)"));
        assert!(text.contains(" * Duration: 3.000s"));
    }

    #[test]
    fn render_failed_only_hides_passed_tests() {
        let text = render_report(&report(), true);
        assert!(!text.contains("math.add"));
        assert!(text.contains(" 1 # math.sub"));
    }

    #[test]
    fn session_prints_header_once_per_suite() {
        let buffer = Buffer::default();
        let shared = report().shared();
        let session = ConsoleSession::new(shared, Box::new(buffer.clone()));

        session.on_test_end(ts(1), &info("math", "add"));
        session.on_test_end(ts(2), &info("math", "sub"));
        session.on_test_skipped(ts(2), &info("other", "later"), "no network");
        session.on_test_session_end(ts(3));

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("math").count(), 3);
        assert!(output.contains(" 2 # math.sub"));
        assert!(output.contains(" 1 # other.later"));
        assert!(output.contains(" * Failures: 1"));
    }

    #[test]
    fn header_is_centered() {
        colored::control::set_override(false);
        let header = suite_header("ab", false);
        assert_eq!(header.trim_end().len(), HEADER_WIDTH);
        assert!(header.starts_with("=================="));
    }
}
