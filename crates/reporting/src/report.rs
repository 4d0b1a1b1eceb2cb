//! 리포트 모델: 실행 결과 트리
//!
//! ```text
//! Report
//!  ├── test_session_setup?   (HookResult)
//!  ├── suites: [SuiteResult]
//!  │     ├── suite_setup?    (HookResult)
//!  │     ├── tests: [TestResult] ── steps: [Step] ── entries: [StepEntry]
//!  │     ├── suites: [SuiteResult]
//!  │     └── suite_teardown?
//!  └── test_session_teardown?
//! ```
//!
//! 경로는 스위트 이름을 점으로 연결한 문자열이며 저장되지 않고 트리에서 계산됩니다.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use zest_core::types::{Link, LogLevel, TestStatus, join_path};

/// 리포트 라이터와 리포팅 세션이 공유하는 리포트
pub type SharedReport = Arc<Mutex<Report>>;

// ─── StepEntry / Step ────────────────────────────────────────────────

/// 스텝 안의 항목
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEntry {
    Log {
        time: DateTime<Utc>,
        level: LogLevel,
        message: String,
    },
    Check {
        time: DateTime<Utc>,
        description: String,
        outcome: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Attachment {
        time: DateTime<Utc>,
        description: String,
        /// 리포트 디렉토리 기준 상대 경로
        path: String,
        as_image: bool,
    },
    Url {
        time: DateTime<Utc>,
        description: String,
        url: String,
    },
}

impl StepEntry {
    /// 에러 로그이거나 실패한 체크인지 여부
    pub fn is_failure(&self) -> bool {
        match self {
            Self::Log { level, .. } => *level == LogLevel::Error,
            Self::Check { outcome, .. } => *outcome == Some(false),
            Self::Attachment { .. } | Self::Url { .. } => false,
        }
    }

    pub fn time(&self) -> DateTime<Utc> {
        match self {
            Self::Log { time, .. }
            | Self::Check { time, .. }
            | Self::Attachment { time, .. }
            | Self::Url { time, .. } => *time,
        }
    }
}

/// 이름이 있는 항목 묶음
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub description: String,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub entries: Vec<StepEntry>,
}

impl Step {
    pub fn new(description: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            description: description.into(),
            start_time,
            end_time: None,
            entries: Vec::new(),
        }
    }

    pub fn has_failure(&self) -> bool {
        self.entries.iter().any(StepEntry::is_failure)
    }
}

fn steps_have_failure(steps: &[Step]) -> bool {
    steps.iter().any(Step::has_failure)
}

// ─── HookResult ──────────────────────────────────────────────────────

/// 스위트/세션 setup·teardown 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookResult {
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// 종료 전이면 `None`
    #[serde(default)]
    pub outcome: Option<bool>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl HookResult {
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time: None,
            outcome: None,
            steps: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn has_failure(&self) -> bool {
        steps_have_failure(&self.steps)
    }
}

// ─── TestResult ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub links: Vec<Link>,
    /// 실행 중이면 `None`
    #[serde(default)]
    pub status: Option<TestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl TestResult {
    pub fn has_failure(&self) -> bool {
        steps_have_failure(&self.steps)
    }

    pub fn duration(&self) -> Option<TimeDelta> {
        self.end_time.map(|end| end - self.start_time)
    }
}

// ─── SuiteResult ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub suite_setup: Option<HookResult>,
    #[serde(default)]
    pub suite_teardown: Option<HookResult>,
    #[serde(default)]
    pub tests: Vec<TestResult>,
    #[serde(default)]
    pub suites: Vec<SuiteResult>,
}

impl SuiteResult {
    fn find_test(&self, name: &str) -> Option<&TestResult> {
        self.tests.iter().rev().find(|t| t.name == name)
    }

    fn find_test_mut(&mut self, name: &str) -> Option<&mut TestResult> {
        self.tests.iter_mut().rev().find(|t| t.name == name)
    }

    fn collect_suites<'a>(&'a self, parent: Option<&str>, out: &mut Vec<(String, &'a SuiteResult)>) {
        let path = join_path(parent, &self.name);
        out.push((path.clone(), self));
        for sub in &self.suites {
            sub.collect_suites(Some(&path), out);
        }
    }
}

// ─── Report ──────────────────────────────────────────────────────────

/// 실행 결과 트리의 루트
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub generation_time: Option<DateTime<Utc>>,
    /// 이름/값 정보 (추가 순서 유지)
    #[serde(default)]
    pub info: Vec<(String, String)>,
    #[serde(default)]
    pub test_session_setup: Option<HookResult>,
    #[serde(default)]
    pub test_session_teardown: Option<HookResult>,
    #[serde(default)]
    pub suites: Vec<SuiteResult>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedReport {
        Arc::new(Mutex::new(self))
    }

    /// 점으로 구분된 경로로 스위트를 찾습니다.
    pub fn suite(&self, path: &str) -> Option<&SuiteResult> {
        let mut names = path.split('.');
        let first = names.next()?;
        let mut suite = self.suites.iter().rev().find(|s| s.name == first)?;
        for name in names {
            suite = suite.suites.iter().rev().find(|s| s.name == name)?;
        }
        Some(suite)
    }

    pub fn suite_mut(&mut self, path: &str) -> Option<&mut SuiteResult> {
        let mut names = path.split('.');
        let first = names.next()?;
        let mut suite = self.suites.iter_mut().rev().find(|s| s.name == first)?;
        for name in names {
            suite = suite.suites.iter_mut().rev().find(|s| s.name == name)?;
        }
        Some(suite)
    }

    /// 점으로 구분된 경로로 테스트를 찾습니다.
    pub fn test(&self, path: &str) -> Option<&TestResult> {
        let (suite_path, name) = path.rsplit_once('.')?;
        self.suite(suite_path)?.find_test(name)
    }

    pub fn test_mut(&mut self, path: &str) -> Option<&mut TestResult> {
        let (suite_path, name) = path.rsplit_once('.')?;
        self.suite_mut(suite_path)?.find_test_mut(name)
    }

    /// 모든 스위트를 깊이 우선 순서로 `(경로, 스위트)`로 나열합니다.
    pub fn all_suites(&self) -> Vec<(String, &SuiteResult)> {
        let mut out = Vec::new();
        for suite in &self.suites {
            suite.collect_suites(None, &mut out);
        }
        out
    }

    /// 모든 테스트를 `(경로, 테스트)`로 나열합니다.
    pub fn all_tests(&self) -> Vec<(String, &TestResult)> {
        self.all_suites()
            .into_iter()
            .flat_map(|(path, suite)| {
                suite
                    .tests
                    .iter()
                    .map(move |t| (join_path(Some(&path), &t.name), t))
            })
            .collect()
    }

    /// 모든 훅 결과 (세션 → 스위트 순)
    pub fn all_hooks(&self) -> Vec<&HookResult> {
        let mut hooks: Vec<&HookResult> = self.test_session_setup.iter().collect();
        for (_, suite) in self.all_suites() {
            hooks.extend(suite.suite_setup.iter());
            hooks.extend(suite.suite_teardown.iter());
        }
        hooks.extend(self.test_session_teardown.iter());
        hooks
    }

    pub fn test_count(&self) -> usize {
        self.all_tests().len()
    }

    /// 모든 테스트가 통과(또는 건너뜀/비활성)했고 실패한 훅이 없으면 참
    pub fn is_successful(&self) -> bool {
        self.all_tests()
            .iter()
            .all(|(_, t)| t.status != Some(TestStatus::Failed))
            && self.all_hooks().iter().all(|h| h.outcome != Some(false))
    }

    pub fn stats(&self) -> ReportStats {
        let mut stats = ReportStats {
            duration: match (self.start_time, self.end_time) {
                (Some(start), Some(end)) => Some(end - start),
                _ => None,
            },
            ..ReportStats::default()
        };

        for (_, test) in self.all_tests() {
            stats.tests += 1;
            match test.status {
                Some(TestStatus::Passed) => stats.passed += 1,
                Some(TestStatus::Failed) => stats.failed += 1,
                Some(TestStatus::Skipped) => stats.skipped += 1,
                Some(TestStatus::Disabled) => stats.disabled += 1,
                None => {}
            }
            stats.count_steps(&test.steps);
        }
        for hook in self.all_hooks() {
            stats.count_steps(&hook.steps);
        }
        stats
    }
}

// ─── ReportStats ─────────────────────────────────────────────────────

/// 리포트 요약 통계
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportStats {
    pub tests: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub disabled: usize,
    pub checks: usize,
    pub check_successes: usize,
    pub check_failures: usize,
    /// 에러 레벨 로그 수
    pub errors: usize,
    pub warnings: usize,
    #[serde(skip)]
    pub duration: Option<TimeDelta>,
}

impl ReportStats {
    fn count_steps(&mut self, steps: &[Step]) {
        for entry in steps.iter().flat_map(|s| &s.entries) {
            match entry {
                StepEntry::Check { outcome, .. } => {
                    self.checks += 1;
                    match outcome {
                        Some(true) => self.check_successes += 1,
                        Some(false) => self.check_failures += 1,
                        None => {}
                    }
                }
                StepEntry::Log { level, .. } => match level {
                    LogLevel::Error => self.errors += 1,
                    LogLevel::Warn => self.warnings += 1,
                    LogLevel::Debug | LogLevel::Info => {}
                },
                StepEntry::Attachment { .. } | StepEntry::Url { .. } => {}
            }
        }
    }

    /// 실행된 테스트(통과+실패) 대비 통과 비율 (0-100)
    pub fn success_percent(&self) -> u32 {
        let enabled = self.passed + self.failed;
        if enabled == 0 {
            return 0;
        }
        ((self.passed as f64 / enabled as f64) * 100.0).round() as u32
    }
}

/// `1m 02.345s` 형식으로 기간을 표시합니다.
pub fn humanize_duration(duration: TimeDelta) -> String {
    let millis = duration.num_milliseconds().max(0);
    let minutes = millis / 60_000;
    let seconds = (millis % 60_000) as f64 / 1000.0;
    if minutes > 0 {
        format!("{minutes}m {seconds:06.3}s")
    } else {
        format!("{seconds:.3}s")
    }
}
