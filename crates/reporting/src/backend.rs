//! 리포팅 백엔드 인터페이스
//!
//! 백엔드는 두 가지 독립된 기능을 가질 수 있습니다.
//! - 실행 중 이벤트를 받는 리포팅 세션 ([`Capabilities::SESSION`])
//! - 완료된 리포트의 저장/로드 ([`Capabilities::SAVE`], [`Capabilities::LOAD`])
//!
//! 호출자는 기능 비트를 먼저 확인해야 하며, 지원하지 않는 연산을 요청하면
//! [`ProgrammingError::UnsupportedCapability`]가 반환됩니다.

use std::fmt;
use std::ops::{BitOr, Deref};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use zest_core::bus::Listener;
use zest_core::error::{ConfigError, ProgrammingError, ReportError, ZestError};
use zest_core::event::EventType;
use zest_core::metrics as m;
use zest_core::types::{Location, LogLevel, SuiteInfo, TestInfo, TestStatus};

use crate::report::{Report, SharedReport};

// ─── Capabilities ────────────────────────────────────────────────────

/// 백엔드 기능 비트마스크
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Self = Self(0);
    /// 리포팅 세션 생성
    pub const SESSION: Self = Self(0x1);
    /// 리포트 저장
    pub const SAVE: Self = Self(0x2);
    /// 리포트 로드
    pub const LOAD: Self = Self(0x4);

    pub fn bits(self) -> u8 {
        self.0
    }

    /// `other`의 모든 비트를 가지고 있는지 여부
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ─── ReportingBackend ────────────────────────────────────────────────

/// 리포팅 백엔드
///
/// 선택적 연산의 기본 구현은 [`ProgrammingError::UnsupportedCapability`]를 반환합니다.
/// 구현체는 실제로 제공하는 연산을 [`ReportingBackend::capabilities`]에 선언합니다.
pub trait ReportingBackend: Send + Sync {
    /// 백엔드 이름 (예: `"json"`)
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// 현재 환경에서 사용할 수 있는지 여부
    fn is_available(&self) -> bool {
        true
    }

    /// 실행 중 이벤트를 받을 리포팅 세션을 만듭니다. 반환된 리스너를 버스에 등록합니다.
    fn create_reporting_session(
        &self,
        report: SharedReport,
        report_dir: &Path,
    ) -> Result<Arc<dyn Listener>, ZestError> {
        let _ = (report, report_dir);
        Err(unsupported(self.name(), "reporting session"))
    }

    fn save_report(&self, path: &Path, report: &Report) -> Result<(), ZestError> {
        let _ = (path, report);
        Err(unsupported(self.name(), "save"))
    }

    /// 파일에서 리포트를 읽습니다.
    ///
    /// 이 백엔드의 형식이 아니면 [`ReportError::InvalidReport`]를 반환해야
    /// 다른 백엔드가 이어서 시도할 수 있습니다.
    fn load_report(&self, path: &Path) -> Result<Report, ZestError> {
        let _ = path;
        Err(unsupported(self.name(), "load"))
    }
}

impl fmt::Debug for dyn ReportingBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReportingBackend")
            .field("name", &self.name())
            .field("capabilities", &self.capabilities())
            .finish()
    }
}

fn unsupported(backend: &str, operation: &str) -> ZestError {
    ProgrammingError::UnsupportedCapability {
        backend: backend.to_owned(),
        operation: operation.to_owned(),
    }
    .into()
}

/// 사용 가능한 백엔드만 남깁니다.
pub fn filter_available_backends(
    backends: &[Arc<dyn ReportingBackend>],
) -> Vec<Arc<dyn ReportingBackend>> {
    backends.iter().filter(|b| b.is_available()).cloned().collect()
}

/// 주어진 기능을 모두 가진 백엔드만 남깁니다.
pub fn filter_backends_by_capabilities(
    backends: &[Arc<dyn ReportingBackend>],
    capabilities: Capabilities,
) -> Vec<Arc<dyn ReportingBackend>> {
    backends
        .iter()
        .filter(|b| b.capabilities().contains(capabilities))
        .cloned()
        .collect()
}

// ─── 저장 / 로드 ─────────────────────────────────────────────────────

/// 백엔드로 리포트를 저장합니다.
pub fn save_report(
    path: &Path,
    report: &Report,
    backend: &dyn ReportingBackend,
) -> Result<(), ZestError> {
    if !backend.capabilities().contains(Capabilities::SAVE) {
        return Err(unsupported(backend.name(), "save"));
    }
    backend.save_report(path, report)?;
    metrics::counter!(m::REPORT_SAVES_TOTAL).increment(1);
    debug!(backend = backend.name(), path = %path.display(), "report saved");
    Ok(())
}

/// 로드 기능이 있는 백엔드를 차례로 시도해 파일에서 리포트를 읽습니다.
///
/// 형식이 맞지 않는 백엔드는 건너뛰고, 파일 자체를 읽을 수 없으면 즉시 실패합니다.
pub fn load_report_from_file(
    path: &Path,
    backends: &[Arc<dyn ReportingBackend>],
) -> Result<BoundReport, ZestError> {
    for backend in backends {
        if !backend.capabilities().contains(Capabilities::LOAD) {
            continue;
        }
        match backend.load_report(path) {
            Ok(report) => {
                debug!(backend = backend.name(), path = %path.display(), "report loaded");
                return Ok(BoundReport::new(report).bind(Arc::clone(backend), path));
            }
            Err(ZestError::Report(ReportError::InvalidReport { reason, .. })) => {
                debug!(backend = backend.name(), reason = %reason, "backend cannot read report");
            }
            Err(ZestError::Report(ReportError::Io { reason, .. })) => {
                return Err(ReportError::InvalidReport {
                    path: path.display().to_string(),
                    reason: format!("cannot load report from file: {reason}"),
                }
                .into());
            }
            Err(e) => return Err(e),
        }
    }
    Err(ReportError::NoSuitableBackend {
        path: path.display().to_string(),
    }
    .into())
}

/// 디렉토리의 파일 중 읽을 수 있는 리포트를 이름 순으로 모두 읽습니다.
pub fn load_reports_from_dir(
    dir: &Path,
    backends: &[Arc<dyn ReportingBackend>],
) -> Result<Vec<BoundReport>, ZestError> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();

    let mut reports = Vec::new();
    for file in files {
        match load_report_from_file(&file, backends) {
            Ok(report) => reports.push(report),
            Err(ZestError::Report(
                ReportError::InvalidReport { .. } | ReportError::NoSuitableBackend { .. },
            )) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(reports)
}

/// 파일이면 그 파일을, 디렉토리면 처음 읽히는 리포트를 로드합니다.
pub fn load_report(
    path: &Path,
    backends: &[Arc<dyn ReportingBackend>],
) -> Result<BoundReport, ZestError> {
    if path.is_dir() {
        load_reports_from_dir(path, backends)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ReportError::NoReportInDirectory {
                    path: path.display().to_string(),
                }
                .into()
            })
    } else {
        load_report_from_file(path, backends)
    }
}

// ─── BoundReport ─────────────────────────────────────────────────────

/// 로드한 백엔드와 경로를 기억하는 리포트
#[derive(Debug)]
pub struct BoundReport {
    report: Report,
    binding: Option<(Arc<dyn ReportingBackend>, PathBuf)>,
}

impl BoundReport {
    pub fn new(report: Report) -> Self {
        Self {
            report,
            binding: None,
        }
    }

    pub fn bind(mut self, backend: Arc<dyn ReportingBackend>, path: impl Into<PathBuf>) -> Self {
        self.binding = Some((backend, path.into()));
        self
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn backend(&self) -> Option<&Arc<dyn ReportingBackend>> {
        self.binding.as_ref().map(|(backend, _)| backend)
    }

    pub fn path(&self) -> Option<&Path> {
        self.binding.as_ref().map(|(_, path)| path.as_path())
    }

    pub fn report_mut(&mut self) -> &mut Report {
        &mut self.report
    }

    pub fn into_report(self) -> Report {
        self.report
    }

    /// 연결된 백엔드와 경로로 다시 저장합니다.
    pub fn save(&self) -> Result<(), ZestError> {
        let (backend, path) = self.binding.as_ref().ok_or(ReportError::Unbound)?;
        save_report(path, &self.report, backend.as_ref())
    }
}

impl Deref for BoundReport {
    type Target = Report;

    fn deref(&self) -> &Report {
        &self.report
    }
}

// ─── 파일 기반 세션 ──────────────────────────────────────────────────

/// 파일 백엔드의 저장 시점
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// 실행 종료 시에만
    AtEndOfTests,
    AtEachSuite,
    AtEachTest,
    /// 실패한 테스트/훅이 끝날 때마다
    #[default]
    AtEachFailedTest,
    /// 모든 항목 이벤트마다
    AtEachEvent,
}

impl SaveMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AtEndOfTests => "at_end_of_tests",
            Self::AtEachSuite => "at_each_suite",
            Self::AtEachTest => "at_each_test",
            Self::AtEachFailedTest => "at_each_failed_test",
            Self::AtEachEvent => "at_each_event",
        }
    }
}

impl FromStr for SaveMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "at_end_of_tests" => Ok(Self::AtEndOfTests),
            "at_each_suite" => Ok(Self::AtEachSuite),
            "at_each_test" => Ok(Self::AtEachTest),
            "at_each_failed_test" => Ok(Self::AtEachFailedTest),
            "at_each_event" => Ok(Self::AtEachEvent),
            other => Err(ConfigError::InvalidValue {
                field: "reporting.save_mode".to_owned(),
                reason: format!("unknown save mode '{other}'"),
            }),
        }
    }
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 리포트를 파일로 쓰는 함수
pub type SaveFn = fn(&Path, &Report) -> Result<(), ZestError>;

/// 저장 시점 규칙에 따라 리포트를 파일로 저장하는 리포팅 세션
///
/// 리포트 라이터보다 나중에 버스에 등록되어야 최신 상태를 저장합니다.
pub struct FileReportSession {
    path: PathBuf,
    report: SharedReport,
    save_fn: SaveFn,
    save_mode: SaveMode,
}

impl FileReportSession {
    pub fn new(
        path: impl Into<PathBuf>,
        report: SharedReport,
        save_fn: SaveFn,
        save_mode: SaveMode,
    ) -> Self {
        Self {
            path: path.into(),
            report,
            save_fn,
            save_mode,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self) -> Result<(), ZestError> {
        let report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
        (self.save_fn)(&self.path, &report)?;
        metrics::counter!(m::REPORT_SAVES_TOTAL).increment(1);
        Ok(())
    }

    fn save_logged(&self) {
        if let Err(e) = self.save() {
            error!(path = %self.path.display(), error = %e, "failed to save report");
        }
    }

    fn handle_code_end(&self, is_failure: bool) {
        let save = match self.save_mode {
            SaveMode::AtEachTest => true,
            SaveMode::AtEachFailedTest => is_failure,
            _ => false,
        };
        if save {
            self.save_logged();
        }
    }

    fn handle_entry(&self) {
        if self.save_mode == SaveMode::AtEachEvent {
            self.save_logged();
        }
    }

    fn hook_failed(&self, location: &Location) -> bool {
        let report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
        let hook = match location {
            Location::TestSessionSetup => report.test_session_setup.as_ref(),
            Location::TestSessionTeardown => report.test_session_teardown.as_ref(),
            Location::SuiteSetup(path) => report.suite(path).and_then(|s| s.suite_setup.as_ref()),
            Location::SuiteTeardown(path) => {
                report.suite(path).and_then(|s| s.suite_teardown.as_ref())
            }
            Location::Test(_) => None,
        };
        hook.is_some_and(|h| h.outcome == Some(false))
    }
}

impl fmt::Debug for FileReportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReportSession")
            .field("path", &self.path)
            .field("save_mode", &self.save_mode)
            .finish_non_exhaustive()
    }
}

#[allow(unused_variables)]
impl Listener for FileReportSession {
    fn subscriptions(&self) -> Vec<EventType> {
        let mut types = vec![
            EventType::TestSessionEnd,
            EventType::TestSessionSetupEnd,
            EventType::TestSessionTeardownEnd,
            EventType::SuiteEnd,
            EventType::SuiteSetupEnd,
            EventType::SuiteTeardownEnd,
            EventType::TestEnd,
        ];
        if self.save_mode == SaveMode::AtEachEvent {
            types.extend([
                EventType::Step,
                EventType::Log,
                EventType::Check,
                EventType::Attachment,
                EventType::Url,
            ]);
        }
        types
    }

    fn on_test_session_end(&self, ts: DateTime<Utc>) {
        self.save_logged();
        info!(path = %self.path.display(), "report written");
    }

    fn on_test_session_setup_end(&self, ts: DateTime<Utc>) {
        self.handle_code_end(self.hook_failed(&Location::TestSessionSetup));
    }

    fn on_test_session_teardown_end(&self, ts: DateTime<Utc>) {
        self.handle_code_end(self.hook_failed(&Location::TestSessionTeardown));
    }

    fn on_suite_end(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {
        if self.save_mode == SaveMode::AtEachSuite {
            self.save_logged();
        }
    }

    fn on_suite_setup_end(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {
        self.handle_code_end(self.hook_failed(&Location::SuiteSetup(suite.path.clone())));
    }

    fn on_suite_teardown_end(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {
        self.handle_code_end(self.hook_failed(&Location::SuiteTeardown(suite.path.clone())));
    }

    fn on_test_end(&self, ts: DateTime<Utc>, test: &TestInfo) {
        let failed = {
            let report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
            report
                .test(&test.path)
                .is_some_and(|t| t.status == Some(TestStatus::Failed))
        };
        self.handle_code_end(failed);
    }

    fn on_step(&self, ts: DateTime<Utc>, location: &Location, description: &str, detached: bool) {
        self.handle_entry();
    }

    fn on_log(
        &self,
        ts: DateTime<Utc>,
        location: &Location,
        step: Option<&str>,
        level: LogLevel,
        message: &str,
    ) {
        self.handle_entry();
    }

    fn on_check(
        &self,
        ts: DateTime<Utc>,
        location: &Location,
        step: Option<&str>,
        description: &str,
        outcome: Option<bool>,
        details: Option<&str>,
    ) {
        self.handle_entry();
    }

    fn on_attachment(
        &self,
        ts: DateTime<Utc>,
        location: &Location,
        step: Option<&str>,
        path: &str,
        description: &str,
        as_image: bool,
    ) {
        self.handle_entry();
    }

    fn on_url(
        &self,
        ts: DateTime<Utc>,
        location: &Location,
        step: Option<&str>,
        url: &str,
        description: &str,
    ) {
        self.handle_entry();
    }
}
