//! 테스트 실행 오케스트레이션
//!
//! [`Runner`]는 스위트 트리와 픽스처 레지스트리를 받아 한 번의 테스트 세션을 실행합니다.
//!
//! # 실행 순서
//!
//! 1. 검증: 픽스처 그래프, 테스트가 사용하는 픽스처, 메타데이터 정책 (빌드 시점)
//! 2. `session_prerun` 픽스처 실행 (리포트가 만들어지기 전, 실패하면 실행 중단)
//! 3. 이벤트 버스, 리포트 라이터, 리포팅 세션 연결
//! 4. 세션 setup (`session` 픽스처) → 스위트 → 세션 teardown
//! 5. `session_prerun` 픽스처 정리
//!
//! 스위트는 setup(`testsuite` 픽스처, setup 훅) → 테스트 → 하위 스위트 → teardown 순으로,
//! 테스트는 setup(`test` 픽스처, `setup_test` 훅) → 본문 → teardown 순으로 실행됩니다.
//!
//! 본문과 훅의 에러나 패닉은 에러 로그로 바뀌어 해당 위치를 실패로 표시할 뿐,
//! 실행을 멈추지 않습니다.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use zest_core::config::ZestConfig;
use zest_core::error::ZestError;
use zest_core::event::EventKind;
use zest_core::fixture::FixtureRegistry;
use zest_core::metadata::MetadataPolicy;
use zest_core::metrics as m;
use zest_core::runtime::{Runtime, panic_message};
use zest_core::suite::{HookFn, Suite, Test, TestContext};
use zest_core::types::{Location, Scope};
use zest_reporting::{Report, ReportingBackend, backends_from_config};

use crate::config::RunnerConfig;
use crate::error::RunnerError;
use crate::wiring::wire_reporting;

/// 세션 setup이 실패했을 때 테스트에 기록되는 사유
const SESSION_SETUP_FAILED: &str = "Test session setup failed";
/// `stop_on_failure`로 건너뛴 테스트의 사유
const PREVIOUS_FAILURE: &str = "Test skipped because of a previous failure";

/// 실행 결과
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: Report,
    /// 실패한 테스트나 훅이 없으면 참
    pub successful: bool,
    pub report_dir: PathBuf,
}

// ─── Runner ──────────────────────────────────────────────────────────

/// 검증을 마친 실행 단위
///
/// [`RunnerBuilder`]로 만듭니다.
pub struct Runner {
    config: RunnerConfig,
    suites: Vec<Suite>,
    fixtures: FixtureRegistry,
    backends: Vec<Arc<dyn ReportingBackend>>,
}

impl Runner {
    pub fn builder() -> RunnerBuilder {
        RunnerBuilder::new()
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    /// 테스트 세션을 실행합니다.
    ///
    /// # Errors
    ///
    /// 리포트 디렉토리 생성, prerun 픽스처, 리포팅 연결, 이벤트 발행이 실패하면
    /// 에러를 반환합니다. 테스트 실패는 에러가 아니라 [`RunOutcome::successful`]로 드러납니다.
    pub fn run(self) -> Result<RunOutcome, RunnerError> {
        let Runner {
            config,
            suites,
            mut fixtures,
            backends,
        } = self;

        std::fs::create_dir_all(&config.report_dir).map_err(|e| RunnerError::ReportDir {
            path: config.report_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let prerun = plan_fixtures(&fixtures, &session_usages(&suites), Scope::SessionPrerun);
        for name in &prerun {
            fixtures.execute(name).map_err(RunnerError::Prerun)?;
        }

        let wiring =
            wire_reporting(&backends, &config.report_dir).map_err(RunnerError::Reporting)?;
        let runtime = Arc::new(Runtime::new(Arc::clone(&wiring.bus), &config.report_dir));
        fixtures.set_runtime(Arc::clone(&runtime));

        info!(
            suites = suites.len(),
            tests = suites.iter().map(Suite::test_count).sum::<usize>(),
            sessions = ?wiring.sessions,
            report_dir = %config.report_dir.display(),
            "test session starting"
        );

        let mut execution = Execution {
            runtime: &runtime,
            fixtures: &mut fixtures,
            stop_on_failure: config.stop_on_failure,
            stop_requested: false,
        };
        let result = execution.run_session(&suites);
        runtime.leave_thread();

        for name in prerun.iter().rev() {
            if !fixtures.is_executed(name) {
                continue;
            }
            if let Err(e) = fixtures.teardown(name) {
                error!(fixture = %name, error = %e, "session prerun fixture teardown failed");
            }
        }
        result?;

        let report = wiring
            .writer
            .report()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let successful = report.is_successful();
        let stats = report.stats();
        info!(
            tests = stats.tests,
            passed = stats.passed,
            failed = stats.failed,
            skipped = stats.skipped,
            disabled = stats.disabled,
            successful,
            "test session finished"
        );

        Ok(RunOutcome {
            report,
            successful,
            report_dir: config.report_dir,
        })
    }
}

impl std::fmt::Debug for Runner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("config", &self.config)
            .field("suites", &self.suites.len())
            .field("fixtures", &self.fixtures)
            .field("backends", &self.backends)
            .finish()
    }
}

// ─── RunnerBuilder ───────────────────────────────────────────────────

/// [`Runner`] 빌더
///
/// # 사용 예시
///
/// ```ignore
/// let outcome = Runner::builder()
///     .config(RunnerConfig::from_core(&config))
///     .suite(suite)
///     .fixtures(registry)
///     .build()?
///     .run()?;
/// ```
pub struct RunnerBuilder {
    config: RunnerConfig,
    suites: Vec<Suite>,
    fixtures: FixtureRegistry,
    policy: MetadataPolicy,
    backends: Vec<Arc<dyn ReportingBackend>>,
}

impl RunnerBuilder {
    pub fn new() -> Self {
        Self {
            config: RunnerConfig::default(),
            suites: Vec::new(),
            fixtures: FixtureRegistry::new(),
            policy: MetadataPolicy::new(),
            backends: Vec::new(),
        }
    }

    /// 전체 설정에서 실행 설정과 리포팅 백엔드를 가져옵니다.
    ///
    /// # Errors
    ///
    /// 저장 모드가 잘못되었으면 에러를 반환합니다.
    pub fn from_config(config: &ZestConfig) -> Result<Self, RunnerError> {
        let backends =
            backends_from_config(&config.reporting).map_err(RunnerError::Validation)?;
        Ok(Self::new()
            .config(RunnerConfig::from_core(config))
            .backends(backends))
    }

    pub fn config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn report_dir(mut self, report_dir: impl Into<PathBuf>) -> Self {
        self.config.report_dir = report_dir.into();
        self
    }

    pub fn stop_on_failure(mut self, stop: bool) -> Self {
        self.config.stop_on_failure = stop;
        self
    }

    pub fn suite(mut self, suite: Suite) -> Self {
        self.suites.push(suite);
        self
    }

    pub fn suites(mut self, suites: impl IntoIterator<Item = Suite>) -> Self {
        self.suites.extend(suites);
        self
    }

    pub fn fixtures(mut self, fixtures: FixtureRegistry) -> Self {
        self.fixtures = fixtures;
        self
    }

    pub fn metadata_policy(mut self, policy: MetadataPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn backend(mut self, backend: Arc<dyn ReportingBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    pub fn backends(mut self, backends: Vec<Arc<dyn ReportingBackend>>) -> Self {
        self.backends = backends;
        self
    }

    /// 검증을 수행하고 실행기를 만듭니다.
    ///
    /// # Errors
    ///
    /// 픽스처 그래프 에러, 등록되지 않은 픽스처를 사용하는 테스트,
    /// 메타데이터 정책 위반이 있으면 [`RunnerError::Validation`]을 반환합니다.
    pub fn build(self) -> Result<Runner, RunnerError> {
        self.fixtures
            .validate()
            .map_err(|e| RunnerError::Validation(e.into()))?;
        self.fixtures
            .check_fixtures_in_suites(&self.suites)
            .map_err(|e| RunnerError::Validation(e.into()))?;
        self.policy
            .check_suites_compliance(&self.suites)
            .map_err(RunnerError::Validation)?;
        debug!(
            suites = self.suites.len(),
            fixtures = self.fixtures.len(),
            "runner validated"
        );

        Ok(Runner {
            config: self.config,
            suites: self.suites,
            fixtures: self.fixtures,
            backends: self.backends,
        })
    }
}

impl Default for RunnerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ─── 픽스처 계획 ─────────────────────────────────────────────────────

/// 모든 스위트의 훅과 활성화된 테스트가 사용하는 픽스처 이름
fn session_usages(suites: &[Suite]) -> Vec<String> {
    suites
        .iter()
        .flat_map(|suite| suite.all_suites(None))
        .flat_map(|(_, suite)| suite_usages(suite))
        .collect()
}

/// 스위트 훅과 직접 속한 (활성화된) 테스트가 사용하는 픽스처 이름
fn suite_usages(suite: &Suite) -> Vec<String> {
    let mut names = suite.fixtures.clone();
    for test in suite.tests.iter().filter(|t| t.disabled.is_none()) {
        names.extend(test.fixtures.iter().cloned());
    }
    names
}

/// `names`와 그 의존성 중 `scope`에 속하고 아직 실행되지 않은 픽스처 (실행 순서)
///
/// 아무 픽스처도 쓰지 않으면 빈 계획입니다.
fn plan_fixtures(fixtures: &FixtureRegistry, names: &[String], scope: Scope) -> Vec<String> {
    match fixtures.with_dependencies(names) {
        Ok(all) if all.is_empty() => Vec::new(),
        Ok(all) => fixtures.filter_fixtures(&all, Some(scope), Some(false)),
        Err(e) => {
            warn!(scope = %scope, error = %e, "cannot plan fixtures");
            Vec::new()
        }
    }
}

// ─── Execution ───────────────────────────────────────────────────────

/// 한 세션 동안의 실행 상태
struct Execution<'a> {
    runtime: &'a Arc<Runtime>,
    fixtures: &'a mut FixtureRegistry,
    stop_on_failure: bool,
    stop_requested: bool,
}

impl Execution<'_> {
    fn emit(&self, kind: EventKind) -> Result<(), RunnerError> {
        self.runtime.emit(kind).map_err(RunnerError::Dispatch)
    }

    fn log_error(&self, message: &str) -> Result<(), RunnerError> {
        self.runtime.log_error(message).map_err(RunnerError::Dispatch)
    }

    fn context(&self, fixtures: &[String]) -> Result<TestContext, ZestError> {
        let args = self.fixtures.args_for(fixtures)?;
        Ok(TestContext::new(Arc::clone(self.runtime), args))
    }

    /// 본문이나 훅을 실행하고, 에러나 패닉을 현재 위치의 에러 로그로 남깁니다.
    fn guarded(&self, what: &str, fixtures: &[String], body: &HookFn) -> Result<(), RunnerError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let ctx = self.context(fixtures)?;
            body(&ctx)
        }));
        let message = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(ZestError::Abort(reason))) => format!("{what} aborted: {reason}"),
            Ok(Err(e)) => format!("{what} failed: {e}"),
            Err(payload) => format!("{what} panicked: {}", panic_message(payload.as_ref())),
        };
        debug!(location = ?self.runtime.location(), %message, "code raised an error");
        self.log_error(&message)
    }

    /// 픽스처를 순서대로 실행합니다. 실패하면 에러 로그를 남기고 멈춥니다.
    ///
    /// 이번 호출에서 실행된 픽스처 이름을 반환합니다.
    fn setup_fixtures(&mut self, names: &[String]) -> Result<Vec<String>, RunnerError> {
        let mut executed = Vec::new();
        for name in names {
            if self.fixtures.is_executed(name) {
                continue;
            }
            let fixtures = &mut *self.fixtures;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| fixtures.execute(name)));
            let message = match outcome {
                Ok(Ok(_)) => {
                    executed.push(name.clone());
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!(
                    "fixture '{name}' panicked: {}",
                    panic_message(payload.as_ref())
                ),
            };
            self.log_error(&message)?;
            break;
        }
        Ok(executed)
    }

    /// 픽스처를 실행 역순으로 정리합니다. 실패는 에러 로그로 남기고 계속합니다.
    fn teardown_fixtures(&mut self, executed: &[String]) -> Result<(), RunnerError> {
        for name in executed.iter().rev() {
            let fixtures = &mut *self.fixtures;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| fixtures.teardown(name)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(payload) => format!(
                    "teardown of fixture '{name}' panicked: {}",
                    panic_message(payload.as_ref())
                ),
            };
            self.log_error(&message)?;
        }
        Ok(())
    }

    fn run_session(&mut self, suites: &[Suite]) -> Result<(), RunnerError> {
        self.emit(EventKind::TestSessionStart)?;

        let session_fixtures = plan_fixtures(self.fixtures, &session_usages(suites), Scope::Session);
        let mut executed = Vec::new();
        let mut skip = None;
        if !session_fixtures.is_empty() {
            self.emit(EventKind::TestSessionSetupStart)?;
            self.runtime.set_location(Location::TestSessionSetup);
            executed = self.setup_fixtures(&session_fixtures)?;
            self.emit(EventKind::TestSessionSetupEnd)?;
            if !self.runtime.is_successful(&Location::TestSessionSetup) {
                warn!("test session setup failed, skipping all tests");
                skip = Some(SESSION_SETUP_FAILED.to_owned());
            }
        }

        for suite in suites {
            self.run_suite(suite, None, skip.as_deref())?;
        }

        if !executed.is_empty() {
            self.emit(EventKind::TestSessionTeardownStart)?;
            self.runtime.set_location(Location::TestSessionTeardown);
            self.teardown_fixtures(&executed)?;
            self.emit(EventKind::TestSessionTeardownEnd)?;
        }

        self.emit(EventKind::TestSessionEnd)
    }

    fn run_suite(
        &mut self,
        suite: &Suite,
        parent: Option<&str>,
        inherited_skip: Option<&str>,
    ) -> Result<(), RunnerError> {
        let info = Arc::new(suite.info(parent));
        let path = info.path.clone();
        self.emit(EventKind::SuiteStart {
            suite: Arc::clone(&info),
        })?;

        let runs_hooks = inherited_skip.is_none();
        let mut skip = inherited_skip.map(str::to_owned);
        let mut executed = Vec::new();
        let mut setup_ok = true;

        let suite_fixtures = if runs_hooks {
            plan_fixtures(self.fixtures, &suite_usages(suite), Scope::TestSuite)
        } else {
            Vec::new()
        };
        if runs_hooks && (suite.setup.is_some() || !suite_fixtures.is_empty()) {
            let location = Location::SuiteSetup(path.clone());
            self.emit(EventKind::SuiteSetupStart {
                suite: Arc::clone(&info),
            })?;
            self.runtime.set_location(location.clone());
            executed = self.setup_fixtures(&suite_fixtures)?;
            if self.runtime.is_successful(&location) {
                if let Some(hook) = &suite.setup {
                    self.guarded("suite setup", &suite.fixtures, hook)?;
                }
            }
            self.emit(EventKind::SuiteSetupEnd {
                suite: Arc::clone(&info),
            })?;
            setup_ok = self.runtime.is_successful(&location);
            if !setup_ok {
                warn!(suite = %path, "suite setup failed, skipping its tests");
                skip = Some(format!("Setup of suite '{path}' failed"));
            }
        }

        for test in &suite.tests {
            self.run_test(test, suite, &path, skip.as_deref())?;
        }
        for sub in &suite.suites {
            self.run_suite(sub, Some(&path), skip.as_deref())?;
        }

        let teardown_hook = suite.teardown.as_ref().filter(|_| setup_ok);
        if runs_hooks && (teardown_hook.is_some() || !executed.is_empty()) {
            self.emit(EventKind::SuiteTeardownStart {
                suite: Arc::clone(&info),
            })?;
            self.runtime
                .set_location(Location::SuiteTeardown(path.clone()));
            if let Some(hook) = teardown_hook {
                self.guarded("suite teardown", &suite.fixtures, hook)?;
            }
            self.teardown_fixtures(&executed)?;
            self.emit(EventKind::SuiteTeardownEnd {
                suite: Arc::clone(&info),
            })?;
        }

        self.emit(EventKind::SuiteEnd { suite: info })
    }

    fn run_test(
        &mut self,
        test: &Test,
        suite: &Suite,
        suite_path: &str,
        skip: Option<&str>,
    ) -> Result<(), RunnerError> {
        let info = Arc::new(test.info(suite_path));

        if let Some(reason) = &test.disabled {
            metrics::counter!(m::TESTS_TOTAL, m::LABEL_STATUS => "disabled").increment(1);
            return self.emit(EventKind::TestDisabled {
                test: info,
                reason: reason.clone(),
            });
        }
        let skip_reason = skip
            .map(str::to_owned)
            .or_else(|| self.stop_requested.then(|| PREVIOUS_FAILURE.to_owned()));
        if let Some(reason) = skip_reason {
            metrics::counter!(m::TESTS_TOTAL, m::LABEL_STATUS => "skipped").increment(1);
            return self.emit(EventKind::TestSkipped { test: info, reason });
        }

        let location = info.location();
        let started = Instant::now();
        self.emit(EventKind::TestStart {
            test: Arc::clone(&info),
        })?;
        self.runtime.set_location(location.clone());

        self.emit(EventKind::TestSetupStart {
            test: Arc::clone(&info),
        })?;
        let test_fixtures = plan_fixtures(self.fixtures, &test.fixtures, Scope::Test);
        let executed = self.setup_fixtures(&test_fixtures)?;
        if let Some(hook) = suite
            .setup_test
            .as_ref()
            .filter(|_| self.runtime.is_successful(&location))
        {
            self.guarded("test setup", &test.fixtures, hook)?;
        }
        self.emit(EventKind::TestSetupEnd {
            test: Arc::clone(&info),
        })?;

        let setup_ok = self.runtime.is_successful(&location);
        if setup_ok {
            self.guarded("test", &test.fixtures, test.body())?;
        }

        self.emit(EventKind::TestTeardownStart {
            test: Arc::clone(&info),
        })?;
        if let Some(hook) = suite.teardown_test.as_ref().filter(|_| setup_ok) {
            self.guarded("test teardown", &test.fixtures, hook)?;
        }
        self.teardown_fixtures(&executed)?;
        self.emit(EventKind::TestTeardownEnd {
            test: Arc::clone(&info),
        })?;

        self.emit(EventKind::TestEnd {
            test: Arc::clone(&info),
        })?;

        let passed = self.runtime.is_successful(&location);
        let status = if passed { "passed" } else { "failed" };
        metrics::counter!(m::TESTS_TOTAL, m::LABEL_STATUS => status).increment(1);
        metrics::histogram!(m::TEST_DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        debug!(test = %info.path, status, "test finished");

        if !passed && self.stop_on_failure && !self.stop_requested {
            info!(test = %info.path, "stopping on first failure");
            self.stop_requested = true;
        }
        Ok(())
    }
}
