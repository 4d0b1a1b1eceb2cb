//! 리포트 라이터: 이벤트 스트림을 리포트 트리로 조립
//!
//! [`ReportWriter`]는 이벤트 버스의 [`Listener`]입니다.
//! 스텝 상태(열린 스텝, 분리 여부, 테스트 단계)는 위치별로 라이터가 관리하고,
//! 결과는 [`SharedReport`]에 누적됩니다.
//!
//! # 항목 배치 규칙
//! 1. 이벤트에 스텝 이름이 있고 그 이름의 스텝이 열려 있으면 그 스텝
//! 2. 아니면 가장 최근에 열린 일반(분리되지 않은) 스텝
//! 3. 열린 스텝이 없으면 위치의 기본 설명으로 암묵적 스텝을 엽니다
//!
//! 닫히는 스텝에 항목이 없으면 리포트에서 제거됩니다.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use zest_core::bus::{EventBus, Listener};
use zest_core::error::EventError;
use zest_core::types::{Location, LogLevel, SuiteInfo, TestInfo, TestStatus};

use crate::report::{HookResult, Report, SharedReport, Step, StepEntry, SuiteResult, TestResult};

#[derive(Debug, Clone)]
struct OpenStep {
    /// 노드 스텝 목록 안의 인덱스
    index: usize,
    description: String,
    detached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TestPhase {
    Setup,
    Body,
    Teardown,
}

#[derive(Debug, Default)]
struct WriterState {
    open_steps: HashMap<Location, Vec<OpenStep>>,
    test_phases: HashMap<String, TestPhase>,
}

/// 이벤트를 받아 리포트를 채우는 리스너
#[derive(Debug)]
pub struct ReportWriter {
    report: SharedReport,
    state: Mutex<WriterState>,
}

impl ReportWriter {
    pub fn new(report: SharedReport) -> Self {
        Self {
            report,
            state: Mutex::new(WriterState::default()),
        }
    }

    pub fn report(&self) -> &SharedReport {
        &self.report
    }

    /// 새 리포트와 라이터를 만들고 버스에 등록합니다.
    pub fn install(bus: &EventBus) -> Result<Arc<Self>, EventError> {
        let writer = Arc::new(Self::new(Report::new().shared()));
        bus.add_listener(writer.clone())?;
        Ok(writer)
    }

    fn lock(&self) -> (MutexGuard<'_, WriterState>, MutexGuard<'_, Report>) {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let report = self.report.lock().unwrap_or_else(PoisonError::into_inner);
        (state, report)
    }

    fn report_guard(&self) -> MutexGuard<'_, Report> {
        self.report.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start_hook(&self, ts: DateTime<Utc>, location: &Location) {
        let (mut state, mut report) = self.lock();
        state.open_steps.remove(location);
        let hook = Some(HookResult::new(ts));
        match location {
            Location::TestSessionSetup => report.test_session_setup = hook,
            Location::TestSessionTeardown => report.test_session_teardown = hook,
            Location::SuiteSetup(path) | Location::SuiteTeardown(path) => {
                let Some(suite) = report.suite_mut(path) else {
                    warn!(suite = %path, "hook started for unknown suite");
                    return;
                };
                if matches!(location, Location::SuiteSetup(_)) {
                    suite.suite_setup = hook;
                } else {
                    suite.suite_teardown = hook;
                }
            }
            Location::Test(_) => {}
        }
    }

    fn end_hook(&self, ts: DateTime<Utc>, location: &Location) {
        let (mut state, mut report) = self.lock();
        close_all_steps(&mut state, &mut report, location, ts);
        let slot = match location {
            Location::TestSessionSetup => &mut report.test_session_setup,
            Location::TestSessionTeardown => &mut report.test_session_teardown,
            Location::SuiteSetup(path) | Location::SuiteTeardown(path) => {
                let Some(suite) = report.suite_mut(path) else {
                    return;
                };
                if matches!(location, Location::SuiteSetup(_)) {
                    &mut suite.suite_setup
                } else {
                    &mut suite.suite_teardown
                }
            }
            Location::Test(_) => return,
        };
        if slot.as_ref().is_some_and(HookResult::is_empty) {
            debug!(location = %location, "discarding hook without steps");
            *slot = None;
        } else if let Some(hook) = slot.as_mut() {
            hook.end_time = Some(ts);
            hook.outcome = Some(!hook.has_failure());
        }
    }

    fn set_phase(&self, ts: DateTime<Utc>, test: &TestInfo, phase: TestPhase) {
        let (mut state, mut report) = self.lock();
        close_current_step(&mut state, &mut report, &test.location(), ts);
        state.test_phases.insert(test.path.clone(), phase);
    }

    fn add_entry(&self, location: &Location, step: Option<&str>, entry: StepEntry) {
        let (mut state, mut report) = self.lock();
        let default_description = default_step_description(&state, &report, location);
        let Some(steps) = node_steps(&mut report, location) else {
            warn!(location = %location, "entry for unknown report node dropped");
            return;
        };
        let open = state.open_steps.entry(location.clone()).or_default();

        let by_name = step.and_then(|name| open.iter().rev().find(|s| s.description == name));
        let target = by_name
            .or_else(|| open.iter().rev().find(|s| !s.detached))
            .map(|s| s.index);

        let index = match target {
            Some(index) => index,
            None => {
                let description = step.map_or(default_description, str::to_owned);
                steps.push(Step::new(description.clone(), entry.time()));
                open.push(OpenStep {
                    index: steps.len() - 1,
                    description,
                    detached: false,
                });
                steps.len() - 1
            }
        };
        if let Some(step) = steps.get_mut(index) {
            step.entries.push(entry);
        }
    }
}

// ─── 스텝 조작 헬퍼 ───────────────────────────────────────────────────

fn node_steps<'a>(report: &'a mut Report, location: &Location) -> Option<&'a mut Vec<Step>> {
    match location {
        Location::Test(path) => report.test_mut(path).map(|t| &mut t.steps),
        Location::SuiteSetup(path) => report
            .suite_mut(path)
            .and_then(|s| s.suite_setup.as_mut())
            .map(|h| &mut h.steps),
        Location::SuiteTeardown(path) => report
            .suite_mut(path)
            .and_then(|s| s.suite_teardown.as_mut())
            .map(|h| &mut h.steps),
        Location::TestSessionSetup => report.test_session_setup.as_mut().map(|h| &mut h.steps),
        Location::TestSessionTeardown => {
            report.test_session_teardown.as_mut().map(|h| &mut h.steps)
        }
    }
}

fn default_step_description(state: &WriterState, report: &Report, location: &Location) -> String {
    match location {
        Location::Test(path) => match state.test_phases.get(path) {
            Some(TestPhase::Setup) => "Setup test".to_owned(),
            Some(TestPhase::Teardown) => "Teardown test".to_owned(),
            Some(TestPhase::Body) | None => report
                .test(path)
                .map_or_else(|| path.clone(), |t| t.description.clone()),
        },
        Location::SuiteSetup(_) => "Setup suite".to_owned(),
        Location::SuiteTeardown(_) => "Teardown suite".to_owned(),
        Location::TestSessionSetup => "Setup test session".to_owned(),
        Location::TestSessionTeardown => "Teardown test session".to_owned(),
    }
}

/// 열린 스텝 하나를 닫습니다. 항목이 없으면 제거하고 나머지 인덱스를 보정합니다.
fn close_step(
    state: &mut WriterState,
    report: &mut Report,
    location: &Location,
    position: usize,
    ts: DateTime<Utc>,
) {
    let Some(open) = state.open_steps.get_mut(location) else {
        return;
    };
    if position >= open.len() {
        return;
    }
    let closed = open.remove(position);
    let Some(steps) = node_steps(report, location) else {
        return;
    };
    let Some(step) = steps.get_mut(closed.index) else {
        return;
    };
    if step.entries.is_empty() {
        steps.remove(closed.index);
        for other in open.iter_mut().filter(|s| s.index > closed.index) {
            other.index -= 1;
        }
    } else {
        step.end_time = Some(ts);
    }
}

/// 가장 최근의 일반 스텝을 닫습니다.
fn close_current_step(
    state: &mut WriterState,
    report: &mut Report,
    location: &Location,
    ts: DateTime<Utc>,
) {
    let position = state
        .open_steps
        .get(location)
        .and_then(|open| open.iter().rposition(|s| !s.detached));
    if let Some(position) = position {
        close_step(state, report, location, position, ts);
    }
}

fn close_all_steps(
    state: &mut WriterState,
    report: &mut Report,
    location: &Location,
    ts: DateTime<Utc>,
) {
    while state
        .open_steps
        .get(location)
        .is_some_and(|open| !open.is_empty())
    {
        let last = state.open_steps.get(location).map_or(0, |o| o.len() - 1);
        close_step(state, report, location, last, ts);
    }
    state.open_steps.remove(location);
}

fn new_test_result(test: &TestInfo, ts: DateTime<Utc>) -> TestResult {
    TestResult {
        name: test.name.clone(),
        description: test.description.clone(),
        tags: test.tags.clone(),
        properties: test.properties.clone(),
        links: test.links.clone(),
        status: None,
        status_details: None,
        start_time: ts,
        end_time: None,
        steps: Vec::new(),
    }
}

fn attach_test(report: &mut Report, test: &TestInfo, result: TestResult) {
    match report.suite_mut(&test.suite_path) {
        Some(suite) => suite.tests.push(result),
        None => warn!(test = %test.path, "test belongs to unknown suite"),
    }
}

// ─── Listener ────────────────────────────────────────────────────────

impl Listener for ReportWriter {
    fn on_test_session_start(&self, ts: DateTime<Utc>) {
        let mut report = self.report_guard();
        report.start_time = Some(ts);
    }

    fn on_test_session_end(&self, ts: DateTime<Utc>) {
        let mut report = self.report_guard();
        report.end_time = Some(ts);
        report.generation_time = Some(ts);
    }

    fn on_test_session_setup_start(&self, ts: DateTime<Utc>) {
        self.start_hook(ts, &Location::TestSessionSetup);
    }

    fn on_test_session_setup_end(&self, ts: DateTime<Utc>) {
        self.end_hook(ts, &Location::TestSessionSetup);
    }

    fn on_test_session_teardown_start(&self, ts: DateTime<Utc>) {
        self.start_hook(ts, &Location::TestSessionTeardown);
    }

    fn on_test_session_teardown_end(&self, ts: DateTime<Utc>) {
        self.end_hook(ts, &Location::TestSessionTeardown);
    }

    fn on_suite_start(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {
        let mut report = self.report_guard();
        let result = SuiteResult {
            name: suite.name.clone(),
            description: suite.description.clone(),
            tags: suite.tags.clone(),
            properties: suite.properties.clone(),
            links: suite.links.clone(),
            start_time: Some(ts),
            end_time: None,
            suite_setup: None,
            suite_teardown: None,
            tests: Vec::new(),
            suites: Vec::new(),
        };
        match suite.parent_path.as_deref() {
            None => report.suites.push(result),
            Some(parent) => match report.suite_mut(parent) {
                Some(parent) => parent.suites.push(result),
                None => warn!(suite = %suite.path, "suite started under unknown parent"),
            },
        }
    }

    fn on_suite_end(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {
        let mut report = self.report_guard();
        if let Some(result) = report.suite_mut(&suite.path) {
            result.end_time = Some(ts);
        }
    }

    fn on_suite_setup_start(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {
        self.start_hook(ts, &Location::SuiteSetup(suite.path.clone()));
    }

    fn on_suite_setup_end(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {
        self.end_hook(ts, &Location::SuiteSetup(suite.path.clone()));
    }

    fn on_suite_teardown_start(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {
        self.start_hook(ts, &Location::SuiteTeardown(suite.path.clone()));
    }

    fn on_suite_teardown_end(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {
        self.end_hook(ts, &Location::SuiteTeardown(suite.path.clone()));
    }

    fn on_test_start(&self, ts: DateTime<Utc>, test: &TestInfo) {
        let (mut state, mut report) = self.lock();
        state.open_steps.remove(&test.location());
        state.test_phases.insert(test.path.clone(), TestPhase::Body);
        attach_test(&mut report, test, new_test_result(test, ts));
    }

    fn on_test_end(&self, ts: DateTime<Utc>, test: &TestInfo) {
        let (mut state, mut report) = self.lock();
        close_all_steps(&mut state, &mut report, &test.location(), ts);
        state.test_phases.remove(&test.path);
        if let Some(result) = report.test_mut(&test.path) {
            result.status = Some(if result.has_failure() {
                TestStatus::Failed
            } else {
                TestStatus::Passed
            });
            result.end_time = Some(ts);
        }
    }

    fn on_test_setup_start(&self, ts: DateTime<Utc>, test: &TestInfo) {
        self.set_phase(ts, test, TestPhase::Setup);
    }

    fn on_test_setup_end(&self, ts: DateTime<Utc>, test: &TestInfo) {
        self.set_phase(ts, test, TestPhase::Body);
    }

    fn on_test_teardown_start(&self, ts: DateTime<Utc>, test: &TestInfo) {
        self.set_phase(ts, test, TestPhase::Teardown);
    }

    fn on_test_teardown_end(&self, ts: DateTime<Utc>, test: &TestInfo) {
        self.set_phase(ts, test, TestPhase::Body);
    }

    fn on_test_skipped(&self, ts: DateTime<Utc>, test: &TestInfo, reason: &str) {
        let mut report = self.report_guard();
        let result = TestResult {
            status: Some(TestStatus::Skipped),
            status_details: Some(reason.to_owned()),
            end_time: Some(ts),
            ..new_test_result(test, ts)
        };
        attach_test(&mut report, test, result);
    }

    fn on_test_disabled(&self, ts: DateTime<Utc>, test: &TestInfo, reason: &str) {
        let mut report = self.report_guard();
        let result = TestResult {
            status: Some(TestStatus::Disabled),
            status_details: Some(reason.to_owned()),
            end_time: Some(ts),
            ..new_test_result(test, ts)
        };
        attach_test(&mut report, test, result);
    }

    fn on_step(&self, ts: DateTime<Utc>, location: &Location, description: &str, detached: bool) {
        let (mut state, mut report) = self.lock();
        if !detached {
            close_current_step(&mut state, &mut report, location, ts);
        }
        let Some(steps) = node_steps(&mut report, location) else {
            warn!(location = %location, "step for unknown report node dropped");
            return;
        };
        steps.push(Step::new(description, ts));
        let index = steps.len() - 1;
        state
            .open_steps
            .entry(location.clone())
            .or_default()
            .push(OpenStep {
                index,
                description: description.to_owned(),
                detached,
            });
    }

    fn on_step_end(&self, ts: DateTime<Utc>, location: &Location, step: &str) {
        let (mut state, mut report) = self.lock();
        let position = state
            .open_steps
            .get(location)
            .and_then(|open| open.iter().rposition(|s| s.description == step));
        match position {
            Some(position) => close_step(&mut state, &mut report, location, position, ts),
            None => debug!(location = %location, step, "end of a step that is not open"),
        }
    }

    fn on_log(
        &self,
        ts: DateTime<Utc>,
        location: &Location,
        step: Option<&str>,
        level: LogLevel,
        message: &str,
    ) {
        self.add_entry(
            location,
            step,
            StepEntry::Log {
                time: ts,
                level,
                message: message.to_owned(),
            },
        );
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
        self.add_entry(
            location,
            step,
            StepEntry::Check {
                time: ts,
                description: description.to_owned(),
                outcome,
                details: details.map(str::to_owned),
            },
        );
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
        self.add_entry(
            location,
            step,
            StepEntry::Attachment {
                time: ts,
                description: description.to_owned(),
                path: path.to_owned(),
                as_image,
            },
        );
    }

    fn on_url(
        &self,
        ts: DateTime<Utc>,
        location: &Location,
        step: Option<&str>,
        url: &str,
        description: &str,
    ) {
        self.add_entry(
            location,
            step,
            StepEntry::Url {
                time: ts,
                description: description.to_owned(),
                url: url.to_owned(),
            },
        );
    }

    fn on_report_info(&self, _ts: DateTime<Utc>, name: &str, value: &str) {
        let mut report = self.report_guard();
        report.info.push((name.to_owned(), value.to_owned()));
    }
}
