//! 저장된 리포트를 이벤트 스트림으로 재생
//!
//! 리포트 트리를 실행 순서대로 순회하며 원래 타임스탬프로 이벤트를 발행합니다.
//! 재생 결과를 [`ReportWriter`](crate::writer::ReportWriter)로 받으면
//! 원본과 같은 리포트가 다시 만들어집니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use zest_core::bus::EventBus;
use zest_core::error::EventError;
use zest_core::event::{Event, EventKind};
use zest_core::types::{Location, SuiteInfo, TestInfo, TestStatus, join_path};

use crate::report::{HookResult, Report, Step, StepEntry, SuiteResult, TestResult};

/// 리포트의 모든 이벤트를 버스로 다시 발행합니다.
///
/// 진행 중이던 리포트(종료 시각 없음)는 해당 종료 이벤트 없이 재생됩니다.
///
/// # Errors
///
/// 버스에 등록되지 않은 이벤트 종류가 있으면 에러를 반환합니다.
pub fn replay_report_events(report: &Report, bus: &EventBus) -> Result<(), EventError> {
    let start = report.start_time.unwrap_or_else(Utc::now);
    bus.fire(&Event::at(start, EventKind::TestSessionStart))?;
    for (name, value) in &report.info {
        bus.fire(&Event::at(
            start,
            EventKind::ReportInfo {
                name: name.clone(),
                value: value.clone(),
            },
        ))?;
    }

    if let Some(hook) = &report.test_session_setup {
        replay_hook(
            bus,
            hook,
            &Location::TestSessionSetup,
            EventKind::TestSessionSetupStart,
            EventKind::TestSessionSetupEnd,
        )?;
    }

    for suite in &report.suites {
        replay_suite(bus, suite, None, start)?;
    }

    if let Some(hook) = &report.test_session_teardown {
        replay_hook(
            bus,
            hook,
            &Location::TestSessionTeardown,
            EventKind::TestSessionTeardownStart,
            EventKind::TestSessionTeardownEnd,
        )?;
    }

    if let Some(end) = report.end_time {
        bus.fire(&Event::at(end, EventKind::TestSessionEnd))?;
    }
    Ok(())
}

fn replay_suite(
    bus: &EventBus,
    suite: &SuiteResult,
    parent_path: Option<&str>,
    fallback_start: DateTime<Utc>,
) -> Result<(), EventError> {
    let info = Arc::new(suite_info(suite, parent_path));
    let start = suite.start_time.unwrap_or(fallback_start);
    bus.fire(&Event::at(
        start,
        EventKind::SuiteStart {
            suite: Arc::clone(&info),
        },
    ))?;

    if let Some(hook) = &suite.suite_setup {
        replay_hook(
            bus,
            hook,
            &Location::SuiteSetup(info.path.clone()),
            EventKind::SuiteSetupStart {
                suite: Arc::clone(&info),
            },
            EventKind::SuiteSetupEnd {
                suite: Arc::clone(&info),
            },
        )?;
    }

    for test in &suite.tests {
        replay_test(bus, test, &info.path)?;
    }
    for sub in &suite.suites {
        replay_suite(bus, sub, Some(&info.path), start)?;
    }

    if let Some(hook) = &suite.suite_teardown {
        replay_hook(
            bus,
            hook,
            &Location::SuiteTeardown(info.path.clone()),
            EventKind::SuiteTeardownStart {
                suite: Arc::clone(&info),
            },
            EventKind::SuiteTeardownEnd {
                suite: Arc::clone(&info),
            },
        )?;
    }

    if let Some(end) = suite.end_time {
        bus.fire(&Event::at(end, EventKind::SuiteEnd { suite: info }))?;
    }
    Ok(())
}

fn replay_test(bus: &EventBus, test: &TestResult, suite_path: &str) -> Result<(), EventError> {
    let info = Arc::new(test_info(test, suite_path));
    let reason = test.status_details.clone().unwrap_or_default();
    match test.status {
        Some(TestStatus::Skipped) => bus.fire(&Event::at(
            test.start_time,
            EventKind::TestSkipped { test: info, reason },
        )),
        Some(TestStatus::Disabled) => bus.fire(&Event::at(
            test.start_time,
            EventKind::TestDisabled { test: info, reason },
        )),
        Some(TestStatus::Passed | TestStatus::Failed) | None => {
            bus.fire(&Event::at(
                test.start_time,
                EventKind::TestStart {
                    test: Arc::clone(&info),
                },
            ))?;
            replay_steps(bus, &info.location(), &test.steps)?;
            if let Some(end) = test.end_time {
                bus.fire(&Event::at(end, EventKind::TestEnd { test: info }))?;
            }
            Ok(())
        }
    }
}

fn replay_hook(
    bus: &EventBus,
    hook: &HookResult,
    location: &Location,
    start: EventKind,
    end: EventKind,
) -> Result<(), EventError> {
    bus.fire(&Event::at(hook.start_time, start))?;
    replay_steps(bus, location, &hook.steps)?;
    if let Some(end_time) = hook.end_time {
        bus.fire(&Event::at(end_time, end))?;
    }
    Ok(())
}

fn replay_steps(bus: &EventBus, location: &Location, steps: &[Step]) -> Result<(), EventError> {
    for step in steps {
        bus.fire(&Event::at(
            step.start_time,
            EventKind::Step {
                location: location.clone(),
                description: step.description.clone(),
                detached: false,
            },
        ))?;
        for entry in &step.entries {
            bus.fire(&Event::at(entry.time(), entry_event(location, step, entry)))?;
        }
        if let Some(end) = step.end_time {
            bus.fire(&Event::at(
                end,
                EventKind::StepEnd {
                    location: location.clone(),
                    step: step.description.clone(),
                },
            ))?;
        }
    }
    Ok(())
}

fn entry_event(location: &Location, step: &Step, entry: &StepEntry) -> EventKind {
    let location = location.clone();
    let step = Some(step.description.clone());
    match entry {
        StepEntry::Log { level, message, .. } => EventKind::Log {
            location,
            step,
            level: *level,
            message: message.clone(),
        },
        StepEntry::Check {
            description,
            outcome,
            details,
            ..
        } => EventKind::Check {
            location,
            step,
            description: description.clone(),
            outcome: *outcome,
            details: details.clone(),
        },
        StepEntry::Attachment {
            description,
            path,
            as_image,
            ..
        } => EventKind::Attachment {
            location,
            step,
            path: path.clone(),
            description: description.clone(),
            as_image: *as_image,
        },
        StepEntry::Url {
            description, url, ..
        } => EventKind::Url {
            location,
            step,
            url: url.clone(),
            description: description.clone(),
        },
    }
}

fn suite_info(suite: &SuiteResult, parent_path: Option<&str>) -> SuiteInfo {
    SuiteInfo {
        path: join_path(parent_path, &suite.name),
        name: suite.name.clone(),
        description: suite.description.clone(),
        tags: suite.tags.clone(),
        properties: suite.properties.clone(),
        links: suite.links.clone(),
        parent_path: parent_path.map(str::to_owned),
    }
}

fn test_info(test: &TestResult, suite_path: &str) -> TestInfo {
    TestInfo {
        path: join_path(Some(suite_path), &test.name),
        name: test.name.clone(),
        description: test.description.clone(),
        tags: test.tags.clone(),
        properties: test.properties.clone(),
        links: test.links.clone(),
        suite_path: suite_path.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use zest_core::event::EventType;

    #[test]
    fn replay_order_follows_tree() {
        let ts = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let report = Report {
            start_time: Some(ts),
            end_time: Some(ts),
            info: vec![("env".to_owned(), "ci".to_owned())],
            suites: vec![SuiteResult {
                name: "s".to_owned(),
                description: "S".to_owned(),
                tags: Vec::new(),
                properties: Default::default(),
                links: Vec::new(),
                start_time: Some(ts),
                end_time: Some(ts),
                suite_setup: None,
                suite_teardown: None,
                tests: Vec::new(),
                suites: Vec::new(),
            }],
            ..Report::new()
        };

        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for event_type in EventType::ALL {
            let seen = Arc::clone(&seen);
            bus.subscribe(
                event_type,
                Arc::new(move |e: &Event| seen.lock().unwrap().push(e.event_type())),
            )
            .unwrap();
        }
        replay_report_events(&report, &bus).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                EventType::TestSessionStart,
                EventType::ReportInfo,
                EventType::SuiteStart,
                EventType::SuiteEnd,
                EventType::TestSessionEnd,
            ]
        );
    }
}
