//! 라이터로 만든 리포트가 JSON/XML 저장·로드와 이벤트 재생을 거쳐도 그대로인지 검증

use std::sync::Arc;

use zest_core::bus::EventBus;
use zest_core::event::EventKind;
use zest_core::matching::equal_to;
use zest_core::runtime::Runtime;
use zest_core::suite::{Suite, Test, TestContext};
use zest_core::types::{Location, TestStatus};
use zest_core::ZestError;
use zest_reporting::backends::{json, xml};
use zest_reporting::{Report, ReportWriter, StepEntry, available_backends, load_report, replay_report_events};

fn noop(_: &TestContext) -> Result<(), zest_core::ZestError> {
    Ok(())
}

/// 세션 setup, 실패한 테스트 하나, 건너뛴 테스트 하나로 이루어진 리포트
fn record_session() -> Result<Report, ZestError> {
    let bus = Arc::new(EventBus::new());
    let writer = ReportWriter::install(&bus)?;
    let dir = tempfile::tempdir()?;
    let rt = Runtime::new(Arc::clone(&bus), dir.path());

    let suite = Suite::new("math")
        .description("Math")
        .tag("smoke")
        .property("owner", "qa")
        .test(Test::new("equality", noop).description("Equality"))
        .test(Test::new("later", noop));
    let suite_info = Arc::new(suite.info(None));
    let test_info = Arc::new(suite.tests[0].info(&suite_info.path));
    let skipped_info = Arc::new(suite.tests[1].info(&suite_info.path));

    rt.emit(EventKind::TestSessionStart)?;
    rt.add_report_info("environment", "ci")?;

    rt.emit(EventKind::TestSessionSetupStart)?;
    rt.set_location(Location::TestSessionSetup);
    rt.check_that("setup value", &1, equal_to(1))?;
    rt.emit(EventKind::TestSessionSetupEnd)?;

    rt.emit(EventKind::SuiteStart {
        suite: Arc::clone(&suite_info),
    })?;
    rt.emit(EventKind::TestStart {
        test: Arc::clone(&test_info),
    })?;
    rt.set_location(test_info.location());
    rt.set_step("Compare values", false)?;
    rt.check_that("value", &1, equal_to(1))?;
    rt.check_that("value", &1, equal_to(2))?;
    rt.log_url("https://example.com/build/1", Some("build"))?;
    rt.set_step("Clean up", false)?;
    rt.log_info("nothing to do")?;
    rt.emit(EventKind::TestEnd {
        test: Arc::clone(&test_info),
    })?;
    rt.emit(EventKind::TestSkipped {
        test: skipped_info,
        reason: "depends on network".to_owned(),
    })?;
    rt.emit(EventKind::SuiteEnd { suite: suite_info })?;
    rt.emit(EventKind::TestSessionEnd)?;
    rt.leave_thread();

    let report = writer.report().lock().unwrap().clone();
    Ok(report)
}

#[test]
fn writer_builds_expected_tree() {
    let report = record_session().unwrap();

    let setup = report.test_session_setup.as_ref().unwrap();
    assert_eq!(setup.outcome, Some(true));
    assert_eq!(setup.steps[0].description, "Setup test session");

    let test = report.test("math.equality").unwrap();
    assert_eq!(test.status, Some(TestStatus::Failed));
    let outcomes: Vec<_> = test.steps[0]
        .entries
        .iter()
        .filter_map(|e| match e {
            StepEntry::Check { outcome, .. } => Some(*outcome),
            _ => None,
        })
        .collect();
    assert_eq!(outcomes, vec![Some(true), Some(false)]);
    assert_eq!(test.steps.len(), 2);

    let skipped = report.test("math.later").unwrap();
    assert_eq!(skipped.status, Some(TestStatus::Skipped));
    assert_eq!(skipped.status_details.as_deref(), Some("depends on network"));

    assert_eq!(report.info, vec![("environment".to_owned(), "ci".to_owned())]);
    assert!(!report.is_successful());
}

#[test]
fn json_save_then_load_is_identical() {
    let report = record_session().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.json");
    json::save(&path, &report).unwrap();

    let loaded = load_report(&path, &available_backends()).unwrap();
    assert!(loaded.is_bound());
    assert_eq!(loaded.backend().map(|b| b.name().to_owned()).as_deref(), Some("json"));
    assert_eq!(*loaded, report);

    let from_dir = load_report(dir.path(), &available_backends()).unwrap();
    assert_eq!(from_dir.into_report(), report);
}

#[test]
fn xml_save_then_load_is_identical() {
    let report = record_session().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xml");
    xml::save(&path, &report).unwrap();

    let loaded = load_report(&path, &available_backends()).unwrap();
    assert_eq!(loaded.backend().map(|b| b.name().to_owned()).as_deref(), Some("xml"));
    assert_eq!(*loaded, report);
}

#[test]
fn replay_rebuilds_the_same_report() {
    let report = record_session().unwrap();

    let bus = EventBus::new();
    let writer = ReportWriter::install(&bus).unwrap();
    replay_report_events(&report, &bus).unwrap();

    let rebuilt = writer.report().lock().unwrap().clone();
    assert_eq!(rebuilt, report);
}

#[test]
fn load_rejects_non_report_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "not a report").unwrap();

    assert!(load_report(&path, &available_backends()).is_err());
    assert!(load_report(dir.path(), &available_backends()).is_err());
}
