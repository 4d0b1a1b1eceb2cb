//! 실행기 전체 흐름 테스트: 스위트 트리 → 실행 → 리포트

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use zest_core::ZestError;
use zest_core::fixture::{FixtureDef, FixtureOutput, FixtureRegistry};
use zest_core::matching::equal_to;
use zest_core::suite::{Suite, Test, TestContext};
use zest_core::types::{Scope, TestStatus};
use zest_reporting::backends::json;
use zest_reporting::{JsonBackend, SaveMode, StepEntry, TestResult};
use zest_runner::{RunOutcome, Runner, RunnerBuilder, RunnerError};

fn noop(_: &TestContext) -> Result<(), ZestError> {
    Ok(())
}

fn run(builder: RunnerBuilder) -> (RunOutcome, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let outcome = builder
        .report_dir(dir.path())
        .build()
        .unwrap()
        .run()
        .unwrap();
    (outcome, dir)
}

fn check_outcomes(test: &TestResult) -> Vec<Option<bool>> {
    test.steps
        .iter()
        .flat_map(|s| &s.entries)
        .filter_map(|e| match e {
            StepEntry::Check { outcome, .. } => Some(*outcome),
            _ => None,
        })
        .collect()
}

fn error_messages(test: &TestResult) -> Vec<String> {
    test.steps
        .iter()
        .flat_map(|s| &s.entries)
        .filter_map(|e| match e {
            StepEntry::Log { message, .. } if e.is_failure() => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn failed_check_fails_the_test() {
    let suite = Suite::new("math").test(Test::new("equality", |ctx| {
        ctx.check_that("value", &1, equal_to(1))?;
        ctx.check_that("value", &1, equal_to(2))?;
        Ok(())
    }));
    let (outcome, _dir) = run(Runner::builder().suite(suite));

    let test = outcome.report.test("math.equality").unwrap();
    assert_eq!(test.status, Some(TestStatus::Failed));
    assert_eq!(check_outcomes(test), vec![Some(true), Some(false)]);
    assert!(!outcome.successful);
}

#[test]
fn suite_setup_with_passing_check_is_kept() {
    let suite = Suite::new("kept")
        .setup(|ctx| {
            ctx.check_that("setup value", &1, equal_to(1))?;
            Ok(())
        })
        .test(Test::new("t", noop));
    let (outcome, _dir) = run(Runner::builder().suite(suite));

    let setup = outcome.report.suite("kept").unwrap().suite_setup.as_ref().unwrap();
    assert_eq!(setup.outcome, Some(true));
    assert_eq!(setup.steps[0].description, "Setup suite");
    assert!(outcome.successful);
}

#[test]
fn empty_suite_setup_leaves_no_node() {
    let suite = Suite::new("empty").setup(noop).test(Test::new("t", noop));
    let (outcome, _dir) = run(Runner::builder().suite(suite));

    let suite = outcome.report.suite("empty").unwrap();
    assert!(suite.suite_setup.is_none());
    assert!(suite.suite_teardown.is_none());
}

#[test]
fn failed_suite_setup_skips_tests_and_sub_suites() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    let suite = Suite::new("broken")
        .setup(|ctx| {
            ctx.log_error("database unreachable")?;
            Ok(())
        })
        .test(Test::new("first", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
        .sub_suite(Suite::new("child").test(Test::new("second", noop)));
    let (outcome, _dir) = run(Runner::builder().suite(suite));

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    for path in ["broken.first", "broken.child.second"] {
        let test = outcome.report.test(path).unwrap();
        assert_eq!(test.status, Some(TestStatus::Skipped));
        assert_eq!(
            test.status_details.as_deref(),
            Some("Setup of suite 'broken' failed")
        );
    }
    let setup = outcome.report.suite("broken").unwrap().suite_setup.as_ref().unwrap();
    assert_eq!(setup.outcome, Some(false));
}

#[test]
fn panic_and_error_in_body_are_logged() {
    let suite = Suite::new("s")
        .test(Test::new("panics", |_| panic!("boom")))
        .test(Test::new("errors", |_| Err(ZestError::Failed("bad state".to_owned()))))
        .test(Test::new("after", noop));
    let (outcome, _dir) = run(Runner::builder().suite(suite));

    let panicked = outcome.report.test("s.panics").unwrap();
    assert_eq!(panicked.status, Some(TestStatus::Failed));
    assert!(error_messages(panicked)[0].contains("panicked: boom"));

    let errored = outcome.report.test("s.errors").unwrap();
    assert_eq!(errored.status, Some(TestStatus::Failed));
    assert!(error_messages(errored)[0].contains("bad state"));

    assert_eq!(
        outcome.report.test("s.after").unwrap().status,
        Some(TestStatus::Passed)
    );
}

#[test]
fn require_that_stops_the_body() {
    let reached = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&reached);
    let suite = Suite::new("s").test(Test::new("aborts", move |ctx| {
        ctx.require_that("status", &500, equal_to(200))?;
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }));
    let (outcome, _dir) = run(Runner::builder().suite(suite));

    assert_eq!(reached.load(Ordering::SeqCst), 0);
    let test = outcome.report.test("s.aborts").unwrap();
    assert_eq!(check_outcomes(test), vec![Some(false)]);
    assert!(error_messages(test)[0].contains("aborted"));
}

#[test]
fn disabled_and_stop_on_failure() {
    let suite = Suite::new("s")
        .test(Test::new("off", noop).disable("flaky on CI"))
        .test(Test::new("fails", |ctx| {
            ctx.log_error("nope")?;
            Ok(())
        }))
        .test(Test::new("never", noop));
    let (outcome, _dir) = run(Runner::builder().stop_on_failure(true).suite(suite));

    let off = outcome.report.test("s.off").unwrap();
    assert_eq!(off.status, Some(TestStatus::Disabled));
    assert_eq!(off.status_details.as_deref(), Some("flaky on CI"));
    assert_eq!(
        outcome.report.test("s.fails").unwrap().status,
        Some(TestStatus::Failed)
    );
    assert_eq!(
        outcome.report.test("s.never").unwrap().status,
        Some(TestStatus::Skipped)
    );
}

#[test]
fn fixtures_follow_their_scopes() {
    let session_runs = Arc::new(AtomicUsize::new(0));
    let test_runs = Arc::new(AtomicUsize::new(0));
    let teardowns = Arc::new(AtomicUsize::new(0));

    let mut registry = FixtureRegistry::new();
    let counter = Arc::clone(&session_runs);
    registry
        .add(FixtureDef::new("base_url", Scope::Session, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(FixtureOutput::value("http://localhost".to_owned()))
        }))
        .unwrap();
    let counter = Arc::clone(&test_runs);
    let torn = Arc::clone(&teardowns);
    registry
        .add(
            FixtureDef::new("client", Scope::Test, move |args| {
                counter.fetch_add(1, Ordering::SeqCst);
                let url = args.get::<String>("base_url")?;
                let torn = Arc::clone(&torn);
                Ok(FixtureOutput::with_teardown(format!("client for {url}"), move || {
                    torn.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }))
            })
            .param("base_url"),
        )
        .unwrap();

    let uses_client = |ctx: &TestContext| -> Result<(), ZestError> {
        let client = ctx.fixture::<String>("client")?;
        ctx.check_that("client", &*client, equal_to("client for http://localhost"))?;
        Ok(())
    };
    let suites = vec![
        Suite::new("a")
            .test(Test::new("one", uses_client).fixture("client"))
            .test(Test::new("two", uses_client).fixture("client")),
        Suite::new("b").test(Test::new("three", uses_client).fixture("client")),
    ];
    let (outcome, _dir) = run(Runner::builder().fixtures(registry).suites(suites));

    assert!(outcome.successful);
    assert_eq!(session_runs.load(Ordering::SeqCst), 1);
    assert_eq!(test_runs.load(Ordering::SeqCst), 3);
    assert_eq!(teardowns.load(Ordering::SeqCst), 3);
}

#[test]
fn failing_fixture_fails_the_test_only() {
    let mut registry = FixtureRegistry::new();
    registry
        .add(FixtureDef::new("broken", Scope::Test, |_| {
            Err(ZestError::Failed("cannot connect".to_owned()))
        }))
        .unwrap();
    let suite = Suite::new("s")
        .test(Test::new("needs_broken", noop).fixture("broken"))
        .test(Test::new("independent", noop));
    let (outcome, _dir) = run(Runner::builder().fixtures(registry).suite(suite));

    let failed = outcome.report.test("s.needs_broken").unwrap();
    assert_eq!(failed.status, Some(TestStatus::Failed));
    assert_eq!(failed.steps[0].description, "Setup test");
    assert!(error_messages(failed)[0].contains("cannot connect"));
    assert_eq!(
        outcome.report.test("s.independent").unwrap().status,
        Some(TestStatus::Passed)
    );
}

#[test]
fn fixtures_run_only_for_tests_that_use_them() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let mut registry = FixtureRegistry::new();
    registry
        .add(FixtureDef::new("unused", Scope::Test, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(FixtureOutput::value(()))
        }))
        .unwrap();
    let suite = Suite::new("s")
        .test(Test::new("first", noop))
        .test(Test::new("second", noop));
    let (outcome, _dir) = run(Runner::builder().fixtures(registry).suite(suite));

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(
        outcome.report.test("s.first").unwrap().status,
        Some(TestStatus::Passed)
    );
}

#[test]
fn session_fixture_of_disabled_test_is_not_run() {
    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let mut registry = FixtureRegistry::new();
    registry
        .add(FixtureDef::new("expensive", Scope::Session, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(FixtureOutput::value(()))
        }))
        .unwrap();
    let suite = Suite::new("s")
        .test(Test::new("skipped", noop).fixture("expensive").disable("later"))
        .test(Test::new("runs", noop));
    let (outcome, _dir) = run(Runner::builder().fixtures(registry).suite(suite));

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert_eq!(
        outcome.report.test("s.skipped").unwrap().status,
        Some(TestStatus::Disabled)
    );
    assert_eq!(
        outcome.report.test("s.runs").unwrap().status,
        Some(TestStatus::Passed)
    );
}

#[test]
fn test_hooks_land_in_setup_and_teardown_steps() {
    let suite = Suite::new("s")
        .setup_test(|ctx| {
            ctx.log_info("preparing")?;
            Ok(())
        })
        .teardown_test(|ctx| {
            ctx.log_info("cleaning")?;
            Ok(())
        })
        .test(Test::new("t", |ctx| {
            ctx.log_info("running")?;
            Ok(())
        }).description("The test"));
    let (outcome, _dir) = run(Runner::builder().suite(suite));

    let test = outcome.report.test("s.t").unwrap();
    let steps: Vec<_> = test.steps.iter().map(|s| s.description.as_str()).collect();
    assert_eq!(steps, vec!["Setup test", "The test", "Teardown test"]);
}

#[test]
fn session_fixture_failure_skips_everything() {
    let mut registry = FixtureRegistry::new();
    registry
        .add(FixtureDef::new("server", Scope::Session, |_| {
            Err(ZestError::Failed("port in use".to_owned()))
        }))
        .unwrap();
    let suite = Suite::new("s").test(Test::new("t", noop).fixture("server"));
    let (outcome, _dir) = run(Runner::builder().fixtures(registry).suite(suite));

    let setup = outcome.report.test_session_setup.as_ref().unwrap();
    assert_eq!(setup.outcome, Some(false));
    let test = outcome.report.test("s.t").unwrap();
    assert_eq!(test.status, Some(TestStatus::Skipped));
    assert_eq!(test.status_details.as_deref(), Some("Test session setup failed"));
}

#[test]
fn prerun_fixture_failure_aborts_the_run() {
    let mut registry = FixtureRegistry::new();
    registry
        .add(FixtureDef::new("license", Scope::SessionPrerun, |_| {
            Err(ZestError::Failed("expired".to_owned()))
        }))
        .unwrap();
    let suite = Suite::new("s").test(Test::new("t", noop).fixture("license"));
    let dir = tempfile::tempdir().unwrap();
    let err = Runner::builder()
        .report_dir(dir.path())
        .fixtures(registry)
        .suite(suite)
        .build()
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, RunnerError::Prerun(_)));
}

#[test]
fn json_session_writes_final_report() {
    let suite = Suite::new("s").test(Test::new("t", |ctx| {
        ctx.check_that("answer", &42, equal_to(42))?;
        Ok(())
    }));
    let (outcome, dir) = run(
        Runner::builder()
            .backend(Arc::new(JsonBackend::new(SaveMode::AtEndOfTests)))
            .suite(suite),
    );

    let saved = json::load(&dir.path().join("report.json")).unwrap();
    assert_eq!(saved, outcome.report);
}
