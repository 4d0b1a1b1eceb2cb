//! 메트릭 상수 및 설명 등록
//!
//! 실행 중 집계되는 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 레코더가 설치되지 않았으면 모든 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `zest_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)
//!
//! # 사용 예시
//!
//! ```ignore
//! use zest_core::metrics as m;
//!
//! metrics::counter!(m::CHECKS_TOTAL, m::LABEL_OUTCOME => "passed").increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 이벤트 종류 레이블 키
pub const LABEL_EVENT_TYPE: &str = "event_type";

/// 테스트 상태 레이블 키 (passed, failed, skipped, disabled)
pub const LABEL_STATUS: &str = "status";

/// 체크 결과 레이블 키 (passed, failed, info)
pub const LABEL_OUTCOME: &str = "outcome";

/// 픽스처 스코프 레이블 키
pub const LABEL_SCOPE: &str = "scope";

/// 로그 레벨 레이블 키
pub const LABEL_LEVEL: &str = "level";

// ─── 메트릭 이름 ───────────────────────────────────────────────────

/// 발행된 이벤트 수
pub const EVENTS_FIRED_TOTAL: &str = "zest_events_fired_total";

/// 상태별 테스트 수
pub const TESTS_TOTAL: &str = "zest_tests_total";

/// 결과별 체크 수
pub const CHECKS_TOTAL: &str = "zest_checks_total";

/// 레벨별 로그 수
pub const LOGS_TOTAL: &str = "zest_logs_total";

/// 저장된 첨부 파일 수
pub const ATTACHMENTS_TOTAL: &str = "zest_attachments_total";

/// 스코프별 픽스처 실행 수
pub const FIXTURES_EXECUTED_TOTAL: &str = "zest_fixtures_executed_total";

/// 픽스처 setup/teardown 에러 수
pub const FIXTURE_ERRORS_TOTAL: &str = "zest_fixture_errors_total";

/// 리포트 저장 횟수
pub const REPORT_SAVES_TOTAL: &str = "zest_report_saves_total";

/// 테스트 본문 실행 시간
pub const TEST_DURATION_SECONDS: &str = "zest_test_duration_seconds";

/// 모든 메트릭의 설명을 등록합니다.
///
/// 레코더 설치 직후 한 번 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_histogram};

    describe_counter!(EVENTS_FIRED_TOTAL, "Total events fired on the event bus");
    describe_counter!(TESTS_TOTAL, "Total tests finished, labelled by status");
    describe_counter!(CHECKS_TOTAL, "Total checks logged, labelled by outcome");
    describe_counter!(LOGS_TOTAL, "Total log entries, labelled by level");
    describe_counter!(ATTACHMENTS_TOTAL, "Total attachments written to disk");
    describe_counter!(
        FIXTURES_EXECUTED_TOTAL,
        "Total fixture executions, labelled by scope"
    );
    describe_counter!(
        FIXTURE_ERRORS_TOTAL,
        "Total fixture setup or teardown failures"
    );
    describe_counter!(REPORT_SAVES_TOTAL, "Total report checkpoints saved");
    describe_histogram!(
        TEST_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Wall-clock duration of test bodies"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_METRIC_NAMES: &[&str] = &[
        EVENTS_FIRED_TOTAL,
        TESTS_TOTAL,
        CHECKS_TOTAL,
        LOGS_TOTAL,
        ATTACHMENTS_TOTAL,
        FIXTURES_EXECUTED_TOTAL,
        FIXTURE_ERRORS_TOTAL,
        REPORT_SAVES_TOTAL,
        TEST_DURATION_SECONDS,
    ];

    #[test]
    fn all_metrics_start_with_zest_prefix() {
        for name in ALL_METRIC_NAMES {
            assert!(
                name.starts_with("zest_"),
                "Metric '{}' does not start with 'zest_' prefix",
                name
            );
        }
    }

    #[test]
    fn counters_end_with_total() {
        for name in ALL_METRIC_NAMES.iter().filter(|n| **n != TEST_DURATION_SECONDS) {
            assert!(name.ends_with("_total"), "{name}");
        }
    }

    #[test]
    fn describe_all_does_not_panic() {
        describe_all();
    }

    #[test]
    fn label_keys_are_lowercase() {
        for key in [
            LABEL_EVENT_TYPE,
            LABEL_STATUS,
            LABEL_OUTCOME,
            LABEL_SCOPE,
            LABEL_LEVEL,
        ] {
            assert_eq!(key, key.to_lowercase());
        }
    }
}
