//! zest.toml 통합 설정 테스트
//!
//! - zest.toml.example 파싱 테스트
//! - 부분 설정 (일부 섹션만) 로딩 테스트
//! - 환경변수 우선순위 테스트
//! - 빈 파일 / 잘못된 형식 에러 테스트

use std::io::Write;

use zest_core::config::ZestConfig;
use zest_core::error::{ConfigError, ZestError};

// =============================================================================
// zest.toml.example 파싱 테스트
// =============================================================================

#[test]
fn example_config_parses_successfully() {
    let content = include_str!("../../../zest.toml.example");
    let config = ZestConfig::parse(content).expect("example config should parse");

    assert_eq!(config.general.log_level, "warn");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.run.report_dir, "report");
}

#[test]
fn example_config_passes_validation() {
    let content = include_str!("../../../zest.toml.example");
    let config = ZestConfig::parse(content).expect("should parse");
    config
        .validate()
        .expect("example config should pass validation");
}

#[test]
fn example_config_matches_code_defaults() {
    let content = include_str!("../../../zest.toml.example");
    let config = ZestConfig::parse(content).expect("should parse");
    assert_eq!(config, ZestConfig::default());
}

// =============================================================================
// 부분 설정 테스트
// =============================================================================

#[test]
fn partial_config_general_only() {
    let config = ZestConfig::parse(
        r#"
[general]
log_level = "debug"
"#,
    )
    .expect("should parse");

    assert_eq!(config.general.log_level, "debug");
    assert_eq!(config.general.log_format, "pretty");
    assert_eq!(config.reporting.save_mode, "at_each_failed_test");
}

#[test]
fn partial_config_reporting_only() {
    let config = ZestConfig::parse(
        r#"
[reporting]
backends = ["junit"]
save_mode = "at_each_event"
junit_filename = "results.xml"
"#,
    )
    .expect("should parse");

    assert_eq!(config.reporting.backends, vec!["junit"]);
    assert_eq!(config.reporting.save_mode, "at_each_event");
    assert_eq!(config.reporting.junit_filename, "results.xml");
    assert_eq!(config.reporting.json_filename, "report.json");
    config.validate().expect("should be valid");
}

#[test]
fn unknown_backend_fails_validation() {
    let config = ZestConfig::parse(
        r#"
[reporting]
backends = ["console", "html"]
"#,
    )
    .expect("should parse");

    let err = config.validate().unwrap_err();
    assert!(matches!(
        err,
        ZestError::Config(ConfigError::InvalidValue { ref field, .. }) if field == "reporting.backends"
    ));
}

#[test]
fn wrong_type_is_parse_error() {
    let err = ZestConfig::parse("[run]\nstop_on_failure = \"yes please\"").unwrap_err();
    assert!(matches!(
        err,
        ZestError::Config(ConfigError::ParseFailed { .. })
    ));
}

// =============================================================================
// 파일 로딩 / 환경변수 우선순위 테스트
// =============================================================================

#[tokio::test]
#[serial_test::serial]
async fn load_reads_file_and_validates() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[run]\nreport_dir = \"out\"").expect("write");

    let config = ZestConfig::load(file.path()).await.expect("should load");
    assert_eq!(config.run.report_dir, "out");
}

#[tokio::test]
#[serial_test::serial]
async fn load_rejects_invalid_values() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "[reporting]\nsave_mode = \"never\"").expect("write");

    let err = ZestConfig::load(file.path()).await.unwrap_err();
    assert!(matches!(
        err,
        ZestError::Config(ConfigError::InvalidValue { .. })
    ));
}

#[test]
#[serial_test::serial]
fn env_override_takes_precedence_over_toml() {
    let mut config = ZestConfig::parse("[general]\nlog_level = \"debug\"").expect("should parse");
    let original = std::env::var("ZEST_GENERAL_LOG_LEVEL").ok();
    // SAFETY: serial 테스트로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("ZEST_GENERAL_LOG_LEVEL", "error");
    }

    config.apply_env_overrides();

    // SAFETY: 테스트 정리
    unsafe {
        match original {
            Some(val) => std::env::set_var("ZEST_GENERAL_LOG_LEVEL", val),
            None => std::env::remove_var("ZEST_GENERAL_LOG_LEVEL"),
        }
    }
    assert_eq!(config.general.log_level, "error");
}

#[test]
#[serial_test::serial]
fn env_override_save_mode_and_filenames() {
    let mut config = ZestConfig::default();
    // SAFETY: serial 테스트로 직렬화되어 환경변수 조작이 안전합니다.
    unsafe {
        std::env::set_var("ZEST_REPORTING_SAVE_MODE", "at_end_of_tests");
        std::env::set_var("ZEST_REPORTING_JSON_FILENAME", "out.json");
    }

    config.apply_env_overrides();

    // SAFETY: 테스트 정리
    unsafe {
        std::env::remove_var("ZEST_REPORTING_SAVE_MODE");
        std::env::remove_var("ZEST_REPORTING_JSON_FILENAME");
    }
    assert_eq!(config.reporting.save_mode, "at_end_of_tests");
    assert_eq!(config.reporting.json_filename, "out.json");
    config.validate().expect("should stay valid");
}
