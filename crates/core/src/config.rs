//! 설정 관리: zest.toml 파싱 및 실행 설정
//!
//! [`ZestConfig`]는 러너와 리포팅 백엔드, CLI가 공유하는 최상위 설정입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`ZEST_RUN_REPORT_DIR=out` 형식)
//! 3. 설정 파일 (`zest.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), zest_core::error::ZestError> {
//! use zest_core::config::ZestConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = ZestConfig::load("zest.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = ZestConfig::parse("[run]\nstop_on_failure = true")?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, ZestError};

/// 사용 가능한 리포팅 백엔드 이름
pub const BACKEND_NAMES: &[&str] = &["console", "json", "xml", "junit"];

/// 사용 가능한 저장 시점 이름
pub const SAVE_MODES: &[&str] = &[
    "at_end_of_tests",
    "at_each_suite",
    "at_each_test",
    "at_each_failed_test",
    "at_each_event",
];

/// Zest 통합 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ZestConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 실행 설정
    #[serde(default)]
    pub run: RunConfig,
    /// 리포팅 설정
    #[serde(default)]
    pub reporting: ReportingConfig,
}

impl ZestConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ZestError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, ZestError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ZestError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                ZestError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, ZestError> {
        toml::from_str(toml_str).map_err(|e| {
            ZestError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `ZEST_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        override_string(&mut self.general.log_level, "ZEST_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "ZEST_GENERAL_LOG_FORMAT");

        override_string(&mut self.run.report_dir, "ZEST_RUN_REPORT_DIR");
        override_bool(&mut self.run.stop_on_failure, "ZEST_RUN_STOP_ON_FAILURE");

        override_csv(&mut self.reporting.backends, "ZEST_REPORTING_BACKENDS");
        override_string(&mut self.reporting.save_mode, "ZEST_REPORTING_SAVE_MODE");
        override_string(
            &mut self.reporting.json_filename,
            "ZEST_REPORTING_JSON_FILENAME",
        );
        override_string(&mut self.reporting.xml_filename, "ZEST_REPORTING_XML_FILENAME");
        override_string(
            &mut self.reporting.junit_filename,
            "ZEST_REPORTING_JUNIT_FILENAME",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), ZestError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".to_owned(),
                reason: format!("must be one of: {}", valid_levels.join(", ")),
            }
            .into());
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_format".to_owned(),
                reason: format!("must be one of: {}", valid_formats.join(", ")),
            }
            .into());
        }

        if self.run.report_dir.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "run.report_dir".to_owned(),
                reason: "report directory must not be empty".to_owned(),
            }
            .into());
        }

        if let Some(unknown) = self
            .reporting
            .backends
            .iter()
            .find(|b| !BACKEND_NAMES.contains(&b.as_str()))
        {
            return Err(ConfigError::InvalidValue {
                field: "reporting.backends".to_owned(),
                reason: format!(
                    "unknown backend '{unknown}', must be among: {}",
                    BACKEND_NAMES.join(", ")
                ),
            }
            .into());
        }

        if !SAVE_MODES.contains(&self.reporting.save_mode.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "reporting.save_mode".to_owned(),
                reason: format!("must be one of: {}", SAVE_MODES.join(", ")),
            }
            .into());
        }

        for (field, filename) in [
            ("reporting.json_filename", &self.reporting.json_filename),
            ("reporting.xml_filename", &self.reporting.xml_filename),
            ("reporting.junit_filename", &self.reporting.junit_filename),
        ] {
            if filename.is_empty() || filename.contains('/') {
                return Err(ConfigError::InvalidValue {
                    field: field.to_owned(),
                    reason: "must be a plain, non-empty file name".to_owned(),
                }
                .into());
            }
        }

        Ok(())
    }
}

/// 일반 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_owned(),
            log_format: "pretty".to_owned(),
        }
    }
}

/// 실행 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// 리포트와 첨부 파일이 저장될 디렉토리
    pub report_dir: String,
    /// 첫 실패 테스트 이후 나머지 테스트를 건너뛸지 여부
    pub stop_on_failure: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            report_dir: "report".to_owned(),
            stop_on_failure: false,
        }
    }
}

/// 리포팅 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// 활성화할 백엔드 (console, json, xml, junit)
    pub backends: Vec<String>,
    /// 파일 백엔드 저장 시점
    pub save_mode: String,
    /// JSON 리포트 파일 이름
    pub json_filename: String,
    /// XML 리포트 파일 이름
    pub xml_filename: String,
    /// JUnit 리포트 파일 이름
    pub junit_filename: String,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            backends: vec!["console".to_owned(), "json".to_owned()],
            save_mode: "at_each_failed_test".to_owned(),
            json_filename: "report.json".to_owned(),
            xml_filename: "report.xml".to_owned(),
            junit_filename: "report-junit.xml".to_owned(),
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_bool(target: &mut bool, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<bool>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse bool from env var, ignoring"
            ),
        }
    }
}

fn override_csv(target: &mut Vec<String>, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val
            .split(',')
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
            .collect();
    }
}
