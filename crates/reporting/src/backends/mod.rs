//! 내장 리포팅 백엔드
//!
//! - `console`: 실행 중 진행 상황 출력 (세션)
//! - `json`: 리포트 저장/로드, 파일 세션
//! - `xml`: 리포트 저장/로드, 파일 세션
//! - `junit`: JUnit XML 저장, 파일 세션

pub mod console;
pub mod json;
pub mod junit;
pub mod xml;

use std::sync::Arc;

use tracing::warn;

use zest_core::config::ReportingConfig;
use zest_core::error::ZestError;

use crate::backend::{ReportingBackend, SaveMode};

pub use console::ConsoleBackend;
pub use json::JsonBackend;
pub use junit::JunitBackend;
pub use xml::XmlBackend;

/// 기본 설정의 모든 내장 백엔드
pub fn available_backends() -> Vec<Arc<dyn ReportingBackend>> {
    vec![
        Arc::new(ConsoleBackend::default()),
        Arc::new(JsonBackend::default()),
        Arc::new(XmlBackend::default()),
        Arc::new(JunitBackend::default()),
    ]
}

/// 설정에 나열된 순서대로 백엔드를 만듭니다.
///
/// 알 수 없는 이름은 경고 후 건너뜁니다 (설정 검증을 거쳤다면 발생하지 않음).
///
/// # Errors
///
/// 저장 모드 문자열이 잘못되었으면 에러를 반환합니다.
pub fn backends_from_config(
    config: &ReportingConfig,
) -> Result<Vec<Arc<dyn ReportingBackend>>, ZestError> {
    let save_mode: SaveMode = config.save_mode.parse()?;
    let mut backends: Vec<Arc<dyn ReportingBackend>> = Vec::new();
    for name in &config.backends {
        match name.as_str() {
            "console" => backends.push(Arc::new(ConsoleBackend::new())),
            "json" => backends.push(Arc::new(
                JsonBackend::new(save_mode).with_filename(&config.json_filename),
            )),
            "xml" => backends.push(Arc::new(
                XmlBackend::new(save_mode).with_filename(&config.xml_filename),
            )),
            "junit" => backends.push(Arc::new(
                JunitBackend::new(save_mode).with_filename(&config.junit_filename),
            )),
            other => warn!(backend = other, "unknown reporting backend, skipping"),
        }
    }
    Ok(backends)
}
