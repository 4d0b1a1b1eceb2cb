#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`report`]: 리포트 트리와 통계
//! - [`writer`]: 이벤트를 리포트로 조립하는 리스너
//! - [`backend`]: 백엔드 trait, 기능 비트, 저장/로드 헬퍼, 파일 세션
//! - [`backends`]: console, json, xml, junit 구현
//! - [`replay`]: 리포트를 이벤트로 재생
//!
//! # 데이터 흐름
//!
//! ```text
//! Runtime/Runner -> EventBus -> ReportWriter -> SharedReport
//!                       |                            |
//!                       +-> reporting sessions <-----+ (읽기)
//! ```

pub mod backend;
pub mod backends;
pub mod replay;
pub mod report;
pub mod writer;

// --- 주요 타입 re-export ---

// 리포트
pub use report::{
    HookResult, Report, ReportStats, SharedReport, Step, StepEntry, SuiteResult, TestResult,
    humanize_duration,
};

// 라이터 / 재생
pub use replay::replay_report_events;
pub use writer::ReportWriter;

// 백엔드
pub use backend::{
    BoundReport, Capabilities, FileReportSession, ReportingBackend, SaveMode,
    filter_available_backends, filter_backends_by_capabilities, load_report,
    load_report_from_file, load_reports_from_dir, save_report,
};
pub use backends::{
    ConsoleBackend, JsonBackend, JunitBackend, XmlBackend, available_backends,
    backends_from_config,
};
