#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`runner`]: 실행 오케스트레이션 ([`Runner`], [`RunnerBuilder`])
//! - [`wiring`]: 이벤트 버스, 리포트 라이터, 리포팅 세션 연결
//! - [`config`]: 실행 설정 (core 설정에서 변환)
//! - [`error`]: 실행기 에러 타입

pub mod config;
pub mod error;
pub mod runner;
pub mod wiring;

pub use config::RunnerConfig;
pub use error::RunnerError;
pub use runner::{RunOutcome, Runner, RunnerBuilder};
pub use wiring::{ReportingWiring, wire_reporting};
