//! 실행기 에러 타입
//!
//! 실행 전 단계(검증, 리포트 디렉토리, 백엔드 연결, prerun 픽스처)의 실패만
//! 에러로 전파됩니다. 테스트와 훅의 실패는 리포트에 기록되고 실행은 계속됩니다.

use zest_core::error::{FixtureError, ZestError};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// 픽스처 그래프, 픽스처 사용, 메타데이터 정책 검증 실패
    #[error("validation failed: {0}")]
    Validation(#[source] ZestError),

    /// 리포트 디렉토리를 만들 수 없음
    #[error("report directory error: {path}: {reason}")]
    ReportDir { path: String, reason: String },

    /// 이벤트 버스나 리포팅 세션 연결 실패
    #[error("reporting setup failed: {0}")]
    Reporting(#[source] ZestError),

    /// 리포트가 만들어지기 전에 실행되는 픽스처 실패
    #[error("session prerun fixture failed: {0}")]
    Prerun(#[source] FixtureError),

    /// 실행 도중 이벤트를 발행할 수 없음
    #[error("event dispatch failed: {0}")]
    Dispatch(#[source] ZestError),
}

impl From<RunnerError> for ZestError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Validation(e) | RunnerError::Reporting(e) | RunnerError::Dispatch(e) => e,
            RunnerError::Prerun(e) => ZestError::Fixture(e),
            RunnerError::ReportDir { path, reason } => {
                ZestError::Io(std::io::Error::other(format!("{path}: {reason}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prerun_error_maps_to_fixture_error() {
        let err = RunnerError::Prerun(FixtureError::NotExecuted {
            name: "db".to_owned(),
        });
        assert!(err.to_string().contains("session prerun fixture failed"));
        assert!(matches!(ZestError::from(err), ZestError::Fixture(_)));
    }

    #[test]
    fn report_dir_error_maps_to_io() {
        let err = RunnerError::ReportDir {
            path: "/nope".to_owned(),
            reason: "denied".to_owned(),
        };
        assert!(matches!(ZestError::from(err), ZestError::Io(_)));
    }
}
