//! 실행기 설정
//!
//! [`ZestConfig`]의 `[run]`/`[reporting]` 섹션에서 만들어집니다.

use std::path::PathBuf;

use zest_core::config::ZestConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// 리포트와 첨부 파일이 저장되는 디렉토리
    pub report_dir: PathBuf,
    /// 테스트가 실패하면 나머지 테스트를 건너뜀
    pub stop_on_failure: bool,
}

impl RunnerConfig {
    pub fn from_core(config: &ZestConfig) -> Self {
        Self {
            report_dir: PathBuf::from(&config.run.report_dir),
            stop_on_failure: config.run.stop_on_failure,
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::from_core(&ZestConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_core_copies_run_section() {
        let mut core = ZestConfig::default();
        core.run.report_dir = "out/reports".to_owned();
        core.run.stop_on_failure = true;

        let config = RunnerConfig::from_core(&core);
        assert_eq!(config.report_dir, PathBuf::from("out/reports"));
        assert!(config.stop_on_failure);
    }

    #[test]
    fn default_follows_core_default() {
        let config = RunnerConfig::default();
        assert_eq!(config.report_dir, PathBuf::from("report"));
        assert!(!config.stop_on_failure);
    }
}
