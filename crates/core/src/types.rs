//! 도메인 타입: 시스템 전역에서 사용되는 공통 타입
//!
//! 픽스처 스코프, 실행 위치, 로그 레벨, 테스트 상태처럼
//! 런타임과 리포트가 함께 사용하는 데이터 구조를 정의합니다.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProgrammingError;

/// 픽스처 스코프
///
/// 결과가 한 번의 실행 동안 몇 번 계산되는지를 결정합니다.
/// `Ord` 구현으로 범위 비교가 가능합니다 (`Test < TestSuite < Session < SessionPrerun`).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// 테스트마다 새로 계산
    #[default]
    Test,
    /// 스위트마다 한 번
    #[serde(rename = "testsuite")]
    TestSuite,
    /// 세션 전체에서 한 번
    Session,
    /// 세션 시작 전, 리포트가 만들어지기 전에 한 번
    SessionPrerun,
}

impl Scope {
    /// 스코프의 수치 레벨을 반환합니다. 넓은 스코프일수록 큽니다.
    pub fn level(self) -> u8 {
        match self {
            Self::Test => 1,
            Self::TestSuite => 2,
            Self::Session => 3,
            Self::SessionPrerun => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::TestSuite => "testsuite",
            Self::Session => "session",
            Self::SessionPrerun => "session_prerun",
        }
    }
}

impl FromStr for Scope {
    type Err = ProgrammingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "test" => Ok(Self::Test),
            "testsuite" => Ok(Self::TestSuite),
            "session" => Ok(Self::Session),
            "session_prerun" => Ok(Self::SessionPrerun),
            other => Err(ProgrammingError::InvalidScope(other.to_owned())),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 로그 레벨
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// 테스트 최종 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    Disabled,
}

impl TestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 외부 링크 (URL + 선택적 표시 이름)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub name: Option<String>,
}

impl Link {
    pub fn new(url: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            url: url.into(),
            name: name.map(str::to_owned),
        }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.url),
            None => f.write_str(&self.url),
        }
    }
}

/// 실행 위치
///
/// 이벤트가 발생한 스위트/테스트/훅 트리 상의 위치를 나타냅니다.
/// 실패 추적과 스텝 연결의 키로 사용되며 스레드마다 하나씩 활성화됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Location {
    /// 테스트 본문 (테스트 경로)
    Test(String),
    /// 스위트 setup (스위트 경로)
    SuiteSetup(String),
    /// 스위트 teardown (스위트 경로)
    SuiteTeardown(String),
    /// 세션 setup
    TestSessionSetup,
    /// 세션 teardown
    TestSessionTeardown,
}

impl Location {
    /// 위치가 가리키는 스위트 또는 테스트 경로를 반환합니다.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Test(path) | Self::SuiteSetup(path) | Self::SuiteTeardown(path) => Some(path),
            Self::TestSessionSetup | Self::TestSessionTeardown => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Test(path) => write!(f, "test {path}"),
            Self::SuiteSetup(path) => write!(f, "setup of suite {path}"),
            Self::SuiteTeardown(path) => write!(f, "teardown of suite {path}"),
            Self::TestSessionSetup => write!(f, "test session setup"),
            Self::TestSessionTeardown => write!(f, "test session teardown"),
        }
    }
}

/// 스위트 정적 메타데이터 스냅샷
///
/// 이벤트에 실려 리포트 라이터와 세션 백엔드로 전달됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteInfo {
    /// 점으로 연결된 전체 경로
    pub path: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub links: Vec<Link>,
    /// 상위 스위트 경로 (최상위면 `None`)
    pub parent_path: Option<String>,
}

/// 테스트 정적 메타데이터 스냅샷
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestInfo {
    pub path: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub links: Vec<Link>,
    /// 테스트를 소유한 스위트 경로
    pub suite_path: String,
}

impl TestInfo {
    pub fn location(&self) -> Location {
        Location::Test(self.path.clone())
    }
}

/// 상위 경로와 이름을 점으로 연결합니다.
pub fn join_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{parent}.{name}"),
        _ => name.to_owned(),
    }
}
