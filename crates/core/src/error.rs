//! 에러 타입: 도메인별 에러 정의

/// Zest 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum ZestError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 픽스처 그래프 및 실행 에러
    #[error("fixture error: {0}")]
    Fixture(#[from] FixtureError),

    /// 메타데이터 정책 위반
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// 작성자 실수로 인한 프로그래밍 에러
    #[error("programming error: {0}")]
    Programming(#[from] ProgrammingError),

    /// 이벤트 버스 에러
    #[error("event error: {0}")]
    Event(#[from] EventError),

    /// 리포트 저장/로드 에러
    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// `require_that` 실패로 테스트 본문이 중단됨
    #[error("aborted: {0}")]
    Abort(String),

    /// 테스트 본문이 반환한 임의의 에러
    #[error("{0}")]
    Failed(String),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZestError {
    /// 테스트 본문에서 사용할 일반 실패 에러를 생성합니다.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 픽스처 그래프 및 실행 에러
#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    /// 내장 픽스처 이름과 충돌
    #[error("'{name}' is a builtin fixture name")]
    NamingConflict { name: String },

    /// 예약된 이름 사용
    #[error("fixture name '{name}' is forbidden")]
    ForbiddenName { name: String },

    /// 알 수 없는 픽스처
    #[error("unknown fixture '{name}'")]
    UnknownFixture { name: String },

    /// 의존성으로 선언된 픽스처가 없음
    #[error("fixture '{fixture}' used by fixture '{dependent}' does not exist")]
    MissingDependency { fixture: String, dependent: String },

    /// 순환 의존성
    #[error("fixture '{requester}' has a circular dependency on fixture '{dependency}'")]
    CircularDependency {
        requester: String,
        dependency: String,
    },

    /// 스코프 호환 불가
    #[error(
        "fixture '{fixture}' with scope '{scope}' is incompatible with scope '{dependency_scope}' of fixture '{dependency}'"
    )]
    ScopeMismatch {
        fixture: String,
        scope: String,
        dependency: String,
        dependency_scope: String,
    },

    /// 테스트가 알 수 없는 픽스처를 사용
    #[error("unknown fixture '{fixture}' used in test '{test}'")]
    UnknownFixtureInTest { fixture: String, test: String },

    /// 실행되지 않은 픽스처에 대한 접근 또는 teardown
    #[error("fixture '{name}' has not been executed")]
    NotExecuted { name: String },

    /// 픽스처 setup 실패
    #[error("fixture '{name}' setup failed: {reason}")]
    SetupFailed { name: String, reason: String },

    /// 픽스처 teardown 실패
    #[error("fixture '{name}' teardown failed: {reason}")]
    TeardownFailed { name: String, reason: String },

    /// 픽스처 결과의 타입 불일치
    #[error("fixture '{name}' does not hold a value of type {expected}")]
    TypeMismatch { name: String, expected: String },
}

/// 메타데이터 정책 위반
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// 정책에 없는 속성
    #[error("cannot load {target} '{path}', the property '{property}' is not supported")]
    UnknownProperty {
        target: String,
        path: String,
        property: String,
    },

    /// 대상 종류에서 허용되지 않는 속성
    #[error("cannot load {target} '{path}', the property '{property}' is not accepted on a {target}")]
    ForbiddenProperty {
        target: String,
        path: String,
        property: String,
    },

    /// 필수 속성 누락
    #[error("cannot load {target} '{path}', the property '{property}' is missing")]
    MissingProperty {
        target: String,
        path: String,
        property: String,
    },

    /// 허용되지 않는 속성 값
    #[error(
        "cannot load {target} '{path}', value '{value}' of property '{property}' is not among the accepted values: {accepted}"
    )]
    InvalidPropertyValue {
        target: String,
        path: String,
        property: String,
        value: String,
        accepted: String,
    },

    /// 정책에 없는 태그
    #[error("cannot load {target} '{path}', the tag '{tag}' is not supported")]
    UnknownTag {
        target: String,
        path: String,
        tag: String,
    },

    /// 대상 종류에서 허용되지 않는 태그
    #[error("cannot load {target} '{path}', the tag '{tag}' is not accepted on a {target}")]
    ForbiddenTag {
        target: String,
        path: String,
        tag: String,
    },
}

/// 작성자 실수로 인한 프로그래밍 에러
#[derive(Debug, thiserror::Error)]
pub enum ProgrammingError {
    /// 잘못된 스코프 문자열
    #[error("invalid fixture scope '{0}'")]
    InvalidScope(String),

    /// 백엔드가 지원하지 않는 연산
    #[error("backend '{backend}' does not support {operation}")]
    UnsupportedCapability { backend: String, operation: String },

    /// 런타임이 초기화되지 않음
    #[error("runtime is not initialized")]
    RuntimeNotInitialized,

    /// 현재 스레드에 위치가 설정되지 않음
    #[error("no location is set for the current thread")]
    NoLocation,

    /// 테스트와 스위트 어디에도 적용되지 않는 규칙
    #[error("rule '{0}' must apply to tests, suites or both")]
    InvalidRuleTarget(String),
}

/// 이벤트 버스 에러
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// 등록되지 않은 이벤트 종류
    #[error("unknown event type '{0}'")]
    UnknownEventType(String),
}

/// 리포트 저장/로드 에러
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// 손상되었거나 해석할 수 없는 리포트
    #[error("invalid report file '{path}': {reason}")]
    InvalidReport { path: String, reason: String },

    /// 리포트를 읽을 수 있는 백엔드가 없음
    #[error("no backend could load report '{path}'")]
    NoSuitableBackend { path: String },

    /// 디렉토리에 리포트가 없음
    #[error("no report found in directory '{path}'")]
    NoReportInDirectory { path: String },

    /// 백엔드와 경로가 연결되지 않은 리포트 저장 시도
    #[error("report is not bound to a backend and a path")]
    Unbound,

    /// 직렬화 실패
    #[error("failed to serialize report: {0}")]
    Serialize(String),

    /// 리포트 파일 I/O 실패
    #[error("report io error on '{path}': {reason}")]
    Io { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_zest_error() {
        let err = ConfigError::FileNotFound {
            path: "/etc/zest.toml".to_owned(),
        };
        let zest_err: ZestError = err.into();
        assert!(matches!(zest_err, ZestError::Config(_)));
        assert!(zest_err.to_string().contains("/etc/zest.toml"));
    }

    #[test]
    fn fixture_error_display_names_both_fixtures() {
        let err = FixtureError::ScopeMismatch {
            fixture: "db".to_owned(),
            scope: "session".to_owned(),
            dependency: "tmp".to_owned(),
            dependency_scope: "test".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'db'"));
        assert!(msg.contains("'tmp'"));
        assert!(msg.contains("'session'"));
        assert!(msg.contains("'test'"));
    }

    #[test]
    fn circular_dependency_names_requester() {
        let err = FixtureError::CircularDependency {
            requester: "a".to_owned(),
            dependency: "b".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "fixture 'a' has a circular dependency on fixture 'b'"
        );
    }

    #[test]
    fn metadata_error_display() {
        let err = MetadataError::MissingProperty {
            target: "test".to_owned(),
            path: "suite.test".to_owned(),
            property: "priority".to_owned(),
        };
        assert_eq!(
            err.to_string(),
            "cannot load test 'suite.test', the property 'priority' is missing"
        );
    }

    #[test]
    fn programming_error_converts() {
        let zest_err: ZestError = ProgrammingError::InvalidScope("global".to_owned()).into();
        assert!(matches!(zest_err, ZestError::Programming(_)));
        assert!(zest_err.to_string().contains("global"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let zest_err: ZestError = io_err.into();
        assert!(matches!(zest_err, ZestError::Io(_)));
    }

    #[test]
    fn failed_helper_keeps_message() {
        let err = ZestError::failed("boom");
        assert_eq!(err.to_string(), "boom");
    }
}
