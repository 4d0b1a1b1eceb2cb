//! 이벤트: 실행 중 발생하는 모든 동작의 기록 단위
//!
//! 런타임과 러너가 만들어 [`EventBus`](crate::bus::EventBus)로 발행하면
//! 리포트 라이터와 리포팅 세션이 동기적으로 소비합니다.
//! [`Event`]는 생성 후 변경되지 않습니다.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::types::{Location, LogLevel, SuiteInfo, TestInfo};

/// 실행 이벤트
#[derive(Debug, Clone)]
pub struct Event {
    /// 이벤트 고유 ID (UUID v4)
    pub id: String,
    /// 발생 시각
    pub timestamp: DateTime<Utc>,
    /// 종류별 페이로드
    pub kind: EventKind,
}

impl Event {
    /// 현재 시각으로 새 이벤트를 생성합니다.
    pub fn new(kind: EventKind) -> Self {
        Self::at(Utc::now(), kind)
    }

    /// 지정한 시각으로 이벤트를 생성합니다.
    ///
    /// 저장된 리포트를 재생할 때 원래 타임스탬프를 유지하기 위해 사용합니다.
    pub fn at(timestamp: DateTime<Utc>, kind: EventKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            kind,
        }
    }

    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} id={}",
            self.timestamp.to_rfc3339(),
            self.event_type(),
            self.id
        )
    }
}

/// 이벤트 종류와 페이로드
#[derive(Debug, Clone)]
pub enum EventKind {
    TestSessionStart,
    TestSessionEnd,
    TestSessionSetupStart,
    TestSessionSetupEnd,
    TestSessionTeardownStart,
    TestSessionTeardownEnd,

    SuiteStart { suite: Arc<SuiteInfo> },
    SuiteEnd { suite: Arc<SuiteInfo> },
    SuiteSetupStart { suite: Arc<SuiteInfo> },
    SuiteSetupEnd { suite: Arc<SuiteInfo> },
    SuiteTeardownStart { suite: Arc<SuiteInfo> },
    SuiteTeardownEnd { suite: Arc<SuiteInfo> },

    TestStart { test: Arc<TestInfo> },
    TestEnd { test: Arc<TestInfo> },
    /// 테스트 단위 setup 구간 (픽스처, `setup_test` 훅)
    TestSetupStart { test: Arc<TestInfo> },
    TestSetupEnd { test: Arc<TestInfo> },
    /// 테스트 단위 teardown 구간
    TestTeardownStart { test: Arc<TestInfo> },
    TestTeardownEnd { test: Arc<TestInfo> },
    TestSkipped { test: Arc<TestInfo>, reason: String },
    TestDisabled { test: Arc<TestInfo>, reason: String },

    Step {
        location: Location,
        description: String,
        detached: bool,
    },
    StepEnd {
        location: Location,
        step: String,
    },
    Log {
        location: Location,
        step: Option<String>,
        level: LogLevel,
        message: String,
    },
    Check {
        location: Location,
        step: Option<String>,
        description: String,
        /// `None`은 합격/불합격에 영향을 주지 않는 정보성 체크
        outcome: Option<bool>,
        details: Option<String>,
    },
    Attachment {
        location: Location,
        step: Option<String>,
        /// 리포트 디렉토리 기준 상대 경로
        path: String,
        description: String,
        as_image: bool,
    },
    Url {
        location: Location,
        step: Option<String>,
        url: String,
        description: String,
    },
    ReportInfo {
        name: String,
        value: String,
    },
}

impl EventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::TestSessionStart => EventType::TestSessionStart,
            Self::TestSessionEnd => EventType::TestSessionEnd,
            Self::TestSessionSetupStart => EventType::TestSessionSetupStart,
            Self::TestSessionSetupEnd => EventType::TestSessionSetupEnd,
            Self::TestSessionTeardownStart => EventType::TestSessionTeardownStart,
            Self::TestSessionTeardownEnd => EventType::TestSessionTeardownEnd,
            Self::SuiteStart { .. } => EventType::SuiteStart,
            Self::SuiteEnd { .. } => EventType::SuiteEnd,
            Self::SuiteSetupStart { .. } => EventType::SuiteSetupStart,
            Self::SuiteSetupEnd { .. } => EventType::SuiteSetupEnd,
            Self::SuiteTeardownStart { .. } => EventType::SuiteTeardownStart,
            Self::SuiteTeardownEnd { .. } => EventType::SuiteTeardownEnd,
            Self::TestStart { .. } => EventType::TestStart,
            Self::TestEnd { .. } => EventType::TestEnd,
            Self::TestSetupStart { .. } => EventType::TestSetupStart,
            Self::TestSetupEnd { .. } => EventType::TestSetupEnd,
            Self::TestTeardownStart { .. } => EventType::TestTeardownStart,
            Self::TestTeardownEnd { .. } => EventType::TestTeardownEnd,
            Self::TestSkipped { .. } => EventType::TestSkipped,
            Self::TestDisabled { .. } => EventType::TestDisabled,
            Self::Step { .. } => EventType::Step,
            Self::StepEnd { .. } => EventType::StepEnd,
            Self::Log { .. } => EventType::Log,
            Self::Check { .. } => EventType::Check,
            Self::Attachment { .. } => EventType::Attachment,
            Self::Url { .. } => EventType::Url,
            Self::ReportInfo { .. } => EventType::ReportInfo,
        }
    }

    /// 이벤트가 속한 실행 위치를 반환합니다.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::Step { location, .. }
            | Self::StepEnd { location, .. }
            | Self::Log { location, .. }
            | Self::Check { location, .. }
            | Self::Attachment { location, .. }
            | Self::Url { location, .. } => Some(location),
            _ => None,
        }
    }
}

/// 페이로드 없는 이벤트 종류 식별자: 구독 키로 사용됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    TestSessionStart,
    TestSessionEnd,
    TestSessionSetupStart,
    TestSessionSetupEnd,
    TestSessionTeardownStart,
    TestSessionTeardownEnd,
    SuiteStart,
    SuiteEnd,
    SuiteSetupStart,
    SuiteSetupEnd,
    SuiteTeardownStart,
    SuiteTeardownEnd,
    TestStart,
    TestEnd,
    TestSetupStart,
    TestSetupEnd,
    TestTeardownStart,
    TestTeardownEnd,
    TestSkipped,
    TestDisabled,
    Step,
    StepEnd,
    Log,
    Check,
    Attachment,
    Url,
    ReportInfo,
}

impl EventType {
    /// 모든 이벤트 종류
    pub const ALL: [EventType; 27] = [
        Self::TestSessionStart,
        Self::TestSessionEnd,
        Self::TestSessionSetupStart,
        Self::TestSessionSetupEnd,
        Self::TestSessionTeardownStart,
        Self::TestSessionTeardownEnd,
        Self::SuiteStart,
        Self::SuiteEnd,
        Self::SuiteSetupStart,
        Self::SuiteSetupEnd,
        Self::SuiteTeardownStart,
        Self::SuiteTeardownEnd,
        Self::TestStart,
        Self::TestEnd,
        Self::TestSetupStart,
        Self::TestSetupEnd,
        Self::TestTeardownStart,
        Self::TestTeardownEnd,
        Self::TestSkipped,
        Self::TestDisabled,
        Self::Step,
        Self::StepEnd,
        Self::Log,
        Self::Check,
        Self::Attachment,
        Self::Url,
        Self::ReportInfo,
    ];

    /// snake_case 이벤트 이름을 반환합니다.
    pub fn name(self) -> &'static str {
        match self {
            Self::TestSessionStart => "test_session_start",
            Self::TestSessionEnd => "test_session_end",
            Self::TestSessionSetupStart => "test_session_setup_start",
            Self::TestSessionSetupEnd => "test_session_setup_end",
            Self::TestSessionTeardownStart => "test_session_teardown_start",
            Self::TestSessionTeardownEnd => "test_session_teardown_end",
            Self::SuiteStart => "suite_start",
            Self::SuiteEnd => "suite_end",
            Self::SuiteSetupStart => "suite_setup_start",
            Self::SuiteSetupEnd => "suite_setup_end",
            Self::SuiteTeardownStart => "suite_teardown_start",
            Self::SuiteTeardownEnd => "suite_teardown_end",
            Self::TestStart => "test_start",
            Self::TestEnd => "test_end",
            Self::TestSetupStart => "test_setup_start",
            Self::TestSetupEnd => "test_setup_end",
            Self::TestTeardownStart => "test_teardown_start",
            Self::TestTeardownEnd => "test_teardown_end",
            Self::TestSkipped => "test_skipped",
            Self::TestDisabled => "test_disabled",
            Self::Step => "step",
            Self::StepEnd => "step_end",
            Self::Log => "log",
            Self::Check => "check",
            Self::Attachment => "log_attachment",
            Self::Url => "log_url",
            Self::ReportInfo => "report_info",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn log_event() -> Event {
        Event::new(EventKind::Log {
            location: Location::Test("suite.test".to_owned()),
            step: None,
            level: LogLevel::Info,
            message: "hello".to_owned(),
        })
    }

    #[test]
    fn event_has_uuid_id() {
        let event = log_event();
        assert_eq!(event.id.len(), 36);
        assert_ne!(event.id, log_event().id);
    }

    #[test]
    fn event_at_preserves_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let event = Event::at(ts, EventKind::TestSessionStart);
        assert_eq!(event.timestamp, ts);
    }

    #[test]
    fn event_type_derived_from_kind() {
        assert_eq!(log_event().event_type(), EventType::Log);
        assert_eq!(
            Event::new(EventKind::ReportInfo {
                name: "a".to_owned(),
                value: "b".to_owned()
            })
            .event_type(),
            EventType::ReportInfo
        );
    }

    #[test]
    fn event_type_names_are_unique() {
        let names: HashSet<_> = EventType::ALL.iter().map(|t| t.name()).collect();
        assert_eq!(names.len(), EventType::ALL.len());
    }

    #[test]
    fn location_only_for_runtime_events() {
        assert_eq!(
            log_event().kind.location(),
            Some(&Location::Test("suite.test".to_owned()))
        );
        assert!(EventKind::TestSessionStart.location().is_none());
    }

    #[test]
    fn event_display_contains_type() {
        let display = log_event().to_string();
        assert!(display.contains("log"));
    }

    #[test]
    fn events_are_send_sync() {
        fn assert_send_sync<T: Send + Sync + 'static>() {}
        assert_send_sync::<Event>();
    }
}
