//! 이벤트 버스와 리포팅 구성
//!
//! 리포트 라이터를 먼저 등록하고 그 뒤에 백엔드 세션을 등록합니다.
//! 버스는 구독 순서대로 전달하므로 세션은 항상 갱신된 리포트를 읽습니다.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use zest_core::bus::EventBus;
use zest_core::error::ZestError;
use zest_reporting::{
    Capabilities, ReportWriter, ReportingBackend, filter_available_backends,
    filter_backends_by_capabilities,
};

/// 한 번의 실행에 쓰이는 버스와 라이터
#[derive(Debug)]
pub struct ReportingWiring {
    pub bus: Arc<EventBus>,
    pub writer: Arc<ReportWriter>,
    /// 연결된 리포팅 세션 이름 (등록 순)
    pub sessions: Vec<String>,
}

/// 새 버스에 라이터와 세션 기능이 있는 백엔드의 세션을 연결합니다.
///
/// # Errors
///
/// 세션 생성이나 구독이 실패하면 에러를 반환합니다.
pub fn wire_reporting(
    backends: &[Arc<dyn ReportingBackend>],
    report_dir: &Path,
) -> Result<ReportingWiring, ZestError> {
    let bus = Arc::new(EventBus::new());
    let writer = ReportWriter::install(&bus)?;

    let available = filter_available_backends(backends);
    let mut sessions = Vec::new();
    for backend in filter_backends_by_capabilities(&available, Capabilities::SESSION) {
        let session = backend.create_reporting_session(Arc::clone(writer.report()), report_dir)?;
        bus.add_listener(session)?;
        debug!(backend = backend.name(), "reporting session attached");
        sessions.push(backend.name().to_owned());
    }

    Ok(ReportingWiring {
        bus,
        writer,
        sessions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zest_core::event::EventType;
    use zest_reporting::{JsonBackend, JunitBackend, SaveMode};

    struct Unavailable;

    impl ReportingBackend for Unavailable {
        fn name(&self) -> &str {
            "unavailable"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities::SESSION
        }

        fn is_available(&self) -> bool {
            false
        }
    }

    #[test]
    fn sessions_follow_backend_order() {
        let dir = tempfile::tempdir().unwrap();
        let backends: Vec<Arc<dyn ReportingBackend>> = vec![
            Arc::new(JunitBackend::new(SaveMode::AtEndOfTests)),
            Arc::new(Unavailable),
            Arc::new(JsonBackend::new(SaveMode::AtEndOfTests)),
        ];
        let wiring = wire_reporting(&backends, dir.path()).unwrap();
        assert_eq!(wiring.sessions, vec!["junit", "json"]);
        // writer + two file sessions
        assert_eq!(wiring.bus.subscriber_count(EventType::TestSessionEnd), 3);
    }

    #[test]
    fn writer_only_without_backends() {
        let dir = tempfile::tempdir().unwrap();
        let wiring = wire_reporting(&[], dir.path()).unwrap();
        assert!(wiring.sessions.is_empty());
        assert_eq!(wiring.bus.subscriber_count(EventType::Log), 1);
    }
}
