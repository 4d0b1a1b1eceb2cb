//! 이벤트 버스: 단일 프로세스 내 동기 발행/구독
//!
//! [`EventBus`]는 이벤트 종류별로 순서가 있는 핸들러 목록을 관리합니다.
//! [`EventBus::fire`]는 호출한 스레드에서 구독 순서대로 모든 핸들러를 실행합니다.
//! 재시도, 버퍼링, 스레드 간 큐는 없습니다.
//!
//! [`Listener`]는 이벤트 종류마다 하나의 메서드를 가진 구독자 인터페이스이며,
//! [`EventBus::add_listener`]가 `(종류, 핸들러)` 쌍을 명시적으로 등록합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::EventError;
use crate::event::{Event, EventKind, EventType};
use crate::metrics as m;
use crate::types::{Location, LogLevel, SuiteInfo, TestInfo};

/// 이벤트 핸들러
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// 구독 식별자: 구독 해제에 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

// ─── EventBus ────────────────────────────────────────────────────────

/// 동기 이벤트 버스
pub struct EventBus {
    handlers: RwLock<HashMap<EventType, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl EventBus {
    /// 모든 이벤트 종류가 등록된 버스를 생성합니다.
    pub fn new() -> Self {
        let bus = Self::empty();
        for event_type in EventType::ALL {
            bus.register(event_type);
        }
        bus
    }

    /// 아무 이벤트 종류도 등록되지 않은 버스를 생성합니다.
    pub fn empty() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 이벤트 종류를 등록합니다. 이미 등록된 종류면 아무 일도 하지 않습니다.
    pub fn register(&self, event_type: EventType) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        handlers.entry(event_type).or_default();
    }

    pub fn is_registered(&self, event_type: EventType) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&event_type)
    }

    /// 핸들러를 구독 목록 끝에 추가합니다.
    ///
    /// # Errors
    ///
    /// 등록되지 않은 이벤트 종류면 [`EventError::UnknownEventType`]을 반환합니다.
    pub fn subscribe(
        &self,
        event_type: EventType,
        handler: Handler,
    ) -> Result<SubscriptionId, EventError> {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let list = handlers
            .get_mut(&event_type)
            .ok_or_else(|| EventError::UnknownEventType(event_type.name().to_owned()))?;
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        list.push(Subscription { id, handler });
        debug!(event_type = %event_type, subscription = id.0, "handler subscribed");
        Ok(id)
    }

    /// 구독을 해제합니다. 해제된 구독이 있었으면 `true`를 반환합니다.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|s| s.id == id) {
                list.remove(pos);
                debug!(subscription = id.0, "handler unsubscribed");
                return true;
            }
        }
        false
    }

    /// 특정 종류 또는 전체(`None`)의 구독을 제거합니다. 등록된 종류는 유지됩니다.
    pub fn reset(&self, event_type: Option<EventType>) {
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        match event_type {
            Some(event_type) => {
                if let Some(list) = handlers.get_mut(&event_type) {
                    list.clear();
                }
            }
            None => handlers.values_mut().for_each(Vec::clear),
        }
    }

    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&event_type)
            .map_or(0, Vec::len)
    }

    /// 이벤트를 현재 구독자 모두에게 구독 순서대로 전달합니다.
    ///
    /// 핸들러 목록은 락을 잡은 채 복사한 뒤 락 밖에서 호출하므로
    /// 핸들러 안에서 다시 발행하거나 구독을 바꿔도 교착되지 않습니다.
    ///
    /// # Errors
    ///
    /// 등록되지 않은 이벤트 종류면 [`EventError::UnknownEventType`]을 반환합니다.
    pub fn fire(&self, event: &Event) -> Result<(), EventError> {
        let event_type = event.event_type();
        let handlers: Vec<Handler> = {
            let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
            let list = handlers
                .get(&event_type)
                .ok_or_else(|| EventError::UnknownEventType(event_type.name().to_owned()))?;
            list.iter().map(|s| Arc::clone(&s.handler)).collect()
        };

        metrics::counter!(m::EVENTS_FIRED_TOTAL, m::LABEL_EVENT_TYPE => event_type.name()).increment(1);
        for handler in handlers {
            handler(event);
        }
        Ok(())
    }

    /// 리스너를 구독 목록의 각 이벤트 종류에 등록합니다.
    ///
    /// # Errors
    ///
    /// 리스너가 등록되지 않은 종류를 구독하려 하면 에러를 반환합니다.
    pub fn add_listener(
        &self,
        listener: Arc<dyn Listener>,
    ) -> Result<Vec<SubscriptionId>, EventError> {
        let mut ids = Vec::new();
        for event_type in listener.subscriptions() {
            let listener = Arc::clone(&listener);
            let handler: Handler = Arc::new(move |event: &Event| dispatch(listener.as_ref(), event));
            ids.push(self.subscribe(event_type, handler)?);
        }
        Ok(ids)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Listener ────────────────────────────────────────────────────────

/// 이벤트 종류마다 하나의 메서드를 가진 구독자
///
/// 모든 메서드는 아무 일도 하지 않는 기본 구현을 가지므로
/// 필요한 이벤트만 구현하면 됩니다.
#[allow(unused_variables)]
pub trait Listener: Send + Sync {
    /// 구독할 이벤트 종류 목록
    fn subscriptions(&self) -> Vec<EventType> {
        EventType::ALL.to_vec()
    }

    fn on_test_session_start(&self, ts: DateTime<Utc>) {}
    fn on_test_session_end(&self, ts: DateTime<Utc>) {}
    fn on_test_session_setup_start(&self, ts: DateTime<Utc>) {}
    fn on_test_session_setup_end(&self, ts: DateTime<Utc>) {}
    fn on_test_session_teardown_start(&self, ts: DateTime<Utc>) {}
    fn on_test_session_teardown_end(&self, ts: DateTime<Utc>) {}

    fn on_suite_start(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {}
    fn on_suite_end(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {}
    fn on_suite_setup_start(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {}
    fn on_suite_setup_end(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {}
    fn on_suite_teardown_start(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {}
    fn on_suite_teardown_end(&self, ts: DateTime<Utc>, suite: &SuiteInfo) {}

    fn on_test_start(&self, ts: DateTime<Utc>, test: &TestInfo) {}
    fn on_test_end(&self, ts: DateTime<Utc>, test: &TestInfo) {}
    fn on_test_setup_start(&self, ts: DateTime<Utc>, test: &TestInfo) {}
    fn on_test_setup_end(&self, ts: DateTime<Utc>, test: &TestInfo) {}
    fn on_test_teardown_start(&self, ts: DateTime<Utc>, test: &TestInfo) {}
    fn on_test_teardown_end(&self, ts: DateTime<Utc>, test: &TestInfo) {}
    fn on_test_skipped(&self, ts: DateTime<Utc>, test: &TestInfo, reason: &str) {}
    fn on_test_disabled(&self, ts: DateTime<Utc>, test: &TestInfo, reason: &str) {}

    fn on_step(&self, ts: DateTime<Utc>, location: &Location, description: &str, detached: bool) {}
    fn on_step_end(&self, ts: DateTime<Utc>, location: &Location, step: &str) {}
    fn on_log(
        &self,
        ts: DateTime<Utc>,
        location: &Location,
        step: Option<&str>,
        level: LogLevel,
        message: &str,
    ) {
    }
    fn on_check(
        &self,
        ts: DateTime<Utc>,
        location: &Location,
        step: Option<&str>,
        description: &str,
        outcome: Option<bool>,
        details: Option<&str>,
    ) {
    }
    fn on_attachment(
        &self,
        ts: DateTime<Utc>,
        location: &Location,
        step: Option<&str>,
        path: &str,
        description: &str,
        as_image: bool,
    ) {
    }
    fn on_url(
        &self,
        ts: DateTime<Utc>,
        location: &Location,
        step: Option<&str>,
        url: &str,
        description: &str,
    ) {
    }
    fn on_report_info(&self, ts: DateTime<Utc>, name: &str, value: &str) {}
}

/// 이벤트를 종류에 맞는 리스너 메서드로 전달합니다.
pub fn dispatch(listener: &dyn Listener, event: &Event) {
    let ts = event.timestamp;
    match &event.kind {
        EventKind::TestSessionStart => listener.on_test_session_start(ts),
        EventKind::TestSessionEnd => listener.on_test_session_end(ts),
        EventKind::TestSessionSetupStart => listener.on_test_session_setup_start(ts),
        EventKind::TestSessionSetupEnd => listener.on_test_session_setup_end(ts),
        EventKind::TestSessionTeardownStart => listener.on_test_session_teardown_start(ts),
        EventKind::TestSessionTeardownEnd => listener.on_test_session_teardown_end(ts),
        EventKind::SuiteStart { suite } => listener.on_suite_start(ts, suite),
        EventKind::SuiteEnd { suite } => listener.on_suite_end(ts, suite),
        EventKind::SuiteSetupStart { suite } => listener.on_suite_setup_start(ts, suite),
        EventKind::SuiteSetupEnd { suite } => listener.on_suite_setup_end(ts, suite),
        EventKind::SuiteTeardownStart { suite } => listener.on_suite_teardown_start(ts, suite),
        EventKind::SuiteTeardownEnd { suite } => listener.on_suite_teardown_end(ts, suite),
        EventKind::TestStart { test } => listener.on_test_start(ts, test),
        EventKind::TestEnd { test } => listener.on_test_end(ts, test),
        EventKind::TestSetupStart { test } => listener.on_test_setup_start(ts, test),
        EventKind::TestSetupEnd { test } => listener.on_test_setup_end(ts, test),
        EventKind::TestTeardownStart { test } => listener.on_test_teardown_start(ts, test),
        EventKind::TestTeardownEnd { test } => listener.on_test_teardown_end(ts, test),
        EventKind::TestSkipped { test, reason } => listener.on_test_skipped(ts, test, reason),
        EventKind::TestDisabled { test, reason } => listener.on_test_disabled(ts, test, reason),
        EventKind::Step {
            location,
            description,
            detached,
        } => listener.on_step(ts, location, description, *detached),
        EventKind::StepEnd { location, step } => listener.on_step_end(ts, location, step),
        EventKind::Log {
            location,
            step,
            level,
            message,
        } => listener.on_log(ts, location, step.as_deref(), *level, message),
        EventKind::Check {
            location,
            step,
            description,
            outcome,
            details,
        } => listener.on_check(
            ts,
            location,
            step.as_deref(),
            description,
            *outcome,
            details.as_deref(),
        ),
        EventKind::Attachment {
            location,
            step,
            path,
            description,
            as_image,
        } => listener.on_attachment(ts, location, step.as_deref(), path, description, *as_image),
        EventKind::Url {
            location,
            step,
            url,
            description,
        } => listener.on_url(ts, location, step.as_deref(), url, description),
        EventKind::ReportInfo { name, value } => listener.on_report_info(ts, name, value),
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        let total: usize = handlers.values().map(Vec::len).sum();
        f.debug_struct("EventBus")
            .field("event_types", &handlers.len())
            .field("subscriptions", &total)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn info_event(message: &str) -> Event {
        Event::new(EventKind::Log {
            location: Location::TestSessionSetup,
            step: None,
            level: LogLevel::Info,
            message: message.to_owned(),
        })
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&'static str) -> Handler) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let make = move |tag: &'static str| -> Handler {
            let seen = Arc::clone(&seen_clone);
            Arc::new(move |_: &Event| seen.lock().unwrap().push(tag.to_owned()))
        };
        (seen, make)
    }

    #[test]
    fn register_is_idempotent() {
        let bus = EventBus::empty();
        bus.register(EventType::Log);
        let (_, make) = recorder();
        bus.subscribe(EventType::Log, make("a")).unwrap();
        bus.register(EventType::Log);
        assert_eq!(bus.subscriber_count(EventType::Log), 1);
    }

    #[test]
    fn subscribe_to_unregistered_type_fails() {
        let bus = EventBus::empty();
        let (_, make) = recorder();
        let err = bus.subscribe(EventType::Check, make("a")).unwrap_err();
        assert!(matches!(err, EventError::UnknownEventType(ref t) if t == "check"));
    }

    #[test]
    fn fire_unregistered_type_fails() {
        let bus = EventBus::empty();
        assert!(bus.fire(&info_event("x")).is_err());
    }

    #[test]
    fn handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let (seen, make) = recorder();
        bus.subscribe(EventType::Log, make("first")).unwrap();
        bus.subscribe(EventType::Log, make("second")).unwrap();
        bus.subscribe(EventType::Check, make("other")).unwrap();

        bus.fire(&info_event("x")).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_removes_handler() {
        let bus = EventBus::new();
        let (seen, make) = recorder();
        let id = bus.subscribe(EventType::Log, make("a")).unwrap();
        bus.subscribe(EventType::Log, make("b")).unwrap();

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.fire(&info_event("x")).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["b"]);
    }

    #[test]
    fn reset_single_type_keeps_others() {
        let bus = EventBus::new();
        let (_, make) = recorder();
        bus.subscribe(EventType::Log, make("a")).unwrap();
        bus.subscribe(EventType::Check, make("b")).unwrap();

        bus.reset(Some(EventType::Log));
        assert_eq!(bus.subscriber_count(EventType::Log), 0);
        assert_eq!(bus.subscriber_count(EventType::Check), 1);
        assert!(bus.is_registered(EventType::Log));

        bus.reset(None);
        assert_eq!(bus.subscriber_count(EventType::Check), 0);
    }

    #[test]
    fn handler_may_fire_reentrantly() {
        let bus = Arc::new(EventBus::new());
        let (seen, make) = recorder();
        bus.subscribe(EventType::ReportInfo, make("info")).unwrap();
        let inner = Arc::clone(&bus);
        bus.subscribe(
            EventType::Log,
            Arc::new(move |_: &Event| {
                inner
                    .fire(&Event::new(EventKind::ReportInfo {
                        name: "n".to_owned(),
                        value: "v".to_owned(),
                    }))
                    .unwrap();
            }),
        )
        .unwrap();

        bus.fire(&info_event("x")).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["info"]);
    }

    struct LogCollector {
        messages: Mutex<Vec<String>>,
    }

    impl Listener for LogCollector {
        fn subscriptions(&self) -> Vec<EventType> {
            vec![EventType::Log]
        }

        fn on_log(
            &self,
            _ts: DateTime<Utc>,
            _location: &Location,
            _step: Option<&str>,
            _level: LogLevel,
            message: &str,
        ) {
            self.messages.lock().unwrap().push(message.to_owned());
        }
    }

    #[test]
    fn add_listener_registers_declared_kinds_only() {
        let bus = EventBus::new();
        let collector = Arc::new(LogCollector {
            messages: Mutex::new(Vec::new()),
        });
        let ids = bus.add_listener(collector.clone()).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(bus.subscriber_count(EventType::Check), 0);

        bus.fire(&info_event("one")).unwrap();
        bus.fire(&info_event("two")).unwrap();
        assert_eq!(*collector.messages.lock().unwrap(), vec!["one", "two"]);
    }

    #[test]
    fn default_listener_subscribes_everything() {
        struct Silent;
        impl Listener for Silent {}

        let bus = EventBus::new();
        bus.add_listener(Arc::new(Silent)).unwrap();
        for event_type in EventType::ALL {
            assert_eq!(bus.subscriber_count(event_type), 1);
        }
        bus.fire(&Event::new(EventKind::TestSessionStart)).unwrap();
    }
}
