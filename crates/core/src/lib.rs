#![doc = include_str!("../README.md")]

pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod fixture;
pub mod matching;
pub mod metadata;
pub mod metrics;
pub mod runtime;
pub mod suite;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{
    ConfigError, EventError, FixtureError, MetadataError, ProgrammingError, ReportError,
    ZestError,
};

// 설정
pub use config::ZestConfig;

// 이벤트
pub use bus::{EventBus, Listener, SubscriptionId};
pub use event::{Event, EventKind, EventType};

// 픽스처 / 스위트
pub use fixture::{FixtureArgs, FixtureDef, FixtureOutput, FixtureRegistry};
pub use metadata::{MetadataPolicy, RuleTarget};
pub use suite::{Suite, Test, TestContext};

// 런타임
pub use runtime::Runtime;

// 도메인 타입
pub use types::{Link, Location, LogLevel, Scope, SuiteInfo, TestInfo, TestStatus};
