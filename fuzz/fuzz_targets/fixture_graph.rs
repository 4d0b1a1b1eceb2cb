#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use zest_core::fixture::{FixtureDef, FixtureOutput, FixtureRegistry};
use zest_core::types::Scope;

/// 퍼저용 픽스처 선언
#[derive(Arbitrary, Debug)]
struct FuzzFixture {
    name: u8,
    scope: FuzzScope,
    params: Vec<u8>,
}

#[derive(Arbitrary, Debug, Clone, Copy)]
enum FuzzScope {
    Test,
    TestSuite,
    Session,
    SessionPrerun,
}

impl FuzzScope {
    fn to_scope(self) -> Scope {
        match self {
            FuzzScope::Test => Scope::Test,
            FuzzScope::TestSuite => Scope::TestSuite,
            FuzzScope::Session => Scope::Session,
            FuzzScope::SessionPrerun => Scope::SessionPrerun,
        }
    }
}

// 이름 공간을 좁혀 중복 이름과 순환을 자주 만든다
fn name(id: u8) -> String {
    format!("f{}", id % 16)
}

fuzz_target!(|input: Vec<FuzzFixture>| {
    let mut registry = FixtureRegistry::new();
    for fixture in input.iter().take(32) {
        let def = FixtureDef::new(name(fixture.name), fixture.scope.to_scope(), |_| {
            Ok(FixtureOutput::value(()))
        })
        .params(fixture.params.iter().take(8).map(|p| name(*p)));
        let _ = registry.add(def);
    }

    // 검증을 통과한 그래프는 등록된 모든 이름의 의존성을 풀 수 있어야 한다
    if registry.validate().is_ok() {
        let known: Vec<String> = (0..16)
            .map(name)
            .filter(|n| registry.params_of(n).is_ok())
            .collect();
        let ordered = registry
            .with_dependencies(&known)
            .expect("validated graph must resolve");
        assert!(ordered.len() >= known.len());
    }
});
