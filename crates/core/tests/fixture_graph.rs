//! 픽스처 그래프 속성 테스트
//!
//! - 임의의 DAG에서 검증 통과, 의존성 순서 보장
//! - 모든 픽스처는 teardown 전까지 정확히 한 번만 실행됨
//! - 순환이 있으면 항상 CircularDependency로 보고됨

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use zest_core::error::FixtureError;
use zest_core::fixture::{FixtureDef, FixtureOutput, FixtureRegistry};
use zest_core::types::Scope;

type Counts = Arc<Mutex<HashMap<String, usize>>>;

/// `edges[i][j]`가 참이고 `j < i`이면 `fi`가 `fj`에 의존합니다.
fn dag_registry(edges: &[Vec<bool>], counts: &Counts) -> FixtureRegistry {
    let mut registry = FixtureRegistry::new();
    for (i, row) in edges.iter().enumerate() {
        let name = format!("f{i}");
        let counts = Arc::clone(counts);
        let counted = name.clone();
        let deps: Vec<String> = (0..i).filter(|j| row[*j]).map(|j| format!("f{j}")).collect();
        let def = FixtureDef::new(name, Scope::Session, move |_| {
            *counts.lock().unwrap().entry(counted.clone()).or_default() += 1;
            Ok(FixtureOutput::value(()))
        })
        .params(deps);
        registry.add(def).unwrap();
    }
    registry
}

fn edges_strategy() -> impl Strategy<Value = Vec<Vec<bool>>> {
    (1_usize..10).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(any::<bool>(), n), n)
    })
}

proptest! {
    #[test]
    fn dag_validates_and_orders_dependencies_first(edges in edges_strategy()) {
        let counts = Counts::default();
        let registry = dag_registry(&edges, &counts);
        prop_assert!(registry.validate().is_ok());

        for name in registry.names() {
            let order = registry.resolve_dependencies(&name).unwrap();
            prop_assert!(!order.contains(&name));
            for (pos, dep) in order.iter().enumerate() {
                for direct in registry.params_of(dep).unwrap() {
                    let direct_pos = order.iter().position(|n| *n == direct);
                    prop_assert!(direct_pos.is_some_and(|p| p < pos));
                }
            }
        }
    }

    #[test]
    fn every_fixture_executes_once_until_teardown(edges in edges_strategy()) {
        let counts = Counts::default();
        let mut registry = dag_registry(&edges, &counts);
        let names = registry.names();

        for name in names.iter().rev() {
            registry.execute(name).unwrap();
        }
        for name in &names {
            prop_assert_eq!(counts.lock().unwrap().get(name).copied(), Some(1));
        }

        for name in names.iter().rev() {
            registry.teardown(name).unwrap();
        }
        for name in &names {
            registry.execute(name).unwrap();
            prop_assert_eq!(counts.lock().unwrap().get(name).copied(), Some(2));
        }
    }

    #[test]
    fn closing_a_chain_is_always_circular(len in 1_usize..10) {
        let mut registry = FixtureRegistry::new();
        for i in 0..len {
            let previous = if i == 0 { len - 1 } else { i - 1 };
            registry
                .add(
                    FixtureDef::new(format!("f{i}"), Scope::Test, |_| Ok(FixtureOutput::value(())))
                        .param(format!("f{previous}")),
                )
                .unwrap();
        }
        let err = registry.validate().unwrap_err();
        prop_assert!(
            matches!(err, FixtureError::CircularDependency { .. }),
            "unexpected error: {err}"
        );
    }
}
