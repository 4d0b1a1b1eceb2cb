//! 픽스처 레지스트리: 의존성 그래프 검증과 스코프별 실행
//!
//! [`FixtureRegistry`]는 이름으로 픽스처를 관리하고 다음을 보장합니다.
//!
//! - 예약된 이름(`fixture_name`)과 내장 픽스처 이름은 사용할 수 없습니다.
//! - 의존성은 모두 존재하고 순환이 없습니다.
//! - 픽스처는 자신과 같거나 더 넓은 스코프의 픽스처에만 의존합니다.
//! - 한 번 실행된 픽스처는 teardown 전까지 캐시된 결과를 돌려줍니다.
//!
//! # 픽스처 결과
//! ```text
//! FixtureOutput::Value(v)              → 결과만 보관
//! FixtureOutput::WithTeardown(v, f)    → 결과 보관, teardown 시 f를 한 번 실행
//! ```

use std::any::{Any, type_name};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{FixtureError, ProgrammingError, ZestError};
use crate::metrics as m;
use crate::runtime::Runtime;
use crate::suite::Suite;
use crate::types::Scope;

/// 실행 중인 픽스처 자신의 이름을 주입받는 예약 파라미터
pub const FIXTURE_NAME_PARAM: &str = "fixture_name";

/// 픽스처 이름으로 사용할 수 없는 이름
pub const FORBIDDEN_FIXTURE_NAMES: &[&str] = &[FIXTURE_NAME_PARAM];

/// 타입이 지워진 픽스처 결과
pub type FixtureValue = Arc<dyn Any + Send + Sync>;

/// teardown 동작
pub type TeardownFn = Box<dyn FnOnce() -> Result<(), ZestError> + Send>;

/// 픽스처 본문
pub type FixtureFn = Arc<dyn Fn(&FixtureArgs) -> Result<FixtureOutput, ZestError> + Send + Sync>;

// ─── FixtureOutput ───────────────────────────────────────────────────

/// 픽스처 본문의 결과
///
/// 값만 만드는 픽스처와 (setup 결과, teardown 동작) 쌍을 만드는 픽스처를 구분합니다.
pub enum FixtureOutput {
    Value(FixtureValue),
    WithTeardown(FixtureValue, TeardownFn),
}

impl FixtureOutput {
    pub fn value<T: Any + Send + Sync>(value: T) -> Self {
        Self::Value(Arc::new(value))
    }

    pub fn with_teardown<T, F>(value: T, teardown: F) -> Self
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<(), ZestError> + Send + 'static,
    {
        Self::WithTeardown(Arc::new(value), Box::new(teardown))
    }
}

impl fmt::Debug for FixtureOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(_) => f.write_str("FixtureOutput::Value(..)"),
            Self::WithTeardown(..) => f.write_str("FixtureOutput::WithTeardown(..)"),
        }
    }
}

// ─── FixtureArgs ─────────────────────────────────────────────────────

/// 픽스처 본문과 테스트 본문에 전달되는 의존성 결과 묶음
#[derive(Clone, Default)]
pub struct FixtureArgs {
    values: HashMap<String, FixtureValue>,
    fixture_name: Option<String>,
    runtime: Option<Arc<Runtime>>,
}

impl FixtureArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FixtureValue) {
        self.values.insert(name.into(), value);
    }

    /// 이름으로 결과를 꺼내 `T`로 변환합니다.
    ///
    /// # Errors
    ///
    /// 결과가 없으면 [`FixtureError::NotExecuted`], 타입이 다르면
    /// [`FixtureError::TypeMismatch`]를 반환합니다.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, FixtureError> {
        let value = self
            .values
            .get(name)
            .ok_or_else(|| FixtureError::NotExecuted {
                name: name.to_owned(),
            })?;
        Arc::clone(value)
            .downcast::<T>()
            .map_err(|_| FixtureError::TypeMismatch {
                name: name.to_owned(),
                expected: type_name::<T>().to_owned(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `fixture_name` 파라미터 값 (실행 중인 픽스처 이름)
    pub fn fixture_name(&self) -> Option<&str> {
        self.fixture_name.as_deref()
    }

    /// 레지스트리에 연결된 런타임
    ///
    /// # Errors
    ///
    /// 런타임이 연결되지 않았으면 [`ProgrammingError::RuntimeNotInitialized`]를 반환합니다.
    pub fn runtime(&self) -> Result<&Arc<Runtime>, ProgrammingError> {
        self.runtime
            .as_ref()
            .ok_or(ProgrammingError::RuntimeNotInitialized)
    }
}

impl fmt::Debug for FixtureArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.values.keys().collect();
        names.sort();
        f.debug_struct("FixtureArgs")
            .field("values", &names)
            .field("fixture_name", &self.fixture_name)
            .finish()
    }
}

// ─── FixtureDef ──────────────────────────────────────────────────────

/// 픽스처 선언: 이름(별칭 포함), 스코프, 의존성 파라미터, 본문
#[derive(Clone)]
pub struct FixtureDef {
    names: Vec<String>,
    scope: Scope,
    params: Vec<String>,
    func: FixtureFn,
}

impl FixtureDef {
    pub fn new<F>(name: impl Into<String>, scope: Scope, func: F) -> Self
    where
        F: Fn(&FixtureArgs) -> Result<FixtureOutput, ZestError> + Send + Sync + 'static,
    {
        Self {
            names: vec![name.into()],
            scope,
            params: Vec::new(),
            func: Arc::new(func),
        }
    }

    /// 같은 본문을 다른 이름으로도 등록합니다.
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// 의존성 파라미터 이름을 추가합니다. `fixture_name`은 자기 이름을 받습니다.
    pub fn param(mut self, name: impl Into<String>) -> Self {
        self.params.push(name.into());
        self
    }

    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }
}

impl fmt::Debug for FixtureDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureDef")
            .field("names", &self.names)
            .field("scope", &self.scope)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

// ─── Fixture ─────────────────────────────────────────────────────────

enum FixtureKind {
    User(FixtureFn),
    /// 세션 시작 전에 준비되는 값, 또는 값을 만드는 함수
    Builtin(Arc<dyn Fn() -> FixtureValue + Send + Sync>),
}

struct Fixture {
    name: String,
    scope: Scope,
    params: Vec<String>,
    kind: FixtureKind,
    result: Option<FixtureValue>,
    teardown: Option<TeardownFn>,
}

impl Fixture {
    fn is_builtin(&self) -> bool {
        matches!(self.kind, FixtureKind::Builtin(_))
    }

    fn is_executed(&self) -> bool {
        self.result.is_some()
    }

    /// `fixture_name`을 제외한 의존성 이름
    fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.params
            .iter()
            .map(String::as_str)
            .filter(|p| *p != FIXTURE_NAME_PARAM)
    }
}

// ─── FixtureRegistry ─────────────────────────────────────────────────

/// 픽스처 레지스트리
#[derive(Default)]
pub struct FixtureRegistry {
    fixtures: HashMap<String, Fixture>,
    /// 등록 순서 (검증과 필터 결과의 순서를 결정)
    order: Vec<String>,
    runtime: Option<Arc<Runtime>>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 픽스처 선언을 등록합니다. 별칭마다 독립된 픽스처가 만들어집니다.
    ///
    /// # Errors
    ///
    /// 이름이 내장 픽스처와 겹치면 [`FixtureError::NamingConflict`]를 반환합니다.
    pub fn add(&mut self, def: FixtureDef) -> Result<(), FixtureError> {
        for name in &def.names {
            self.check_not_builtin(name)?;
        }
        for name in def.names {
            let fixture = Fixture {
                name: name.clone(),
                scope: def.scope,
                params: def.params.clone(),
                kind: FixtureKind::User(Arc::clone(&def.func)),
                result: None,
                teardown: None,
            };
            self.insert(fixture);
        }
        Ok(())
    }

    pub fn add_fixtures(
        &mut self,
        defs: impl IntoIterator<Item = FixtureDef>,
    ) -> Result<(), FixtureError> {
        defs.into_iter().try_for_each(|def| self.add(def))
    }

    /// 고정 값을 반환하는 내장 픽스처를 등록합니다 (스코프 `session_prerun`).
    pub fn add_builtin<T: Any + Send + Sync>(
        &mut self,
        name: impl Into<String>,
        value: T,
    ) -> Result<(), FixtureError> {
        let value: FixtureValue = Arc::new(value);
        self.add_builtin_producer(name, move || Arc::clone(&value))
    }

    /// 실행 시점에 값을 만드는 내장 픽스처를 등록합니다.
    pub fn add_builtin_producer<F>(
        &mut self,
        name: impl Into<String>,
        producer: F,
    ) -> Result<(), FixtureError>
    where
        F: Fn() -> FixtureValue + Send + Sync + 'static,
    {
        let name = name.into();
        self.check_not_builtin(&name)?;
        self.insert(Fixture {
            name,
            scope: Scope::SessionPrerun,
            params: Vec::new(),
            kind: FixtureKind::Builtin(Arc::new(producer)),
            result: None,
            teardown: None,
        });
        Ok(())
    }

    fn check_not_builtin(&self, name: &str) -> Result<(), FixtureError> {
        match self.fixtures.get(name) {
            Some(existing) if existing.is_builtin() => Err(FixtureError::NamingConflict {
                name: name.to_owned(),
            }),
            _ => Ok(()),
        }
    }

    fn insert(&mut self, fixture: Fixture) {
        if !self.fixtures.contains_key(&fixture.name) {
            self.order.push(fixture.name.clone());
        }
        self.fixtures.insert(fixture.name.clone(), fixture);
    }

    /// 픽스처 본문에 전달할 런타임을 연결합니다.
    pub fn set_runtime(&mut self, runtime: Arc<Runtime>) {
        self.runtime = Some(runtime);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fixtures.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// 등록 순서대로 이름을 반환합니다.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn scope_of(&self, name: &str) -> Result<Scope, FixtureError> {
        Ok(self.get(name)?.scope)
    }

    /// 픽스처의 직접 파라미터 (`fixture_name` 포함)
    pub fn params_of(&self, name: &str) -> Result<Vec<String>, FixtureError> {
        Ok(self.get(name)?.params.clone())
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.fixtures.get(name).is_some_and(Fixture::is_builtin)
    }

    fn get(&self, name: &str) -> Result<&Fixture, FixtureError> {
        self.fixtures
            .get(name)
            .ok_or_else(|| FixtureError::UnknownFixture {
                name: name.to_owned(),
            })
    }

    // ─── 그래프 ──────────────────────────────────────────────────────

    /// `name`을 실행하기 전에 필요한 전이적 의존성을 실행 순서대로 반환합니다.
    ///
    /// # Errors
    ///
    /// - 존재하지 않는 의존성: [`FixtureError::MissingDependency`]
    /// - 순환 의존성: [`FixtureError::CircularDependency`] (최초 요청자 이름 포함)
    pub fn resolve_dependencies(&self, name: &str) -> Result<Vec<String>, FixtureError> {
        self.get(name)?;
        let mut collected = Vec::new();
        let mut stack = vec![name.to_owned()];
        self.collect_dependencies(name, None, &mut stack, &mut collected)?;

        let mut seen = HashSet::new();
        collected.retain(|dep| seen.insert(dep.clone()));
        Ok(collected)
    }

    fn collect_dependencies(
        &self,
        name: &str,
        requester: Option<&str>,
        stack: &mut Vec<String>,
        out: &mut Vec<String>,
    ) -> Result<(), FixtureError> {
        let fixture = self.get(name)?;
        let params: Vec<&str> = fixture.dependencies().collect();

        if let Some(requester) = requester {
            if params.contains(&requester) {
                return Err(FixtureError::CircularDependency {
                    requester: requester.to_owned(),
                    dependency: name.to_owned(),
                });
            }
        }

        for param in &params {
            if !self.fixtures.contains_key(*param) {
                return Err(FixtureError::MissingDependency {
                    fixture: (*param).to_owned(),
                    dependent: name.to_owned(),
                });
            }
            // 요청자를 거치지 않는 순환 (a → b → c → b)
            if stack.iter().any(|s| s == param) {
                return Err(FixtureError::CircularDependency {
                    requester: (*param).to_owned(),
                    dependency: name.to_owned(),
                });
            }
            stack.push((*param).to_owned());
            self.collect_dependencies(param, Some(requester.unwrap_or(name)), stack, out)?;
            stack.pop();
        }
        out.extend(params.iter().map(|p| (*p).to_owned()));
        Ok(())
    }

    /// 전체 그래프를 검증합니다. 처음 발견한 위반을 반환합니다.
    ///
    /// 순서: 예약 이름 → 누락/순환 의존성 → 직접 의존성의 스코프 호환성
    pub fn validate(&self) -> Result<(), FixtureError> {
        for name in &self.order {
            if FORBIDDEN_FIXTURE_NAMES.contains(&name.as_str()) {
                return Err(FixtureError::ForbiddenName { name: name.clone() });
            }
        }

        for name in &self.order {
            self.resolve_dependencies(name)?;
        }

        for name in &self.order {
            let fixture = self.get(name)?;
            for dep_name in fixture.dependencies() {
                let dependency = self.get(dep_name)?;
                if dependency.scope.level() < fixture.scope.level() {
                    return Err(FixtureError::ScopeMismatch {
                        fixture: fixture.name.clone(),
                        scope: fixture.scope.to_string(),
                        dependency: dependency.name.clone(),
                        dependency_scope: dependency.scope.to_string(),
                    });
                }
            }
        }

        debug!(fixtures = self.order.len(), "fixture graph validated");
        Ok(())
    }

    /// 스위트 트리의 테스트와 훅이 사용하는 픽스처가 모두 등록되어 있는지 검사합니다.
    pub fn check_fixtures_in_suites(&self, suites: &[Suite]) -> Result<(), FixtureError> {
        for suite in suites {
            for (path, fixtures) in suite.fixture_usages(None) {
                for fixture in fixtures {
                    if !self.fixtures.contains_key(&fixture) {
                        return Err(FixtureError::UnknownFixtureInTest {
                            fixture,
                            test: path,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// 조건에 맞는 픽스처 이름을 반환합니다.
    ///
    /// `base_names`가 비어 있으면 등록된 모든 픽스처를 대상으로 합니다.
    pub fn filter_fixtures(
        &self,
        base_names: &[String],
        scope: Option<Scope>,
        is_executed: Option<bool>,
    ) -> Vec<String> {
        let names: &[String] = if base_names.is_empty() {
            &self.order
        } else {
            base_names
        };
        names
            .iter()
            .filter_map(|name| self.fixtures.get(name))
            .filter(|f| scope.is_none_or(|s| f.scope == s))
            .filter(|f| is_executed.is_none_or(|e| f.is_executed() == e))
            .map(|f| f.name.clone())
            .collect()
    }

    /// 이름들과 그 전이적 의존성을 실행 순서대로 모읍니다.
    pub fn with_dependencies(&self, names: &[String]) -> Result<Vec<String>, FixtureError> {
        let mut ordered = Vec::new();
        let mut seen = HashSet::new();
        for name in names {
            for dep in self.resolve_dependencies(name)? {
                if seen.insert(dep.clone()) {
                    ordered.push(dep);
                }
            }
            if seen.insert(name.clone()) {
                ordered.push(name.clone());
            }
        }
        Ok(ordered)
    }

    // ─── 실행 ────────────────────────────────────────────────────────

    pub fn is_executed(&self, name: &str) -> bool {
        self.fixtures.get(name).is_some_and(Fixture::is_executed)
    }

    /// 픽스처를 실행하고 결과를 반환합니다. 이미 실행되었으면 캐시된 결과를 반환합니다.
    ///
    /// 실행되지 않은 의존성은 의존성 순서대로 먼저 실행됩니다.
    pub fn execute(&mut self, name: &str) -> Result<FixtureValue, FixtureError> {
        if let Some(result) = self.get(name)?.result.as_ref() {
            return Ok(Arc::clone(result));
        }
        for dep in self.resolve_dependencies(name)? {
            if !self.is_executed(&dep) {
                self.execute_one(&dep)?;
            }
        }
        self.execute_one(name)
    }

    fn execute_one(&mut self, name: &str) -> Result<FixtureValue, FixtureError> {
        let args = self.build_args(name)?;
        let fixture = self
            .fixtures
            .get_mut(name)
            .ok_or_else(|| FixtureError::UnknownFixture {
                name: name.to_owned(),
            })?;

        let (value, teardown) = match &fixture.kind {
            FixtureKind::Builtin(producer) => (producer(), None),
            FixtureKind::User(func) => match func(&args) {
                Ok(FixtureOutput::Value(value)) => (value, None),
                Ok(FixtureOutput::WithTeardown(value, teardown)) => (value, Some(teardown)),
                Err(e) => {
                    metrics::counter!(m::FIXTURE_ERRORS_TOTAL).increment(1);
                    warn!(fixture = name, error = %e, "fixture setup failed");
                    return Err(FixtureError::SetupFailed {
                        name: name.to_owned(),
                        reason: e.to_string(),
                    });
                }
            },
        };

        metrics::counter!(m::FIXTURES_EXECUTED_TOTAL, m::LABEL_SCOPE => fixture.scope.as_str())
            .increment(1);
        debug!(fixture = name, scope = %fixture.scope, "fixture executed");
        fixture.result = Some(Arc::clone(&value));
        fixture.teardown = teardown;
        Ok(value)
    }

    fn build_args(&self, name: &str) -> Result<FixtureArgs, FixtureError> {
        let fixture = self.get(name)?;
        let mut args = FixtureArgs {
            runtime: self.runtime.clone(),
            ..FixtureArgs::default()
        };
        for param in &fixture.params {
            if param == FIXTURE_NAME_PARAM {
                args.fixture_name = Some(name.to_owned());
                continue;
            }
            args.insert(param.clone(), self.result(param)?);
        }
        Ok(args)
    }

    /// 실행된 픽스처의 결과를 반환합니다.
    pub fn result(&self, name: &str) -> Result<FixtureValue, FixtureError> {
        self.get(name)?
            .result
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| FixtureError::NotExecuted {
                name: name.to_owned(),
            })
    }

    /// 실행된 픽스처들의 결과를 본문 인자로 묶습니다.
    pub fn args_for(&self, names: &[String]) -> Result<FixtureArgs, FixtureError> {
        let mut args = FixtureArgs {
            runtime: self.runtime.clone(),
            ..FixtureArgs::default()
        };
        for name in names {
            args.insert(name.clone(), self.result(name)?);
        }
        Ok(args)
    }

    /// 픽스처를 정리합니다.
    ///
    /// 결과를 버리고, teardown 동작이 있으면 정확히 한 번 실행합니다.
    /// 이후 같은 픽스처는 다시 실행될 수 있습니다. 내장 픽스처는 결과를 유지합니다.
    ///
    /// # Errors
    ///
    /// 실행되지 않은 픽스처면 [`FixtureError::NotExecuted`],
    /// teardown 동작이 실패하면 [`FixtureError::TeardownFailed`]를 반환합니다.
    pub fn teardown(&mut self, name: &str) -> Result<(), FixtureError> {
        let fixture = self
            .fixtures
            .get_mut(name)
            .ok_or_else(|| FixtureError::UnknownFixture {
                name: name.to_owned(),
            })?;
        if !fixture.is_executed() {
            return Err(FixtureError::NotExecuted {
                name: name.to_owned(),
            });
        }
        if fixture.is_builtin() {
            return Ok(());
        }

        fixture.result = None;
        if let Some(teardown) = fixture.teardown.take() {
            teardown().map_err(|e| {
                metrics::counter!(m::FIXTURE_ERRORS_TOTAL).increment(1);
                warn!(fixture = name, error = %e, "fixture teardown failed");
                FixtureError::TeardownFailed {
                    name: name.to_owned(),
                    reason: e.to_string(),
                }
            })?;
        }
        debug!(fixture = name, "fixture torn down");
        Ok(())
    }
}

impl fmt::Debug for FixtureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixtureRegistry")
            .field("fixtures", &self.order)
            .field("has_runtime", &self.runtime.is_some())
            .finish()
    }
}
