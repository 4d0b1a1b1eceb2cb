//! 스위트/테스트 선언: 로더가 넘겨주는 정적 트리
//!
//! 스위트는 설명, 태그, 속성, 링크, 테스트 목록, 하위 스위트,
//! 그리고 선택적인 setup/teardown 훅을 가집니다.
//! 경로는 스위트 이름을 점으로 연결해 만듭니다 (`suite.sub_suite.test`).

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::error::{FixtureError, ZestError};
use crate::fixture::FixtureArgs;
use crate::runtime::Runtime;
use crate::types::{Link, SuiteInfo, TestInfo, join_path};

/// 테스트 본문
pub type TestFn = Arc<dyn Fn(&TestContext) -> Result<(), ZestError> + Send + Sync>;

/// 스위트/테스트 훅
pub type HookFn = TestFn;

// ─── TestContext ─────────────────────────────────────────────────────

/// 본문과 훅에 전달되는 실행 컨텍스트
///
/// 런타임 메서드를 바로 호출할 수 있도록 [`Runtime`]으로 역참조됩니다.
#[derive(Debug, Clone)]
pub struct TestContext {
    runtime: Arc<Runtime>,
    fixtures: FixtureArgs,
}

impl TestContext {
    pub fn new(runtime: Arc<Runtime>, fixtures: FixtureArgs) -> Self {
        Self { runtime, fixtures }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    pub fn fixtures(&self) -> &FixtureArgs {
        &self.fixtures
    }

    /// 픽스처 결과를 `T`로 꺼냅니다.
    pub fn fixture<T: std::any::Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, FixtureError> {
        self.fixtures.get(name)
    }
}

impl Deref for TestContext {
    type Target = Runtime;

    fn deref(&self) -> &Runtime {
        &self.runtime
    }
}

// ─── Test ────────────────────────────────────────────────────────────

/// 테스트 선언
#[derive(Clone)]
pub struct Test {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub links: Vec<Link>,
    /// 본문이 사용하는 픽스처 이름
    pub fixtures: Vec<String>,
    /// 비활성화 사유 (`Some`이면 실행하지 않음)
    pub disabled: Option<String>,
    body: TestFn,
}

impl Test {
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&TestContext) -> Result<(), ZestError> + Send + Sync + 'static,
    {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            tags: Vec::new(),
            properties: BTreeMap::new(),
            links: Vec::new(),
            fixtures: Vec::new(),
            disabled: None,
            body: Arc::new(body),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn link(mut self, url: impl Into<String>, name: Option<&str>) -> Self {
        self.links.push(Link::new(url, name));
        self
    }

    pub fn fixture(mut self, name: impl Into<String>) -> Self {
        self.fixtures.push(name.into());
        self
    }

    pub fn disable(mut self, reason: impl Into<String>) -> Self {
        self.disabled = Some(reason.into());
        self
    }

    pub fn body(&self) -> &TestFn {
        &self.body
    }

    /// 소유 스위트 경로 기준의 메타데이터 스냅샷을 만듭니다.
    pub fn info(&self, suite_path: &str) -> TestInfo {
        TestInfo {
            path: join_path(Some(suite_path), &self.name),
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            properties: self.properties.clone(),
            links: self.links.clone(),
            suite_path: suite_path.to_owned(),
        }
    }
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("name", &self.name)
            .field("fixtures", &self.fixtures)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

// ─── Suite ───────────────────────────────────────────────────────────

/// 스위트 선언
#[derive(Clone, Default)]
pub struct Suite {
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub links: Vec<Link>,
    pub tests: Vec<Test>,
    pub suites: Vec<Suite>,
    /// 스위트 훅이 사용하는 픽스처 이름
    pub fixtures: Vec<String>,
    pub setup: Option<HookFn>,
    pub teardown: Option<HookFn>,
    pub setup_test: Option<HookFn>,
    pub teardown_test: Option<HookFn>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            description: name.clone(),
            name,
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn link(mut self, url: impl Into<String>, name: Option<&str>) -> Self {
        self.links.push(Link::new(url, name));
        self
    }

    pub fn test(mut self, test: Test) -> Self {
        self.tests.push(test);
        self
    }

    pub fn sub_suite(mut self, suite: Suite) -> Self {
        self.suites.push(suite);
        self
    }

    pub fn fixture(mut self, name: impl Into<String>) -> Self {
        self.fixtures.push(name.into());
        self
    }

    pub fn setup<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TestContext) -> Result<(), ZestError> + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(hook));
        self
    }

    pub fn teardown<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TestContext) -> Result<(), ZestError> + Send + Sync + 'static,
    {
        self.teardown = Some(Arc::new(hook));
        self
    }

    pub fn setup_test<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TestContext) -> Result<(), ZestError> + Send + Sync + 'static,
    {
        self.setup_test = Some(Arc::new(hook));
        self
    }

    pub fn teardown_test<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TestContext) -> Result<(), ZestError> + Send + Sync + 'static,
    {
        self.teardown_test = Some(Arc::new(hook));
        self
    }

    /// 상위 경로 기준의 메타데이터 스냅샷을 만듭니다.
    pub fn info(&self, parent_path: Option<&str>) -> SuiteInfo {
        SuiteInfo {
            path: join_path(parent_path, &self.name),
            name: self.name.clone(),
            description: self.description.clone(),
            tags: self.tags.clone(),
            properties: self.properties.clone(),
            links: self.links.clone(),
            parent_path: parent_path.map(str::to_owned),
        }
    }

    /// 하위 트리 전체의 테스트 수
    pub fn test_count(&self) -> usize {
        self.tests.len() + self.suites.iter().map(Suite::test_count).sum::<usize>()
    }

    /// 트리의 모든 테스트를 `(경로, 테스트)`로 나열합니다.
    pub fn all_tests(&self, parent_path: Option<&str>) -> Vec<(String, &Test)> {
        let path = join_path(parent_path, &self.name);
        let mut tests: Vec<_> = self
            .tests
            .iter()
            .map(|t| (join_path(Some(&path), &t.name), t))
            .collect();
        for sub in &self.suites {
            tests.extend(sub.all_tests(Some(&path)));
        }
        tests
    }

    /// 트리의 모든 스위트를 `(경로, 스위트)`로 나열합니다. 자신이 첫 번째입니다.
    pub fn all_suites(&self, parent_path: Option<&str>) -> Vec<(String, &Suite)> {
        let path = join_path(parent_path, &self.name);
        let mut suites = vec![(path.clone(), self)];
        for sub in &self.suites {
            suites.extend(sub.all_suites(Some(&path)));
        }
        suites
    }

    /// 테스트와 스위트 훅이 사용하는 픽스처 이름을 경로별로 나열합니다.
    pub fn fixture_usages(&self, parent_path: Option<&str>) -> Vec<(String, Vec<String>)> {
        let mut usages: Vec<(String, Vec<String>)> = self
            .all_suites(parent_path)
            .into_iter()
            .filter(|(_, s)| !s.fixtures.is_empty())
            .map(|(path, s)| (path, s.fixtures.clone()))
            .collect();
        usages.extend(
            self.all_tests(parent_path)
                .into_iter()
                .map(|(path, t)| (path, t.fixtures.clone())),
        );
        usages
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("tests", &self.tests)
            .field("suites", &self.suites)
            .field("has_setup", &self.setup.is_some())
            .field("has_teardown", &self.teardown.is_some())
            .finish_non_exhaustive()
    }
}
