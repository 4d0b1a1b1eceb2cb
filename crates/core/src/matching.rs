//! 매처: `check_that`/`require_that`에 사용하는 값 검사기
//!
//! 각 매처는 부정사형(`to be equal to 1`)과 3인칭형(`is equal to 1`) 설명을 만들고,
//! 실패 시 실제 값을 담은 상세 메시지를 돌려줍니다.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Debug;
use std::hash::BuildHasher;

use regex::Regex;

/// 매칭 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub outcome: bool,
    /// 체크 상세 메시지. `None`이면 실제 값을 그대로 표시합니다.
    pub details: Option<String>,
}

impl MatchResult {
    pub fn new(outcome: bool, details: impl Into<String>) -> Self {
        Self {
            outcome,
            details: Some(details.into()),
        }
    }

    pub fn success() -> Self {
        Self {
            outcome: true,
            details: None,
        }
    }

    pub fn failure(details: impl Into<String>) -> Self {
        Self::new(false, details)
    }
}

fn got<T: Debug + ?Sized>(actual: &T) -> String {
    format!("got {actual:?}")
}

/// 값 검사기
pub trait Matcher<T: ?Sized> {
    /// `conjugate`가 참이면 3인칭형(`is ...`), 아니면 부정사형(`to be ...`)을 반환합니다.
    fn describe(&self, conjugate: bool) -> String;

    fn matches(&self, actual: &T) -> MatchResult;

    fn description(&self) -> String {
        self.describe(false)
    }
}

// ─── 비교 ────────────────────────────────────────────────────────────

/// 동등 비교 매처
#[derive(Debug, Clone)]
pub struct Equality<E> {
    expected: E,
    negate: bool,
}

impl<T, E> Matcher<T> for Equality<E>
where
    T: PartialEq<E> + Debug + ?Sized,
    E: Debug,
{
    fn describe(&self, conjugate: bool) -> String {
        let verb = if conjugate { "is" } else { "to be" };
        let phrase = if self.negate {
            "not equal to"
        } else {
            "equal to"
        };
        format!("{verb} {phrase} {:?}", self.expected)
    }

    fn matches(&self, actual: &T) -> MatchResult {
        let equal = actual == &self.expected;
        MatchResult::new(equal != self.negate, got(actual))
    }
}

pub fn equal_to<E>(expected: E) -> Equality<E> {
    Equality {
        expected,
        negate: false,
    }
}

pub fn not_equal_to<E>(expected: E) -> Equality<E> {
    Equality {
        expected,
        negate: true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bound {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
}

impl Bound {
    fn phrase(self) -> &'static str {
        match self {
            Self::Greater => "greater than",
            Self::GreaterOrEqual => "greater than or equal to",
            Self::Less => "lower than",
            Self::LessOrEqual => "lower than or equal to",
        }
    }
}

/// 크기 비교 매처
#[derive(Debug, Clone)]
pub struct Ordering<E> {
    expected: E,
    bound: Bound,
}

impl<T, E> Matcher<T> for Ordering<E>
where
    T: PartialOrd<E> + Debug + ?Sized,
    E: Debug,
{
    fn describe(&self, conjugate: bool) -> String {
        let verb = if conjugate { "is" } else { "to be" };
        format!("{verb} {} {:?}", self.bound.phrase(), self.expected)
    }

    fn matches(&self, actual: &T) -> MatchResult {
        let outcome = match self.bound {
            Bound::Greater => actual > &self.expected,
            Bound::GreaterOrEqual => actual >= &self.expected,
            Bound::Less => actual < &self.expected,
            Bound::LessOrEqual => actual <= &self.expected,
        };
        MatchResult::new(outcome, got(actual))
    }
}

pub fn greater_than<E>(expected: E) -> Ordering<E> {
    Ordering {
        expected,
        bound: Bound::Greater,
    }
}

pub fn greater_than_or_equal_to<E>(expected: E) -> Ordering<E> {
    Ordering {
        expected,
        bound: Bound::GreaterOrEqual,
    }
}

pub fn less_than<E>(expected: E) -> Ordering<E> {
    Ordering {
        expected,
        bound: Bound::Less,
    }
}

pub fn less_than_or_equal_to<E>(expected: E) -> Ordering<E> {
    Ordering {
        expected,
        bound: Bound::LessOrEqual,
    }
}

// ─── 문자열 ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextOp {
    StartsWith,
    EndsWith,
    Contains,
}

/// 문자열 접두어/접미어/부분 문자열 매처
#[derive(Debug, Clone)]
pub struct Text {
    expected: String,
    op: TextOp,
}

impl<T: AsRef<str> + Debug + ?Sized> Matcher<T> for Text {
    fn describe(&self, conjugate: bool) -> String {
        let verb = match (self.op, conjugate) {
            (TextOp::StartsWith, true) => "starts with",
            (TextOp::StartsWith, false) => "to start with",
            (TextOp::EndsWith, true) => "ends with",
            (TextOp::EndsWith, false) => "to end with",
            (TextOp::Contains, true) => "contains",
            (TextOp::Contains, false) => "to contain",
        };
        format!("{verb} \"{}\"", self.expected)
    }

    fn matches(&self, actual: &T) -> MatchResult {
        let s = actual.as_ref();
        let outcome = match self.op {
            TextOp::StartsWith => s.starts_with(&self.expected),
            TextOp::EndsWith => s.ends_with(&self.expected),
            TextOp::Contains => s.contains(&self.expected),
        };
        MatchResult::new(outcome, got(actual))
    }
}

pub fn starts_with(prefix: impl Into<String>) -> Text {
    Text {
        expected: prefix.into(),
        op: TextOp::StartsWith,
    }
}

pub fn ends_with(suffix: impl Into<String>) -> Text {
    Text {
        expected: suffix.into(),
        op: TextOp::EndsWith,
    }
}

pub fn contains_string(needle: impl Into<String>) -> Text {
    Text {
        expected: needle.into(),
        op: TextOp::Contains,
    }
}

/// 정규식 검색 매처
#[derive(Debug, Clone)]
pub struct MatchPattern {
    pattern: Regex,
}

impl<T: AsRef<str> + Debug + ?Sized> Matcher<T> for MatchPattern {
    fn describe(&self, conjugate: bool) -> String {
        let verb = if conjugate {
            "matches pattern"
        } else {
            "to match pattern"
        };
        format!("{verb} \"{}\"", self.pattern.as_str())
    }

    fn matches(&self, actual: &T) -> MatchResult {
        MatchResult::new(self.pattern.is_match(actual.as_ref()), got(actual))
    }
}

/// 문자열 어딘가에 정규식이 일치하는지 검사합니다.
pub fn match_pattern(pattern: Regex) -> MatchPattern {
    MatchPattern { pattern }
}

// ─── 컬렉션 ──────────────────────────────────────────────────────────

/// 목록 중 하나라도 내부 매처를 만족하는지 검사합니다.
#[derive(Debug, Clone)]
pub struct HasItem<M> {
    inner: M,
}

impl<T, M> Matcher<[T]> for HasItem<M>
where
    T: Debug,
    M: Matcher<T>,
{
    fn describe(&self, conjugate: bool) -> String {
        let verb = if conjugate { "has" } else { "to have" };
        format!("{verb} an item whose value {}", self.inner.describe(true))
    }

    fn matches(&self, actual: &[T]) -> MatchResult {
        match actual.iter().position(|item| self.inner.matches(item).outcome) {
            Some(index) => MatchResult::new(true, format!("found matching item at index {index}")),
            None => MatchResult::failure("no matching item"),
        }
    }
}

impl<T, M> Matcher<Vec<T>> for HasItem<M>
where
    T: Debug,
    M: Matcher<T>,
{
    fn describe(&self, conjugate: bool) -> String {
        <Self as Matcher<[T]>>::describe(self, conjugate)
    }

    fn matches(&self, actual: &Vec<T>) -> MatchResult {
        <Self as Matcher<[T]>>::matches(self, actual.as_slice())
    }
}

pub fn has_item<M>(inner: M) -> HasItem<M> {
    HasItem { inner }
}

/// 맵에 키가 있고 그 값이 내부 매처를 만족하는지 검사합니다.
#[derive(Debug, Clone)]
pub struct HasEntry<M> {
    key: String,
    inner: M,
}

impl<M> HasEntry<M> {
    fn describe_entry<V: ?Sized>(&self, conjugate: bool) -> String
    where
        M: Matcher<V>,
    {
        let verb = if conjugate { "has" } else { "to have" };
        format!(
            "{verb} entry '{}' that {}",
            self.key,
            self.inner.describe(true)
        )
    }

    fn match_value<V: ?Sized>(&self, value: Option<&V>) -> MatchResult
    where
        M: Matcher<V>,
    {
        match value {
            Some(value) => self.inner.matches(value),
            None => MatchResult::failure(format!("No entry '{}'", self.key)),
        }
    }
}

impl<V, M> Matcher<BTreeMap<String, V>> for HasEntry<M>
where
    M: Matcher<V>,
{
    fn describe(&self, conjugate: bool) -> String {
        self.describe_entry::<V>(conjugate)
    }

    fn matches(&self, actual: &BTreeMap<String, V>) -> MatchResult {
        self.match_value(actual.get(&self.key))
    }
}

impl<V, M, S> Matcher<HashMap<String, V, S>> for HasEntry<M>
where
    M: Matcher<V>,
    S: BuildHasher,
{
    fn describe(&self, conjugate: bool) -> String {
        self.describe_entry::<V>(conjugate)
    }

    fn matches(&self, actual: &HashMap<String, V, S>) -> MatchResult {
        self.match_value(actual.get(&self.key))
    }
}

pub fn has_entry<M>(key: impl Into<String>, inner: M) -> HasEntry<M> {
    HasEntry {
        key: key.into(),
        inner,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_to_description_and_result() {
        let matcher = equal_to(1);
        assert_eq!(Matcher::<i32>::description(&matcher), "to be equal to 1");
        assert!(matcher.matches(&1).outcome);
        let result = matcher.matches(&2);
        assert!(!result.outcome);
        assert_eq!(result.details.as_deref(), Some("got 2"));
    }

    #[test]
    fn ordering_matchers() {
        assert!(greater_than(3).matches(&4).outcome);
        assert!(!greater_than(3).matches(&3).outcome);
        assert!(greater_than_or_equal_to(3).matches(&3).outcome);
        assert!(less_than(3).matches(&2).outcome);
        assert!(less_than_or_equal_to(3).matches(&3).outcome);
        assert!(not_equal_to(3).matches(&2).outcome);
    }

    #[test]
    fn string_matchers() {
        assert!(starts_with("foo").matches("foobar").outcome);
        assert!(!starts_with("bar").matches("foobar").outcome);
        assert!(ends_with("bar").matches(&"foobar".to_owned()).outcome);
        assert!(contains_string("oba").matches("foobar").outcome);
        assert_eq!(
            Matcher::<str>::description(&starts_with("foo")),
            "to start with \"foo\""
        );
    }

    #[test]
    fn pattern_matcher_searches_anywhere() {
        let matcher = match_pattern(Regex::new(r"\d{3}").unwrap());
        assert!(matcher.matches("abc123def").outcome);
        assert!(!matcher.matches("abc12").outcome);
        assert_eq!(
            Matcher::<str>::describe(&matcher, true),
            "matches pattern \"\\d{3}\""
        );
    }

    #[test]
    fn has_item_uses_inner_conjugated_description() {
        let matcher = has_item(equal_to(2));
        assert_eq!(
            Matcher::<Vec<i32>>::description(&matcher),
            "to have an item whose value is equal to 2"
        );
        assert!(matcher.matches(&vec![1, 2, 3]).outcome);
        assert!(!matcher.matches(&vec![4, 5]).outcome);
    }

    #[test]
    fn has_entry_reports_missing_key() {
        let mut map = BTreeMap::new();
        map.insert("status".to_owned(), "ok".to_owned());
        assert!(has_entry("status", equal_to("ok")).matches(&map).outcome);

        let result = has_entry("code", equal_to("200")).matches(&map);
        assert!(!result.outcome);
        assert_eq!(result.details.as_deref(), Some("No entry 'code'"));
    }

    #[test]
    fn has_entry_on_hash_map() {
        let mut map = HashMap::new();
        map.insert("n".to_owned(), 5);
        assert!(has_entry("n", greater_than(3)).matches(&map).outcome);
    }
}
