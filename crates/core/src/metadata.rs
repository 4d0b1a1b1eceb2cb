//! 메타데이터 정책: 테스트/스위트에 허용되는 태그와 속성 규칙
//!
//! 규칙은 로드 시점에 검사되며, 처음 발견한 위반을 [`MetadataError`]로 반환합니다.
//! 검사 순서: 알 수 없는 속성 → 금지된 속성 → 필수 속성 → 허용 값 → 알 수 없는 태그 → 금지된 태그

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::error::{MetadataError, ProgrammingError, ZestError};
use crate::suite::{Suite, Test};

/// 규칙이 적용되는 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleTarget {
    pub on_test: bool,
    pub on_suite: bool,
}

impl RuleTarget {
    /// 테스트에만 적용 (기본값)
    pub const TESTS: Self = Self {
        on_test: true,
        on_suite: false,
    };
    pub const SUITES: Self = Self {
        on_test: false,
        on_suite: true,
    };
    pub const BOTH: Self = Self {
        on_test: true,
        on_suite: true,
    };

    fn applies_to(self, kind: TargetKind) -> bool {
        match kind {
            TargetKind::Test => self.on_test,
            TargetKind::Suite => self.on_suite,
        }
    }
}

impl Default for RuleTarget {
    fn default() -> Self {
        Self::TESTS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Test,
    Suite,
}

impl TargetKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Suite => "suite",
        }
    }
}

#[derive(Debug, Clone)]
struct PropertyRule {
    accepted_values: Option<Vec<String>>,
    target: RuleTarget,
    required: bool,
}

/// 메타데이터 정책
#[derive(Debug, Clone, Default)]
pub struct MetadataPolicy {
    properties: Vec<(String, PropertyRule)>,
    tags: Vec<(String, RuleTarget)>,
    disallow_unknown_properties: bool,
    disallow_unknown_tags: bool,
}

impl MetadataPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// 검사할 규칙이 하나라도 있는지 여부
    pub fn has_constraints(&self) -> bool {
        !self.properties.is_empty()
            || !self.tags.is_empty()
            || self.disallow_unknown_properties
            || self.disallow_unknown_tags
    }

    /// 속성 규칙을 추가합니다. 같은 이름의 규칙은 교체됩니다.
    ///
    /// # Errors
    ///
    /// 테스트와 스위트 어디에도 적용되지 않는 규칙이면
    /// [`ProgrammingError::InvalidRuleTarget`]을 반환합니다.
    pub fn add_property_rule(
        &mut self,
        name: impl Into<String>,
        accepted_values: Option<Vec<String>>,
        target: RuleTarget,
        required: bool,
    ) -> Result<(), ProgrammingError> {
        let name = name.into();
        check_target(&name, target)?;
        let rule = PropertyRule {
            accepted_values,
            target,
            required,
        };
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = rule,
            None => self.properties.push((name, rule)),
        }
        Ok(())
    }

    /// 태그 규칙을 추가합니다.
    pub fn add_tag_rule<I, S>(&mut self, tags: I, target: RuleTarget) -> Result<(), ProgrammingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for tag in tags {
            let tag = tag.into();
            check_target(&tag, target)?;
            match self.tags.iter_mut().find(|(t, _)| *t == tag) {
                Some((_, existing)) => *existing = target,
                None => self.tags.push((tag, target)),
            }
        }
        Ok(())
    }

    pub fn disallow_unknown_properties(&mut self) {
        self.disallow_unknown_properties = true;
    }

    pub fn disallow_unknown_tags(&mut self) {
        self.disallow_unknown_tags = true;
    }

    /// 테스트 하나를 검사합니다.
    pub fn check_test_compliance(&self, path: &str, test: &Test) -> Result<(), MetadataError> {
        self.check_compliance(TargetKind::Test, path, &test.properties, &test.tags)
    }

    /// 스위트 하나를 검사합니다. 하위 테스트와 스위트는 검사하지 않습니다.
    pub fn check_suite_compliance(&self, path: &str, suite: &Suite) -> Result<(), MetadataError> {
        self.check_compliance(TargetKind::Suite, path, &suite.properties, &suite.tags)
    }

    /// 스위트 트리 전체를 검사합니다.
    pub fn check_suites_compliance(&self, suites: &[Suite]) -> Result<(), ZestError> {
        if !self.has_constraints() {
            return Ok(());
        }
        for suite in suites {
            for (path, s) in suite.all_suites(None) {
                self.check_suite_compliance(&path, s)?;
            }
            for (path, t) in suite.all_tests(None) {
                self.check_test_compliance(&path, t)?;
            }
        }
        debug!(suites = suites.len(), "metadata policy checked");
        Ok(())
    }

    fn check_compliance(
        &self,
        kind: TargetKind,
        path: &str,
        properties: &BTreeMap<String, String>,
        tags: &[String],
    ) -> Result<(), MetadataError> {
        let available: HashMap<&str, &PropertyRule> = self
            .properties
            .iter()
            .filter(|(_, rule)| rule.target.applies_to(kind))
            .map(|(name, rule)| (name.as_str(), rule))
            .collect();
        let target = kind.as_str().to_owned();

        if self.disallow_unknown_properties {
            if let Some(name) = properties.keys().find(|n| !available.contains_key(n.as_str())) {
                return Err(MetadataError::UnknownProperty {
                    target,
                    path: path.to_owned(),
                    property: name.clone(),
                });
            }
        }

        for name in properties.keys() {
            let forbidden = self
                .properties
                .iter()
                .any(|(n, rule)| n == name && !rule.target.applies_to(kind));
            if forbidden {
                return Err(MetadataError::ForbiddenProperty {
                    target,
                    path: path.to_owned(),
                    property: name.clone(),
                });
            }
        }

        for (name, rule) in &self.properties {
            if rule.required && rule.target.applies_to(kind) && !properties.contains_key(name) {
                return Err(MetadataError::MissingProperty {
                    target,
                    path: path.to_owned(),
                    property: name.clone(),
                });
            }
        }

        for (name, value) in properties {
            let Some(rule) = available.get(name.as_str()) else {
                continue;
            };
            if let Some(accepted) = &rule.accepted_values {
                if !accepted.is_empty() && !accepted.contains(value) {
                    return Err(MetadataError::InvalidPropertyValue {
                        target,
                        path: path.to_owned(),
                        property: name.clone(),
                        value: value.clone(),
                        accepted: accepted.join(", "),
                    });
                }
            }
        }

        if self.disallow_unknown_tags {
            let unknown = tags.iter().find(|tag| {
                !self
                    .tags
                    .iter()
                    .any(|(t, rule)| t == *tag && rule.applies_to(kind))
            });
            if let Some(tag) = unknown {
                return Err(MetadataError::UnknownTag {
                    target,
                    path: path.to_owned(),
                    tag: tag.clone(),
                });
            }
        }

        for tag in tags {
            let forbidden = self
                .tags
                .iter()
                .any(|(t, rule)| t == tag && !rule.applies_to(kind));
            if forbidden {
                return Err(MetadataError::ForbiddenTag {
                    target,
                    path: path.to_owned(),
                    tag: tag.clone(),
                });
            }
        }

        Ok(())
    }
}

fn check_target(name: &str, target: RuleTarget) -> Result<(), ProgrammingError> {
    if target.on_test || target.on_suite {
        Ok(())
    } else {
        Err(ProgrammingError::InvalidRuleTarget(name.to_owned()))
    }
}
