use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GradeError, Result};
use crate::record::{Attribute, Category, PerformanceRecord};

/// What a limit rule counts: a record category or a whole attribute group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    Category(Category),
    Attribute(Attribute),
}

impl Selector {
    pub fn matches(&self, record: &PerformanceRecord) -> bool {
        match self {
            Selector::Category(category) => record.category() == *category,
            Selector::Attribute(attribute) => record.attribute() == *attribute,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Category(category) => write!(f, "{}", category),
            Selector::Attribute(attribute) => write!(f, "{}", attribute),
        }
    }
}

/// Count constraint over a grouping of records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitRule {
    pub grouping: Vec<Selector>,
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl LimitRule {
    pub fn new(grouping: Vec<Selector>, min: Option<usize>, max: Option<usize>) -> Self {
        Self { grouping, min, max }
    }

    /// Records matching any selector of the grouping.
    pub fn count(&self, records: &[PerformanceRecord]) -> usize {
        records
            .iter()
            .filter(|record| self.grouping.iter().any(|s| s.matches(record)))
            .count()
    }

    pub fn label(&self) -> String {
        self.grouping
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// Outcome of one rule against a record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleOutcome {
    pub rule: LimitRule,
    pub count: usize,
    pub passed: bool,
    /// Below the minimum; only warned about
    pub soft_fail: bool,
    /// Above the maximum; blocks the calculation
    pub hard_fail: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitReport {
    pub passed: bool,
    pub soft_fail: bool,
    pub hard_fail: bool,
    pub rules: Vec<RuleOutcome>,
}

impl LimitReport {
    pub fn warnings(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter(|o| o.soft_fail)
            .map(|o| {
                format!(
                    "too few records: {}: {} < {}",
                    o.rule.label(),
                    o.count,
                    o.rule.min.unwrap_or_default()
                )
            })
            .collect()
    }

    pub fn violations(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter(|o| o.hard_fail)
            .map(|o| {
                format!(
                    "{}: {} > {}",
                    o.rule.label(),
                    o.count,
                    o.rule.max.unwrap_or_default()
                )
            })
            .collect()
    }
}

/// A named rule set from the grading regulation.
///
/// Every rule set starts with the base rule that at least one oral, written
/// or practical record exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulationLimits {
    pub name: String,
    pub rules: Vec<LimitRule>,
}

impl RegulationLimits {
    fn base_rule() -> LimitRule {
        LimitRule::new(
            vec![
                Selector::Attribute(Attribute::Oral),
                Selector::Attribute(Attribute::Written),
                Selector::Attribute(Attribute::Practical),
            ],
            Some(1),
            None,
        )
    }

    /// Rule set with the base rule followed by `rules`.
    pub fn custom(name: &str, rules: Vec<LimitRule>) -> Self {
        let mut all = vec![Self::base_rule()];
        all.extend(rules);
        Self {
            name: name.to_string(),
            rules: all,
        }
    }

    /// Kernfach: at least one oral grade and four written exams.
    pub fn core_subject() -> Self {
        Self::custom(
            "Kernfach",
            vec![
                LimitRule::new(vec![Selector::Attribute(Attribute::Oral)], Some(1), None),
                LimitRule::new(vec![Selector::Category(Category::WrittenExam)], Some(4), None),
            ],
        )
    }

    /// Nichtkernfach: at most four written exams and short tests combined.
    pub fn non_core_subject() -> Self {
        Self::custom(
            "Nichtkernfach",
            vec![
                LimitRule::new(
                    vec![
                        Selector::Category(Category::WrittenExam),
                        Selector::Category(Category::ShortTest),
                    ],
                    None,
                    Some(4),
                ),
                LimitRule::new(vec![Selector::Attribute(Attribute::Oral)], Some(1), None),
            ],
        )
    }

    /// Leistungskurs: at least one oral grade and two written exams.
    pub fn advanced_course() -> Self {
        Self::custom(
            "LK",
            vec![
                LimitRule::new(vec![Selector::Attribute(Attribute::Oral)], Some(1), None),
                LimitRule::new(vec![Selector::Category(Category::WrittenExam)], Some(2), None),
            ],
        )
    }

    pub fn check(&self, records: &[PerformanceRecord]) -> LimitReport {
        let rules: Vec<RuleOutcome> = self
            .rules
            .iter()
            .map(|rule| {
                let count = rule.count(records);
                let soft_fail = rule.min.is_some_and(|min| count < min);
                let hard_fail = rule.max.is_some_and(|max| count > max);
                RuleOutcome {
                    rule: rule.clone(),
                    count,
                    passed: !soft_fail && !hard_fail,
                    soft_fail,
                    hard_fail,
                }
            })
            .collect();

        LimitReport {
            passed: rules.iter().all(|o| o.passed),
            soft_fail: rules.iter().any(|o| o.soft_fail),
            hard_fail: rules.iter().any(|o| o.hard_fail),
            rules,
        }
    }

    /// Check `records`, warn about soft failures and reject hard failures.
    pub fn enforce(&self, records: &[PerformanceRecord], emit_warnings: bool) -> Result<LimitReport> {
        let report = self.check(records);

        if emit_warnings {
            for warning in report.warnings() {
                tracing::warn!(limits = %self.name, "{}", warning);
            }
        }

        if report.hard_fail {
            let violations = report.violations();
            for violation in &violations {
                tracing::error!(limits = %self.name, "too many records: {}", violation);
            }
            return Err(GradeError::LimitExceeded(violations));
        }

        Ok(report)
    }
}
