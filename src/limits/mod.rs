pub mod rules;
pub mod subject;

pub use rules::{LimitReport, LimitRule, RegulationLimits, RuleOutcome, Selector};
pub use subject::Subject;
