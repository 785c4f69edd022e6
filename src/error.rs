use thiserror::Error;

use crate::grade::GradeScale;
use crate::record::Category;

pub type Result<T> = std::result::Result<T, GradeError>;

/// Everything the grade engine can reject.
///
/// Variants map one-to-one onto the kinds of bad input the engine detects:
/// malformed intake, values off the scale, inconsistent record sets and
/// regulation violations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GradeError {
    #[error("{0}")]
    Validation(String),

    #[error("invalid date '{0}', expected YYYY-MM-DD")]
    DateFormat(String),

    #[error("grade {value} outside of {scale} bounds [{min}, {max}]")]
    Range {
        value: f64,
        scale: GradeScale,
        min: f64,
        max: f64,
    },

    #[error("normalized grade {0} must lie within [0, 1]")]
    NormalizedRange(f64),

    #[error("cannot combine a {left} grade with a {right} grade")]
    ScaleMismatch { left: GradeScale, right: GradeScale },

    #[error("{from} cannot be converted to {to}")]
    Conversion { from: GradeScale, to: GradeScale },

    #[error("invalid oral period: {0}")]
    Period(String),

    #[error("{category} number {number} on {date} does not follow number {previous}")]
    Sequencing {
        category: Category,
        number: u32,
        previous: u32,
        date: chrono::NaiveDate,
    },

    #[error("{0}")]
    TimeWindow(String),

    #[error("too many records: {}", .0.join("; "))]
    LimitExceeded(Vec<String>),

    #[error("both accumulators carry a mean, so both need a weight")]
    MissingWeight,

    #[error("unknown record category '{0}'")]
    UnknownCategory(String),

    #[error("invalid configuration: {}", .0.join("; "))]
    Config(Vec<String>),
}
