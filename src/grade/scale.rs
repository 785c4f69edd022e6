use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GradeError, Result};

/// A numeric grading scale.
///
/// Only `Six` and `Fifteen` are used for calculations. `Pseudo6` is the
/// historical shifted 6-point scale and `Normalized` is the [0, 1] hub both
/// are converted through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeScale {
    /// 1 (sehr gut) to 6 (ungenügend)
    Six,
    /// 15 (sehr gut) to 0 (ungenügend)
    Fifteen,
    /// 2/3 to 5 2/3, legacy intermediate scale
    Pseudo6,
    /// 1 best, 0 worst
    Normalized,
}

/// Permitted direct conversions. Same-scale conversion is always a no-op.
const CONVERSIONS: &[(GradeScale, &[GradeScale])] = &[
    (GradeScale::Six, &[GradeScale::Normalized]),
    (
        GradeScale::Pseudo6,
        &[GradeScale::Normalized, GradeScale::Fifteen, GradeScale::Six],
    ),
    (
        GradeScale::Fifteen,
        &[GradeScale::Normalized, GradeScale::Pseudo6],
    ),
    (
        GradeScale::Normalized,
        &[
            GradeScale::Normalized,
            GradeScale::Fifteen,
            GradeScale::Six,
            GradeScale::Pseudo6,
        ],
    ),
];

impl GradeScale {
    pub fn good(self) -> f64 {
        match self {
            GradeScale::Six => 1.0,
            GradeScale::Fifteen => 15.0,
            GradeScale::Pseudo6 => 2.0 / 3.0,
            GradeScale::Normalized => 1.0,
        }
    }

    pub fn bad(self) -> f64 {
        match self {
            GradeScale::Six => 6.0,
            GradeScale::Fifteen => 0.0,
            GradeScale::Pseudo6 => 5.0 + 2.0 / 3.0,
            GradeScale::Normalized => 0.0,
        }
    }

    /// True when a numerically lower grade is the better one.
    pub fn lower_is_better(self) -> bool {
        self.bad() > self.good()
    }

    pub fn range(self) -> f64 {
        (self.good() - self.bad()).abs()
    }

    /// `(min, max)` regardless of direction.
    pub fn bounds(self) -> (f64, f64) {
        (self.good().min(self.bad()), self.good().max(self.bad()))
    }

    pub fn contains(self, value: f64) -> bool {
        let (min, max) = self.bounds();
        (min..=max).contains(&value)
    }

    /// Whether the aggregation algorithm can run on this scale.
    pub fn is_calculation_scale(self) -> bool {
        matches!(self, GradeScale::Six | GradeScale::Fifteen)
    }

    pub fn permitted_targets(self) -> &'static [GradeScale] {
        CONVERSIONS
            .iter()
            .find(|(source, _)| *source == self)
            .map(|(_, targets)| *targets)
            .unwrap_or(&[])
    }

    pub fn can_convert_to(self, target: GradeScale) -> bool {
        self == target || self.permitted_targets().contains(&target)
    }

    /// Map a grade to a fraction where 0 is the worst and 1 the best grade.
    pub fn to_normalized(self, value: f64) -> Result<f64> {
        let norm = (value - self.bad()).abs() / self.range();
        if !(0.0..=1.0).contains(&norm) {
            return Err(GradeError::NormalizedRange(norm));
        }
        Ok(norm)
    }

    pub fn from_normalized(self, norm: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&norm) {
            return Err(GradeError::NormalizedRange(norm));
        }
        if self.lower_is_better() {
            Ok(self.bad() - norm * self.range())
        } else {
            Ok(norm * self.range() + self.bad())
        }
    }

    /// Parse the short names used in config files and on the command line.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "six" | "6" => Some(GradeScale::Six),
            "np" | "fifteen" | "15" => Some(GradeScale::Fifteen),
            "nps" | "pseudo6" => Some(GradeScale::Pseudo6),
            "norm" | "normalized" => Some(GradeScale::Normalized),
            _ => None,
        }
    }
}

impl fmt::Display for GradeScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GradeScale::Six => "N",
            GradeScale::Fifteen => "NP",
            GradeScale::Pseudo6 => "N Pseudo",
            GradeScale::Normalized => "norm",
        };
        write!(f, "{}", name)
    }
}
