use serde::{Deserialize, Serialize};
use std::fmt;

use super::scale::GradeScale;
use crate::error::{GradeError, Result};

/// Which rounding a grade is rendered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    /// Quarter steps on the 6-point scale ("Halbjahresinformation")
    Interim,
    /// Whole grades ("Zeugnis")
    Final,
}

/// A grade bound to its scale.
///
/// The value may be undefined; undefined grades are skipped when means are
/// formed and propagate through arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeValue {
    value: Option<f64>,
    scale: GradeScale,
}

impl GradeValue {
    /// Create a grade, rejecting values outside the scale bounds.
    pub fn new(value: f64, scale: GradeScale) -> Result<Self> {
        if !scale.contains(value) {
            let (min, max) = scale.bounds();
            return Err(GradeError::Range {
                value,
                scale,
                min,
                max,
            });
        }
        Ok(Self {
            value: Some(value),
            scale,
        })
    }

    /// Grade from a computed mean, pulled back onto the scale.
    ///
    /// Weighted sums can land a rounding error beyond the worst or best
    /// grade. Only NaN is rejected.
    pub(crate) fn clamped(value: f64, scale: GradeScale) -> Result<Self> {
        let (min, max) = scale.bounds();
        if value.is_nan() {
            return Err(GradeError::Range {
                value,
                scale,
                min,
                max,
            });
        }
        Self::new(value.clamp(min, max), scale)
    }

    pub fn undefined(scale: GradeScale) -> Self {
        Self { value: None, scale }
    }

    pub fn from_option(value: Option<f64>, scale: GradeScale) -> Result<Self> {
        match value {
            Some(v) => Self::new(v, scale),
            None => Ok(Self::undefined(scale)),
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn scale(&self) -> GradeScale {
        self.scale
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    fn operate(&self, other: &GradeValue, op: impl Fn(f64, f64) -> f64) -> Result<Self> {
        if self.scale != other.scale {
            return Err(GradeError::ScaleMismatch {
                left: self.scale,
                right: other.scale,
            });
        }
        self.operate_scalar(other.value, op)
    }

    fn operate_scalar(&self, other: Option<f64>, op: impl Fn(f64, f64) -> f64) -> Result<Self> {
        match (self.value, other) {
            (Some(a), Some(b)) => Self::new(op(a, b), self.scale),
            _ => Ok(Self::undefined(self.scale)),
        }
    }

    pub fn add(&self, other: &GradeValue) -> Result<Self> {
        self.operate(other, |a, b| a + b)
    }

    pub fn sub(&self, other: &GradeValue) -> Result<Self> {
        self.operate(other, |a, b| a - b)
    }

    pub fn mul(&self, other: &GradeValue) -> Result<Self> {
        self.operate(other, |a, b| a * b)
    }

    pub fn div(&self, other: &GradeValue) -> Result<Self> {
        self.operate(other, |a, b| a / b)
    }

    /// Shift the grade by a plain number, staying on the same scale.
    pub fn offset(&self, delta: f64) -> Result<Self> {
        self.operate_scalar(Some(delta), |a, b| a + b)
    }

    /// Halfway point between the neighbouring whole grades.
    pub fn midpoint(&self) -> Option<f64> {
        self.value.map(|v| (v.ceil() + v.floor()) / 2.0)
    }

    /// Whole-grade rounding. Exact halves go to the worse grade.
    pub fn round_final(&self) -> Option<f64> {
        self.value.map(|v| round_half_worse(v, self.scale))
    }

    /// Quarter-step rounding on the 6-point scale; whole points on 0-15.
    pub fn round_interim(&self) -> Option<f64> {
        match self.scale {
            GradeScale::Six => self
                .value
                .map(|v| round_half_worse(v * 4.0, self.scale) / 4.0),
            _ => self.round_final(),
        }
    }

    /// Render the grade the way it is written on a report.
    ///
    /// On the 6-point scale the interim rendering uses the tendency marks:
    /// 2.25 is "2-", 2.5 is "2-3" and 2.75 is "3+".
    pub fn to_display_string(&self, mode: RoundingMode) -> String {
        let rounded = match mode {
            RoundingMode::Interim => self.round_interim(),
            RoundingMode::Final => self.round_final(),
        };
        let Some(value) = rounded else {
            return "---".to_string();
        };

        match self.scale {
            GradeScale::Fifteen => format!("{}", round_half_worse(value, self.scale) as i64),
            GradeScale::Six => {
                if mode == RoundingMode::Final || value == round_half_worse(value, self.scale) {
                    return format!("{}", round_half_worse(value, self.scale) as i64);
                }
                let whole = value.trunc() as i64;
                let fraction = value % 1.0;
                if fraction <= 0.25 {
                    format!("{}-", whole)
                } else if fraction >= 0.75 {
                    format!("{}+", whole + 1)
                } else {
                    format!("{}-{}", whole, whole + 1)
                }
            }
            GradeScale::Pseudo6 | GradeScale::Normalized => format!("{:.2}", value),
        }
    }

    /// Verbal grade for the final rounding, e.g. "befriedigend".
    pub fn verbal_label(&self) -> Option<&'static str> {
        let rounded = self.round_final()? as i64;
        match self.scale {
            GradeScale::Six => match rounded {
                1 => Some("sehr gut"),
                2 => Some("gut"),
                3 => Some("befriedigend"),
                4 => Some("ausreichend"),
                5 => Some("mangelhaft"),
                6 => Some("ungenügend"),
                _ => None,
            },
            GradeScale::Fifteen => match rounded {
                13..=15 => Some("sehr gut"),
                10..=12 => Some("gut"),
                7..=9 => Some("befriedigend"),
                5..=6 => Some("ausreichend"),
                4 => Some("schwach ausreichend"),
                1..=3 => Some("mangelhaft"),
                0 => Some("ungenügend"),
                _ => None,
            },
            GradeScale::Pseudo6 | GradeScale::Normalized => None,
        }
    }

    /// Convert along a declared edge of the conversion table.
    pub fn convert_to(&self, target: GradeScale) -> Result<Self> {
        if target == self.scale {
            return Ok(*self);
        }
        if !self.scale.can_convert_to(target) {
            return Err(GradeError::Conversion {
                from: self.scale,
                to: target,
            });
        }
        let Some(value) = self.value else {
            return Ok(Self::undefined(target));
        };

        if self.scale == GradeScale::Pseudo6 && target == GradeScale::Six {
            // Lossy: the value is kept and only clamped onto the 1-6 range.
            tracing::warn!(value, "inconsistent conversion from {} to {}", self.scale, target);
            let kept = if !(1.0..=5.5).contains(&value) {
                value.round()
            } else {
                value
            };
            return Self::new(kept, target);
        }

        let norm = self.scale.to_normalized(value)?;
        Self::new(target.from_normalized(norm)?, target)
    }

    /// Convert directly when allowed, otherwise through the normalized scale.
    pub fn convert_via_normalized(&self, target: GradeScale) -> Result<Self> {
        if self.scale.can_convert_to(target) {
            return self.convert_to(target);
        }
        self.convert_to(GradeScale::Normalized)?.convert_to(target)
    }
}

impl fmt::Display for GradeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Some(v) => write!(f, "{:.2}", v),
            None => write!(f, "---"),
        }
    }
}

/// Round to whole numbers; exact halves move toward the bad end of the scale.
pub fn round_half_worse(value: f64, scale: GradeScale) -> f64 {
    if value % 1.0 == 0.5 {
        match scale {
            GradeScale::Six => value.ceil(),
            GradeScale::Fifteen => value.floor(),
            GradeScale::Pseudo6 | GradeScale::Normalized => value.round(),
        }
    } else {
        value.round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn six(v: f64) -> GradeValue {
        GradeValue::new(v, GradeScale::Six).unwrap()
    }

    fn fifteen(v: f64) -> GradeValue {
        GradeValue::new(v, GradeScale::Fifteen).unwrap()
    }

    #[test]
    fn test_clamped_absorbs_rounding_drift() {
        assert_eq!(
            GradeValue::clamped(6.000000000000001, GradeScale::Six).unwrap().value(),
            Some(6.0)
        );
        assert_eq!(
            GradeValue::clamped(15.000000000000002, GradeScale::Fifteen).unwrap().value(),
            Some(15.0)
        );
        assert_eq!(GradeValue::clamped(2.5, GradeScale::Six).unwrap().value(), Some(2.5));
        assert!(GradeValue::clamped(f64::NAN, GradeScale::Six).is_err());
        assert!(GradeValue::new(6.000000000000001, GradeScale::Six).is_err());
    }

    #[test]
    fn test_bounds_are_enforced() {
        assert!(GradeValue::new(1.0, GradeScale::Six).is_ok());
        assert!(GradeValue::new(6.0, GradeScale::Six).is_ok());
        assert!(matches!(
            GradeValue::new(0.5, GradeScale::Six),
            Err(GradeError::Range { .. })
        ));
        assert!(GradeValue::new(6.01, GradeScale::Six).is_err());
        assert!(GradeValue::new(0.0, GradeScale::Fifteen).is_ok());
        assert!(GradeValue::new(15.5, GradeScale::Fifteen).is_err());
        assert!(GradeValue::from_option(None, GradeScale::Six).is_ok());
    }

    #[test]
    fn test_arithmetic_requires_same_scale() {
        let result = six(2.0).add(&fifteen(2.0));
        assert!(matches!(result, Err(GradeError::ScaleMismatch { .. })));
        assert_eq!(six(2.0).add(&six(1.5)).unwrap().value(), Some(3.5));
        assert_eq!(six(4.0).div(&six(2.0)).unwrap().value(), Some(2.0));
    }

    #[test]
    fn test_arithmetic_leaving_the_scale_fails() {
        assert!(six(4.0).add(&six(3.0)).is_err());
        assert!(six(2.0).offset(-1.5).is_err());
    }

    #[test]
    fn test_undefined_propagates() {
        let undefined = GradeValue::undefined(GradeScale::Six);
        assert_eq!(six(2.0).add(&undefined).unwrap().value(), None);
        assert_eq!(undefined.offset(1.0).unwrap().value(), None);
    }

    #[test]
    fn test_final_rounding_ties_toward_worse() {
        assert_eq!(six(2.5).round_final(), Some(3.0));
        assert_eq!(six(2.49).round_final(), Some(2.0));
        assert_eq!(fifteen(10.5).round_final(), Some(10.0));
        assert_eq!(fifteen(10.51).round_final(), Some(11.0));
    }

    #[test]
    fn test_interim_rounding_quarter_steps() {
        assert_eq!(six(2.3).round_interim(), Some(2.25));
        assert_eq!(six(2.125).round_interim(), Some(2.25));
        assert_eq!(six(2.6).round_interim(), Some(2.5));
        assert_eq!(fifteen(9.6).round_interim(), Some(10.0));
    }

    #[test]
    fn test_display_six_interim() {
        assert_eq!(six(2.0).to_display_string(RoundingMode::Interim), "2");
        assert_eq!(six(2.25).to_display_string(RoundingMode::Interim), "2-");
        assert_eq!(six(2.5).to_display_string(RoundingMode::Interim), "2-3");
        assert_eq!(six(2.75).to_display_string(RoundingMode::Interim), "3+");
        assert_eq!(six(2.9).to_display_string(RoundingMode::Interim), "3");
    }

    #[test]
    fn test_display_final_is_integer() {
        assert_eq!(six(2.5).to_display_string(RoundingMode::Final), "3");
        assert_eq!(six(2.25).to_display_string(RoundingMode::Final), "2");
        assert_eq!(fifteen(11.5).to_display_string(RoundingMode::Interim), "11");
        assert_eq!(fifteen(11.6).to_display_string(RoundingMode::Final), "12");
        assert_eq!(
            GradeValue::undefined(GradeScale::Six).to_display_string(RoundingMode::Final),
            "---"
        );
    }

    #[test]
    fn test_verbal_labels() {
        assert_eq!(six(2.4).verbal_label(), Some("gut"));
        assert_eq!(six(3.5).verbal_label(), Some("ausreichend"));
        assert_eq!(fifteen(4.0).verbal_label(), Some("schwach ausreichend"));
        assert_eq!(fifteen(14.0).verbal_label(), Some("sehr gut"));
        assert_eq!(GradeValue::undefined(GradeScale::Six).verbal_label(), None);
    }

    #[test]
    fn test_midpoint() {
        assert_eq!(six(2.3).midpoint(), Some(2.5));
        assert_eq!(six(3.0).midpoint(), Some(3.0));
    }

    #[test]
    fn test_conversion_requires_declared_target() {
        assert!(matches!(
            six(2.0).convert_to(GradeScale::Fifteen),
            Err(GradeError::Conversion { .. })
        ));
        let norm = six(1.0).convert_to(GradeScale::Normalized).unwrap();
        assert_eq!(norm.value(), Some(1.0));
    }

    #[test]
    fn test_round_trip_conversions() {
        let pairs = [
            (GradeScale::Six, GradeScale::Normalized, 2.7),
            (GradeScale::Fifteen, GradeScale::Normalized, 11.0),
            (GradeScale::Fifteen, GradeScale::Pseudo6, 7.5),
            (GradeScale::Normalized, GradeScale::Pseudo6, 0.3),
        ];
        for (from, to, value) in pairs {
            let original = GradeValue::new(value, from).unwrap();
            let back = original.convert_to(to).unwrap().convert_to(from).unwrap();
            let diff = (back.value().unwrap() - value).abs();
            assert!(diff < 1e-9, "{} -> {} -> {}: {}", from, to, from, diff);
        }
    }

    #[test]
    fn test_pseudo_to_six_is_lossy() {
        let low = GradeValue::new(0.8, GradeScale::Pseudo6).unwrap();
        assert_eq!(low.convert_to(GradeScale::Six).unwrap().value(), Some(1.0));

        let high = GradeValue::new(5.6, GradeScale::Pseudo6).unwrap();
        assert_eq!(high.convert_to(GradeScale::Six).unwrap().value(), Some(6.0));

        let middle = GradeValue::new(3.3, GradeScale::Pseudo6).unwrap();
        assert_eq!(middle.convert_to(GradeScale::Six).unwrap().value(), Some(3.3));
    }

    #[test]
    fn test_convert_via_normalized_hub() {
        let converted = six(1.0).convert_via_normalized(GradeScale::Fifteen).unwrap();
        assert_eq!(converted.value(), Some(15.0));
        let back = fifteen(0.0).convert_via_normalized(GradeScale::Six).unwrap();
        assert_eq!(back.value(), Some(6.0));
    }
}
