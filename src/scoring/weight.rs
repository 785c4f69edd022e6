use std::collections::BTreeSet;
use std::fmt;

use crate::error::{GradeError, Result};
use crate::grade::GradeValue;
use crate::record::{Category, PerformanceRecord};

/// Weighted mean of a group of grades.
///
/// An accumulator built from no defined grade is empty: it has neither mean
/// nor weight, and combining with it returns the other operand unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Weight {
    mean: Option<GradeValue>,
    weight: Option<f64>,
    count: usize,
    categories: BTreeSet<Category>,
}

impl Default for Weight {
    fn default() -> Self {
        Self::empty()
    }
}

impl Weight {
    pub fn empty() -> Self {
        Self {
            mean: None,
            weight: None,
            count: 0,
            categories: BTreeSet::new(),
        }
    }

    /// Unweighted mean of the defined grades; undefined grades are skipped.
    pub fn from_grades(grades: &[GradeValue]) -> Result<Self> {
        let defined: Vec<&GradeValue> = grades.iter().filter(|g| g.is_defined()).collect();
        let Some(first) = defined.first() else {
            return Ok(Self::empty());
        };
        let scale = first.scale();
        if let Some(other) = defined.iter().find(|g| g.scale() != scale) {
            return Err(GradeError::ScaleMismatch {
                left: scale,
                right: other.scale(),
            });
        }

        let sum: f64 = defined.iter().filter_map(|g| g.value()).sum();
        let mean = GradeValue::clamped(sum / defined.len() as f64, scale)?;
        Ok(Self {
            mean: Some(mean),
            weight: None,
            count: defined.len(),
            categories: BTreeSet::new(),
        })
    }

    pub fn from_records(records: &[&PerformanceRecord]) -> Result<Self> {
        let grades: Vec<GradeValue> = records.iter().map(|r| *r.grade()).collect();
        let mut weight = Self::from_grades(&grades)?;
        if weight.mean.is_some() {
            weight.categories = records.iter().map(|r| r.category()).collect();
        }
        Ok(weight)
    }

    /// Weight of the whole group. Ignored for an empty accumulator.
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = self.mean.map(|_| weight);
        self
    }

    /// Weight `weight` for every contributing grade.
    pub fn with_weight_each(mut self, weight: f64) -> Self {
        let count = self.count as f64;
        self.weight = self.mean.map(|_| weight * count);
        self
    }

    /// Weight equal to the number of contributing grades.
    pub fn normalized(self) -> Self {
        self.with_weight_each(1.0)
    }

    pub fn mean(&self) -> Option<&GradeValue> {
        self.mean.as_ref()
    }

    pub fn weight(&self) -> Option<f64> {
        self.weight
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn categories(&self) -> &BTreeSet<Category> {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_none() && self.weight.is_none()
    }

    /// Weighted mean of both operands; the weights add up.
    pub fn combine(&self, other: &Weight) -> Result<Weight> {
        if self.is_empty() {
            return Ok(other.clone());
        }
        if other.is_empty() {
            return Ok(self.clone());
        }

        let (Some(a), Some(b)) = (self.mean, other.mean) else {
            return Err(GradeError::MissingWeight);
        };
        let (Some(wa), Some(wb)) = (self.weight, other.weight) else {
            return Err(GradeError::MissingWeight);
        };
        if a.scale() != b.scale() {
            return Err(GradeError::ScaleMismatch {
                left: a.scale(),
                right: b.scale(),
            });
        }

        let total = wa + wb;
        if total == 0.0 {
            return Err(GradeError::Validation(
                "combined weight of two accumulators is zero".to_string(),
            ));
        }
        let (Some(va), Some(vb)) = (a.value(), b.value()) else {
            return Err(GradeError::MissingWeight);
        };
        let mean = GradeValue::clamped((va * wa + vb * wb) / total, a.scale())?;

        Ok(Weight {
            mean: Some(mean),
            weight: Some(total),
            count: self.count + other.count,
            categories: self.categories.union(&other.categories).copied().collect(),
        })
    }
}

impl fmt::Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.weight, self.mean) {
            (Some(w), Some(m)) => write!(f, "{}*{}", w, m),
            (None, Some(m)) => write!(f, "?*{}", m),
            _ => write!(f, "empty"),
        }
    }
}
