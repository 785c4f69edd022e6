use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::grade::GradeScale;

/// Policy constants of the grade calculation.
///
/// Example YAML:
/// ```yaml
/// w_th: 0.4
/// w_s0: 1
/// w_sm: 3
/// n_kt_0: 3
/// scale: six
/// improvement_enabled: true
/// subject: M
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct EngineConfig {
    /// Distance from the midline within which an improvement counts
    pub w_th: f64,

    /// Full weight of the short-test category
    pub w_s0: f64,

    /// Weight of the written sub-grade against the oral mean
    pub w_sm: f64,

    /// Number of short tests at which they reach full weight
    pub n_kt_0: u32,

    pub scale: GradeScale,

    pub improvement_enabled: bool,

    /// Built-in subject code ("M", "Ph", "PhLK", "Inf") whose limits apply
    pub subject: Option<String>,

    /// "Today" for due-date transitions; the local date when unset
    pub reference_date: Option<NaiveDate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            w_th: 0.25,
            w_s0: 1.0,
            w_sm: 3.0,
            n_kt_0: 3,
            scale: GradeScale::Six,
            improvement_enabled: true,
            subject: None,
            reference_date: None,
        }
    }
}

impl EngineConfig {
    pub fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Local::now().date_naive())
    }

    /// Effective weight of `count` short tests, ramping up to `w_s0`.
    pub fn short_test_weight(&self, count: usize) -> f64 {
        let full = self.n_kt_0 as usize;
        if count < full {
            count as f64 * self.w_s0 / self.n_kt_0 as f64
        } else {
            self.w_s0
        }
    }
}
