use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use super::config::EngineConfig;
use super::legacy;
use super::validation::validate_config;
use super::weight::Weight;
use crate::error::{GradeError, Result};
use crate::grade::{GradeScale, GradeValue};
use crate::limits::Subject;
use crate::record::{
    discretization_distance, Category, PerformanceRecord, RecordInput, RecordRow,
};

/// Categories averaged as full written grades.
pub const WRITTEN: [Category; 3] = [
    Category::WrittenExam,
    Category::Presentation,
    Category::PracticalWritten,
];

/// Categories sharing the ramped short-test weight.
pub const SHORT_TESTS: [Category; 3] = [
    Category::ShortTest,
    Category::SubstituteWritten,
    Category::PracticalTest,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    pub label: String,
    pub mean: Option<GradeValue>,
    pub weight: Option<f64>,
    pub count: usize,
}

impl Contribution {
    fn from_weight(label: &str, weight: &Weight) -> Self {
        Self {
            label: label.to_string(),
            mean: weight.mean().copied(),
            weight: weight.weight(),
            count: weight.count(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GradeBreakdown {
    /// Effective short-test weight `w_s`
    pub short_test_weight: f64,
    pub improvement_applied: bool,
    pub contributions: Vec<Contribution>,
}

/// Calculated grades at the date of the latest record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeResult {
    /// Written mean before the improvement adjustment
    pub m_s1: GradeValue,
    /// Written mean after the improvement adjustment
    pub m_s: GradeValue,
    /// Oral mean
    pub m_m: GradeValue,
    /// Gesamtnote
    pub gesamtnote: GradeValue,
    pub date: NaiveDate,
    pub breakdown: GradeBreakdown,
}

/// The Sept 1 to Jul 31 window all records of one calculation lie in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchoolYear {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl SchoolYear {
    /// School year of the earliest record; every record must fall inside it.
    pub fn containing(records: &[PerformanceRecord]) -> Result<Self> {
        let dates = || records.iter().map(|r| r.date());
        let (Some(first), Some(last)) = (dates().min(), dates().max()) else {
            return Err(GradeError::TimeWindow("no records to place in a school year".to_string()));
        };

        if (last - first).num_days() > 365 {
            return Err(GradeError::TimeWindow(format!(
                "records from {} to {} lie more than one year apart",
                first, last
            )));
        }

        let year = if first.month() >= 9 {
            first.year()
        } else {
            first.year() - 1
        };
        let start = NaiveDate::from_ymd_opt(year, 9, 1);
        let end = NaiveDate::from_ymd_opt(year + 1, 7, 31);
        let (Some(start), Some(end)) = (start, end) else {
            return Err(GradeError::TimeWindow(format!("no school year starting {}", year)));
        };

        if let Some(outside) = dates().find(|d| *d < start || *d > end) {
            return Err(GradeError::TimeWindow(format!(
                "record on {} lies outside the school year {}/{}",
                outside,
                start.year(),
                end.year()
            )));
        }

        Ok(Self { start, end })
    }

    pub fn label(&self) -> String {
        format!("{}/{}", self.start.year(), self.end.year())
    }
}

/// Holds the records of one student in one subject and calculates grades.
#[derive(Debug, Clone)]
pub struct GradeEngine {
    config: EngineConfig,
    subject: Option<Subject>,
    records: Vec<PerformanceRecord>,
    school_year: Option<SchoolYear>,
}

impl GradeEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        validate_config(&config).map_err(GradeError::Config)?;
        let subject = config.subject.as_deref().and_then(Subject::builtin);
        Ok(Self {
            config,
            subject,
            records: Vec::new(),
            school_year: None,
        })
    }

    /// Apply the limits of `subject` instead of the configured one.
    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    /// Records sorted by date.
    pub fn records(&self) -> &[PerformanceRecord] {
        &self.records
    }

    pub fn school_year(&self) -> Option<SchoolYear> {
        self.school_year
    }

    /// Validate and add one record from raw intake.
    pub fn add_record(&mut self, input: &RecordInput) -> Result<()> {
        let record = PerformanceRecord::from_input(input, self.config.scale, self.config.today())?;
        self.add_performance(record)
    }

    /// Add an already built record. Nothing changes if the record is rejected.
    pub fn add_performance(&mut self, record: PerformanceRecord) -> Result<()> {
        if record.grade().scale() != self.config.scale {
            return Err(GradeError::ScaleMismatch {
                left: self.config.scale,
                right: record.grade().scale(),
            });
        }

        let mut records = self.records.clone();
        records.push(record);
        records.sort_by_key(|r| r.date());
        let school_year = SchoolYear::containing(&records)?;
        assign_sequence_numbers(&mut records)?;

        tracing::debug!(
            count = records.len(),
            school_year = %school_year.label(),
            "record added"
        );
        self.records = records;
        self.school_year = Some(school_year);
        Ok(())
    }

    /// Calculate the grades from all records.
    ///
    /// Returns `None` when there are no records. Limit violations above a
    /// maximum fail; shortfalls below a minimum are only warned about.
    pub fn calculate_final_grade(&self, emit_warnings: bool) -> Result<Option<GradeResult>> {
        evaluate(&self.config, self.subject.as_ref(), &self.records, emit_warnings)
    }

    /// Same grades through the closed-form formula, for cross-checking.
    pub fn calculate_direct(&self) -> Result<Option<GradeResult>> {
        legacy::direct_formula(&self.config, &self.records)
    }

    /// Grade after each record, replaying the records in date order.
    ///
    /// Steps that fail are logged and left out.
    pub fn time_series(&self) -> Vec<GradeResult> {
        (1..=self.records.len())
            .filter_map(|n| {
                match evaluate(&self.config, self.subject.as_ref(), &self.records[..n], false) {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::warn!(step = n, "skipping time series step: {}", e);
                        None
                    }
                }
            })
            .collect()
    }

    pub fn to_record_list(&self) -> Vec<RecordRow> {
        self.records.iter().map(|r| r.as_row()).collect()
    }

    /// Re-express all grades on `scale` and calculate on it from now on.
    pub fn convert_to(&mut self, scale: GradeScale) -> Result<()> {
        if !scale.is_calculation_scale() {
            return Err(GradeError::Conversion {
                from: self.config.scale,
                to: scale,
            });
        }
        let converted = self
            .records
            .iter()
            .map(|r| r.grade().convert_via_normalized(scale))
            .collect::<Result<Vec<_>>>()?;

        for (record, grade) in self.records.iter_mut().zip(converted) {
            record.set_grade(grade);
        }
        self.config.scale = scale;
        Ok(())
    }
}

/// Fill in missing record numbers per category in date order.
///
/// Explicit numbers must exceed every number before them, including filled-in
/// ones. The assignment depends only on the record set, not on the order
/// records were added in.
fn assign_sequence_numbers(records: &mut [PerformanceRecord]) -> Result<()> {
    for category in Category::ALL {
        let mut indices: Vec<usize> = (0..records.len())
            .filter(|&i| records[i].category() == category)
            .collect();
        indices.sort_by(|&a, &b| {
            let (ra, rb) = (&records[a], &records[b]);
            ra.date()
                .cmp(&rb.date())
                .then_with(|| {
                    let key = |r: &PerformanceRecord| (r.explicit_number().is_none(), r.explicit_number());
                    key(ra).cmp(&key(rb))
                })
                .then_with(|| {
                    let (ga, gb) = (ra.grade().value(), rb.grade().value());
                    ga.unwrap_or(f64::NAN).total_cmp(&gb.unwrap_or(f64::NAN))
                })
        });

        let mut previous: Option<u32> = None;
        for i in indices {
            let number = match (records[i].explicit_number(), previous) {
                (Some(number), Some(last)) if number <= last => {
                    return Err(GradeError::Sequencing {
                        category,
                        number,
                        previous: last,
                        date: records[i].date(),
                    });
                }
                (Some(number), _) => number,
                (None, last) => last.map_or(1, |last| last + 1),
            };
            records[i].set_sequence(number);
            previous = Some(number);
        }
    }
    Ok(())
}

/// Oral records covering a period must not overlap each other.
fn check_oral_periods(records: &[PerformanceRecord]) -> Result<()> {
    let periods: Vec<(&PerformanceRecord, NaiveDate, NaiveDate)> = records
        .iter()
        .filter(|r| !r.is_punctual())
        .filter_map(|r| r.period().map(|(from, until)| (r, from, until)))
        .collect();

    for (i, (a, a_from, a_until)) in periods.iter().enumerate() {
        for (b, b_from, b_until) in &periods[i + 1..] {
            if a_from <= b_until && a_until >= b_from {
                return Err(GradeError::Period(format!(
                    "oral periods overlap: {} from {} to {} and {} from {} to {}",
                    a, a_from, a_until, b, b_from, b_until
                )));
            }
        }
    }
    Ok(())
}

fn select<'a>(records: &'a [PerformanceRecord], categories: &[Category]) -> Vec<&'a PerformanceRecord> {
    records
        .iter()
        .filter(|r| categories.contains(&r.category()))
        .collect()
}

/// Cross-record checks followed by the aggregation.
fn evaluate(
    config: &EngineConfig,
    subject: Option<&Subject>,
    records: &[PerformanceRecord],
    emit_warnings: bool,
) -> Result<Option<GradeResult>> {
    check_oral_periods(records)?;
    if !records.is_empty() {
        SchoolYear::containing(records)?;
    }
    if let Some(subject) = subject {
        subject.limits.enforce(records, emit_warnings)?;
    }
    aggregate(config, records)
}

/// Weighted aggregation of already validated records.
pub fn aggregate(config: &EngineConfig, records: &[PerformanceRecord]) -> Result<Option<GradeResult>> {
    let Some(latest) = records.last() else {
        return Ok(None);
    };
    let scale = config.scale;
    let written = select(records, &WRITTEN);
    let short_tests = select(records, &SHORT_TESTS);
    let oral = select(records, &[Category::Oral]);

    let m_m = Weight::from_records(&oral)?.with_weight(1.0);

    if written.is_empty() && short_tests.is_empty() {
        let Some(oral_mean) = m_m.mean().copied() else {
            return Ok(None);
        };
        return Ok(Some(GradeResult {
            m_s1: GradeValue::undefined(scale),
            m_s: GradeValue::undefined(scale),
            m_m: oral_mean,
            gesamtnote: oral_mean,
            date: latest.date(),
            breakdown: GradeBreakdown {
                short_test_weight: 0.0,
                improvement_applied: false,
                contributions: vec![Contribution::from_weight("oral", &m_m)],
            },
        }));
    }

    let w_s = config.short_test_weight(short_tests.len());
    let ka = Weight::from_records(&written)?.with_weight_each(1.0);
    let kt = Weight::from_records(&short_tests)?.with_weight(w_s);
    let m_s1 = ka.combine(&kt)?;

    let improvement = improvement_weight(config, records, &m_s1)?;
    let m_s = match &improvement {
        Some(v) => m_s1.combine(v)?,
        None => m_s1.clone(),
    };

    let total = m_s.clone().with_weight(config.w_sm).combine(&m_m)?;

    let mut contributions = vec![
        Contribution::from_weight("written", &ka),
        Contribution::from_weight("short tests", &kt),
    ];
    if let Some(v) = &improvement {
        contributions.push(Contribution::from_weight("improvement", v));
    }
    contributions.push(Contribution::from_weight("oral", &m_m));

    let undefined = GradeValue::undefined(scale);
    let result = GradeResult {
        m_s1: m_s1.mean().copied().unwrap_or(undefined),
        m_s: m_s.mean().copied().unwrap_or(undefined),
        m_m: m_m.mean().copied().unwrap_or(undefined),
        gesamtnote: total.mean().copied().unwrap_or(undefined),
        date: latest.date(),
        breakdown: GradeBreakdown {
            short_test_weight: w_s,
            improvement_applied: improvement.is_some(),
            contributions,
        },
    };
    tracing::debug!(
        m_s1 = %result.m_s1,
        m_s = %result.m_s,
        m_m = %result.m_m,
        gesamtnote = %result.gesamtnote,
        "grade calculated"
    );
    Ok(Some(result))
}

/// Accumulator of the improvement pseudo-records, weighted `|range / w_th|`.
///
/// `None` when the adjustment is off, no record asks for it, or the written
/// mean is at least `w_th` away from the midline.
fn improvement_weight(
    config: &EngineConfig,
    records: &[PerformanceRecord],
    m_s1: &Weight,
) -> Result<Option<Weight>> {
    let requested = records.iter().any(|r| r.status().is_enabled());
    if !config.improvement_enabled || config.w_th == 0.0 || !requested {
        return Ok(None);
    }
    let Some(mean) = m_s1.mean() else {
        return Ok(None);
    };
    let Some(value) = mean.value() else {
        return Ok(None);
    };
    if discretization_distance(value, config.w_th) >= 1.0 {
        return Ok(None);
    }

    let w_v3 = (mean.scale().range() / config.w_th).abs();
    let pseudo = records
        .iter()
        .map(|r| PerformanceRecord::improvement(mean, r.status(), r.date(), config.w_th))
        .collect::<Result<Vec<_>>>()?;
    let refs: Vec<&PerformanceRecord> = pseudo.iter().collect();
    let v = Weight::from_records(&refs)?.with_weight(w_v3);

    Ok(if v.is_empty() { None } else { Some(v) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ImprovementStatus;

    fn engine(config: EngineConfig) -> GradeEngine {
        GradeEngine::new(EngineConfig {
            reference_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            ..config
        })
        .unwrap()
    }

    fn add(engine: &mut GradeEngine, inputs: &[RecordInput]) {
        for input in inputs {
            engine.add_record(input).unwrap();
        }
    }

    fn value(grade: &GradeValue) -> f64 {
        grade.value().unwrap()
    }

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    fn sample_inputs() -> Vec<RecordInput> {
        vec![
            RecordInput::new("KA", 5.0, "2024-04-10").with_status("fertig"),
            RecordInput::new("KA", 6.0, "2024-04-15").with_status("fertig"),
            RecordInput::new("KA", 3.0, "2024-03-01").with_status("fertig"),
            RecordInput::new("KA", 5.0, "2024-03-15").with_status("fertig"),
            RecordInput::new("KT", 4.0, "2024-02-01").with_status("fertig"),
            RecordInput::new("KT", 2.75, "2024-01-01").with_status("fertig"),
            RecordInput::new("m", 3.0, "2023-09-01"),
            RecordInput::new("m", 3.25, "2023-10-01"),
            RecordInput::new("m", 3.5, "2023-11-01"),
        ]
    }

    #[test]
    fn test_no_records() {
        let e = engine(EngineConfig::default());
        assert_eq!(e.calculate_final_grade(true).unwrap(), None);
        assert!(e.time_series().is_empty());
    }

    #[test]
    fn test_oral_only() {
        let mut e = engine(EngineConfig::default());
        add(
            &mut e,
            &[
                RecordInput::new("m", 3.0, "2023-09-01"),
                RecordInput::new("m", 3.25, "2023-10-01"),
                RecordInput::new("m", 3.5, "2023-11-01"),
            ],
        );
        let result = e.calculate_final_grade(true).unwrap().unwrap();
        assert_close(value(&result.gesamtnote), 3.25);
        assert_close(value(&result.m_m), 3.25);
        assert!(!result.m_s1.is_defined());
        assert!(!result.m_s.is_defined());
        assert_eq!(result.date, NaiveDate::from_ymd_opt(2023, 11, 1).unwrap());
    }

    #[test]
    fn test_without_oral_final_equals_written() {
        let mut e = engine(EngineConfig::default());
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01"),
                RecordInput::new("KA", 3.0, "2023-11-01"),
            ],
        );
        let result = e.calculate_final_grade(true).unwrap().unwrap();
        assert_close(value(&result.m_s), 2.5);
        assert_close(value(&result.gesamtnote), value(&result.m_s));
        assert!(!result.m_m.is_defined());
    }

    #[test]
    fn test_sample_without_threshold_crossing() {
        // KA mean 4.75, KT mean 3.375 with full weight 1 (n_KT_0 = 2)
        let mut e = engine(EngineConfig {
            n_kt_0: 2,
            improvement_enabled: false,
            ..EngineConfig::default()
        });
        add(&mut e, &sample_inputs());
        let result = e.calculate_final_grade(true).unwrap().unwrap();

        let m_s1 = (19.0 + 3.375) / 5.0;
        assert_close(value(&result.m_s1), m_s1);
        assert_close(value(&result.m_s), m_s1);
        assert_close(value(&result.m_m), 3.25);
        assert_close(value(&result.gesamtnote), (3.0 * m_s1 + 3.25) / 4.0);
        assert_eq!(result.breakdown.short_test_weight, 1.0);
        assert!(!result.breakdown.improvement_applied);
    }

    #[test]
    fn test_all_worst_grades_stay_on_scale() {
        let mut e = engine(EngineConfig::default());
        add(
            &mut e,
            &[
                RecordInput::new("KA", 6.0, "2023-10-01"),
                RecordInput::new("KT", 6.0, "2023-11-01"),
                RecordInput::new("KT", 6.0, "2023-12-01"),
                RecordInput::new("m", 6.0, "2024-01-10"),
            ],
        );
        let result = e.calculate_final_grade(false).unwrap().unwrap();
        assert_eq!(result.m_s1.value(), Some(6.0));
        assert_eq!(result.gesamtnote.value(), Some(6.0));
        assert_eq!(e.time_series().len(), 4);

        let direct = e.calculate_direct().unwrap().unwrap();
        assert_eq!(direct.gesamtnote.value(), Some(6.0));
    }

    #[test]
    fn test_all_best_grades_stay_on_scale() {
        let mut e = engine(EngineConfig {
            scale: GradeScale::Fifteen,
            ..EngineConfig::default()
        });
        add(
            &mut e,
            &[
                RecordInput::new("KA", 15.0, "2023-10-01"),
                RecordInput::new("KT", 15.0, "2023-11-01"),
                RecordInput::new("KT", 15.0, "2023-12-01"),
            ],
        );
        let result = e.calculate_final_grade(false).unwrap().unwrap();
        assert_eq!(result.m_s.value(), Some(15.0));
        assert_eq!(result.gesamtnote.value(), Some(15.0));
        assert_eq!(e.time_series().len(), 3);

        let direct = e.calculate_direct().unwrap().unwrap();
        assert_eq!(direct.gesamtnote.value(), Some(15.0));
    }

    #[test]
    fn test_short_test_ramp() {
        let mut e = engine(EngineConfig::default());
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01"),
                RecordInput::new("KT", 5.0, "2023-11-01"),
            ],
        );
        let result = e.calculate_final_grade(true).unwrap().unwrap();
        // one short test counts a third of the full weight
        assert_close(result.breakdown.short_test_weight, 1.0 / 3.0);
        assert_close(value(&result.m_s1), (2.0 + 5.0 / 3.0) / (4.0 / 3.0));
    }

    #[test]
    fn test_improvement_missing_pulls_toward_worse() {
        // m_s1 = 2.4 sits within w_th of the 2.5 midline
        let mut e = engine(EngineConfig {
            w_th: 0.25,
            ..EngineConfig::default()
        });
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01"),
                RecordInput::new("KA", 2.2, "2023-11-01"),
                RecordInput::new("KA", 3.0, "2023-12-01").with_status("fehlt"),
            ],
        );
        let result = e.calculate_final_grade(true).unwrap().unwrap();
        assert_close(value(&result.m_s1), 2.4);

        let w_v3 = 5.0 / 0.25;
        let expected = (3.0 * 2.4 + w_v3 * 2.75) / (3.0 + w_v3);
        assert_close(value(&result.m_s), expected);
        assert!(result.breakdown.improvement_applied);
        assert_close(value(&result.gesamtnote), value(&result.m_s));
    }

    #[test]
    fn test_improvement_completed_pulls_toward_better_on_fifteen() {
        let mut e = engine(EngineConfig {
            scale: GradeScale::Fifteen,
            w_th: 0.25,
            ..EngineConfig::default()
        });
        add(
            &mut e,
            &[
                RecordInput::new("KA", 9.0, "2023-10-01"),
                RecordInput::new("KA", 10.2, "2023-11-01").with_status("fertig"),
            ],
        );
        let result = e.calculate_final_grade(true).unwrap().unwrap();
        assert_close(value(&result.m_s1), 9.6);

        let w_v3 = 15.0 / 0.25;
        let expected = (2.0 * 9.6 + w_v3 * 9.75) / (2.0 + w_v3);
        assert_close(value(&result.m_s), expected);
    }

    #[test]
    fn test_improvement_skipped_on_whole_grade() {
        let mut e = engine(EngineConfig {
            w_th: 0.4,
            ..EngineConfig::default()
        });
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01").with_status("fertig"),
                RecordInput::new("KA", 4.0, "2023-11-01").with_status("fehlt"),
            ],
        );
        let result = e.calculate_final_grade(true).unwrap().unwrap();
        assert_close(value(&result.m_s1), 3.0);
        assert_eq!(result.m_s, result.m_s1);
        assert!(!result.breakdown.improvement_applied);
    }

    #[test]
    fn test_improvement_skipped_when_threshold_zero() {
        let mut e = engine(EngineConfig {
            w_th: 0.0,
            ..EngineConfig::default()
        });
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01"),
                RecordInput::new("KA", 3.0, "2023-11-01").with_status("fehlt"),
            ],
        );
        let result = e.calculate_final_grade(true).unwrap().unwrap();
        assert_eq!(result.m_s, result.m_s1);
    }

    #[test]
    fn test_improvement_skipped_without_status() {
        let mut e = engine(EngineConfig::default());
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01"),
                RecordInput::new("KA", 3.0, "2023-11-01"),
            ],
        );
        let result = e.calculate_final_grade(true).unwrap().unwrap();
        assert_eq!(result.m_s, result.m_s1);
    }

    #[test]
    fn test_core_subject_minimum_only_warns() {
        let mut e = engine(EngineConfig {
            subject: Some("M".to_string()),
            ..EngineConfig::default()
        });
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01"),
                RecordInput::new("KA", 3.0, "2023-11-01"),
                RecordInput::new("m", 2.0, "2023-12-01"),
            ],
        );
        assert!(e.calculate_final_grade(true).unwrap().is_some());
    }

    #[test]
    fn test_maximum_violation_blocks() {
        let mut e = engine(EngineConfig {
            subject: Some("Inf".to_string()),
            ..EngineConfig::default()
        });
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01"),
                RecordInput::new("KA", 3.0, "2023-11-01"),
                RecordInput::new("KT", 3.0, "2023-11-15"),
                RecordInput::new("KT", 3.0, "2023-12-01"),
                RecordInput::new("KA", 3.0, "2024-01-10"),
                RecordInput::new("m", 2.0, "2024-02-01"),
            ],
        );
        let err = e.calculate_final_grade(false).unwrap_err();
        assert!(matches!(err, GradeError::LimitExceeded(_)));
    }

    #[test]
    fn test_overlapping_oral_periods() {
        let mut e = engine(EngineConfig::default());
        add(
            &mut e,
            &[
                RecordInput::new("m", 3.0, "2023-10-05").with_period("2023-09-01", "2023-10-05"),
                RecordInput::new("m", 2.0, "2023-11-05").with_period("2023-10-01", "2023-11-05"),
            ],
        );
        let err = e.calculate_final_grade(true).unwrap_err();
        assert!(matches!(err, GradeError::Period(_)));
    }

    #[test]
    fn test_adjacent_oral_periods_are_fine() {
        let mut e = engine(EngineConfig::default());
        add(
            &mut e,
            &[
                RecordInput::new("m", 3.0, "2023-10-05").with_period("2023-09-01", "2023-10-05"),
                RecordInput::new("m", 2.0, "2023-11-05").with_period("2023-10-06", "2023-11-05"),
            ],
        );
        assert!(e.calculate_final_grade(true).is_ok());
    }

    #[test]
    fn test_records_more_than_a_year_apart() {
        let mut e = engine(EngineConfig::default());
        e.add_record(&RecordInput::new("KA", 2.0, "2023-09-05")).unwrap();
        let err = e
            .add_record(&RecordInput::new("KA", 2.0, "2024-09-10"))
            .unwrap_err();
        assert!(matches!(err, GradeError::TimeWindow(_)));
        assert_eq!(e.records().len(), 1);
    }

    #[test]
    fn test_record_outside_school_year() {
        let mut e = engine(EngineConfig::default());
        e.add_record(&RecordInput::new("KA", 2.0, "2024-03-05")).unwrap();
        let err = e
            .add_record(&RecordInput::new("KA", 2.0, "2024-08-10"))
            .unwrap_err();
        assert!(matches!(err, GradeError::TimeWindow(_)));

        let year = e.school_year().unwrap();
        assert_eq!(year.start, NaiveDate::from_ymd_opt(2023, 9, 1).unwrap());
        assert_eq!(year.end, NaiveDate::from_ymd_opt(2024, 7, 31).unwrap());
        assert_eq!(year.label(), "2023/2024");
    }

    #[test]
    fn test_sequence_numbers_backfill() {
        let mut e = engine(EngineConfig::default());
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01"),
                RecordInput::new("KA", 3.0, "2023-11-01").with_number(3),
                RecordInput::new("KA", 4.0, "2023-12-01"),
                RecordInput::new("KT", 4.0, "2023-12-01"),
            ],
        );
        let numbers: Vec<(Category, Option<u32>)> = e
            .records()
            .iter()
            .map(|r| (r.category(), r.number()))
            .collect();
        assert_eq!(
            numbers,
            vec![
                (Category::WrittenExam, Some(1)),
                (Category::WrittenExam, Some(3)),
                (Category::WrittenExam, Some(4)),
                (Category::ShortTest, Some(1)),
            ]
        );
    }

    #[test]
    fn test_sequence_numbers_must_increase() {
        let mut e = engine(EngineConfig::default());
        e.add_record(&RecordInput::new("KA", 2.0, "2023-10-01").with_number(2))
            .unwrap();
        let err = e
            .add_record(&RecordInput::new("KA", 3.0, "2023-11-01").with_number(2))
            .unwrap_err();
        assert!(matches!(err, GradeError::Sequencing { .. }));
        assert_eq!(e.records().len(), 1);
    }

    #[test]
    fn test_explicit_number_must_exceed_filled_in_number() {
        let mut e = engine(EngineConfig::default());
        e.add_record(&RecordInput::new("KA", 2.0, "2023-10-01")).unwrap();
        let err = e
            .add_record(&RecordInput::new("KA", 3.0, "2023-11-01").with_number(1))
            .unwrap_err();
        assert!(matches!(
            err,
            GradeError::Sequencing {
                number: 1,
                previous: 1,
                ..
            }
        ));
        assert_eq!(e.records().len(), 1);

        let mut e = engine(EngineConfig::default());
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01").with_number(3),
                RecordInput::new("KA", 3.0, "2023-11-01"),
            ],
        );
        let err = e
            .add_record(&RecordInput::new("KA", 4.0, "2023-12-01").with_number(4))
            .unwrap_err();
        assert!(matches!(err, GradeError::Sequencing { .. }));
        let numbers: Vec<Option<u32>> = e.records().iter().map(|r| r.number()).collect();
        assert_eq!(numbers, vec![Some(3), Some(4)]);
    }

    #[test]
    fn test_same_day_explicit_number_goes_first() {
        let mut e = engine(EngineConfig::default());
        e.add_record(&RecordInput::new("KA", 2.0, "2023-10-01")).unwrap();
        e.add_record(&RecordInput::new("KA", 3.0, "2023-10-01").with_number(1))
            .unwrap();
        let mut numbers: Vec<(Option<u32>, Option<f64>)> = e
            .records()
            .iter()
            .map(|r| (r.number(), r.grade().value()))
            .collect();
        numbers.sort_by_key(|(n, _)| *n);
        assert_eq!(numbers, vec![(Some(1), Some(3.0)), (Some(2), Some(2.0))]);
    }

    #[test]
    fn test_sequence_numbers_independent_of_insertion_order() {
        let inputs = vec![
            RecordInput::new("KA", 2.0, "2023-10-01"),
            RecordInput::new("KA", 3.0, "2023-11-01").with_number(5),
            RecordInput::new("KA", 4.0, "2023-12-01"),
            RecordInput::new("KT", 4.0, "2023-12-01"),
            RecordInput::new("KT", 1.0, "2023-09-20"),
        ];
        let mut forward = engine(EngineConfig::default());
        add(&mut forward, &inputs);
        let mut backward = engine(EngineConfig::default());
        let reversed: Vec<RecordInput> = inputs.iter().rev().cloned().collect();
        add(&mut backward, &reversed);

        let numbered = |e: &GradeEngine| {
            let mut rows: Vec<(NaiveDate, Category, Option<u32>)> = e
                .records()
                .iter()
                .map(|r| (r.date(), r.category(), r.number()))
                .collect();
            rows.sort();
            rows
        };
        assert_eq!(numbered(&forward), numbered(&backward));
    }

    #[test]
    fn test_time_series_one_result_per_record() {
        let mut e = engine(EngineConfig::default());
        add(&mut e, &sample_inputs());
        let series = e.time_series();
        assert_eq!(series.len(), 9);
        assert_close(value(&series[0].gesamtnote), 3.0);
        let dates: Vec<NaiveDate> = series.iter().map(|r| r.date).collect();
        let mut sorted = dates.clone();
        sorted.sort();
        assert_eq!(dates, sorted);
        assert_eq!(
            series.last().map(|r| r.gesamtnote),
            e.calculate_final_grade(false).unwrap().map(|r| r.gesamtnote)
        );
    }

    #[test]
    fn test_time_series_skips_failing_steps() {
        let mut e = engine(EngineConfig {
            subject: Some("Ph".to_string()),
            ..EngineConfig::default()
        });
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01"),
                RecordInput::new("KA", 3.0, "2023-10-02"),
                RecordInput::new("KA", 3.0, "2023-10-03"),
                RecordInput::new("KA", 3.0, "2023-10-04"),
                RecordInput::new("KA", 3.0, "2023-10-05"),
            ],
        );
        // the fifth written exam exceeds the maximum of four
        assert_eq!(e.time_series().len(), 4);
    }

    #[test]
    fn test_record_list() {
        let mut e = engine(EngineConfig::default());
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01").with_status("offen").with_due("2024-07-01"),
                RecordInput::new("m", 3.0, "2023-09-20").with_period("2023-09-01", "2023-09-20"),
            ],
        );
        let rows = e.to_record_list();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].category, Category::Oral);
        assert_eq!(rows[0].status, "---");
        assert_eq!(rows[0].from, NaiveDate::from_ymd_opt(2023, 9, 1));
        assert_eq!(rows[1].status, "offen bis 01.07.2024");
        assert_eq!(rows[1].number, Some(1));
        assert_eq!(rows[1].due, NaiveDate::from_ymd_opt(2024, 7, 1));
    }

    #[test]
    fn test_convert_to_fifteen() {
        let mut e = engine(EngineConfig::default());
        add(
            &mut e,
            &[
                RecordInput::new("KA", 1.0, "2023-10-01"),
                RecordInput::new("KA", 6.0, "2023-11-01"),
            ],
        );
        e.convert_to(GradeScale::Fifteen).unwrap();
        assert_eq!(e.config().scale, GradeScale::Fifteen);
        let grades: Vec<f64> = e.records().iter().map(|r| value(r.grade())).collect();
        assert_close(grades[0], 15.0);
        assert_close(grades[1], 0.0);

        let result = e.calculate_final_grade(false).unwrap().unwrap();
        assert_close(value(&result.gesamtnote), 7.5);
        assert!(e.convert_to(GradeScale::Normalized).is_err());
    }

    #[test]
    fn test_rejects_foreign_scale_record() {
        let mut e = engine(EngineConfig::default());
        let record = PerformanceRecord::new(
            Category::WrittenExam,
            GradeValue::new(10.0, GradeScale::Fifteen).unwrap(),
            NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
            ImprovementStatus::disabled(),
            None,
        );
        assert!(matches!(
            e.add_performance(record),
            Err(GradeError::ScaleMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = GradeEngine::new(EngineConfig {
            w_sm: 10.0,
            ..EngineConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, GradeError::Config(_)));
    }

    #[test]
    fn test_with_custom_subject() {
        use crate::limits::{LimitRule, RegulationLimits, Selector};

        let limits = RegulationLimits::custom(
            "Test",
            vec![LimitRule::new(
                vec![Selector::Category(Category::WrittenExam)],
                None,
                Some(1),
            )],
        );
        let mut e = engine(EngineConfig::default()).with_subject(Subject::new("T", "Testfach", limits));
        add(
            &mut e,
            &[
                RecordInput::new("KA", 2.0, "2023-10-01"),
                RecordInput::new("KA", 3.0, "2023-11-01"),
            ],
        );
        assert!(matches!(
            e.calculate_final_grade(false),
            Err(GradeError::LimitExceeded(_))
        ));
    }
}
