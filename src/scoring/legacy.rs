use super::config::EngineConfig;
use super::engine::{Contribution, GradeBreakdown, GradeResult, SHORT_TESTS, WRITTEN};
use crate::error::{GradeError, Result};
use crate::grade::{GradeScale, GradeValue};
use crate::record::{discretization_distance, Category, ImprovementState, PerformanceRecord};

fn mean(records: &[&PerformanceRecord]) -> Option<f64> {
    let values: Vec<f64> = records.iter().filter_map(|r| r.grade().value()).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn select<'a>(records: &'a [PerformanceRecord], categories: &[Category]) -> Vec<&'a PerformanceRecord> {
    records
        .iter()
        .filter(|r| categories.contains(&r.category()))
        .collect()
}

fn contribution(label: &str, mean: Option<f64>, weight: f64, count: usize, scale: GradeScale) -> Result<Contribution> {
    Ok(Contribution {
        label: label.to_string(),
        mean: mean.map(|m| GradeValue::clamped(m, scale)).transpose()?,
        weight: mean.map(|_| weight),
        count,
    })
}

/// Closed-form grade calculation over category counts and means.
///
/// Gives the same grades as the accumulator aggregation and serves as an
/// independent cross-check of it.
pub fn direct_formula(config: &EngineConfig, records: &[PerformanceRecord]) -> Result<Option<GradeResult>> {
    calculate(config, records, config.improvement_enabled)
}

/// Closed-form calculation without the improvement adjustment.
pub fn simple_formula(config: &EngineConfig, records: &[PerformanceRecord]) -> Result<Option<GradeResult>> {
    calculate(config, records, false)
}

fn calculate(
    config: &EngineConfig,
    records: &[PerformanceRecord],
    improvement_enabled: bool,
) -> Result<Option<GradeResult>> {
    let Some(latest) = records.last() else {
        return Ok(None);
    };
    let scale = config.scale;
    let grade = |value: f64| GradeValue::clamped(value, scale);

    let written = select(records, &WRITTEN);
    let short_tests = select(records, &SHORT_TESTS);
    let oral = select(records, &[Category::Oral]);
    let (n_ka, n_m) = (written.len() as f64, oral.len());

    let oral_mean = mean(&oral);
    let m_m = oral_mean.unwrap_or(0.0);
    let w_m = if n_m == 0 { 0.0 } else { 1.0 };

    if written.is_empty() && short_tests.is_empty() {
        let Some(oral_mean) = oral_mean else {
            return Ok(None);
        };
        let m_m = grade(oral_mean)?;
        return Ok(Some(GradeResult {
            m_s1: GradeValue::undefined(scale),
            m_s: GradeValue::undefined(scale),
            m_m,
            gesamtnote: m_m,
            date: latest.date(),
            breakdown: GradeBreakdown {
                contributions: vec![contribution("oral", Some(oral_mean), 1.0, n_m, scale)?],
                ..GradeBreakdown::default()
            },
        }));
    }

    let m_ka = mean(&written).unwrap_or(0.0);
    let m_kt = mean(&short_tests).unwrap_or(0.0);
    let w_s = config.short_test_weight(short_tests.len());
    let m_s1 = (n_ka * m_ka + w_s * m_kt) / (n_ka + w_s);

    let w_th = config.w_th;
    let w_d = discretization_distance(m_s1, w_th);
    let m_h = (m_s1.ceil() + m_s1.floor()) / 2.0;
    let (w_v1, w_v2) = if scale.lower_is_better() {
        (m_h + w_th, m_h - w_th)
    } else {
        (m_h - w_th, m_h + w_th)
    };

    let enabled: Vec<ImprovementState> = records
        .iter()
        .filter(|r| r.status().is_enabled())
        .map(|r| r.status().state())
        .collect();
    let count = |state: ImprovementState| enabled.iter().filter(|s| **s == state).count() as f64;
    let n_v_g = enabled.len() as f64;

    let (w_v3, w_v4) = if !improvement_enabled || enabled.is_empty() || w_th == 0.0 || w_d >= 1.0 {
        (0.0, 0.0)
    } else {
        let w_v4 = (count(ImprovementState::CompletedMissing) * w_v1
            + count(ImprovementState::Pending) * m_s1
            + count(ImprovementState::CompletedGood) * w_v2)
            / n_v_g;
        ((scale.range() / w_th).abs(), w_v4)
    };

    let m_s = (n_ka * m_ka + w_s * m_kt + w_v3 * w_v4) / (n_ka + w_s + w_v3);
    let gesamtnote = (config.w_sm * m_s + m_m) / (config.w_sm + w_m);
    if !gesamtnote.is_finite() {
        return Err(GradeError::Validation(
            "written grades carry no weight".to_string(),
        ));
    }

    let mut contributions = vec![
        contribution("written", mean(&written), n_ka, written.len(), scale)?,
        contribution("short tests", mean(&short_tests), w_s, short_tests.len(), scale)?,
    ];
    if w_v3 > 0.0 {
        contributions.push(contribution("improvement", Some(w_v4), w_v3, enabled.len(), scale)?);
    }
    contributions.push(contribution("oral", oral_mean, 1.0, n_m, scale)?);

    Ok(Some(GradeResult {
        m_s1: grade(m_s1)?,
        m_s: grade(m_s)?,
        m_m: oral_mean.map(grade).transpose()?.unwrap_or(GradeValue::undefined(scale)),
        gesamtnote: grade(gesamtnote)?,
        date: latest.date(),
        breakdown: GradeBreakdown {
            short_test_weight: w_s,
            improvement_applied: w_v3 > 0.0,
            contributions,
        },
    }))
}
