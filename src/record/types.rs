use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::category::{Attribute, Category};
use super::status::{ImprovementState, ImprovementStatus};
use crate::error::{GradeError, Result};
use crate::grade::{GradeScale, GradeValue};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parse a calendar date in the fixed `YYYY-MM-DD` format.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)
        .map_err(|_| GradeError::DateFormat(s.to_string()))
}

/// Category of a record together with the fields only that category has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    WrittenExam,
    ShortTest,
    /// Oral grades may cover a period instead of a single day.
    Oral {
        from: NaiveDate,
        until: NaiveDate,
    },
    Presentation,
    PracticalWritten,
    PracticalTest,
    SubstituteWritten,
    Improvement,
}

impl RecordKind {
    pub fn category(&self) -> Category {
        match self {
            RecordKind::WrittenExam => Category::WrittenExam,
            RecordKind::ShortTest => Category::ShortTest,
            RecordKind::Oral { .. } => Category::Oral,
            RecordKind::Presentation => Category::Presentation,
            RecordKind::PracticalWritten => Category::PracticalWritten,
            RecordKind::PracticalTest => Category::PracticalTest,
            RecordKind::SubstituteWritten => Category::SubstituteWritten,
            RecordKind::Improvement => Category::Improvement,
        }
    }

    fn punctual(category: Category, date: NaiveDate) -> Self {
        match category {
            Category::WrittenExam => RecordKind::WrittenExam,
            Category::ShortTest => RecordKind::ShortTest,
            Category::Oral => RecordKind::Oral {
                from: date,
                until: date,
            },
            Category::Presentation => RecordKind::Presentation,
            Category::PracticalWritten => RecordKind::PracticalWritten,
            Category::PracticalTest => RecordKind::PracticalTest,
            Category::SubstituteWritten => RecordKind::SubstituteWritten,
            Category::Improvement => RecordKind::Improvement,
        }
    }
}

/// Raw intake for one record, as read from a grade book file.
///
/// Every field is optional here so that missing mandatory fields can be
/// reported instead of failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordInput {
    #[serde(default, alias = "art")]
    pub category: Option<String>,

    #[serde(default, alias = "note")]
    pub grade: Option<f64>,

    #[serde(default)]
    pub date: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default, alias = "nr")]
    pub number: Option<u32>,

    #[serde(default, alias = "von")]
    pub from: Option<String>,

    #[serde(default, alias = "bis")]
    pub until: Option<String>,

    #[serde(default)]
    pub due: Option<String>,
}

impl RecordInput {
    pub fn new(category: &str, grade: f64, date: &str) -> Self {
        Self {
            category: Some(category.to_string()),
            grade: Some(grade),
            date: Some(date.to_string()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn with_number(mut self, number: u32) -> Self {
        self.number = Some(number);
        self
    }

    pub fn with_period(mut self, from: &str, until: &str) -> Self {
        self.from = Some(from.to_string());
        self.until = Some(until.to_string());
        self
    }

    pub fn with_due(mut self, due: &str) -> Self {
        self.due = Some(due.to_string());
        self
    }
}

/// A single graded performance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    grade: GradeValue,
    date: NaiveDate,
    kind: RecordKind,
    /// Number given in the grade book, if any
    number: Option<u32>,
    /// Number filled in from the preceding record of the same category
    sequence: Option<u32>,
    status: ImprovementStatus,
}

impl PerformanceRecord {
    /// Build a single-day record. Oral records get a one-day period.
    pub fn new(
        category: Category,
        grade: GradeValue,
        date: NaiveDate,
        status: ImprovementStatus,
        number: Option<u32>,
    ) -> Self {
        let status = if category.supports_improvement() {
            status
        } else {
            ImprovementStatus::disabled()
        };
        Self {
            grade,
            date,
            kind: RecordKind::punctual(category, date),
            number,
            sequence: None,
            status,
        }
    }

    /// Build an oral record covering `from..=until`; both default to `date`.
    pub fn oral(
        grade: GradeValue,
        date: NaiveDate,
        from: Option<NaiveDate>,
        until: Option<NaiveDate>,
        number: Option<u32>,
    ) -> Result<Self> {
        let from = from.unwrap_or(date);
        let until = until.unwrap_or(date);
        if from > until {
            return Err(GradeError::Period(format!(
                "oral period starts {} after it ends {}",
                from, until
            )));
        }
        Ok(Self {
            grade,
            date,
            kind: RecordKind::Oral { from, until },
            number,
            sequence: None,
            status: ImprovementStatus::disabled(),
        })
    }

    /// Validate raw intake and build the record on `scale`.
    pub fn from_input(input: &RecordInput, scale: GradeScale, today: NaiveDate) -> Result<Self> {
        let mut missing = Vec::new();
        if input.category.is_none() {
            missing.push("category");
        }
        if input.grade.is_none() {
            missing.push("grade");
        }
        if input.date.is_none() {
            missing.push("date");
        }
        let (Some(code), Some(grade), Some(date)) = (&input.category, input.grade, &input.date)
        else {
            return Err(GradeError::Validation(format!(
                "missing required field(s): {}",
                missing.join(" and ")
            )));
        };

        let category = Category::from_code(code)?;
        let date = parse_date(date)?;
        let grade = GradeValue::new(grade, scale)?;

        if category == Category::Oral {
            let from = input.from.as_deref().map(parse_date).transpose()?;
            let until = input.until.as_deref().map(parse_date).transpose()?;
            return Self::oral(grade, date, from, until, input.number);
        }

        let due = input.due.as_deref().map(parse_date).transpose()?;
        let status = ImprovementStatus::parse(input.status.as_deref(), due, today);
        Ok(Self::new(category, grade, date, status, input.number))
    }

    /// Improvement pseudo-record derived from the written mean `mean`.
    ///
    /// A pending improvement counts with the mean itself, a missing one with
    /// the worse side of the midline and a completed one with the better
    /// side, each `w_th` away from the midline. The grade is undefined when
    /// the status is disabled or the mean is too far from the midline.
    pub fn improvement(
        mean: &GradeValue,
        status: &ImprovementStatus,
        date: NaiveDate,
        w_th: f64,
    ) -> Result<Self> {
        let grade = improvement_grade(mean, status.state(), w_th)?;
        Ok(Self {
            grade,
            date,
            kind: RecordKind::Improvement,
            number: None,
            sequence: None,
            status: ImprovementStatus::disabled(),
        })
    }

    pub fn grade(&self) -> &GradeValue {
        &self.grade
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn kind(&self) -> &RecordKind {
        &self.kind
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    pub fn attribute(&self) -> Attribute {
        self.category().attribute()
    }

    pub fn status(&self) -> &ImprovementStatus {
        &self.status
    }

    pub fn explicit_number(&self) -> Option<u32> {
        self.number
    }

    /// Explicit number, or the one filled in by the engine.
    pub fn number(&self) -> Option<u32> {
        self.number.or(self.sequence)
    }

    pub(crate) fn set_sequence(&mut self, sequence: u32) {
        self.sequence = Some(sequence);
    }

    pub(crate) fn set_grade(&mut self, grade: GradeValue) {
        self.grade = grade;
    }

    pub fn period(&self) -> Option<(NaiveDate, NaiveDate)> {
        match self.kind {
            RecordKind::Oral { from, until } => Some((from, until)),
            _ => None,
        }
    }

    /// False only for oral records that cover more than one day.
    pub fn is_punctual(&self) -> bool {
        match self.kind {
            RecordKind::Oral { from, until } => from == until,
            _ => true,
        }
    }

    pub fn as_row(&self) -> RecordRow {
        let (from, until) = self.period().unzip();
        RecordRow {
            date: self.date,
            category: self.category(),
            status: self.status.text().to_string(),
            grade: self.grade,
            number: self.number(),
            from,
            until,
            due: self.status.due(),
        }
    }
}

impl fmt::Display for PerformanceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}; {}; {}",
            self.grade,
            self.category(),
            self.date.format("%d.%m.%Y")
        )?;
        if let Some(number) = self.number() {
            write!(f, "; nr {}", number)?;
            if self.status.is_enabled() {
                write!(f, ", Status: {}", self.status)?;
            }
        }
        write!(f, ")")
    }
}

/// Flat view of a record for tabular export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordRow {
    pub date: NaiveDate,
    pub category: Category,
    pub status: String,
    pub grade: GradeValue,
    pub number: Option<u32>,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub due: Option<NaiveDate>,
}

/// Distance of `value` from the midline between two whole grades, in units
/// of `w_th`. At or beyond 1 no improvement adjustment applies.
pub fn discretization_distance(value: f64, w_th: f64) -> f64 {
    if w_th == 0.0 {
        return 1.0;
    }
    ((0.5 - value % 1.0) / w_th).abs()
}

fn improvement_grade(mean: &GradeValue, state: ImprovementState, w_th: f64) -> Result<GradeValue> {
    let scale = mean.scale();
    let (Some(value), Some(midline)) = (mean.value(), mean.midpoint()) else {
        return Ok(GradeValue::undefined(scale));
    };
    if discretization_distance(value, w_th) >= 1.0 {
        return Ok(GradeValue::undefined(scale));
    }

    let (worse, better) = match scale {
        GradeScale::Six => (midline + w_th, midline - w_th),
        GradeScale::Fifteen => (midline - w_th, midline + w_th),
        other => {
            return Err(GradeError::Validation(format!(
                "improvement needs a calculation scale, not {}",
                other
            )))
        }
    };

    let pseudo = match state {
        ImprovementState::Pending => value,
        ImprovementState::CompletedMissing => worse,
        ImprovementState::CompletedGood => better,
        ImprovementState::Disabled => return Ok(GradeValue::undefined(scale)),
    };
    GradeValue::new(pseudo, scale)
}
