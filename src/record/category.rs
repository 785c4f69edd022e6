use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GradeError, Result};

/// Kind of performance, as coded in the grade book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    /// Klassenarbeit
    WrittenExam,
    /// Kurztest
    ShortTest,
    /// mündliche Note
    Oral,
    /// GFS (gleichwertige Feststellung von Schülerleistungen)
    Presentation,
    PracticalWritten,
    PracticalTest,
    /// Ersatzleistung for a written exam
    SubstituteWritten,
    /// Verbesserung pseudo-record
    Improvement,
}

/// How a performance was delivered; regulation limits count by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    Oral,
    Written,
    Practical,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::WrittenExam,
        Category::ShortTest,
        Category::Oral,
        Category::Presentation,
        Category::PracticalWritten,
        Category::PracticalTest,
        Category::SubstituteWritten,
        Category::Improvement,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Category::WrittenExam => "KA",
            Category::ShortTest => "KT",
            Category::Oral => "m",
            Category::Presentation => "GFS",
            Category::PracticalWritten => "KAP",
            Category::PracticalTest => "KTP",
            Category::SubstituteWritten => "S",
            Category::Improvement => "V",
        }
    }

    /// Parse a grade book code. "P" is the older name of a practical test.
    pub fn from_code(code: &str) -> Result<Self> {
        match code.trim() {
            "KA" => Ok(Category::WrittenExam),
            "KT" => Ok(Category::ShortTest),
            "m" | "M" => Ok(Category::Oral),
            "GFS" => Ok(Category::Presentation),
            "KAP" => Ok(Category::PracticalWritten),
            "KTP" | "P" => Ok(Category::PracticalTest),
            "S" => Ok(Category::SubstituteWritten),
            "V" => Ok(Category::Improvement),
            other => Err(GradeError::UnknownCategory(other.to_string())),
        }
    }

    pub fn attribute(self) -> Attribute {
        match self {
            Category::Oral => Attribute::Oral,
            Category::WrittenExam
            | Category::ShortTest
            | Category::SubstituteWritten
            | Category::Improvement => Attribute::Written,
            Category::Presentation | Category::PracticalWritten | Category::PracticalTest => {
                Attribute::Practical
            }
        }
    }

    /// Whether an improvement can be requested for this kind of record.
    pub fn supports_improvement(self) -> bool {
        matches!(self, Category::WrittenExam | Category::ShortTest)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Attribute::Oral => "mündlich",
            Attribute::Written => "schriftlich",
            Attribute::Practical => "fachpraktisch",
        };
        write!(f, "{}", name)
    }
}
