use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a requested improvement stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImprovementState {
    Disabled,
    Pending,
    CompletedGood,
    CompletedMissing,
}

/// Improvement ("Verbesserung") status of a single record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImprovementStatus {
    state: ImprovementState,
    due: Option<NaiveDate>,
    text: String,
}

impl Default for ImprovementStatus {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ImprovementStatus {
    pub fn disabled() -> Self {
        Self {
            state: ImprovementState::Disabled,
            due: None,
            text: "---".to_string(),
        }
    }

    /// Parse a status token from the grade book.
    ///
    /// "---" disables, "fertig" and "fehlt" complete the improvement, any
    /// other token leaves it pending. A pending "offen" turns into "fehlt"
    /// once `today` is past the due date. Before the due date every enabled
    /// status reads "offen bis dd.mm.yyyy" and keeps its state.
    pub fn parse(token: Option<&str>, due: Option<NaiveDate>, today: NaiveDate) -> Self {
        let token = token.map(str::trim).unwrap_or("---");
        let state = match token.to_ascii_lowercase().as_str() {
            "---" | "" | "none" => return Self::disabled(),
            "fertig" | "good" => ImprovementState::CompletedGood,
            "fehlt" | "missing" => ImprovementState::CompletedMissing,
            _ => ImprovementState::Pending,
        };
        let mut status = Self {
            state,
            due,
            text: token.to_string(),
        };

        if let Some(due) = due {
            let open = matches!(token.to_ascii_lowercase().as_str(), "offen" | "pending");
            if today > due && open {
                status.state = ImprovementState::CompletedMissing;
                status.text = "fehlt".to_string();
            } else if today < due {
                status.text = format!("offen bis {}", due.format("%d.%m.%Y"));
            }
        }
        status
    }

    pub fn state(&self) -> ImprovementState {
        self.state
    }

    pub fn due(&self) -> Option<NaiveDate> {
        self.due
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_enabled(&self) -> bool {
        self.state != ImprovementState::Disabled
    }
}

impl fmt::Display for ImprovementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text)
    }
}
