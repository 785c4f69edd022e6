use super::rules::RegulationLimits;

/// A school subject and the regulation limits that apply to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub code: String,
    pub name: String,
    pub limits: RegulationLimits,
}

impl Subject {
    pub fn new(code: &str, name: &str, limits: RegulationLimits) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            limits,
        }
    }

    pub fn mathematics() -> Self {
        Self::new("M", "Mathematik", RegulationLimits::core_subject())
    }

    pub fn physics() -> Self {
        Self::new("Ph", "Physik", RegulationLimits::non_core_subject())
    }

    pub fn physics_advanced() -> Self {
        Self::new("PhLK", "Physik", RegulationLimits::advanced_course())
    }

    pub fn computer_science() -> Self {
        Self::new("Inf", "Informatik", RegulationLimits::non_core_subject())
    }

    /// Look up a built-in subject by code, case-insensitively.
    pub fn builtin(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "m" => Some(Self::mathematics()),
            "ph" => Some(Self::physics()),
            "phlk" => Some(Self::physics_advanced()),
            "inf" => Some(Self::computer_science()),
            _ => None,
        }
    }
}
