use super::config::EngineConfig;
use crate::limits::Subject;

/// Validate the engine configuration.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if !(0.0..=0.5).contains(&config.w_th) {
        errors.push(format!("w_th: {} must lie within [0, 0.5]", config.w_th));
    }

    if !(0.0..=2.0).contains(&config.w_s0) {
        errors.push(format!("w_s0: {} must lie within [0, 2]", config.w_s0));
    }

    if !(1.0..=4.0).contains(&config.w_sm) {
        errors.push(format!("w_sm: {} must lie within [1, 4]", config.w_sm));
    }

    if config.n_kt_0 < 1 {
        errors.push("n_kt_0: must be at least 1".to_string());
    }

    if !config.scale.is_calculation_scale() {
        errors.push(format!(
            "scale: grades can only be calculated on N or NP, not {}",
            config.scale
        ));
    }

    if let Some(ref code) = config.subject {
        if Subject::builtin(code).is_none() {
            errors.push(format!("subject: unknown subject '{}'", code));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
