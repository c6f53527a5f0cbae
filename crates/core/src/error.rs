use thiserror::Error;

pub type BanditResult<T> = Result<T, BanditError>;

#[derive(Error, Debug)]
pub enum BanditError {
    #[error("Invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Context dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Inconsistent configuration: {0}")]
    InconsistentConfiguration(String),

    #[error("Invalid policy state: {0}")]
    InvalidState(String),

    #[error("Arm index {arm} out of range for {n_arms} arms")]
    ArmOutOfRange { arm: usize, n_arms: usize },

    #[error("Trial cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BanditError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Fails unless `value` is finite and lies in `[0, 1]`.
pub fn ensure_unit_interval(field: &str, value: f64) -> BanditResult<()> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(BanditError::invalid(
            field,
            format!("must be within [0, 1], got {value}"),
        ))
    }
}

/// Fails unless `value` is finite and strictly positive.
pub fn ensure_positive(field: &str, value: f64) -> BanditResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(BanditError::invalid(
            field,
            format!("must be a positive number, got {value}"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_interval_bounds() {
        assert!(ensure_unit_interval("epsilon", 0.0).is_ok());
        assert!(ensure_unit_interval("epsilon", 1.0).is_ok());
        assert!(ensure_unit_interval("epsilon", -0.01).is_err());
        assert!(ensure_unit_interval("epsilon", f64::NAN).is_err());
    }

    #[test]
    fn test_invalid_parameter_names_field() {
        let err = ensure_positive("policies[2].c", 0.0).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("policies[2].c"), "{msg}");
        assert!(matches!(err, BanditError::InvalidParameter { .. }));
    }
}
