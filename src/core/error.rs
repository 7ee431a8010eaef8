use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FireError {
    #[error("invalid input `{field}`: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("goal unreachable: {reason}")]
    UnreachableGoal { reason: String },
}

impl FireError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::UnreachableGoal {
            reason: reason.into(),
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::UnreachableGoal { .. })
    }
}

pub type FireResult<T> = Result<T, FireError>;

pub(crate) fn require_finite(field: &str, value: f64) -> FireResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FireError::invalid(field, "must be a finite number"))
    }
}

pub(crate) fn require_non_negative(field: &str, value: f64) -> FireResult<f64> {
    require_finite(field, value)?;
    if value < 0.0 {
        return Err(FireError::invalid(field, "must be >= 0"));
    }
    Ok(value)
}

pub(crate) fn require_positive(field: &str, value: f64) -> FireResult<f64> {
    require_finite(field, value)?;
    if value <= 0.0 {
        return Err(FireError::invalid(field, "must be > 0"));
    }
    Ok(value)
}
