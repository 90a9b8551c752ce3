use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::error::AppError;

pub fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|errors| AppError::UnprocessableEntity(format!("Validation failed: {errors}")))
}

/// `start`/`end` take `YYYY-MM-DD` or RFC 3339 values and win over `range`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnalyticsQuery {
    #[validate(length(min = 1, max = 128), custom(function = "validate_org_id"))]
    pub org_id: String,
    pub start: Option<String>,
    pub end: Option<String>,
    #[validate(length(max = 32))]
    pub range: Option<String>,
    #[validate(range(min = 1, max = 1000))]
    pub top: Option<usize>,
}

fn validate_org_id(org_id: &str) -> Result<(), ValidationError> {
    if org_id.trim().is_empty() {
        return Err(ValidationError::new("blank_org_id"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{validate_input, AnalyticsQuery};
    use crate::error::AppError;

    fn query(org_id: &str, top: Option<usize>) -> AnalyticsQuery {
        AnalyticsQuery {
            org_id: org_id.to_string(),
            start: None,
            end: None,
            range: None,
            top,
        }
    }

    #[test]
    fn accepts_minimal_query() {
        assert!(validate_input(&query("default_org", None)).is_ok());
        assert!(validate_input(&query("default_org", Some(10))).is_ok());
    }

    #[test]
    fn rejects_empty_org_and_zero_top() {
        assert!(matches!(
            validate_input(&query("", None)),
            Err(AppError::UnprocessableEntity(_))
        ));
        assert!(matches!(
            validate_input(&query("default_org", Some(0))),
            Err(AppError::UnprocessableEntity(_))
        ));
    }

    #[test]
    fn rejects_whitespace_only_org() {
        assert!(matches!(
            validate_input(&query("  \t", None)),
            Err(AppError::UnprocessableEntity(_))
        ));
        assert!(validate_input(&query(" default_org ", None)).is_ok());
    }
}
