//! Plan ID sanitization and validation
//!
//! Plan IDs become directory names under `<home>/plans/`, so they are held
//! to a filesystem-safe alphabet.

use crate::error::{ErrorCategory, UserFriendlyError};
use unicode_normalization::UnicodeNormalization;

/// Error type for plan ID validation failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanIdError {
    #[error("Plan ID is empty after sanitization")]
    Empty,

    #[error("Plan ID contains only invalid characters")]
    OnlyInvalidCharacters,

    #[error("Plan ID '{id}' must not start with a dot")]
    LeadingDot { id: String },

    #[error("Plan ID '{id}' is not canonical (expected '{canonical}')")]
    NotCanonical { id: String, canonical: String },
}

impl UserFriendlyError for PlanIdError {
    fn user_message(&self) -> String {
        match self {
            Self::Empty => "The plan ID is empty or contains no valid characters".to_string(),
            Self::OnlyInvalidCharacters => {
                "The plan ID contains only invalid characters (no alphanumeric, dots, or dashes)"
                    .to_string()
            }
            Self::LeadingDot { id } => format!("The plan ID '{id}' starts with a dot"),
            Self::NotCanonical { id, canonical } => {
                format!("The plan ID '{id}' would be stored as '{canonical}'")
            }
        }
    }

    fn context(&self) -> Option<String> {
        Some("Plan IDs are used as directory names. Only ASCII alphanumeric characters, dots (.), dashes (-), and underscores (_) are allowed.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotCanonical { canonical, .. } => {
                vec![format!("Address the plan as '{canonical}'")]
            }
            _ => vec![
                "Use alphanumeric characters, dots, dashes, or underscores".to_string(),
                "Example: add-login-endpoint, migrate-db-v2".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}

/// Sanitizes a raw plan name into a plan ID.
///
/// - Normalizes Unicode with NFKC to fold confusables
/// - Accepts only `[A-Za-z0-9._-]`, replacing everything else with `_`
/// - Collapses `..` so the ID can never traverse
/// - Rejects IDs that are empty, meaningless, or hidden (leading dot)
///
/// ```
/// use planwright_utils::plan_id::sanitize_plan_id;
///
/// assert_eq!(sanitize_plan_id("add-login_2").unwrap(), "add-login_2");
/// assert_eq!(sanitize_plan_id("add login!").unwrap(), "add_login_");
/// assert_eq!(sanitize_plan_id("ａｄｄ－ｌｏｇｉｎ").unwrap(), "add-login");
/// ```
pub fn sanitize_plan_id(id: &str) -> Result<String, PlanIdError> {
    let normalized: String = id.nfkc().collect();

    let mut sanitized: String = normalized
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    while sanitized.contains("..") {
        sanitized = sanitized.replace("..", "__");
    }

    if sanitized.is_empty() {
        return Err(PlanIdError::Empty);
    }

    let has_meaningful_content = sanitized
        .chars()
        .any(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if !has_meaningful_content {
        return Err(PlanIdError::OnlyInvalidCharacters);
    }

    if sanitized.starts_with('.') {
        return Err(PlanIdError::LeadingDot { id: sanitized });
    }

    if sanitized != id {
        tracing::warn!(original = %id, sanitized = %sanitized, "plan id sanitized");
    }

    Ok(sanitized)
}

/// Checks that `id` is already canonical, i.e. sanitizing it is a no-op.
///
/// Store operations address plans by exact ID and never rewrite them.
pub fn validate_plan_id(id: &str) -> Result<(), PlanIdError> {
    let canonical = sanitize_plan_id(id)?;
    if canonical != id {
        return Err(PlanIdError::NotCanonical {
            id: id.to_string(),
            canonical,
        });
    }
    Ok(())
}
