//! Input validation utilities.
//!
//! Centralized validation helpers used across API routes.

use std::sync::LazyLock;

use chrono::NaiveDate;
use validator::{Validate, ValidationError, ValidationErrorsKind};

use crate::error::RxError;

/// Validate a request body, returning a RxError::Validation on failure.
pub fn validate_request<T: Validate>(body: &T) -> Result<(), RxError> {
    body.validate().map_err(|e| RxError::Validation {
        message: format_validation_errors(e),
    })
}

/// Format validation errors into a human-readable string.
fn format_validation_errors(errors: validator::ValidationErrors) -> String {
    let mut messages = Vec::new();
    collect_messages(&errors, &mut messages);
    // errors() is backed by a HashMap; keep output stable
    messages.sort();
    messages.dedup();
    messages.join("; ")
}

fn collect_messages(errors: &validator::ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        match kind {
            ValidationErrorsKind::Field(errs) => out.extend(errs.iter().map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for '{field}'"))
            })),
            ValidationErrorsKind::Struct(inner) => collect_messages(inner, out),
            ValidationErrorsKind::List(items) => {
                for inner in items.values() {
                    collect_messages(inner, out);
                }
            }
        }
    }
}

pub static PHONE_REGEX: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^\+?[0-9 ()\-.]{7,20}$").expect("valid phone regex"));

pub static TIME_OF_DAY_REGEX: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").expect("valid time regex")
});

/// Reject blank strings that pass a plain length check ("   ").
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// Dates of birth must lie in the past.
pub fn past_date(value: &NaiveDate) -> Result<(), ValidationError> {
    if *value >= chrono::Utc::now().date_naive() {
        return Err(ValidationError::new("date_not_in_past"));
    }
    Ok(())
}

/// Turn a display name into a URL slug: lowercase ascii, words joined by '-'.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Sample {
        #[validate(length(min = 3, message = "Name must be at least 3 characters"))]
        name: String,
        #[validate(email(message = "Invalid email format"))]
        email: String,
    }

    #[test]
    fn test_validation_messages_are_joined() {
        let body = Sample {
            name: "ab".into(),
            email: "nope".into(),
        };
        let err = validate_request(&body).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: Invalid email format; Name must be at least 3 characters"
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Cold & Flu"), "cold-flu");
        assert_eq!(slugify("  Vitamin D3 1000IU "), "vitamin-d3-1000iu");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn test_phone_and_time_patterns() {
        assert!(PHONE_REGEX.is_match("+1 (555) 010-2000"));
        assert!(!PHONE_REGEX.is_match("call me"));
        assert!(TIME_OF_DAY_REGEX.is_match("09:30"));
        assert!(!TIME_OF_DAY_REGEX.is_match("24:00"));
    }

    #[test]
    fn test_past_date() {
        assert!(past_date(&NaiveDate::from_ymd_opt(1990, 5, 1).unwrap()).is_ok());
        let tomorrow = chrono::Utc::now().date_naive() + chrono::Days::new(1);
        assert!(past_date(&tomorrow).is_err());
    }
}
