//! Field-level validation errors.
//!
//! Request payloads expose a `validate()` that collects every problem instead
//! of stopping at the first, so clients can fix a form in one round trip.

use core::fmt;

use serde::{Deserialize, Serialize};

/// A single invalid field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Accumulated validation failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    /// Empty error set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a failure for `field`.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// Check that a required text field is non-blank and at most `max` chars.
    pub fn check_text(&mut self, field: &str, value: &str, max: usize) {
        let len = value.trim().chars().count();
        if len == 0 {
            self.add(field, "must not be empty");
        } else if len > max {
            self.add(field, format!("must be at most {max} characters"));
        }
    }

    /// Check an optional text field is at most `max` chars.
    pub fn check_optional_text(&mut self, field: &str, value: Option<&str>, max: usize) {
        if let Some(v) = value
            && v.chars().count() > max
        {
            self.add(field, format!("must be at most {max} characters"));
        }
    }

    /// Check an integer lies in `min..=max`.
    pub fn check_range(&mut self, field: &str, value: i64, min: i64, max: i64) {
        if value < min || value > max {
            self.add(field, format!("must be between {min} and {max}"));
        }
    }

    /// Whether no failures were recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The recorded failures.
    #[must_use]
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok(())` when empty, otherwise `Err(self)`.
    ///
    /// # Errors
    ///
    /// Returns `self` if any failure was recorded.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_all_failures() {
        let mut errors = ValidationErrors::new();
        errors.check_text("name", "   ", 100);
        errors.check_optional_text("description", Some(&"x".repeat(11)), 10);
        errors.check_range("limit", 0, 1, 100);
        assert_eq!(errors.errors().len(), 3);
        assert_eq!(
            errors.to_string(),
            "name: must not be empty; description: must be at most 10 characters; limit: must be between 1 and 100"
        );
    }

    #[test]
    fn test_valid_input_is_ok() {
        let mut errors = ValidationErrors::new();
        errors.check_text("name", "Premium", 100);
        errors.check_optional_text("description", None, 10);
        errors.check_range("limit", 50, 1, 100);
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        let mut errors = ValidationErrors::new();
        errors.check_text("name", "ééééé", 5);
        assert!(errors.is_empty());
    }
}
