//! Configuration validation error types.
//!
//! Validation catches invalid configurations at [`crate::Client::new`] time
//! with a clear message instead of surprising behavior at dispatch time.

use std::fmt;
use thiserror::Error;

/// Configuration validation failure.
///
/// Each variant names the offending field so callers can report it directly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigValidationError {
    /// Field value exceeds the maximum allowed value.
    #[error("Field '{field}' value {value} exceeds maximum {max}")]
    ValueTooHigh {
        /// The name of the configuration field.
        field: &'static str,
        /// The actual value that was provided.
        value: String,
        /// The maximum allowed value.
        max: String,
    },

    /// Field value is invalid for reasons other than range.
    #[error("Field '{field}' has invalid value: {reason}")]
    ValueInvalid {
        /// The name of the configuration field.
        field: &'static str,
        /// The reason why the value is invalid.
        reason: String,
    },

    /// Required field is missing.
    #[error("Required field '{field}' is missing")]
    ValueMissing {
        /// The name of the missing configuration field.
        field: &'static str,
    },
}

impl ConfigValidationError {
    /// Returns the field name associated with this error.
    #[must_use]
    pub fn field_name(&self) -> &'static str {
        match self {
            ConfigValidationError::ValueTooHigh { field, .. }
            | ConfigValidationError::ValueInvalid { field, .. }
            | ConfigValidationError::ValueMissing { field } => field,
        }
    }

    /// Creates a new `ValueTooHigh` error.
    pub fn too_high<V: fmt::Display, M: fmt::Display>(
        field: &'static str,
        value: V,
        max: M,
    ) -> Self {
        ConfigValidationError::ValueTooHigh {
            field,
            value: value.to_string(),
            max: max.to_string(),
        }
    }

    /// Creates a new `ValueInvalid` error.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigValidationError::ValueInvalid {
            field,
            reason: reason.into(),
        }
    }

    /// Creates a new `ValueMissing` error.
    pub fn missing(field: &'static str) -> Self {
        ConfigValidationError::ValueMissing { field }
    }
}

/// Result of a successful configuration validation.
///
/// Carries warnings for configurations that are valid but likely to behave
/// suboptimally (e.g. a sub-second timeout).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// Non-fatal issues the user should be aware of.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Creates a new empty validation result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a validation result with the given warnings.
    #[must_use]
    pub fn with_warnings(warnings: Vec<String>) -> Self {
        Self { warnings }
    }

    /// Adds a warning to the validation result.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Returns `true` if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}
