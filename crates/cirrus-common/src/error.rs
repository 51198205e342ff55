// ============================================
// File: crates/cirrus-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Defines the error type shared across Cirrus crates for failures that
//! are not specific to one layer (input validation, configuration values).
//!
//! ## ⚠️ Important Note for Next Developer
//! - Error messages may be shown to users and written to logs; never put
//!   key material or file contents in them.

use thiserror::Error;

/// Result type for common operations.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors shared across the Cirrus crates.
#[derive(Error, Debug)]
pub enum CommonError {
    /// A username or filename failed validation.
    #[error("invalid name `{value}`: must be 1-34 characters from [A-Za-z0-9_\\-.@], not `.` or `..`")]
    InvalidName {
        /// The offending value (truncated for display).
        value: String,
    },

    /// A caller-supplied value was out of range or malformed.
    #[error("invalid input for {field}: {reason}")]
    InvalidInput {
        /// Which field was invalid.
        field: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl CommonError {
    /// Creates an `InvalidName` error, truncating the value for display.
    pub fn invalid_name(value: impl AsRef<str>) -> Self {
        let value = value.as_ref().chars().take(64).collect();
        Self::InvalidName { value }
    }

    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_name_truncates_value() {
        let err = CommonError::invalid_name("x".repeat(500));
        let msg = err.to_string();
        assert!(msg.len() < 200);
    }
}
