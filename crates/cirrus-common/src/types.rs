// ============================================
// File: crates/cirrus-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the validated name type used for both usernames and
//! filenames. Every name that reaches the filesystem or the wire goes
//! through this type, so path traversal and over-long names are rejected
//! in exactly one place.
//!
//! ## Main Functionality
//! - `Name`: printable identifier, at most 34 bytes, whitelist-restricted
//! - Fixed 35-byte zero-padded wire form with a guaranteed NUL terminator
//!
//! ## ⚠️ Important Note for Next Developer
//! - `Name` is security-critical: it is the only barrier between wire
//!   input and filesystem paths. Never construct file paths from raw
//!   wire bytes.
//! - The wire form is exactly `NAME_WIRE_SIZE` bytes; changing it breaks
//!   every fixed-layout message that embeds a name.

use std::fmt;
use std::str::FromStr;

use crate::error::CommonError;

// ============================================
// Constants
// ============================================

/// Size of the zero-padded name field on the wire (34 bytes + NUL).
pub const NAME_WIRE_SIZE: usize = 35;

/// Maximum length of a name in bytes (strictly less than the wire size,
/// so a NUL terminator always fits).
pub const NAME_MAX_LEN: usize = NAME_WIRE_SIZE - 1;

/// Characters allowed in usernames and filenames.
const NAME_WHITELIST: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890_-.@";

// ============================================
// Name
// ============================================

/// A validated username or filename.
///
/// # Invariants
/// - non-empty and at most [`NAME_MAX_LEN`] bytes
/// - contains only characters from the whitelist `[A-Za-z0-9_\-.@]`
/// - is neither `.` nor `..`
///
/// # Wire Format
/// ```text
/// ┌──────────────────────────────────────────────┐
/// │ name bytes │ 0x00 padding up to 35 bytes      │
/// └──────────────────────────────────────────────┘
/// ```
/// The padding guarantees at least one NUL terminator inside the field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name(String);

impl Name {
    /// Validates and wraps a string.
    ///
    /// # Errors
    /// Returns `InvalidName` if the string is empty, too long, contains a
    /// character outside the whitelist, or is one of the reserved path
    /// tokens `.` / `..`.
    pub fn new(value: impl Into<String>) -> Result<Self, CommonError> {
        let value = value.into();
        if !is_valid_name(&value) {
            return Err(CommonError::invalid_name(&value));
        }
        Ok(Self(value))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the fixed-size zero-padded wire representation.
    #[must_use]
    pub fn to_wire(&self) -> [u8; NAME_WIRE_SIZE] {
        let mut buf = [0u8; NAME_WIRE_SIZE];
        buf[..self.0.len()].copy_from_slice(self.0.as_bytes());
        buf
    }

    /// Parses a name from its fixed-size wire representation.
    ///
    /// The field is read up to the first NUL byte and then validated with
    /// the same rules as [`Name::new`], so a malicious peer cannot smuggle
    /// path components through the padding.
    ///
    /// # Errors
    /// Returns `InvalidName` if the decoded bytes are not a valid name.
    pub fn from_wire(buf: &[u8; NAME_WIRE_SIZE]) -> Result<Self, CommonError> {
        let len = buf.iter().position(|&b| b == 0).unwrap_or(NAME_WIRE_SIZE);
        let value = std::str::from_utf8(&buf[..len])
            .map_err(|_| CommonError::invalid_name("<non-utf8>"))?;
        Self::new(value)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Name {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Checks whether a string satisfies the name rules.
///
/// True iff the string is non-empty, strictly shorter than the 35-byte
/// wire field, consists only of whitelisted characters, and is not one of
/// the reserved path tokens.
#[must_use]
pub fn is_valid_name(value: &str) -> bool {
    if value.is_empty() || value.len() > NAME_MAX_LEN {
        return false;
    }
    if value == "." || value == ".." {
        return false;
    }
    value.chars().all(|c| NAME_WHITELIST.contains(c))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_whitelisted_names() {
        for value in ["alice", "report-2024.txt", "a", "user@host", "A_b-c.9"] {
            assert!(Name::new(value).is_ok(), "{value} should be valid");
        }
    }

    #[test]
    fn rejects_invalid_names() {
        let too_long = "a".repeat(NAME_MAX_LEN + 1);
        for value in ["", ".", "..", "a/b", "a b", "päth", "a\0b", too_long.as_str()] {
            assert!(Name::new(value).is_err(), "{value:?} should be rejected");
        }
    }

    #[test]
    fn accepts_maximum_length() {
        let max = "a".repeat(NAME_MAX_LEN);
        assert!(Name::new(max).is_ok());
    }

    #[test]
    fn wire_roundtrip() {
        let name = Name::new("readme.txt").unwrap();
        let wire = name.to_wire();
        assert_eq!(wire.len(), NAME_WIRE_SIZE);
        // Zero padding after the name, NUL terminator guaranteed.
        assert_eq!(wire[10], 0);
        let decoded = Name::from_wire(&wire).unwrap();
        assert_eq!(name, decoded);
    }

    #[test]
    fn from_wire_rejects_traversal() {
        let mut buf = [0u8; NAME_WIRE_SIZE];
        buf[..2].copy_from_slice(b"..");
        assert!(Name::from_wire(&buf).is_err());

        let mut buf = [0u8; NAME_WIRE_SIZE];
        buf[..4].copy_from_slice(b"a/..");
        assert!(Name::from_wire(&buf).is_err());
    }

    #[test]
    fn from_wire_rejects_unterminated_garbage() {
        // All 35 bytes used, no NUL: longer than NAME_MAX_LEN.
        let buf = [b'x'; NAME_WIRE_SIZE];
        assert!(Name::from_wire(&buf).is_err());
    }
}
