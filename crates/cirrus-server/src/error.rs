// ============================================
// File: crates/cirrus-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! Fatal errors of a worker or of server startup. Application-level
//! failures (missing file, name collision, declined delete) never appear
//! here; they are encoded as typed reply codes and the session stays
//! established.

use thiserror::Error;

use crate::services::storage::StorageError;
use cirrus_core::CoreError;
use cirrus_transport::TransportError;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error kinds.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Protocol or crypto failure; session-fatal.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The byte stream broke; session-fatal.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A filesystem failure that cannot be reported inside the session
    /// (for example a chunk read failing mid-stream).
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration file could not be loaded.
    #[error("failed to load config {path}: {reason}")]
    ConfigLoad {
        /// Path of the configuration file.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// A configuration value is invalid.
    #[error("invalid config value {field}: {reason}")]
    ConfigInvalid {
        /// Which field was invalid.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Server credential material (key, certificate, user keys) could
    /// not be loaded at startup.
    #[error("failed to load resource {path}: {reason}")]
    Resource {
        /// Path of the resource file.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// Binding or accepting on the listener socket failed.
    #[error("listener error: {0}")]
    Listener(#[source] std::io::Error),
}

impl ServerError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Resource` error.
    pub fn resource(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resource {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the error suggests the peer misbehaved rather than the
    /// server; workers log these at warn level.
    #[must_use]
    pub fn is_suspicious(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_suspicious())
    }
}
