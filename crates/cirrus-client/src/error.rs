// ============================================
// File: crates/cirrus-client/src/error.rs
// ============================================
//! # Client Error Types
//!
//! ## Creation Reason
//! Separates the two failure families the client must treat differently:
//! session-fatal errors (crypto, protocol, transport: disconnect and
//! report) and application outcomes (file not found, name taken,
//! declined delete: report and keep the session).
//!
//! Failures surface on the CLI as numeric codes via
//! [`ClientError::code`]; no secret material ever appears in a message.

use thiserror::Error;

use cirrus_common::CommonError;
use cirrus_core::CoreError;
use cirrus_transport::TransportError;

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Client error kinds.
#[derive(Error, Debug)]
pub enum ClientError {
    // ========================================
    // Session-fatal
    // ========================================
    /// Protocol or crypto failure; the session is torn down.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The byte stream broke; the session is torn down.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Local input validation failed (bad name, bad path).
    #[error(transparent)]
    Common(#[from] CommonError),

    // ========================================
    // Application outcomes (session survives)
    // ========================================
    /// The requested file does not exist on the server.
    #[error("file not found on server")]
    FileNotFound,

    /// The target filename is already taken on the server.
    #[error("filename already exists on server")]
    FileAlreadyExists,

    /// The delete was declined (either locally or by the reply code).
    #[error("delete not confirmed")]
    NoDeleteConfirm,

    /// The server reported the rename failed.
    #[error("rename failed on server")]
    RenameFailure,

    /// The server could not delete the file.
    #[error("delete failed on server")]
    DeleteFileError,

    /// A local file was missing, unreadable, or not a regular file.
    #[error("local file error: {reason}")]
    LocalFile {
        /// What went wrong with the local path.
        reason: String,
    },

    /// The local file exceeds the protocol's upload limit.
    #[error("file too large for upload")]
    WrongFileSize,

    /// The configuration file could not be loaded.
    #[error("failed to load config {path}: {reason}")]
    ConfigLoad {
        /// Path of the configuration file.
        path: String,
        /// What went wrong.
        reason: String,
    },

    /// Local credential material could not be loaded.
    #[error("failed to load {path}: {reason}")]
    Resource {
        /// Path of the resource file.
        path: String,
        /// What went wrong.
        reason: String,
    },
}

impl ClientError {
    /// Creates a `LocalFile` error.
    pub fn local_file(reason: impl Into<String>) -> Self {
        Self::LocalFile {
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
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

    /// True when the session must be torn down (disconnect and
    /// re-authenticate to continue).
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        match self {
            Self::Core(e) => e.is_session_fatal(),
            Self::Transport(_) => true,
            _ => false,
        }
    }

    /// The numeric code reported on the CLI.
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            Self::Core(CoreError::UsernameNotFound) => 17,
            Self::Core(CoreError::AuthenticationFailure) => 24,
            Self::Core(CoreError::Encryption { .. }) => 25,
            Self::Transport(TransportError::Connect(_) | TransportError::SendFailure(_)) => 26,
            Self::Transport(_) => 27,
            Self::Core(CoreError::Decryption) => 28,
            Self::Core(CoreError::WrongCounter { .. }) => 29,
            Self::Core(
                CoreError::WrongMessageCode { .. } | CoreError::UnknownMessageCode(_),
            ) => 30,
            Self::Common(_) | Self::LocalFile { .. } => 31,
            Self::FileAlreadyExists => 32,
            Self::FileNotFound => 33,
            Self::WrongFileSize => 36,
            Self::NoDeleteConfirm => 37,
            Self::RenameFailure => 38,
            Self::DeleteFileError => 39,
            _ => 24,
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(ClientError::Core(CoreError::Decryption).is_session_fatal());
        assert!(ClientError::Transport(TransportError::Closed).is_session_fatal());
        assert!(!ClientError::FileNotFound.is_session_fatal());
        assert!(!ClientError::NoDeleteConfirm.is_session_fatal());
        assert!(!ClientError::Core(CoreError::RekeyRequired).is_session_fatal());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(ClientError::Core(CoreError::UsernameNotFound).code(), 17);
        assert_eq!(ClientError::Core(CoreError::wrong_counter(1, 0)).code(), 29);
        assert_eq!(ClientError::FileNotFound.code(), 33);
    }
}
