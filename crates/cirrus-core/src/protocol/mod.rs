// ============================================
// File: crates/cirrus-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the closed set of wire messages, their fixed binary layouts
//! and the protocol constants both peers must agree on.
//!
//! ## Submodules
//! - [`messages`]: typed message structs
//! - [`codec`]: binary serialization/deserialization
//! - [`envelope`]: the record wire format `iv ‖ aad ‖ tag ‖ ciphertext`
//!
//! ## ⚠️ Important Note for Next Developer
//! - The numeric values of [`MessageCode`] are wire format; never renumber
//! - `MAX_PACKET_SIZE` is sized for the largest request (rename: 1 + 35 +
//!   35); every request plaintext is padded to exactly this size so the
//!   ciphertext length never identifies the operation

pub mod codec;
pub mod envelope;
pub mod messages;

pub use messages::{
    AuthM1, AuthM3, AuthM4, ChunkMessage, DeleteM1, DownloadM1, DownloadM2, ListM2, ListM3,
    RenameM1, SimpleMessage, UploadM1,
};

// ============================================
// Constants
// ============================================

/// Fixed plaintext size of every request message and of `SimpleMessage`:
/// one code byte plus the two 35-byte names of the largest request.
pub const MAX_PACKET_SIZE: usize = 71;

/// Unit of file transfer: 1 MB (decimal) per chunk; the last chunk of a
/// file may be smaller.
pub const CHUNK_SIZE: usize = 1_000_000;

/// Largest file accepted for upload: 4 GB (decimal).
pub const MAX_FILE_SIZE: u64 = 4_000_000_000;

/// Counter value that forces a rekey; never used to seal or open a
/// record.
pub const MAX_COUNTER: u32 = 0xFFFF_FFFF;

// ============================================
// MessageCode
// ============================================

/// Wire message/result code carried as the first plaintext byte.
///
/// One code space covers operation requests, flow-control results and
/// typed application errors; the numeric values are fixed wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum MessageCode {
    Ack = 0,
    Nack = 1,
    AuthenticationRequest = 2,
    UploadRequest = 3,
    UploadChunk = 4,
    DownloadRequest = 5,
    DownloadAck = 6,
    DownloadChunk = 7,
    DeleteRequest = 8,
    DeleteAsk = 9,
    DeleteConfirm = 10,
    ListRequest = 11,
    ListAck = 12,
    ListResponse = 13,
    RenameRequest = 14,
    LogoutRequest = 15,
    NoDeleteConfirm = 16,
    UsernameNotFound = 17,
    FilenameAlreadyExists = 18,
    FileNotFound = 19,
    FilenameNotFound = 20,
    DeleteFileError = 21,
}

impl MessageCode {
    /// Converts a wire byte to a `MessageCode`.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Ack),
            1 => Some(Self::Nack),
            2 => Some(Self::AuthenticationRequest),
            3 => Some(Self::UploadRequest),
            4 => Some(Self::UploadChunk),
            5 => Some(Self::DownloadRequest),
            6 => Some(Self::DownloadAck),
            7 => Some(Self::DownloadChunk),
            8 => Some(Self::DeleteRequest),
            9 => Some(Self::DeleteAsk),
            10 => Some(Self::DeleteConfirm),
            11 => Some(Self::ListRequest),
            12 => Some(Self::ListAck),
            13 => Some(Self::ListResponse),
            14 => Some(Self::RenameRequest),
            15 => Some(Self::LogoutRequest),
            16 => Some(Self::NoDeleteConfirm),
            17 => Some(Self::UsernameNotFound),
            18 => Some(Self::FilenameAlreadyExists),
            19 => Some(Self::FileNotFound),
            20 => Some(Self::FilenameNotFound),
            21 => Some(Self::DeleteFileError),
            _ => None,
        }
    }

    /// Returns the wire byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// Checks whether this code starts an operation (the codes the server
    /// dispatch loop accepts).
    #[must_use]
    pub const fn is_request(self) -> bool {
        matches!(
            self,
            Self::UploadRequest
                | Self::DownloadRequest
                | Self::DeleteRequest
                | Self::ListRequest
                | Self::RenameRequest
                | Self::LogoutRequest
        )
    }
}

impl TryFrom<u8> for MessageCode {
    type Error = u8;

    fn try_from(value: u8) -> std::result::Result<Self, u8> {
        Self::from_byte(value).ok_or(value)
    }
}

impl From<MessageCode> for u8 {
    fn from(code: MessageCode) -> Self {
        code.as_byte()
    }
}

// ============================================
// ChunkPlan
// ============================================

/// Chunking schedule for a file of a given size.
///
/// Both peers compute the identical plan from the declared file size, so
/// the number and sizes of chunk messages are never negotiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
}

impl ChunkPlan {
    /// Creates the plan for a file of `file_size` bytes.
    #[must_use]
    pub const fn new(file_size: u64) -> Self {
        Self { file_size }
    }

    /// Number of chunks: `ceil(file_size / CHUNK_SIZE)`; zero for an
    /// empty file.
    #[must_use]
    pub const fn chunk_count(&self) -> u64 {
        self.file_size.div_ceil(CHUNK_SIZE as u64)
    }

    /// Size of chunk `index`: `CHUNK_SIZE` for every chunk except a
    /// shorter trailing remainder.
    #[must_use]
    pub fn chunk_len(&self, index: u64) -> usize {
        debug_assert!(index < self.chunk_count());
        if index + 1 < self.chunk_count() {
            return CHUNK_SIZE;
        }
        match (self.file_size % CHUNK_SIZE as u64) as usize {
            0 => CHUNK_SIZE,
            rem => rem,
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
    fn code_roundtrip() {
        for byte in 0u8..=21 {
            let code = MessageCode::from_byte(byte).unwrap();
            assert_eq!(code.as_byte(), byte);
        }
        assert!(MessageCode::from_byte(22).is_none());
        assert!(MessageCode::from_byte(0xFF).is_none());
    }

    #[test]
    fn request_classification() {
        assert!(MessageCode::ListRequest.is_request());
        assert!(MessageCode::LogoutRequest.is_request());
        assert!(!MessageCode::Ack.is_request());
        assert!(!MessageCode::DownloadAck.is_request());
    }

    #[test]
    fn chunk_plan_exact_multiple() {
        let plan = ChunkPlan::new(2 * CHUNK_SIZE as u64);
        assert_eq!(plan.chunk_count(), 2);
        assert_eq!(plan.chunk_len(0), CHUNK_SIZE);
        assert_eq!(plan.chunk_len(1), CHUNK_SIZE);
    }

    #[test]
    fn chunk_plan_with_remainder() {
        let plan = ChunkPlan::new(2_500_000);
        assert_eq!(plan.chunk_count(), 3);
        assert_eq!(plan.chunk_len(0), CHUNK_SIZE);
        assert_eq!(plan.chunk_len(1), CHUNK_SIZE);
        assert_eq!(plan.chunk_len(2), 500_000);
    }

    #[test]
    fn chunk_plan_empty_and_tiny() {
        assert_eq!(ChunkPlan::new(0).chunk_count(), 0);

        let plan = ChunkPlan::new(1);
        assert_eq!(plan.chunk_count(), 1);
        assert_eq!(plan.chunk_len(0), 1);
    }
}
