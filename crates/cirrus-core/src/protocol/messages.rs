// ============================================
// File: crates/cirrus-core/src/protocol/messages.rs
// ============================================
//! # Protocol Message Definitions
//!
//! ## Creation Reason
//! Defines the typed form of every message exchanged between Cirrus
//! clients and servers. The codec maps these to the fixed byte layouts.
//!
//! ## Message Sizes (plaintext / cleartext)
//! | Message | Size (bytes) |
//! |---------|--------------|
//! | SimpleMessage | 71 |
//! | AuthM1 | 72 |
//! | AuthM3 | 328 + cert_len |
//! | AuthM4 | 288 |
//! | ListM2 | 5 |
//! | ListM3 | 1 + list_size |
//! | DownloadM1 / DeleteM1 / UploadM1 / RenameM1 | 71 (padded) |
//! | DownloadM2 | 9 |
//! | ChunkMessage | 1 + chunk_len |
//!
//! ## Wire Format
//! All multi-byte integers are little-endian. Name fields are the fixed
//! 35-byte zero-padded form of [`cirrus_common::Name`].
//!
//! ## ⚠️ Important Note for Next Developer
//! - Field order is wire format; do not reorder
//! - Request messages are random-padded to 71 bytes by the codec; the
//!   padding is not part of the typed value and never compared

use cirrus_common::types::NAME_WIRE_SIZE;
use cirrus_common::Name;

use crate::crypto::{GCM_IV_SIZE, GCM_TAG_SIZE, RSA_SIGNATURE_SIZE, X25519_PUBLIC_KEY_SIZE};
use crate::protocol::{MessageCode, MAX_PACKET_SIZE};

// ============================================
// Size Constants
// ============================================

/// Wire size of `SimpleMessage` (and of every padded request message).
pub const SIMPLE_MESSAGE_SIZE: usize = MAX_PACKET_SIZE;

/// Wire size of AuthM1: code + username + key length + X25519 key.
pub const AUTH_M1_SIZE: usize = 1 + NAME_WIRE_SIZE + 4 + X25519_PUBLIC_KEY_SIZE;

/// Wire size of the fixed AuthM3 prefix, up to (excluding) the
/// certificate length field.
pub const AUTH_M3_PREFIX_SIZE: usize =
    4 + X25519_PUBLIC_KEY_SIZE + GCM_IV_SIZE + 4 + GCM_TAG_SIZE + RSA_SIGNATURE_SIZE;

/// Wire size of AuthM4.
pub const AUTH_M4_SIZE: usize = GCM_IV_SIZE + 4 + GCM_TAG_SIZE + RSA_SIGNATURE_SIZE;

/// Wire size of ListM2: code + list size.
pub const LIST_M2_SIZE: usize = 5;

/// Wire size of DownloadM2: code + file size.
pub const DOWNLOAD_M2_SIZE: usize = 9;

/// Largest certificate accepted in AuthM3; a parsing guard, far above any
/// real single certificate.
pub const MAX_CERTIFICATE_SIZE: usize = 16 * 1024;

// ============================================
// Handshake Messages
// ============================================

/// M1 (client → server, cleartext): username and the client's ephemeral
/// public key.
///
/// # Wire Format (72 bytes)
/// ```text
/// code(1)=AUTHENTICATION_REQUEST ‖ username(35) ‖ key_len:u32 ‖ key(32)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthM1 {
    /// Claimed username; the server looks up its public key store.
    pub username: Name,
    /// Client ephemeral X25519 public key (`g^a`).
    pub ephemeral_key: [u8; X25519_PUBLIC_KEY_SIZE],
}

/// M3 (server → client, cleartext with an AEAD-protected signature):
/// the server's ephemeral key, its transcript signature encrypted under
/// the fresh session key, and its certificate.
///
/// # Wire Format (328 + cert_len bytes)
/// ```text
/// key_len:u32 ‖ server_eph(32) ‖ iv(12) ‖ aad(4)=counter 0 ‖ tag(16) ‖
/// encrypted_sig(256) ‖ cert_len:u32 ‖ cert_der(cert_len)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthM3 {
    /// Server ephemeral X25519 public key (`g^b`).
    pub ephemeral_key: [u8; X25519_PUBLIC_KEY_SIZE],
    /// IV of the inner AEAD.
    pub iv: [u8; GCM_IV_SIZE],
    /// AAD of the inner AEAD (counter 0, little-endian).
    pub aad: [u8; 4],
    /// Tag of the inner AEAD.
    pub tag: [u8; GCM_TAG_SIZE],
    /// `Sig_S(g^a ‖ g^b)` encrypted under the session key.
    pub encrypted_signature: Vec<u8>,
    /// Server X.509 certificate, DER.
    pub certificate_der: Vec<u8>,
}

/// M4 (client → server): the client's transcript signature encrypted
/// under the session key.
///
/// # Wire Format (288 bytes)
/// ```text
/// iv(12) ‖ aad(4)=counter 1 ‖ tag(16) ‖ encrypted_sig(256)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthM4 {
    /// IV of the inner AEAD.
    pub iv: [u8; GCM_IV_SIZE],
    /// AAD of the inner AEAD (counter 1, little-endian).
    pub aad: [u8; 4],
    /// Tag of the inner AEAD.
    pub tag: [u8; GCM_TAG_SIZE],
    /// `Sig_C(g^a ‖ g^b)` encrypted under the session key.
    pub encrypted_signature: Vec<u8>,
}

// ============================================
// Operation Messages
// ============================================

/// A fixed 71-byte record carrying one code byte plus random padding;
/// used wherever the payload is semantically trivial but must not leak
/// its own nature via length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleMessage {
    /// The carried code.
    pub code: MessageCode,
}

impl SimpleMessage {
    /// Creates a simple message with the given code.
    #[must_use]
    pub const fn new(code: MessageCode) -> Self {
        Self { code }
    }
}

/// List reply header: the byte length of the upcoming file list
/// (including its NUL terminator), or 0 when the directory is empty.
///
/// # Wire Format (5 bytes)
/// `code(1)=LIST_ACK ‖ list_size:u32`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListM2 {
    /// Byte length of the ListM3 payload; 0 means no ListM3 follows.
    pub list_size: u32,
}

/// List reply body: comma-separated filenames with a trailing NUL.
///
/// # Wire Format (1 + list_size bytes)
/// `code(1)=LIST_RESPONSE ‖ file_list(list_size)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListM3 {
    /// Comma-separated names, NUL-terminated.
    pub file_list: Vec<u8>,
}

/// Download request: which file to fetch.
///
/// # Wire Format (71 bytes, random-padded)
/// `code(1)=DOWNLOAD_REQUEST ‖ filename(35) ‖ padding`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadM1 {
    /// Name of the requested file.
    pub filename: Name,
}

/// Download reply: `DOWNLOAD_ACK` with the real size, or
/// `FILE_NOT_FOUND` with size 0 (terminal).
///
/// # Wire Format (9 bytes)
/// `code(1) ‖ file_size:u64`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadM2 {
    /// `DownloadAck` or `FileNotFound`.
    pub code: MessageCode,
    /// File size in bytes; 0 when the file was not found.
    pub file_size: u64,
}

/// Upload request: target name and declared size.
///
/// # Wire Format (71 bytes, random-padded)
/// `code(1)=UPLOAD_REQUEST ‖ filename(35) ‖ file_size:u64 ‖ padding`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadM1 {
    /// Target filename in the user's directory.
    pub filename: Name,
    /// Declared size; the chunk schedule on both sides derives from it.
    pub file_size: u64,
}

/// Rename request.
///
/// # Wire Format (71 bytes, exactly filled)
/// `code(1)=RENAME_REQUEST ‖ old_name(35) ‖ new_name(35)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameM1 {
    /// Current filename.
    pub old_name: Name,
    /// Desired filename.
    pub new_name: Name,
}

/// Delete request; the server answers with `DELETE_ASK` and awaits
/// confirmation before removing anything.
///
/// # Wire Format (71 bytes, random-padded)
/// `code(1)=DELETE_REQUEST ‖ filename(35) ‖ padding`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteM1 {
    /// Name of the file to delete.
    pub filename: Name,
}

/// One file chunk in either direction.
///
/// # Wire Format (1 + chunk_len bytes)
/// `code(1)=UPLOAD_CHUNK|DOWNLOAD_CHUNK ‖ chunk(chunk_len)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMessage {
    /// `UploadChunk` or `DownloadChunk`.
    pub code: MessageCode,
    /// Raw file bytes; every chunk is `CHUNK_SIZE` long except possibly
    /// the last.
    pub chunk: Vec<u8>,
}
