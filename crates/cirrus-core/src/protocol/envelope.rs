// ============================================
// File: crates/cirrus-core/src/protocol/envelope.rs
// ============================================
//! # Envelope Record Format
//!
//! ## Creation Reason
//! Defines the wire shape of every post-handshake record. The
//! cryptographic state machine that fills and checks these lives in
//! [`crate::session`]; this module is pure layout.
//!
//! ## Wire Format
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ iv (12 bytes)          │ random GCM nonce                │
//! ├──────────────────────────────────────────────────────────┤
//! │ aad (4 bytes)          │ session counter, little-endian  │
//! ├──────────────────────────────────────────────────────────┤
//! │ tag (16 bytes)         │ GCM authentication tag          │
//! ├──────────────────────────────────────────────────────────┤
//! │ ciphertext (N bytes)   │ N == plaintext length           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//! GCM is length-preserving, so the receiver always knows the full record
//! size from the plaintext size its state machine expects.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::crypto::{AAD_SIZE, GCM_IV_SIZE, GCM_TAG_SIZE};
use crate::error::{CoreError, Result};

/// Fixed bytes preceding the ciphertext: iv + aad + tag.
pub const ENVELOPE_OVERHEAD: usize = GCM_IV_SIZE + AAD_SIZE + GCM_TAG_SIZE;

/// A parsed record: header fields plus ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Random GCM nonce chosen by the sealer.
    pub iv: [u8; GCM_IV_SIZE],
    /// Session counter bound into the tag, little-endian.
    pub aad: [u8; AAD_SIZE],
    /// GCM authentication tag.
    pub tag: [u8; GCM_TAG_SIZE],
    /// Ciphertext, same length as the plaintext.
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Total wire size of an envelope for a given plaintext length.
    #[must_use]
    pub const fn wire_size(plaintext_len: usize) -> usize {
        ENVELOPE_OVERHEAD + plaintext_len
    }

    /// Returns the counter carried in the AAD.
    #[must_use]
    pub const fn counter(&self) -> u32 {
        u32::from_le_bytes(self.aad)
    }

    /// Serializes the envelope.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::wire_size(self.ciphertext.len()));
        buf.put_slice(&self.iv);
        buf.put_slice(&self.aad);
        buf.put_slice(&self.tag);
        buf.put_slice(&self.ciphertext);
        buf.to_vec()
    }

    /// Parses an envelope whose ciphertext must be exactly
    /// `plaintext_len` bytes.
    ///
    /// # Errors
    /// Returns `MessageTooShort` if the buffer is not exactly the
    /// expected record size.
    pub fn from_bytes(buf: &[u8], plaintext_len: usize) -> Result<Self> {
        let expected = Self::wire_size(plaintext_len);
        if buf.len() != expected {
            return Err(CoreError::too_short(expected, buf.len()));
        }
        let mut bytes = Bytes::copy_from_slice(buf);

        let mut iv = [0u8; GCM_IV_SIZE];
        bytes.copy_to_slice(&mut iv);
        let mut aad = [0u8; AAD_SIZE];
        bytes.copy_to_slice(&mut aad);
        let mut tag = [0u8; GCM_TAG_SIZE];
        bytes.copy_to_slice(&mut tag);

        Ok(Self {
            iv,
            aad,
            tag,
            ciphertext: bytes.to_vec(),
        })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let envelope = Envelope {
            iv: [1; GCM_IV_SIZE],
            aad: 9u32.to_le_bytes(),
            tag: [2; GCM_TAG_SIZE],
            ciphertext: vec![3; 71],
        };
        let bytes = envelope.to_bytes();
        assert_eq!(bytes.len(), Envelope::wire_size(71));

        let parsed = Envelope::from_bytes(&bytes, 71).unwrap();
        assert_eq!(parsed, envelope);
        assert_eq!(parsed.counter(), 9);
    }

    #[test]
    fn length_mismatch_rejected() {
        let envelope = Envelope {
            iv: [1; GCM_IV_SIZE],
            aad: [0; AAD_SIZE],
            tag: [2; GCM_TAG_SIZE],
            ciphertext: vec![3; 10],
        };
        let bytes = envelope.to_bytes();
        assert!(Envelope::from_bytes(&bytes, 11).is_err());
        assert!(Envelope::from_bytes(&bytes[..bytes.len() - 1], 10).is_err());
    }

    #[test]
    fn counter_is_little_endian() {
        let envelope = Envelope {
            iv: [0; GCM_IV_SIZE],
            aad: [0x01, 0x02, 0x03, 0x04],
            tag: [0; GCM_TAG_SIZE],
            ciphertext: Vec::new(),
        };
        assert_eq!(envelope.counter(), 0x0403_0201);
    }
}
