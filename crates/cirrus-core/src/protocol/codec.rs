// ============================================
// File: crates/cirrus-core/src/protocol/codec.rs
// ============================================
//! # Protocol Codec
//!
//! ## Creation Reason
//! Provides the bijective mapping between typed messages and their fixed
//! byte layouts. Integers are little-endian; names are the 35-byte
//! zero-padded wire form.
//!
//! ## Parsing Strategy
//! 1. Check the exact expected length
//! 2. Read and validate the code byte
//! 3. Read fields in wire order
//! 4. Ignore request padding (random bytes, never interpreted)
//!
//! ## Padding
//! Every request plaintext (`SimpleMessage`, `UploadM1`, `DownloadM1`,
//! `RenameM1`, `DeleteM1`) is filled with cryptographically random bytes
//! up to `MAX_PACKET_SIZE` so that, under encryption, the record length
//! never reveals which operation a client started.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always validate buffer lengths before reading
//! - Padding bytes must come from the OS RNG, not a counter or zeros

use bytes::{Buf, BufMut, Bytes, BytesMut};
use rand::rngs::OsRng;
use rand::RngCore;

use cirrus_common::types::NAME_WIRE_SIZE;
use cirrus_common::Name;

use crate::crypto::{GCM_IV_SIZE, GCM_TAG_SIZE, RSA_SIGNATURE_SIZE, X25519_PUBLIC_KEY_SIZE};
use crate::error::{CoreError, Result};
use crate::protocol::messages::{
    AuthM1, AuthM3, AuthM4, ChunkMessage, DeleteM1, DownloadM1, DownloadM2, ListM2, ListM3,
    RenameM1, SimpleMessage, UploadM1, AUTH_M1_SIZE, AUTH_M3_PREFIX_SIZE, AUTH_M4_SIZE,
    DOWNLOAD_M2_SIZE, LIST_M2_SIZE, MAX_CERTIFICATE_SIZE, SIMPLE_MESSAGE_SIZE,
};
use crate::protocol::{MessageCode, MAX_PACKET_SIZE};

// ============================================
// Codec Trait
// ============================================

/// Trait for encoding and decoding protocol messages.
pub trait Codec<T> {
    /// Encodes a message into a byte buffer.
    fn encode(&self, msg: &T, buf: &mut BytesMut);

    /// Decodes a message from bytes.
    ///
    /// # Errors
    /// Returns a protocol error if the buffer is too short, a code byte
    /// is unexpected, or an embedded name fails validation.
    fn decode(&self, buf: &mut Bytes) -> Result<T>;
}

/// Codec implementation for all protocol messages.
#[derive(Debug, Default, Clone)]
pub struct ProtocolCodec;

impl ProtocolCodec {
    /// Creates a new protocol codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

// ============================================
// Helpers
// ============================================

/// Fills the buffer with random bytes up to `MAX_PACKET_SIZE`.
fn pad_to_packet_size(buf: &mut BytesMut) {
    debug_assert!(buf.len() <= MAX_PACKET_SIZE);
    let mut padding = [0u8; MAX_PACKET_SIZE];
    let needed = MAX_PACKET_SIZE - buf.len();
    OsRng.fill_bytes(&mut padding[..needed]);
    buf.put_slice(&padding[..needed]);
}

fn check_len(buf: &Bytes, expected: usize) -> Result<()> {
    if buf.len() < expected {
        return Err(CoreError::too_short(expected, buf.len()));
    }
    Ok(())
}

fn read_code(buf: &mut Bytes) -> Result<MessageCode> {
    let byte = buf.get_u8();
    MessageCode::from_byte(byte).ok_or(CoreError::UnknownMessageCode(byte))
}

fn expect_code(buf: &mut Bytes, expected: MessageCode) -> Result<()> {
    let byte = buf.get_u8();
    if byte != expected.as_byte() {
        return Err(CoreError::wrong_message_code(format!("{expected:?}"), byte));
    }
    Ok(())
}

fn read_name(buf: &mut Bytes) -> Result<Name> {
    let mut wire = [0u8; NAME_WIRE_SIZE];
    buf.copy_to_slice(&mut wire);
    Ok(Name::from_wire(&wire)?)
}

// ============================================
// SimpleMessage
// ============================================

impl Codec<SimpleMessage> for ProtocolCodec {
    fn encode(&self, msg: &SimpleMessage, buf: &mut BytesMut) {
        buf.reserve(SIMPLE_MESSAGE_SIZE);
        buf.put_u8(msg.code.as_byte());
        pad_to_packet_size(buf);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<SimpleMessage> {
        check_len(buf, SIMPLE_MESSAGE_SIZE)?;
        let code = read_code(buf)?;
        Ok(SimpleMessage { code })
    }
}

// ============================================
// AuthM1
// ============================================

impl Codec<AuthM1> for ProtocolCodec {
    fn encode(&self, msg: &AuthM1, buf: &mut BytesMut) {
        buf.reserve(AUTH_M1_SIZE);
        buf.put_u8(MessageCode::AuthenticationRequest.as_byte());
        buf.put_slice(&msg.username.to_wire());
        buf.put_u32_le(X25519_PUBLIC_KEY_SIZE as u32);
        buf.put_slice(&msg.ephemeral_key);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<AuthM1> {
        check_len(buf, AUTH_M1_SIZE)?;
        expect_code(buf, MessageCode::AuthenticationRequest)?;
        let username = read_name(buf)?;

        let key_len = buf.get_u32_le() as usize;
        if key_len != X25519_PUBLIC_KEY_SIZE {
            return Err(CoreError::MessageTooLarge {
                max: X25519_PUBLIC_KEY_SIZE,
                actual: key_len,
            });
        }
        let mut ephemeral_key = [0u8; X25519_PUBLIC_KEY_SIZE];
        buf.copy_to_slice(&mut ephemeral_key);

        Ok(AuthM1 {
            username,
            ephemeral_key,
        })
    }
}

// ============================================
// AuthM3
// ============================================

impl Codec<AuthM3> for ProtocolCodec {
    fn encode(&self, msg: &AuthM3, buf: &mut BytesMut) {
        buf.reserve(AUTH_M3_PREFIX_SIZE + 4 + msg.certificate_der.len());
        buf.put_u32_le(X25519_PUBLIC_KEY_SIZE as u32);
        buf.put_slice(&msg.ephemeral_key);
        buf.put_slice(&msg.iv);
        buf.put_slice(&msg.aad);
        buf.put_slice(&msg.tag);
        buf.put_slice(&msg.encrypted_signature);
        buf.put_u32_le(msg.certificate_der.len() as u32);
        buf.put_slice(&msg.certificate_der);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<AuthM3> {
        check_len(buf, AUTH_M3_PREFIX_SIZE + 4)?;

        let key_len = buf.get_u32_le() as usize;
        if key_len != X25519_PUBLIC_KEY_SIZE {
            return Err(CoreError::MessageTooLarge {
                max: X25519_PUBLIC_KEY_SIZE,
                actual: key_len,
            });
        }
        let mut ephemeral_key = [0u8; X25519_PUBLIC_KEY_SIZE];
        buf.copy_to_slice(&mut ephemeral_key);

        let mut iv = [0u8; GCM_IV_SIZE];
        buf.copy_to_slice(&mut iv);
        let mut aad = [0u8; 4];
        buf.copy_to_slice(&mut aad);
        let mut tag = [0u8; GCM_TAG_SIZE];
        buf.copy_to_slice(&mut tag);

        let mut encrypted_signature = vec![0u8; RSA_SIGNATURE_SIZE];
        buf.copy_to_slice(&mut encrypted_signature);

        let cert_len = buf.get_u32_le() as usize;
        if cert_len > MAX_CERTIFICATE_SIZE {
            return Err(CoreError::MessageTooLarge {
                max: MAX_CERTIFICATE_SIZE,
                actual: cert_len,
            });
        }
        check_len(buf, cert_len)?;
        let mut certificate_der = vec![0u8; cert_len];
        buf.copy_to_slice(&mut certificate_der);

        Ok(AuthM3 {
            ephemeral_key,
            iv,
            aad,
            tag,
            encrypted_signature,
            certificate_der,
        })
    }
}

// ============================================
// AuthM4
// ============================================

impl Codec<AuthM4> for ProtocolCodec {
    fn encode(&self, msg: &AuthM4, buf: &mut BytesMut) {
        buf.reserve(AUTH_M4_SIZE);
        buf.put_slice(&msg.iv);
        buf.put_slice(&msg.aad);
        buf.put_slice(&msg.tag);
        buf.put_slice(&msg.encrypted_signature);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<AuthM4> {
        check_len(buf, AUTH_M4_SIZE)?;

        let mut iv = [0u8; GCM_IV_SIZE];
        buf.copy_to_slice(&mut iv);
        let mut aad = [0u8; 4];
        buf.copy_to_slice(&mut aad);
        let mut tag = [0u8; GCM_TAG_SIZE];
        buf.copy_to_slice(&mut tag);
        let mut encrypted_signature = vec![0u8; RSA_SIGNATURE_SIZE];
        buf.copy_to_slice(&mut encrypted_signature);

        Ok(AuthM4 {
            iv,
            aad,
            tag,
            encrypted_signature,
        })
    }
}

// ============================================
// List Messages
// ============================================

impl Codec<ListM2> for ProtocolCodec {
    fn encode(&self, msg: &ListM2, buf: &mut BytesMut) {
        buf.reserve(LIST_M2_SIZE);
        buf.put_u8(MessageCode::ListAck.as_byte());
        buf.put_u32_le(msg.list_size);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<ListM2> {
        check_len(buf, LIST_M2_SIZE)?;
        expect_code(buf, MessageCode::ListAck)?;
        Ok(ListM2 {
            list_size: buf.get_u32_le(),
        })
    }
}

impl Codec<ListM3> for ProtocolCodec {
    fn encode(&self, msg: &ListM3, buf: &mut BytesMut) {
        buf.reserve(1 + msg.file_list.len());
        buf.put_u8(MessageCode::ListResponse.as_byte());
        buf.put_slice(&msg.file_list);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<ListM3> {
        check_len(buf, 1)?;
        expect_code(buf, MessageCode::ListResponse)?;
        Ok(ListM3 {
            file_list: buf.to_vec(),
        })
    }
}

// ============================================
// Download Messages
// ============================================

impl Codec<DownloadM1> for ProtocolCodec {
    fn encode(&self, msg: &DownloadM1, buf: &mut BytesMut) {
        buf.reserve(MAX_PACKET_SIZE);
        buf.put_u8(MessageCode::DownloadRequest.as_byte());
        buf.put_slice(&msg.filename.to_wire());
        pad_to_packet_size(buf);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<DownloadM1> {
        check_len(buf, 1 + NAME_WIRE_SIZE)?;
        expect_code(buf, MessageCode::DownloadRequest)?;
        Ok(DownloadM1 {
            filename: read_name(buf)?,
        })
    }
}

impl Codec<DownloadM2> for ProtocolCodec {
    fn encode(&self, msg: &DownloadM2, buf: &mut BytesMut) {
        buf.reserve(DOWNLOAD_M2_SIZE);
        buf.put_u8(msg.code.as_byte());
        buf.put_u64_le(msg.file_size);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<DownloadM2> {
        check_len(buf, DOWNLOAD_M2_SIZE)?;
        let code = read_code(buf)?;
        if !matches!(code, MessageCode::DownloadAck | MessageCode::FileNotFound) {
            return Err(CoreError::wrong_message_code(
                "DownloadAck or FileNotFound",
                code.as_byte(),
            ));
        }
        Ok(DownloadM2 {
            code,
            file_size: buf.get_u64_le(),
        })
    }
}

// ============================================
// Upload / Rename / Delete Requests
// ============================================

impl Codec<UploadM1> for ProtocolCodec {
    fn encode(&self, msg: &UploadM1, buf: &mut BytesMut) {
        buf.reserve(MAX_PACKET_SIZE);
        buf.put_u8(MessageCode::UploadRequest.as_byte());
        buf.put_slice(&msg.filename.to_wire());
        buf.put_u64_le(msg.file_size);
        pad_to_packet_size(buf);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<UploadM1> {
        check_len(buf, 1 + NAME_WIRE_SIZE + 8)?;
        expect_code(buf, MessageCode::UploadRequest)?;
        Ok(UploadM1 {
            filename: read_name(buf)?,
            file_size: buf.get_u64_le(),
        })
    }
}

impl Codec<RenameM1> for ProtocolCodec {
    fn encode(&self, msg: &RenameM1, buf: &mut BytesMut) {
        buf.reserve(MAX_PACKET_SIZE);
        buf.put_u8(MessageCode::RenameRequest.as_byte());
        buf.put_slice(&msg.old_name.to_wire());
        buf.put_slice(&msg.new_name.to_wire());
    }

    fn decode(&self, buf: &mut Bytes) -> Result<RenameM1> {
        check_len(buf, 1 + 2 * NAME_WIRE_SIZE)?;
        expect_code(buf, MessageCode::RenameRequest)?;
        Ok(RenameM1 {
            old_name: read_name(buf)?,
            new_name: read_name(buf)?,
        })
    }
}

impl Codec<DeleteM1> for ProtocolCodec {
    fn encode(&self, msg: &DeleteM1, buf: &mut BytesMut) {
        buf.reserve(MAX_PACKET_SIZE);
        buf.put_u8(MessageCode::DeleteRequest.as_byte());
        buf.put_slice(&msg.filename.to_wire());
        pad_to_packet_size(buf);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<DeleteM1> {
        check_len(buf, 1 + NAME_WIRE_SIZE)?;
        expect_code(buf, MessageCode::DeleteRequest)?;
        Ok(DeleteM1 {
            filename: read_name(buf)?,
        })
    }
}

// ============================================
// Chunk Messages
// ============================================

impl Codec<ChunkMessage> for ProtocolCodec {
    fn encode(&self, msg: &ChunkMessage, buf: &mut BytesMut) {
        buf.reserve(1 + msg.chunk.len());
        buf.put_u8(msg.code.as_byte());
        buf.put_slice(&msg.chunk);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<ChunkMessage> {
        check_len(buf, 1)?;
        let code = read_code(buf)?;
        if !matches!(code, MessageCode::UploadChunk | MessageCode::DownloadChunk) {
            return Err(CoreError::wrong_message_code(
                "UploadChunk or DownloadChunk",
                code.as_byte(),
            ));
        }
        Ok(ChunkMessage {
            code,
            chunk: buf.to_vec(),
        })
    }
}

// ============================================
// Convenience Functions
// ============================================

/// Encodes any codec-supported message to a fresh buffer.
#[must_use]
pub fn encode<T>(msg: &T) -> BytesMut
where
    ProtocolCodec: Codec<T>,
{
    let mut buf = BytesMut::new();
    ProtocolCodec.encode(msg, &mut buf);
    buf
}

/// Decodes any codec-supported message from a byte slice.
///
/// # Errors
/// Propagates the codec's protocol errors.
pub fn decode<T>(buf: &[u8]) -> Result<T>
where
    ProtocolCodec: Codec<T>,
{
    let mut bytes = Bytes::copy_from_slice(buf);
    ProtocolCodec.decode(&mut bytes)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn name(value: &str) -> Name {
        Name::new(value).unwrap()
    }

    #[test]
    fn simple_message_layout() {
        let msg = SimpleMessage::new(MessageCode::ListRequest);
        let encoded = encode(&msg);
        assert_eq!(encoded.len(), SIMPLE_MESSAGE_SIZE);
        assert_eq!(encoded[0], MessageCode::ListRequest.as_byte());

        let decoded: SimpleMessage = decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn simple_message_padding_is_random() {
        let msg = SimpleMessage::new(MessageCode::Ack);
        let a = encode(&msg);
        let b = encode(&msg);
        assert_eq!(a[0], b[0]);
        assert_ne!(a[1..], b[1..]);
    }

    #[test]
    fn simple_message_unknown_code_rejected() {
        let mut buf = vec![0u8; SIMPLE_MESSAGE_SIZE];
        buf[0] = 0xEE;
        assert!(matches!(
            decode::<SimpleMessage>(&buf),
            Err(CoreError::UnknownMessageCode(0xEE))
        ));
    }

    #[test]
    fn auth_m1_roundtrip() {
        let msg = AuthM1 {
            username: name("alice"),
            ephemeral_key: [0x11; X25519_PUBLIC_KEY_SIZE],
        };
        let encoded = encode(&msg);
        assert_eq!(encoded.len(), AUTH_M1_SIZE);
        assert_eq!(decode::<AuthM1>(&encoded).unwrap(), msg);
    }

    #[test]
    fn auth_m1_rejects_bad_key_len() {
        let msg = AuthM1 {
            username: name("alice"),
            ephemeral_key: [0x11; X25519_PUBLIC_KEY_SIZE],
        };
        let mut encoded = encode(&msg).to_vec();
        // Corrupt the little-endian key length field.
        encoded[1 + NAME_WIRE_SIZE] = 64;
        assert!(decode::<AuthM1>(&encoded).is_err());
    }

    #[test]
    fn auth_m3_roundtrip() {
        let msg = AuthM3 {
            ephemeral_key: [0x22; X25519_PUBLIC_KEY_SIZE],
            iv: [0x01; GCM_IV_SIZE],
            aad: 0u32.to_le_bytes(),
            tag: [0x02; GCM_TAG_SIZE],
            encrypted_signature: vec![0x33; RSA_SIGNATURE_SIZE],
            certificate_der: vec![0x44; 900],
        };
        let encoded = encode(&msg);
        assert_eq!(encoded.len(), AUTH_M3_PREFIX_SIZE + 4 + 900);
        assert_eq!(decode::<AuthM3>(&encoded).unwrap(), msg);
    }

    #[test]
    fn auth_m3_rejects_oversized_certificate() {
        let msg = AuthM3 {
            ephemeral_key: [0x22; X25519_PUBLIC_KEY_SIZE],
            iv: [0x01; GCM_IV_SIZE],
            aad: 0u32.to_le_bytes(),
            tag: [0x02; GCM_TAG_SIZE],
            encrypted_signature: vec![0x33; RSA_SIGNATURE_SIZE],
            certificate_der: vec![0x44; 16],
        };
        let mut encoded = encode(&msg).to_vec();
        let cert_len_offset = AUTH_M3_PREFIX_SIZE;
        encoded[cert_len_offset..cert_len_offset + 4]
            .copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(
            decode::<AuthM3>(&encoded),
            Err(CoreError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn auth_m4_roundtrip() {
        let msg = AuthM4 {
            iv: [0x05; GCM_IV_SIZE],
            aad: 1u32.to_le_bytes(),
            tag: [0x06; GCM_TAG_SIZE],
            encrypted_signature: vec![0x77; RSA_SIGNATURE_SIZE],
        };
        let encoded = encode(&msg);
        assert_eq!(encoded.len(), AUTH_M4_SIZE);
        assert_eq!(decode::<AuthM4>(&encoded).unwrap(), msg);
    }

    #[test]
    fn list_messages_roundtrip() {
        let m2 = ListM2 { list_size: 12 };
        let encoded = encode(&m2);
        assert_eq!(encoded.len(), LIST_M2_SIZE);
        assert_eq!(decode::<ListM2>(&encoded).unwrap(), m2);

        let m3 = ListM3 {
            file_list: b"a.txt,b.txt\0".to_vec(),
        };
        let encoded = encode(&m3);
        assert_eq!(encoded.len(), 1 + 12);
        assert_eq!(decode::<ListM3>(&encoded).unwrap(), m3);
    }

    #[test]
    fn download_messages_roundtrip() {
        let m1 = DownloadM1 {
            filename: name("file.bin"),
        };
        let encoded = encode(&m1);
        assert_eq!(encoded.len(), MAX_PACKET_SIZE);
        assert_eq!(decode::<DownloadM1>(&encoded).unwrap(), m1);

        let m2 = DownloadM2 {
            code: MessageCode::DownloadAck,
            file_size: 2_500_000,
        };
        let encoded = encode(&m2);
        assert_eq!(encoded.len(), DOWNLOAD_M2_SIZE);
        assert_eq!(decode::<DownloadM2>(&encoded).unwrap(), m2);
    }

    #[test]
    fn download_m2_rejects_unrelated_code() {
        let mut buf = vec![0u8; DOWNLOAD_M2_SIZE];
        buf[0] = MessageCode::ListAck.as_byte();
        assert!(matches!(
            decode::<DownloadM2>(&buf),
            Err(CoreError::WrongMessageCode { .. })
        ));
    }

    #[test]
    fn upload_rename_delete_roundtrip() {
        let upload = UploadM1 {
            filename: name("big.iso"),
            file_size: 4_000_000_000,
        };
        let encoded = encode(&upload);
        assert_eq!(encoded.len(), MAX_PACKET_SIZE);
        assert_eq!(decode::<UploadM1>(&encoded).unwrap(), upload);

        let rename = RenameM1 {
            old_name: name("old.txt"),
            new_name: name("new.txt"),
        };
        let encoded = encode(&rename);
        assert_eq!(encoded.len(), MAX_PACKET_SIZE);
        assert_eq!(decode::<RenameM1>(&encoded).unwrap(), rename);

        let delete = DeleteM1 {
            filename: name("gone.txt"),
        };
        let encoded = encode(&delete);
        assert_eq!(encoded.len(), MAX_PACKET_SIZE);
        assert_eq!(decode::<DeleteM1>(&encoded).unwrap(), delete);
    }

    #[test]
    fn request_padding_hides_variant_length() {
        // Every request encodes to the same size regardless of content.
        let sizes = [
            encode(&SimpleMessage::new(MessageCode::LogoutRequest)).len(),
            encode(&DownloadM1 { filename: name("a") }).len(),
            encode(&UploadM1 { filename: name("a"), file_size: 1 }).len(),
            encode(&RenameM1 { old_name: name("a"), new_name: name("b") }).len(),
            encode(&DeleteM1 { filename: name("a") }).len(),
        ];
        assert!(sizes.iter().all(|&s| s == MAX_PACKET_SIZE));
    }

    #[test]
    fn chunk_roundtrip() {
        let msg = ChunkMessage {
            code: MessageCode::DownloadChunk,
            chunk: vec![0xAB; 500_000],
        };
        let encoded = encode(&msg);
        assert_eq!(encoded.len(), 1 + 500_000);
        assert_eq!(decode::<ChunkMessage>(&encoded).unwrap(), msg);
    }

    #[test]
    fn chunk_rejects_non_chunk_code() {
        let buf = [MessageCode::Ack.as_byte(), 1, 2, 3];
        assert!(decode::<ChunkMessage>(&buf).is_err());
    }

    #[test]
    fn decode_from_wire_rejects_traversal_names() {
        let mut buf = encode(&DownloadM1 {
            filename: name("ok.txt"),
        })
        .to_vec();
        buf[1..4].copy_from_slice(b"../");
        buf[4] = 0;
        assert!(decode::<DownloadM1>(&buf).is_err());
    }
}
