// ============================================
// File: crates/cirrus-client/src/session.rs
// ============================================
//! # Client Session
//!
//! ## Creation Reason
//! Drives the client half of the protocol: the five-message handshake,
//! then the six operations as strictly sequential state machines over
//! the record layer. One operation is in flight at a time; every
//! response size is known before the read.
//!
//! ## Failure Semantics
//! - Session-fatal errors (crypto, counter, transport) invalidate the
//!   session; the caller reports the numeric code and disconnects.
//! - Application outcomes (file not found, name taken, declined delete)
//!   are typed errors/outcomes; the session remains usable.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The handshake order is: decrypt the server's signature, verify the
//!   certificate chain, only then verify the signature with the
//!   certified key. Never trust a key before its certificate
//! - A fatal error in the middle of a download removes the partial
//!   local file

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;

use tracing::{debug, info};
use zeroize::Zeroize;

use cirrus_common::Name;
use cirrus_core::crypto::handshake::{
    decrypt_signature, encrypt_signature, sign_transcript, transcript, verify_transcript,
    M3_COUNTER, M4_COUNTER, M5_COUNTER,
};
use cirrus_core::crypto::kdf::derive_session_key;
use cirrus_core::crypto::{EphemeralKeyPair, IdentityKeyPair, TrustStore};
use cirrus_core::protocol::codec::{decode, encode};
use cirrus_core::protocol::envelope::Envelope;
use cirrus_core::protocol::messages::{
    AUTH_M3_PREFIX_SIZE, DOWNLOAD_M2_SIZE, LIST_M2_SIZE, MAX_CERTIFICATE_SIZE,
    SIMPLE_MESSAGE_SIZE,
};
use cirrus_core::protocol::{
    AuthM1, AuthM3, AuthM4, ChunkMessage, ChunkPlan, DeleteM1, DownloadM1, DownloadM2, ListM2,
    ListM3, MessageCode, RenameM1, SimpleMessage, UploadM1, MAX_FILE_SIZE,
};
use cirrus_core::{CoreError, Session};
use cirrus_transport::Connection;

use crate::error::{ClientError, Result};

/// Outcome of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The server confirmed the file is gone.
    Deleted,
    /// The user declined at the confirmation step; nothing was removed.
    Declined,
}

// ============================================
// ClientSession
// ============================================

/// An authenticated connection to a Cirrus server.
pub struct ClientSession {
    conn: Connection,
    session: Session,
    username: Name,
    identity: IdentityKeyPair,
    trust: TrustStore,
    interactive: bool,
}

impl ClientSession {
    /// Connects and runs the handshake.
    ///
    /// # Errors
    /// - `Core(UsernameNotFound)` when the server rejects the username
    /// - `Core(AuthenticationFailure)` on certificate/signature failure
    /// - transport errors when the server is unreachable
    pub fn connect(
        addr: &str,
        username: Name,
        identity: IdentityKeyPair,
        trust: TrustStore,
    ) -> Result<Self> {
        let mut conn = Connection::connect(addr)?;
        let session = Self::authenticate(&mut conn, &username, &identity, &trust)?;
        info!(user = %username, server = addr, "session established");
        Ok(Self {
            conn,
            session,
            username,
            identity,
            trust,
            interactive: false,
        })
    }

    /// Enables terminal progress output for transfers.
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    /// Runs the client half of the five-message handshake.
    fn authenticate(
        conn: &mut Connection,
        username: &Name,
        identity: &IdentityKeyPair,
        trust: &TrustStore,
    ) -> Result<Session> {
        // M1: username and a fresh ephemeral key, cleartext.
        let ephemeral = EphemeralKeyPair::generate();
        let client_ephemeral = ephemeral.public_key_bytes();
        conn.send(&encode(&AuthM1 {
            username: username.clone(),
            ephemeral_key: client_ephemeral,
        }))?;

        // M2: ACK or NACK. The wire never says more than
        // USERNAME_NOT_FOUND.
        let m2_buf = conn.receive(SIMPLE_MESSAGE_SIZE)?;
        let m2: SimpleMessage = decode(&m2_buf)?;
        if m2.code != MessageCode::Ack {
            return Err(CoreError::UsernameNotFound.into());
        }

        // M3 arrives as a fixed prefix, then the length-prefixed
        // certificate.
        let mut m3_buf = conn.receive(AUTH_M3_PREFIX_SIZE)?;
        let len_bytes = conn.receive(4)?;
        let cert_len = u32::from_le_bytes(
            len_bytes
                .as_slice()
                .try_into()
                .expect("receive returned 4 bytes"),
        ) as usize;
        if cert_len > MAX_CERTIFICATE_SIZE {
            return Err(CoreError::MessageTooLarge {
                max: MAX_CERTIFICATE_SIZE,
                actual: cert_len,
            }
            .into());
        }
        let cert_buf = conn.receive(cert_len)?;
        m3_buf.extend_from_slice(&len_bytes);
        m3_buf.extend_from_slice(&cert_buf);
        let m3: AuthM3 = decode(&m3_buf)?;

        // Key agreement; the shared secret dies here.
        let mut shared = ephemeral.exchange(&m3.ephemeral_key);
        let key = derive_session_key(&shared);
        shared.zeroize();

        // Authenticate the server: decrypt its signature, validate its
        // certificate against the trust anchor, then verify.
        let transcript_bytes = transcript(&client_ephemeral, &m3.ephemeral_key);
        let mut server_signature = decrypt_signature(
            &key,
            M3_COUNTER,
            &m3.iv,
            &m3.aad,
            &m3.encrypted_signature,
            &m3.tag,
        )?;
        let verification = trust
            .verify_peer(&m3.certificate_der)
            .and_then(|server_public| {
                verify_transcript(&server_public, &transcript_bytes, &server_signature)
            });
        server_signature.zeroize();
        verification.map_err(|_| CoreError::AuthenticationFailure)?;
        debug!(user = %username, "server authenticated");

        // M4: prove our own identity.
        let signature = sign_transcript(identity, &transcript_bytes);
        let (iv, aad, encrypted_signature, tag) =
            encrypt_signature(&key, M4_COUNTER, &signature)?;
        conn.send(&encode(&AuthM4 {
            iv,
            aad,
            tag,
            encrypted_signature,
        }))?;

        // M5: the server's verdict, inside the record layer at counter 2.
        let record = conn.receive(Envelope::wire_size(SIMPLE_MESSAGE_SIZE))?;
        let mut m5_session = Session::with_counter(key.clone(), M5_COUNTER);
        let plaintext = m5_session.open(&record, SIMPLE_MESSAGE_SIZE)?;
        let m5: SimpleMessage = decode(&plaintext)?;
        if m5.code != MessageCode::Ack {
            return Err(CoreError::AuthenticationFailure.into());
        }

        // Both sides now reset the shared counter to 0.
        Ok(Session::new(key))
    }

    // ========================================
    // Record helpers
    // ========================================

    fn send_message(&mut self, plaintext: &[u8]) -> Result<()> {
        let record = self.session.seal(plaintext)?;
        self.conn.send(&record)?;
        self.rekey_if_needed()
    }

    fn receive_message(&mut self, plaintext_len: usize) -> Result<Vec<u8>> {
        let record = self.conn.receive(Envelope::wire_size(plaintext_len))?;
        let plaintext = self.session.open(&record, plaintext_len)?;
        self.rekey_if_needed()?;
        Ok(plaintext)
    }

    /// Re-runs the handshake when the counter is exhausted; the server
    /// reaches the same boundary on the same message and is already
    /// waiting for M1.
    fn rekey_if_needed(&mut self) -> Result<()> {
        if !self.session.needs_rekey() {
            return Ok(());
        }
        info!(user = %self.username, "session counter exhausted, re-running handshake");
        self.session =
            Self::authenticate(&mut self.conn, &self.username, &self.identity, &self.trust)?;
        Ok(())
    }

    fn send_simple(&mut self, code: MessageCode) -> Result<()> {
        self.send_message(&encode(&SimpleMessage::new(code)))
    }

    fn receive_simple(&mut self) -> Result<SimpleMessage> {
        let plaintext = self.receive_message(SIMPLE_MESSAGE_SIZE)?;
        Ok(decode(&plaintext)?)
    }

    // ========================================
    // List
    // ========================================

    /// Fetches the filenames stored in the user's directory.
    ///
    /// # Errors
    /// Session-fatal kinds only; an empty directory is `Ok(vec![])`.
    pub fn list(&mut self) -> Result<Vec<String>> {
        self.send_simple(MessageCode::ListRequest)?;

        let m2_plain = self.receive_message(LIST_M2_SIZE)?;
        let m2: ListM2 = decode(&m2_plain)?;
        if m2.list_size == 0 {
            return Ok(Vec::new());
        }

        let m3_plain = self.receive_message(1 + m2.list_size as usize)?;
        let m3: ListM3 = decode(&m3_plain)?;

        // Comma-separated, NUL-terminated.
        let list = m3.file_list.strip_suffix(&[0]).unwrap_or(&m3.file_list);
        let text = String::from_utf8_lossy(list);
        Ok(text
            .split(',')
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    // ========================================
    // Download
    // ========================================

    /// Downloads a file into `downloads_dir`, refusing to overwrite an
    /// existing local file. Returns the byte count.
    ///
    /// # Errors
    /// - `FileNotFound` when the server has no such file (session
    ///   survives)
    /// - `LocalFile` when the destination exists or cannot be written
    /// - session-fatal kinds on record/transport failures
    pub fn download(&mut self, filename: &Name, downloads_dir: &Path) -> Result<u64> {
        fs::create_dir_all(downloads_dir)
            .map_err(|e| ClientError::local_file(e.to_string()))?;
        let dest = downloads_dir.join(filename.as_str());
        if dest.exists() {
            return Err(ClientError::local_file(format!(
                "{} already exists locally",
                dest.display()
            )));
        }

        self.send_message(&encode(&DownloadM1 {
            filename: filename.clone(),
        }))?;

        let m2_plain = self.receive_message(DOWNLOAD_M2_SIZE)?;
        let m2: DownloadM2 = decode(&m2_plain)?;
        if m2.code == MessageCode::FileNotFound {
            return Err(ClientError::FileNotFound);
        }

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&dest)
            .map_err(|e| ClientError::local_file(e.to_string()))?;

        match self.receive_download_chunks(file, m2.file_size) {
            Ok(()) => {
                info!(user = %self.username, file = %filename, bytes = m2.file_size, "download complete");
                Ok(m2.file_size)
            }
            Err(e) => {
                // Do not leave a partial file behind.
                let _ = fs::remove_file(&dest);
                Err(e)
            }
        }
    }

    fn receive_download_chunks(&mut self, mut file: File, file_size: u64) -> Result<()> {
        let plan = ChunkPlan::new(file_size);
        let mut received: u64 = 0;

        for index in 0..plan.chunk_count() {
            let chunk_len = plan.chunk_len(index);
            let plaintext = self.receive_message(1 + chunk_len)?;
            let message: ChunkMessage = decode(&plaintext)?;
            if message.code != MessageCode::DownloadChunk {
                return Err(CoreError::wrong_message_code(
                    "DownloadChunk",
                    message.code.as_byte(),
                )
                .into());
            }
            file.write_all(&message.chunk)
                .map_err(|e| ClientError::local_file(e.to_string()))?;

            received += message.chunk.len() as u64;
            self.show_progress("Downloading", received, file_size);
        }
        self.finish_progress();
        file.flush()
            .map_err(|e| ClientError::local_file(e.to_string()))
    }

    // ========================================
    // Upload
    // ========================================

    /// Uploads a local file under `remote_name`. Returns the byte count.
    ///
    /// # Errors
    /// - `LocalFile` when the path is missing or not a regular file
    /// - `WrongFileSize` when the file exceeds the 4 GB protocol limit
    /// - `FileAlreadyExists` when the server refuses the name (session
    ///   survives)
    /// - session-fatal kinds on record/transport failures
    pub fn upload(&mut self, path: &Path, remote_name: &Name) -> Result<u64> {
        let metadata =
            fs::metadata(path).map_err(|e| ClientError::local_file(e.to_string()))?;
        if !metadata.is_file() {
            return Err(ClientError::local_file(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let file_size = metadata.len();
        if file_size > MAX_FILE_SIZE {
            return Err(ClientError::WrongFileSize);
        }

        self.send_message(&encode(&UploadM1 {
            filename: remote_name.clone(),
            file_size,
        }))?;

        let reply = self.receive_simple()?;
        match reply.code {
            MessageCode::Ack => {}
            MessageCode::Nack => return Err(ClientError::FileAlreadyExists),
            other => {
                return Err(
                    CoreError::wrong_message_code("Ack or Nack", other.as_byte()).into(),
                )
            }
        }

        let mut file = File::open(path).map_err(|e| ClientError::local_file(e.to_string()))?;
        let plan = ChunkPlan::new(file_size);
        let mut sent: u64 = 0;
        for index in 0..plan.chunk_count() {
            let chunk_len = plan.chunk_len(index);
            let mut chunk = vec![0u8; chunk_len];
            file.read_exact(&mut chunk)
                .map_err(|e| ClientError::local_file(e.to_string()))?;
            self.send_message(&encode(&ChunkMessage {
                code: MessageCode::UploadChunk,
                chunk,
            }))?;

            sent += chunk_len as u64;
            self.show_progress("Uploading", sent, file_size);
        }
        self.finish_progress();

        let done = self.receive_simple()?;
        if done.code != MessageCode::Ack {
            return Err(CoreError::wrong_message_code("Ack", done.code.as_byte()).into());
        }
        info!(user = %self.username, file = %remote_name, bytes = file_size, "upload complete");
        Ok(file_size)
    }

    // ========================================
    // Rename
    // ========================================

    /// Renames a stored file.
    ///
    /// # Errors
    /// - `FileNotFound` / `FileAlreadyExists` / `RenameFailure` as typed
    ///   application outcomes (session survives)
    /// - session-fatal kinds on record/transport failures
    pub fn rename(&mut self, old_name: &Name, new_name: &Name) -> Result<()> {
        self.send_message(&encode(&RenameM1 {
            old_name: old_name.clone(),
            new_name: new_name.clone(),
        }))?;

        let reply = self.receive_simple()?;
        match reply.code {
            MessageCode::Ack => Ok(()),
            MessageCode::FileNotFound => Err(ClientError::FileNotFound),
            MessageCode::FilenameAlreadyExists => Err(ClientError::FileAlreadyExists),
            MessageCode::Nack => Err(ClientError::RenameFailure),
            other => Err(CoreError::wrong_message_code(
                "Ack, Nack, FileNotFound or FilenameAlreadyExists",
                other.as_byte(),
            )
            .into()),
        }
    }

    // ========================================
    // Delete
    // ========================================

    /// Deletes a stored file after the confirmation leg. `confirm` is
    /// consulted between the server's `DELETE_ASK` and the final answer.
    ///
    /// # Errors
    /// - `FileNotFound` / `DeleteFileError` as typed application
    ///   outcomes (session survives)
    /// - session-fatal kinds on record/transport failures
    pub fn delete(
        &mut self,
        filename: &Name,
        confirm: impl FnOnce() -> bool,
    ) -> Result<DeleteOutcome> {
        self.send_message(&encode(&DeleteM1 {
            filename: filename.clone(),
        }))?;

        let ask = self.receive_simple()?;
        if ask.code != MessageCode::DeleteAsk {
            return Err(
                CoreError::wrong_message_code("DeleteAsk", ask.code.as_byte()).into(),
            );
        }

        if !confirm() {
            self.send_simple(MessageCode::NoDeleteConfirm)?;
            return Ok(DeleteOutcome::Declined);
        }
        self.send_simple(MessageCode::DeleteConfirm)?;

        let reply = self.receive_simple()?;
        match reply.code {
            MessageCode::Ack => Ok(DeleteOutcome::Deleted),
            MessageCode::FilenameNotFound => Err(ClientError::FileNotFound),
            MessageCode::DeleteFileError => Err(ClientError::DeleteFileError),
            other => Err(CoreError::wrong_message_code(
                "Ack, FilenameNotFound or DeleteFileError",
                other.as_byte(),
            )
            .into()),
        }
    }

    // ========================================
    // Logout
    // ========================================

    /// Logs out and closes the connection. The session key is zeroized
    /// when the session drops.
    ///
    /// # Errors
    /// Session-fatal kinds; either way the connection is closed.
    pub fn logout(mut self) -> Result<()> {
        self.send_simple(MessageCode::LogoutRequest)?;
        let reply = self.receive_simple()?;
        if reply.code != MessageCode::Ack {
            return Err(CoreError::wrong_message_code("Ack", reply.code.as_byte()).into());
        }
        info!(user = %self.username, "logged out");
        self.conn.close();
        Ok(())
    }

    // ========================================
    // Progress output
    // ========================================

    fn show_progress(&self, verb: &str, done: u64, total: u64) {
        if !self.interactive {
            return;
        }
        let percent = done * 100 / total.max(1);
        print!("\r{verb}: {percent}% complete");
        let _ = std::io::stdout().flush();
    }

    fn finish_progress(&self) {
        if self.interactive {
            println!();
        }
    }
}

impl std::fmt::Debug for ClientSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSession")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}
