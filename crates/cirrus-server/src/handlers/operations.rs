// ============================================
// File: crates/cirrus-server/src/handlers/operations.rs
// ============================================
//! # Per-Connection Worker
//!
//! ## Creation Reason
//! Implements the server side of the operation state machines: one
//! worker owns one authenticated connection and steps through requests
//! strictly sequentially; exactly one operation is ever in flight.
//!
//! ## Dispatch
//! Every request arrives as a 71-byte plaintext inside an envelope; the
//! first byte selects the operation:
//! list, download, upload, rename, delete, logout.
//!
//! ## Failure Semantics
//! - Record-layer errors (`Decryption`, `WrongCounter`), transport
//!   breaks and unexpected codes are session-fatal: the worker logs and
//!   returns, dropping the session (key zeroized on drop).
//! - Application errors (file not found, name collision, declined
//!   delete) become typed reply codes; the session stays established.
//! - A session-fatal error in the middle of an upload removes the
//!   partially written file.
//!
//! ## Rekey
//! After every sealed or opened record the worker checks the counter;
//! at the `MAX_COUNTER` boundary it re-runs the handshake in lockstep
//! with the client and carries on with the fresh session.

use std::sync::Arc;

use tracing::{debug, info, warn};

use cirrus_common::Name;
use cirrus_core::protocol::codec::{decode, encode};
use cirrus_core::protocol::envelope::Envelope;
use cirrus_core::protocol::messages::SIMPLE_MESSAGE_SIZE;
use cirrus_core::protocol::{
    ChunkMessage, ChunkPlan, DeleteM1, DownloadM1, DownloadM2, ListM2, ListM3, MessageCode,
    RenameM1, SimpleMessage, UploadM1, MAX_FILE_SIZE, MAX_PACKET_SIZE,
};
use cirrus_core::{CoreError, Session};
use cirrus_transport::Connection;

use crate::error::{Result, ServerError};
use crate::services::storage::{FileWriter, StorageError};
use crate::services::{HandshakeService, Storage};

// ============================================
// ConnectionHandler
// ============================================

/// Worker state for one authenticated client connection.
pub struct ConnectionHandler {
    conn: Connection,
    session: Session,
    username: Name,
    storage: Arc<Storage>,
    handshake: Arc<HandshakeService>,
}

impl ConnectionHandler {
    /// Wraps an established session.
    #[must_use]
    pub fn new(
        conn: Connection,
        session: Session,
        username: Name,
        storage: Arc<Storage>,
        handshake: Arc<HandshakeService>,
    ) -> Self {
        Self {
            conn,
            session,
            username,
            storage,
            handshake,
        }
    }

    /// Runs the request loop until logout, disconnect or a session-fatal
    /// error. Consumes the handler; the session key is zeroized when the
    /// session drops.
    pub fn run(mut self) {
        loop {
            let plaintext = match self.receive_message(MAX_PACKET_SIZE) {
                Ok(p) => p,
                Err(ServerError::Transport(e)) if e.is_closed() => {
                    info!(user = %self.username, "connection closed by client");
                    return;
                }
                Err(e) => {
                    self.log_fatal("request", &e);
                    return;
                }
            };

            let code = match MessageCode::from_byte(plaintext[0]) {
                Some(code) if code.is_request() => code,
                _ => {
                    warn!(user = %self.username, byte = plaintext[0], "invalid request code");
                    return;
                }
            };

            debug!(user = %self.username, ?code, "request received");
            let result = match code {
                MessageCode::ListRequest => self.handle_list(),
                MessageCode::DownloadRequest => self.handle_download(&plaintext),
                MessageCode::UploadRequest => self.handle_upload(&plaintext),
                MessageCode::RenameRequest => self.handle_rename(&plaintext),
                MessageCode::DeleteRequest => self.handle_delete(&plaintext),
                MessageCode::LogoutRequest => {
                    if let Err(e) = self.handle_logout() {
                        self.log_fatal("logout", &e);
                    }
                    return;
                }
                _ => unreachable!("is_request() admits only operation codes"),
            };

            match result {
                Ok(()) => debug!(user = %self.username, ?code, "request finished"),
                Err(e) => {
                    self.log_fatal("operation", &e);
                    return;
                }
            }
        }
    }

    fn log_fatal(&self, stage: &str, error: &ServerError) {
        if error.is_suspicious() {
            warn!(user = %self.username, stage, error = %error, "session torn down");
        } else {
            info!(user = %self.username, stage, error = %error, "session ended");
        }
    }

    // ========================================
    // Record helpers
    // ========================================

    /// Seals and sends one message, then rekeys if the counter just hit
    /// its boundary.
    fn send_message(&mut self, plaintext: &[u8]) -> Result<()> {
        let record = self.session.seal(plaintext)?;
        self.conn.send(&record)?;
        self.rekey_if_needed()
    }

    /// Receives and opens one message of known plaintext length, then
    /// rekeys if the counter just hit its boundary.
    fn receive_message(&mut self, plaintext_len: usize) -> Result<Vec<u8>> {
        let record = self.conn.receive(Envelope::wire_size(plaintext_len))?;
        let plaintext = self.session.open(&record, plaintext_len)?;
        self.rekey_if_needed()?;
        Ok(plaintext)
    }

    /// Re-runs the handshake when the session counter is exhausted. Both
    /// peers reach this on the same message boundary, so the client is
    /// sending M1 exactly when this side starts waiting for it.
    fn rekey_if_needed(&mut self) -> Result<()> {
        if !self.session.needs_rekey() {
            return Ok(());
        }
        info!(user = %self.username, "session counter exhausted, re-running handshake");
        let (session, username) = self.handshake.authenticate(&mut self.conn)?;
        if username != self.username {
            warn!(user = %self.username, claimed = %username, "rekey changed identity");
            return Err(CoreError::AuthenticationFailure.into());
        }
        self.session = session;
        Ok(())
    }

    fn send_simple(&mut self, code: MessageCode) -> Result<()> {
        self.send_message(&encode(&SimpleMessage::new(code)))
    }

    // ========================================
    // List
    // ========================================

    fn handle_list(&mut self) -> Result<()> {
        let file_list = self.storage.list_files(&self.username)?;
        let list_size = file_list.len() as u32;

        self.send_message(&encode(&ListM2 { list_size }))?;

        if list_size == 0 {
            debug!(user = %self.username, "no files to list");
            return Ok(());
        }
        self.send_message(&encode(&ListM3 { file_list }))
    }

    // ========================================
    // Download
    // ========================================

    fn handle_download(&mut self, plaintext: &[u8]) -> Result<()> {
        let request: DownloadM1 = decode(plaintext)?;

        let mut reader = match self.storage.open_for_read(&self.username, &request.filename) {
            Ok(reader) => reader,
            Err(StorageError::NotFound) => {
                info!(user = %self.username, file = %request.filename, "download: file not found");
                return self.send_message(&encode(&DownloadM2 {
                    code: MessageCode::FileNotFound,
                    file_size: 0,
                }));
            }
            Err(e) => return Err(e.into()),
        };

        let file_size = reader.size();
        self.send_message(&encode(&DownloadM2 {
            code: MessageCode::DownloadAck,
            file_size,
        }))?;

        let plan = reader.chunk_plan();
        for index in 0..plan.chunk_count() {
            let chunk = reader.read_chunk(plan.chunk_len(index))?;
            self.send_message(&encode(&ChunkMessage {
                code: MessageCode::DownloadChunk,
                chunk,
            }))?;
        }
        info!(user = %self.username, file = %request.filename, bytes = file_size, "download complete");
        Ok(())
    }

    // ========================================
    // Upload
    // ========================================

    fn handle_upload(&mut self, plaintext: &[u8]) -> Result<()> {
        let request: UploadM1 = decode(plaintext)?;

        if request.file_size > MAX_FILE_SIZE {
            info!(
                user = %self.username,
                file = %request.filename,
                size = request.file_size,
                "upload refused: declared size over limit"
            );
            return self.send_simple(MessageCode::Nack);
        }
        let writer = match self.storage.create_for_write(&self.username, &request.filename) {
            Ok(writer) => writer,
            Err(StorageError::AlreadyExists) => {
                info!(user = %self.username, file = %request.filename, "upload refused: name taken");
                return self.send_simple(MessageCode::Nack);
            }
            Err(e) => return Err(e.into()),
        };
        self.send_simple(MessageCode::Ack)?;

        // From here on a fatal error leaves a partial file behind;
        // remove it before propagating.
        let mut writer = Some(writer);
        match self.receive_upload_chunks(&request, &mut writer) {
            Ok(()) => {
                info!(
                    user = %self.username,
                    file = %request.filename,
                    bytes = request.file_size,
                    "upload complete"
                );
                self.send_simple(MessageCode::Ack)
            }
            Err(e) => {
                match writer.take() {
                    Some(writer) => writer.discard(),
                    // finish() already consumed the writer; the file
                    // exists under its final name, delete it directly.
                    None => {
                        let _ = self.storage.delete(&self.username, &request.filename);
                    }
                }
                Err(e)
            }
        }
    }

    fn receive_upload_chunks(
        &mut self,
        request: &UploadM1,
        writer: &mut Option<FileWriter>,
    ) -> Result<()> {
        let plan = ChunkPlan::new(request.file_size);
        let mut received: u64 = 0;
        let mut last_logged_decile = 0;

        for index in 0..plan.chunk_count() {
            let chunk_len = plan.chunk_len(index);
            let plaintext = self.receive_message(1 + chunk_len)?;
            let message: ChunkMessage = decode(&plaintext)?;
            if message.code != MessageCode::UploadChunk {
                return Err(CoreError::wrong_message_code(
                    "UploadChunk",
                    message.code.as_byte(),
                )
                .into());
            }
            writer
                .as_mut()
                .expect("writer present while chunks stream")
                .write_chunk(&message.chunk)?;

            received += message.chunk.len() as u64;
            let decile = (received * 10 / request.file_size.max(1)) as u32;
            if decile > last_logged_decile {
                last_logged_decile = decile;
                debug!(
                    user = %self.username,
                    file = %request.filename,
                    percent = decile * 10,
                    "upload progress"
                );
            }
        }

        writer
            .take()
            .expect("writer present until finish")
            .finish()?;
        Ok(())
    }

    // ========================================
    // Rename
    // ========================================

    fn handle_rename(&mut self, plaintext: &[u8]) -> Result<()> {
        let request: RenameM1 = decode(plaintext)?;

        let code = match self
            .storage
            .rename(&self.username, &request.old_name, &request.new_name)
        {
            Ok(()) => MessageCode::Ack,
            Err(StorageError::NotFound) => MessageCode::FileNotFound,
            Err(StorageError::AlreadyExists) => MessageCode::FilenameAlreadyExists,
            Err(StorageError::Io(e)) => {
                warn!(user = %self.username, error = %e, "rename failed");
                MessageCode::Nack
            }
        };
        info!(
            user = %self.username,
            old = %request.old_name,
            new = %request.new_name,
            ?code,
            "rename handled"
        );
        self.send_simple(code)
    }

    // ========================================
    // Delete
    // ========================================

    fn handle_delete(&mut self, plaintext: &[u8]) -> Result<()> {
        let request: DeleteM1 = decode(plaintext)?;

        self.send_simple(MessageCode::DeleteAsk)?;

        let reply = self.receive_message(SIMPLE_MESSAGE_SIZE)?;
        let confirmation: SimpleMessage = decode(&reply)?;
        match confirmation.code {
            MessageCode::DeleteConfirm => {}
            MessageCode::NoDeleteConfirm => {
                info!(user = %self.username, file = %request.filename, "delete declined");
                return Ok(());
            }
            other => {
                return Err(CoreError::wrong_message_code(
                    "DeleteConfirm or NoDeleteConfirm",
                    other.as_byte(),
                )
                .into());
            }
        }

        let code = match self.storage.delete(&self.username, &request.filename) {
            Ok(()) => MessageCode::Ack,
            Err(StorageError::NotFound) => MessageCode::FilenameNotFound,
            Err(e) => {
                warn!(user = %self.username, file = %request.filename, error = %e, "delete failed");
                MessageCode::DeleteFileError
            }
        };
        info!(user = %self.username, file = %request.filename, ?code, "delete handled");
        self.send_simple(code)
    }

    // ========================================
    // Logout
    // ========================================

    fn handle_logout(&mut self) -> Result<()> {
        self.send_simple(MessageCode::Ack)?;
        info!(user = %self.username, "logout");
        self.conn.close();
        Ok(())
    }
}
