// ============================================
// File: crates/cirrus-server/src/server.rs
// ============================================
//! # Server Orchestrator
//!
//! ## Creation Reason
//! Wires configuration, credential material, storage and the listener
//! together, and runs the accept loop: one OS thread per accepted
//! connection, blocking I/O throughout, no event loop.
//!
//! ## Lifecycle
//! 1. `Server::new(config)` loads keys, certificate and storage root
//! 2. `server.run()` binds and accepts until the process is terminated
//! 3. each worker authenticates its client, then serves requests until
//!    logout, disconnect or a session-fatal error
//!
//! Workers are detached: they own their connection and session outright
//! and share only the read-only services and the filesystem.

use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

use tracing::{error, info, warn};

use cirrus_core::CoreError;
use cirrus_transport::Connection;

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::handlers::ConnectionHandler;
use crate::services::{HandshakeService, Storage};

/// The Cirrus storage server.
pub struct Server {
    config: ServerConfig,
    handshake: Arc<HandshakeService>,
    storage: Arc<Storage>,
}

impl Server {
    /// Creates a server, loading credential material and preparing the
    /// storage root.
    ///
    /// # Errors
    /// Returns `Resource` or `Storage` errors when startup material is
    /// missing or unreadable.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let handshake = Arc::new(HandshakeService::from_resources(&config.resources)?);
        let storage = Arc::new(Storage::new(config.storage.data_dir.clone())?);
        Ok(Self {
            config,
            handshake,
            storage,
        })
    }

    /// Binds the listener and serves connections until the process ends.
    ///
    /// # Errors
    /// Returns `Listener` if binding fails; individual accept errors are
    /// logged and do not stop the loop.
    pub fn run(&self) -> Result<()> {
        let listener =
            TcpListener::bind(self.config.network.listen_addr).map_err(ServerError::Listener)?;
        self.serve(listener)
    }

    /// Serves connections on an already-bound listener (lets tests bind
    /// an ephemeral port first).
    ///
    /// # Errors
    /// Never returns on the happy path; listener-level failures are
    /// logged and skipped.
    pub fn serve(&self, listener: TcpListener) -> Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "server listening");
        }

        for incoming in listener.incoming() {
            let stream = match incoming {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };

            let peer = stream
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|_| "unknown".to_string());
            info!(peer = %peer, "connection accepted");

            let handshake = Arc::clone(&self.handshake);
            let storage = Arc::clone(&self.storage);
            let spawn_result = thread::Builder::new()
                .name(format!("worker-{peer}"))
                .spawn(move || serve_connection(stream, handshake, storage));
            if let Err(e) = spawn_result {
                error!(peer = %peer, error = %e, "failed to spawn worker thread");
            }
        }
        Ok(())
    }
}

/// Per-connection worker entry: handshake, then the request loop.
fn serve_connection(
    stream: std::net::TcpStream,
    handshake: Arc<HandshakeService>,
    storage: Arc<Storage>,
) {
    let mut conn = Connection::from_stream(stream);

    let (session, username) = match handshake.authenticate(&mut conn) {
        Ok(established) => established,
        Err(ServerError::Core(CoreError::UsernameNotFound)) => return,
        Err(e) => {
            warn!(error = %e, "handshake failed");
            return;
        }
    };

    if let Err(e) = storage.ensure_user_dir(&username) {
        error!(user = %username, error = %e, "cannot prepare user directory");
        return;
    }

    ConnectionHandler::new(conn, session, username, storage, handshake).run();
}
