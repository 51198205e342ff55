// ============================================
// File: crates/cirrus-server/src/config.rs
// ============================================
//! # Server Configuration
//!
//! ## Creation Reason
//! Provides configuration management for the Cirrus server from a TOML
//! file with defaults, so a bare `cirrus-server start` works against the
//! conventional resource layout.
//!
//! ## Configuration Sections
//! - `network`: TCP listen address, accept backlog
//! - `storage`: root of the per-user data directories
//! - `resources`: server private key, certificate, per-user public keys
//! - `logging`: log level
//!
//! ## Example Configuration
//! ```toml
//! [network]
//! listen_addr = "0.0.0.0:5000"
//!
//! [storage]
//! data_dir = "data"
//!
//! [resources]
//! private_key = "resources/private_keys/Server_key.pem"
//! certificate = "resources/certificates/Server_cert.pem"
//! public_keys_dir = "resources/public_keys"
//!
//! [logging]
//! level = "info"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ServerError};

// ============================================
// ServerConfig
// ============================================

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Credential material paths.
    #[serde(default)]
    pub resources: ResourcesConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigLoad` if the file cannot be read or parsed, or
    /// `ConfigInvalid` if a value fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        let content = std::fs::read_to_string(path)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| ServerError::config_load(&path_str, e.to_string()))?;

        config.validate()?;
        info!(path = %path_str, "configuration loaded");
        Ok(config)
    }

    /// Parses configuration from a TOML string (useful for tests).
    ///
    /// # Errors
    /// Returns `ConfigLoad`/`ConfigInvalid` as [`ServerConfig::load`].
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServerError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns `ConfigInvalid` naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        self.network.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

// ============================================
// NetworkConfig
// ============================================

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// TCP listen address.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

fn default_listen_addr() -> SocketAddr {
    "0.0.0.0:5000".parse().expect("static address parses")
}

impl NetworkConfig {
    fn validate(&self) -> Result<()> {
        if self.listen_addr.port() == 0 {
            return Err(ServerError::config_invalid(
                "network.listen_addr",
                "port cannot be 0",
            ));
        }
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

// ============================================
// StorageConfig
// ============================================

/// Storage configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding one subdirectory per user.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ServerError::config_invalid(
                "storage.data_dir",
                "cannot be empty",
            ));
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

// ============================================
// ResourcesConfig
// ============================================

/// Credential material paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Server long-term RSA private key (PKCS#8 PEM).
    #[serde(default = "default_private_key")]
    pub private_key: PathBuf,

    /// Server X.509 certificate (PEM) sent during the handshake.
    #[serde(default = "default_certificate")]
    pub certificate: PathBuf,

    /// Directory of `<username>_key.pem` public keys for registered
    /// users.
    #[serde(default = "default_public_keys_dir")]
    pub public_keys_dir: PathBuf,
}

fn default_private_key() -> PathBuf {
    PathBuf::from("resources/private_keys/Server_key.pem")
}

fn default_certificate() -> PathBuf {
    PathBuf::from("resources/certificates/Server_cert.pem")
}

fn default_public_keys_dir() -> PathBuf {
    PathBuf::from("resources/public_keys")
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            private_key: default_private_key(),
            certificate: default_certificate(),
            public_keys_dir: default_public_keys_dir(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================
