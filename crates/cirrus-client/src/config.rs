// ============================================
// File: crates/cirrus-client/src/config.rs
// ============================================
//! # Client Configuration
//!
//! ## Example Configuration
//! ```toml
//! [network]
//! server_addr = "127.0.0.1:5000"
//!
//! [resources]
//! ca_certificate = "resources/certificates/CA_cert.pem"
//! private_keys_dir = "resources/encrypted_private_keys"
//!
//! [storage]
//! downloads_dir = "downloads"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! The private keys directory holds one password-encrypted PKCS#8 PEM
//! per user, named `<username>_key.pem`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

// ============================================
// ClientConfig
// ============================================

/// Main client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Network configuration.
    #[serde(default)]
    pub network: NetworkConfig,

    /// Credential material paths.
    #[serde(default)]
    pub resources: ResourcesConfig,

    /// Local storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns `ConfigLoad` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::config_load(&path_str, e.to_string()))?;
        toml::from_str(&content).map_err(|e| ClientError::config_load(&path_str, e.to_string()))
    }

    /// Path of a user's encrypted private key file.
    #[must_use]
    pub fn private_key_path(&self, username: &str) -> PathBuf {
        self.resources
            .private_keys_dir
            .join(format!("{username}_key.pem"))
    }
}

/// Network configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Address of the Cirrus server.
    #[serde(default = "default_server_addr")]
    pub server_addr: String,
}

fn default_server_addr() -> String {
    "127.0.0.1:5000".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_addr: default_server_addr(),
        }
    }
}

/// Credential material paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcesConfig {
    /// Trusted CA certificate for server authentication (PEM).
    #[serde(default = "default_ca_certificate")]
    pub ca_certificate: PathBuf,

    /// Directory of password-encrypted per-user private keys.
    #[serde(default = "default_private_keys_dir")]
    pub private_keys_dir: PathBuf,
}

fn default_ca_certificate() -> PathBuf {
    PathBuf::from("resources/certificates/CA_cert.pem")
}

fn default_private_keys_dir() -> PathBuf {
    PathBuf::from("resources/encrypted_private_keys")
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            ca_certificate: default_ca_certificate(),
            private_keys_dir: default_private_keys_dir(),
        }
    }
}

/// Local storage configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory downloaded files are written into.
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            downloads_dir: default_downloads_dir(),
        }
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.network.server_addr, "127.0.0.1:5000");
        assert_eq!(
            config.private_key_path("alice"),
            PathBuf::from("resources/encrypted_private_keys/alice_key.pem")
        );
    }

    #[test]
    fn parses_partial_toml() {
        let config: ClientConfig =
            toml::from_str("[network]\nserver_addr = \"10.0.0.1:9000\"\n").unwrap();
        assert_eq!(config.network.server_addr, "10.0.0.1:9000");
        assert_eq!(config.storage.downloads_dir, PathBuf::from("downloads"));
    }
}
