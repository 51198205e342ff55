// ============================================
// File: crates/cirrus-server/src/main.rs
// ============================================
//! # Cirrus Server Entry Point
//!
//! ## Usage
//! ```bash
//! # Start with the conventional resource layout
//! cirrus-server start
//!
//! # Start with an explicit config file
//! cirrus-server start --config /etc/cirrus/server.toml
//!
//! # Check a config file without starting
//! cirrus-server validate --config /etc/cirrus/server.toml
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cirrus_server::{Server, ServerConfig};

// ============================================
// CLI Definition
// ============================================

/// Cirrus secure cloud storage server.
#[derive(Parser, Debug)]
#[command(name = "cirrus-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server.
    Start {
        /// Path to the configuration file.
        #[arg(short, long, default_value = "server.toml")]
        config: PathBuf,
    },

    /// Validate the configuration file and exit.
    Validate {
        /// Path to the configuration file.
        #[arg(short, long, default_value = "server.toml")]
        config: PathBuf,
    },
}

// ============================================
// Main
// ============================================

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config } => {
            let config = load_config(&config)?;
            init_logging(&config.logging.level);
            let server = Server::new(config)?;
            server.run()?;
        }
        Commands::Validate { config } => {
            let config = ServerConfig::load(&config)?;
            println!("configuration is valid");
            println!("  listen:          {}", config.network.listen_addr);
            println!("  data dir:        {}", config.storage.data_dir.display());
            println!(
                "  private key:     {}",
                config.resources.private_key.display()
            );
            println!(
                "  certificate:     {}",
                config.resources.certificate.display()
            );
            println!(
                "  public keys dir: {}",
                config.resources.public_keys_dir.display()
            );
        }
    }
    Ok(())
}

/// Loads the config file, falling back to defaults when it is absent.
fn load_config(path: &PathBuf) -> anyhow::Result<ServerConfig> {
    if path.exists() {
        Ok(ServerConfig::load(path)?)
    } else {
        eprintln!(
            "config file {} not found, using defaults",
            path.display()
        );
        Ok(ServerConfig::default())
    }
}

/// Initializes the tracing subscriber.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}
