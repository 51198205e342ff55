// ============================================
// File: crates/cirrus-client/src/main.rs
// ============================================
//! # Cirrus Client Entry Point
//!
//! ## Usage
//! ```bash
//! # Connect with the conventional resource layout
//! cirrus-client
//!
//! # Explicit config file and server override
//! cirrus-client --config client.toml --server 10.0.0.5:5000
//! ```
//!
//! The client prompts for username and password (the password decrypts
//! the local private key), authenticates, then offers the operations
//! menu until logout.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use zeroize::Zeroize;

use cirrus_client::session::DeleteOutcome;
use cirrus_client::{ClientConfig, ClientError, ClientSession};
use cirrus_common::types::is_valid_name;
use cirrus_common::Name;
use cirrus_core::crypto::{IdentityKeyPair, TrustStore};

// ============================================
// CLI Definition
// ============================================

/// Cirrus secure cloud storage client.
#[derive(Parser, Debug)]
#[command(name = "cirrus-client")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "client.toml")]
    config: PathBuf,

    /// Server address override (host:port).
    #[arg(short, long)]
    server: Option<String>,
}

// ============================================
// Main
// ============================================

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        ClientConfig::load(&cli.config)?
    } else {
        ClientConfig::default()
    };
    init_logging(&config.logging.level);

    let server_addr = cli
        .server
        .unwrap_or_else(|| config.network.server_addr.clone());

    // Login: both inputs pass the same whitelist as wire names.
    let username = prompt("Username: ")?;
    let mut password = prompt("Password: ")?;
    if !is_valid_name(&username) || !is_valid_name(&password) {
        password.zeroize();
        eprintln!("invalid username or password");
        std::process::exit(1);
    }
    let username = Name::new(username).expect("validated above");

    // The password decrypts the local key; a wrong username and a wrong
    // password are indistinguishable on purpose.
    let key_path = config.private_key_path(username.as_str());
    let identity = load_identity(&key_path, password.as_bytes());
    password.zeroize();
    let identity = match identity {
        Ok(identity) => identity,
        Err(_) => {
            eprintln!("wrong username or password");
            std::process::exit(1);
        }
    };

    let ca_pem = std::fs::read_to_string(&config.resources.ca_certificate).map_err(|e| {
        anyhow::anyhow!(
            "cannot read CA certificate {}: {e}",
            config.resources.ca_certificate.display()
        )
    })?;
    let trust = TrustStore::from_ca_pem(&ca_pem)?;

    let mut session = match ClientSession::connect(&server_addr, username.clone(), identity, trust)
    {
        Ok(session) => session,
        Err(e) => {
            eprintln!("authentication failed with error code {}", e.code());
            std::process::exit(1);
        }
    };
    session.set_interactive(true);
    println!("Authenticated as {username}");

    // Operations menu, until logout or a session-fatal error.
    loop {
        show_menu(&username);
        let choice = prompt("Insert operation code: ")?;

        if choice.trim() == "6" {
            return match session.logout() {
                Ok(()) => {
                    println!("Logged out.");
                    Ok(())
                }
                Err(e) => {
                    println!("Operation failed with error code {}", e.code());
                    if e.is_session_fatal() {
                        eprintln!("session terminated: {e}");
                        std::process::exit(1);
                    }
                    Ok(())
                }
            };
        }

        let result = match choice.trim() {
            "1" => run_list(&mut session),
            "2" => run_download(&mut session, &config),
            "3" => run_upload(&mut session),
            "4" => run_rename(&mut session),
            "5" => run_delete(&mut session),
            _ => {
                println!("Unknown operation code\n");
                continue;
            }
        };

        if let Err(e) = result {
            println!("Operation failed with error code {}", e.code());
            if e.is_session_fatal() {
                eprintln!("session terminated: {e}");
                std::process::exit(1);
            }
        }
        println!();
    }
}

// ============================================
// Operations
// ============================================

fn run_list(session: &mut ClientSession) -> Result<(), ClientError> {
    let files = session.list()?;
    if files.is_empty() {
        println!("There are no files in your storage.");
        return Ok(());
    }
    println!("----------- LIST -------------");
    for file in files {
        println!("{file}");
    }
    println!("------------------------------");
    Ok(())
}

fn run_download(session: &mut ClientSession, config: &ClientConfig) -> Result<(), ClientError> {
    let name = prompt_name("Filename to download: ")?;
    let bytes = session.download(&name, &config.storage.downloads_dir)?;
    println!(
        "Downloaded {name} ({bytes} bytes) into {}",
        config.storage.downloads_dir.display()
    );
    Ok(())
}

fn run_upload(session: &mut ClientSession) -> Result<(), ClientError> {
    let path = prompt("Path of the file to upload: ")
        .map_err(|e| ClientError::local_file(e.to_string()))?;
    let path = PathBuf::from(path.trim());
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ClientError::local_file("path has no usable file name"))?;
    let remote_name = Name::new(file_name)?;

    let bytes = session.upload(&path, &remote_name)?;
    println!("Uploaded {remote_name} ({bytes} bytes)");
    Ok(())
}

fn run_rename(session: &mut ClientSession) -> Result<(), ClientError> {
    let old_name = prompt_name("Current filename: ")?;
    let new_name = prompt_name("New filename: ")?;
    session.rename(&old_name, &new_name)?;
    println!("Renamed {old_name} to {new_name}");
    Ok(())
}

fn run_delete(session: &mut ClientSession) -> Result<(), ClientError> {
    let name = prompt_name("Filename to delete: ")?;
    let outcome = session.delete(&name, || {
        matches!(
            prompt("Really delete? [y/N]: ").as_deref(),
            Ok("y") | Ok("Y") | Ok("yes")
        )
    })?;
    match outcome {
        DeleteOutcome::Deleted => println!("Deleted {name}"),
        DeleteOutcome::Declined => println!("Delete cancelled"),
    }
    Ok(())
}

// ============================================
// Helpers
// ============================================

fn show_menu(username: &Name) {
    println!("**MENU** (user: {username})");
    println!("* 1. list files");
    println!("* 2. download file");
    println!("* 3. upload file");
    println!("* 4. rename file");
    println!("* 5. delete file");
    println!("* 6. logout");
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn prompt_name(label: &str) -> Result<Name, ClientError> {
    let value = prompt(label).map_err(|e| ClientError::local_file(e.to_string()))?;
    Ok(Name::new(value)?)
}

fn load_identity(path: &PathBuf, password: &[u8]) -> Result<IdentityKeyPair, ClientError> {
    let pem = std::fs::read_to_string(path)
        .map_err(|e| ClientError::resource(path.display().to_string(), e.to_string()))?;
    IdentityKeyPair::from_pkcs8_encrypted_pem(&pem, password)
        .map_err(|e| ClientError::resource(path.display().to_string(), e.to_string()))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .ok();
}
