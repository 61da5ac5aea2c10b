//! Nether Streamdump - inspect stream-directory files
//!
//! # Commands
//!
//! - `nether-streamdump entries` - Print the raw directory header
//! - `nether-streamdump dump` - Decode every stream and print JSON
//! - `nether-streamdump canonicalize` - Decode and re-encode to canonical bytes
//!
//! # Usage
//!
//! ```bash
//! # Minidump-style layout (default)
//! nether-streamdump dump crash.dmp --resolve
//!
//! # Custom layout file
//! nether-streamdump dump data.bin --layout layout.toml
//!
//! # Rewrite with recomputed counts, sizes and offsets
//! nether-streamdump canonicalize data.bin -o data.canonical.bin
//! ```
//!
//! Logging goes to stderr through `RUST_LOG` (default `info`).

mod canonicalize;
mod dump;
mod entries;
mod input;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Nether Streamdump - inspect stream-directory files
#[derive(Parser)]
#[command(name = "nether-streamdump")]
#[command(about = "Dump and canonicalize stream-directory files")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the raw directory header entries
    Entries(entries::EntriesArgs),

    /// Decode every stream and print it as JSON
    Dump(dump::DumpArgs),

    /// Decode then re-encode with recomputed counts, sizes and offsets
    Canonicalize(canonicalize::CanonicalizeArgs),
}

fn main() -> Result<()> {
    // Initialize logging; stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Entries(args) => entries::execute(args),
        Commands::Dump(args) => dump::execute(args),
        Commands::Canonicalize(args) => canonicalize::execute(args),
    }
}
