//! Canonicalize command - decode then re-encode a directory file

use anyhow::{Context, Result};
use clap::Args;
use nether_stream::StreamDirectory;
use std::path::PathBuf;

use crate::input::{load_layout, read_input};

/// Arguments for the canonicalize command
#[derive(Args)]
pub struct CanonicalizeArgs {
    /// Input file
    pub file: PathBuf,

    /// Output file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Layout file (defaults to the minidump layout)
    #[arg(short, long)]
    pub layout: Option<PathBuf>,
}

/// Execute the canonicalize command
pub fn execute(args: CanonicalizeArgs) -> Result<()> {
    let data = read_input(&args.file)?;
    let layout = load_layout(args.layout.as_deref())?;

    let directory = StreamDirectory::new(&data, layout);
    let structure = directory
        .decode_all()
        .with_context(|| format!("Failed to decode {}", args.file.display()))?;
    let canonical = StreamDirectory::encode(&structure, directory.layout())
        .context("Failed to encode canonical output")?;

    std::fs::write(&args.output, &canonical)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    if canonical.len() != data.len() {
        tracing::warn!(
            "Output is {} bytes, input was {}; data outside stream bodies is dropped",
            canonical.len(),
            data.len()
        );
    }
    println!(
        "Wrote {} stream(s) to {} ({} bytes)",
        structure.len(),
        args.output.display(),
        canonical.len()
    );
    Ok(())
}
