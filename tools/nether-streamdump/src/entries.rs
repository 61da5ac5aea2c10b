//! Entries command - print the raw directory header

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::input::read_input;

/// Arguments for the entries command
#[derive(Args)]
pub struct EntriesArgs {
    /// Input file
    pub file: PathBuf,
}

/// Execute the entries command
pub fn execute(args: EntriesArgs) -> Result<()> {
    let data = read_input(&args.file)?;
    let entries = nether_stream::read_header(&data).context("Failed to read directory header")?;

    println!("{} stream(s)", entries.len());
    for entry in &entries {
        println!(
            "  tag {:>5}  offset 0x{:08X}  size {:>8}",
            entry.tag,
            entry.range.start,
            entry.range.len()
        );
    }
    Ok(())
}
