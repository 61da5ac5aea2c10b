//! Input file and layout loading shared by all commands

use anyhow::{Context, Result};
use nether_stream::{DirectoryLayout, LayoutConfig, presets};
use std::path::Path;

/// Read the whole input file
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    tracing::info!("Loaded {} ({} bytes)", path.display(), data.len());
    Ok(data)
}

/// Load a layout file, or fall back to the minidump presets
pub fn load_layout(path: Option<&Path>) -> Result<DirectoryLayout> {
    match path {
        Some(path) => {
            let config = LayoutConfig::load(path)?;
            let layout = config
                .build()
                .with_context(|| format!("Invalid layout in {}", path.display()))?;
            tracing::info!("Using layout {} ({} streams)", path.display(), layout.len());
            Ok(layout)
        }
        None => {
            tracing::info!("Using built-in minidump layout");
            presets::minidump_layout().context("Failed to build minidump layout")
        }
    }
}
