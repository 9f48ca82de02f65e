//! Recording export
//!
//! A finished recording is written as a pretty-printed JSON array (the same
//! shape [`FrameSequence::load`] reads back), named with the configured
//! prefix and an ISO-8601 UTC timestamp.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ExportConfig;
use crate::error::Result;
use crate::landmarks::FrameSequence;

/// File name for an export made at `at`, e.g.
/// `landmark-data-20261015T093012.250Z.json`
pub fn export_file_name(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{}-{}.json", prefix, at.format("%Y%m%dT%H%M%S%.3fZ"))
}

/// Write `sequence` to `path`, replacing any existing file
pub async fn write_sequence(path: &Path, sequence: &FrameSequence) -> Result<()> {
    let json = sequence.to_json_pretty()?;
    tokio::fs::write(path, json).await?;
    Ok(())
}

/// Export `sequence` into the configured directory; returns the written path
pub async fn export_sequence(sequence: &FrameSequence, config: &ExportConfig) -> Result<PathBuf> {
    tokio::fs::create_dir_all(&config.directory).await?;
    let path = config
        .directory
        .join(export_file_name(&config.file_prefix, Utc::now()));

    write_sequence(&path, sequence).await?;
    info!("Exported {} frames to {}", sequence.len(), path.display());
    Ok(path)
}
