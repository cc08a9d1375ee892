use crate::config::WRITE_BUFFER_SIZE;
use crate::models::ContentRecord;
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Nothing to write; no file was created.
    Empty,
    Written { records: usize },
}

/// Writes the records as a pretty-printed JSON array (2-space indent,
/// non-ASCII kept as-is), replacing any existing file at `path`.
///
/// The JSON goes to a temporary sibling that is renamed over `path`, so a
/// failed write never leaves a truncated output behind.
pub fn write_json(records: &[ContentRecord], path: &Path) -> Result<WriteOutcome> {
    if records.is_empty() {
        info!("No content found for processing, no output file written");
        return Ok(WriteOutcome::Empty);
    }

    info!(path = %path.display(), records = records.len(), "Saving content records");

    let tmp = temp_path(path);
    let result = write_pretty(records, &tmp).and_then(|()| {
        fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move output into place: {}", path.display()))
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result?;

    info!(path = %path.display(), "JSON file saved");
    Ok(WriteOutcome::Written {
        records: records.len(),
    })
}

fn write_pretty(records: &[ContentRecord], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

    serde_json::to_writer_pretty(&mut writer, records)
        .context("Failed to serialize content records")?;
    writer
        .flush()
        .with_context(|| format!("Failed to write output file: {}", path.display()))?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
