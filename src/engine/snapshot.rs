//! Raw HTML snapshot persistence

use std::fs;
use std::path::{Path, PathBuf};

/// Writes the raw HTML of a detail page, keyed by its content hash
///
/// Re-saving the same content overwrites the identical file, so snapshots
/// are naturally deduplicated across passes.
///
/// # Arguments
///
/// * `dir` - Snapshot directory, created if missing
/// * `content_hash` - Hex content hash, used as the file stem
/// * `html` - The raw page HTML
pub fn save_snapshot(dir: &Path, content_hash: &str, html: &str) -> std::io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.html", content_hash));
    fs::write(&path, html)?;
    Ok(path)
}
