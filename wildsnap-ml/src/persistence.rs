//! Filesystem helpers shared by the pipeline stages: atomic writes and moves.

use std::io;
use std::path::Path;

/// Atomically write raw bytes to a file.
///
/// Writes to a `.tmp` sibling file, then renames to the target path.
/// Creates parent directories if they don't exist.
pub fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Move a file, replacing `to` if it exists.
///
/// Falls back to copy + remove when a rename is not possible (e.g. across
/// filesystems). The source never survives a successful call.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(err) => {
            tracing::debug!(error = %err, from = %from.display(), "rename failed, copying instead");
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}
