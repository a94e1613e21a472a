use crate::error::PersistenceError;
use crate::models::{ModelSnapshot, MODEL_FORMAT_VERSION};
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

/// Serializes a snapshot to `path` atomically: the blob is written to a
/// sibling temporary file, flushed to disk, then renamed into place. A crash
/// at any point leaves either the old blob or the new one, never a torn mix.
pub fn save(snapshot: &ModelSnapshot, path: &Path) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    let result = write_blob(snapshot, &tmp_path);
    if result.is_err() {
        // Leave nothing half-written next to a valid model.
        if let Err(cleanup) = fs::remove_file(&tmp_path) {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %tmp_path.display(), error = %cleanup, "failed to remove stale temp blob");
            }
        }
        return result;
    }

    fs::rename(&tmp_path, path)?;
    info!(
        path = %path.display(),
        users = snapshot.n_users(),
        items = snapshot.n_items(),
        rank = snapshot.rank,
        "model snapshot saved"
    );
    Ok(())
}

fn write_blob(snapshot: &ModelSnapshot, tmp_path: &Path) -> Result<(), PersistenceError> {
    let file = File::create(tmp_path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, snapshot)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Version tag probed before committing to a full parse.
#[derive(Deserialize)]
struct VersionTag {
    format_version: u32,
}

/// Reads a snapshot back. The format version is checked first and any
/// mismatch is rejected outright; there is no best-effort migration. The
/// parsed snapshot is re-validated and its lookup maps rebuilt before it is
/// handed to callers.
pub fn load(path: &Path) -> Result<ModelSnapshot, PersistenceError> {
    let bytes = fs::read(path)?;

    let tag: VersionTag = serde_json::from_slice(&bytes)?;
    if tag.format_version != MODEL_FORMAT_VERSION {
        return Err(PersistenceError::VersionMismatch {
            expected: MODEL_FORMAT_VERSION,
            found: tag.format_version,
        });
    }

    let mut snapshot: ModelSnapshot = serde_json::from_slice(&bytes)?;
    snapshot
        .check_consistency()
        .map_err(PersistenceError::Corrupt)?;
    snapshot.rebuild_lookups();

    info!(
        path = %path.display(),
        users = snapshot.n_users(),
        items = snapshot.n_items(),
        rank = snapshot.rank,
        "model snapshot loaded"
    );
    Ok(snapshot)
}
