//! Shared persistence helpers: data directory resolution and atomic JSON writes.
//!
//! Spec §6: "Atomic replace by write-to-temp+rename." Every subsystem that
//! owns a state file (llm_fallback, slave, orchestrator task audit) goes
//! through `write_json_atomic` / `read_json` so there is exactly one way to
//! hit disk.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Root data directory, configurable via `TASKGRID_DATA_DIR`, defaulting to
/// a per-user location outside the code tree (spec §6 persistence layout).
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TASKGRID_DATA_DIR") {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskgrid")
}

/// Write `value` to `path` as pretty JSON via write-to-temp-then-rename so
/// concurrent readers never observe a torn write.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| PersistenceError::Io { path: parent.to_path_buf(), source })?;
    }
    let tmp_path = path.with_extension("tmp");
    let body = serde_json::to_vec_pretty(value).map_err(|source| PersistenceError::Parse { path: path.to_path_buf(), source })?;
    std::fs::write(&tmp_path, body).map_err(|source| PersistenceError::Io { path: tmp_path.clone(), source })?;
    std::fs::rename(&tmp_path, path).map_err(|source| PersistenceError::Io { path: path.to_path_buf(), source })?;
    Ok(())
}

/// Read and parse a JSON file, returning `Ok(None)` if it doesn't exist.
///
/// A file that exists but fails to parse is treated as corrupted: the
/// caller is expected to back it up and start fresh (spec §7, "Fatal"
/// error handling for corrupted persistence files).
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| PersistenceError::Parse { path: path.to_path_buf(), source }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(PersistenceError::Io { path: path.to_path_buf(), source }),
    }
}

/// Back up a corrupted file by renaming it aside, then return as if absent.
pub fn quarantine_corrupt(path: &Path) {
    if path.exists() {
        let backup = path.with_extension("corrupt");
        if let Err(e) = std::fs::rename(path, &backup) {
            tracing::warn!(?path, error = %e, "failed to quarantine corrupt persistence file");
        } else {
            tracing::warn!(?path, ?backup, "quarantined corrupt persistence file, starting fresh");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        n: u32,
    }

    #[test]
    fn round_trips_through_atomic_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sample.json");

        write_json_atomic(&path, &Sample { n: 42 }).unwrap();
        let loaded: Option<Sample> = read_json(&path).unwrap();
        assert_eq!(loaded, Some(Sample { n: 42 }));
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.json");
        let loaded: Option<Sample> = read_json(&path).unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sample.json");
        std::fs::write(&path, b"not json").unwrap();

        let result: Result<Option<Sample>, _> = read_json(&path);
        assert!(result.is_err());

        quarantine_corrupt(&path);
        assert!(!path.exists());
        assert!(path.with_extension("corrupt").exists());
    }
}
