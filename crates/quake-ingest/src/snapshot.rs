//! Previously published dataset
//!
//! The local output file doubles as the snapshot for the next run. A missing
//! file means "no history". A corrupt or unreadable file is also treated as
//! no history by [`load_snapshot_or_empty`]: the run then republishes only
//! what the feeds currently return and the older records are lost. That
//! at-most-once behaviour is intentional and always logged at `warn`.

use crate::error::SnapshotError;
use quake_common::record::records_from_json;
use quake_common::EarthquakeRecord;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Load the snapshot, distinguishing missing, unreadable and corrupt files
pub async fn load_snapshot(path: &Path) -> Result<Vec<EarthquakeRecord>, SnapshotError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(SnapshotError::Missing(path.to_path_buf()));
        },
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            return Err(SnapshotError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        },
        Err(source) => {
            return Err(SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            });
        },
    };

    records_from_json(&content).map_err(|e| SnapshotError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Load the snapshot, falling back to an empty history on any failure
pub async fn load_snapshot_or_empty(path: &Path) -> Vec<EarthquakeRecord> {
    match load_snapshot(path).await {
        Ok(records) => {
            info!(path = %path.display(), records = records.len(), "Loaded snapshot");
            records
        },
        Err(SnapshotError::Missing(_)) => {
            info!(path = %path.display(), "No snapshot found; starting from empty history");
            Vec::new()
        },
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Snapshot unusable; continuing with empty history, previously published records will be dropped"
            );
            Vec::new()
        },
    }
}

/// Replace the file at `path` with `body`
///
/// Writes a sibling temporary file and renames it over the target so readers
/// never observe a half-written dataset.
pub async fn write_snapshot(path: &Path, body: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let staging = staging_path(path);
    tokio::fs::write(&staging, body).await?;

    if let Err(e) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(e);
    }

    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use quake_common::record::records_to_json;
    use tempfile::TempDir;

    fn sample() -> Vec<EarthquakeRecord> {
        vec![
            EarthquakeRecord::new("2024-01-01", "10:00:00", 38.0, 27.0).with_location("Manisa"),
            EarthquakeRecord::new("2024-01-01", "09:00:00", 37.0, 26.0).with_location("Ege Denizi"),
        ]
    }

    #[tokio::test]
    async fn test_missing_snapshot() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");

        assert!(matches!(load_snapshot(&path).await, Err(SnapshotError::Missing(_))));
        assert!(load_snapshot_or_empty(&path).await.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_defaults_to_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        tokio::fs::write(&path, "[{\"Tarih\": \"2024-01-01\"").await.unwrap();

        assert!(matches!(load_snapshot(&path).await, Err(SnapshotError::Corrupt { .. })));
        assert!(load_snapshot_or_empty(&path).await.is_empty());
    }

    #[tokio::test]
    async fn test_non_array_snapshot_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        tokio::fs::write(&path, "{\"records\": []}").await.unwrap();

        assert!(matches!(load_snapshot(&path).await, Err(SnapshotError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_invalid_utf8_snapshot_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        tokio::fs::write(&path, [0xff, 0xfe, 0x00]).await.unwrap();

        assert!(matches!(load_snapshot(&path).await, Err(SnapshotError::Corrupt { .. })));
    }

    #[tokio::test]
    async fn test_write_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("public").join("data").join("deprem_data.json");
        let records = sample();

        write_snapshot(&path, &records_to_json(&records).unwrap()).await.unwrap();

        assert_eq!(load_snapshot(&path).await.unwrap(), records);
        assert!(!staging_path(&path).exists());
    }

    #[tokio::test]
    async fn test_write_replaces_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.json");
        tokio::fs::write(&path, "stale").await.unwrap();

        write_snapshot(&path, "[]").await.unwrap();

        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "[]");
        assert!(load_snapshot(&path).await.unwrap().is_empty());
    }

    #[test]
    fn test_staging_path() {
        assert_eq!(
            staging_path(Path::new("public/data/deprem_data.json")),
            PathBuf::from("public/data/deprem_data.json.tmp")
        );
    }
}
