use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;

use crate::models::Snapshot;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access snapshot {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed snapshot {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Replaces the whole file with `snapshot`. The write is not atomic.
pub async fn write(path: &Path, snapshot: &Snapshot) -> Result<(), SnapshotError> {
    let content = serde_json::to_vec(snapshot).map_err(|source| SnapshotError::Json {
        path: path.display().to_string(),
        source,
    })?;
    tokio::fs::write(path, content).await.map_err(|source| SnapshotError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Reads the last written snapshot. A missing file is an empty snapshot.
pub async fn read(path: &Path) -> Result<Snapshot, SnapshotError> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Snapshot::default()),
        Err(source) => {
            return Err(SnapshotError::Io { path: path.display().to_string(), source })
        }
    };
    serde_json::from_slice(&content).map_err(|source| SnapshotError::Json {
        path: path.display().to_string(),
        source,
    })
}
