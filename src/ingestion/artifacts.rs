//! Filesystem artifacts written by the pipeline.
//!
//! Two directories are involved:
//! - the raw archive, holding byte-exact copies of capture files under their
//!   original names,
//! - the structured directory, holding one `<session_id>.json` document per
//!   ingested session. The existence of that document is the durable
//!   "processed" marker.
//!
//! Both kinds of file are written to a hidden temporary name first and renamed
//! into place, so a crash never leaves a truncated artifact behind.

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::error_handling::types::StorageError;
use crate::session_parser::Session;

/// Contents of the structured-output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDocument {
    pub honeypot_id: String,
    pub protocol: String,
    #[serde(flatten)]
    pub session: Session,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    raw_dir: PathBuf,
    json_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(raw_dir: P, json_dir: Q) -> Self {
        Self {
            raw_dir: raw_dir.into(),
            json_dir: json_dir.into(),
        }
    }

    /// Creates both artifact directories if needed.
    pub async fn prepare(&self) -> Result<(), StorageError> {
        for dir in [&self.raw_dir, &self.json_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                error!("Failed to create artifact dir {}: {}", dir.display(), e);
                StorageError::WriteFailed(format!("{}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }

    pub fn raw_path(&self, file_name: &str) -> PathBuf {
        self.raw_dir.join(file_name)
    }

    pub fn structured_path(&self, session_id: &str) -> PathBuf {
        self.json_dir.join(format!("{}.json", session_id))
    }

    /// Whether the structured artifact for `session_id` exists. An unreadable
    /// artifact directory counts as not processed.
    pub async fn is_processed(&self, session_id: &str) -> bool {
        matches!(
            tokio::fs::try_exists(self.structured_path(session_id)).await,
            Ok(true)
        )
    }

    /// Copies `raw` into the archive as `file_name` unless a copy is already
    /// there, and returns the archive path either way.
    pub async fn archive_raw(&self, file_name: &str, raw: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.raw_path(file_name);
        if matches!(tokio::fs::try_exists(&path).await, Ok(true)) {
            debug!("Raw copy {} already archived", path.display());
            return Ok(path);
        }
        write_atomically(&path, raw).await.map_err(|e| {
            error!("Failed to archive {}: {}", path.display(), e);
            StorageError::WriteFailed(format!("{}: {}", path.display(), e))
        })?;
        debug!("Archived {} byte(s) to {}", raw.len(), path.display());
        Ok(path)
    }

    /// Writes the structured artifact, marking the session as processed.
    pub async fn write_structured(&self, document: &SessionDocument) -> Result<PathBuf, StorageError> {
        let path = self.structured_path(&document.session.session_id);
        let json = serde_json::to_vec_pretty(document)
            .map_err(|e| StorageError::WriteFailed(e.to_string()))?;
        write_atomically(&path, &json).await.map_err(|e| {
            error!("Failed to write {}: {}", path.display(), e);
            StorageError::WriteFailed(format!("{}: {}", path.display(), e))
        })?;
        Ok(path)
    }
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let temp = path.with_file_name(format!(".{}.partial", file_name.to_string_lossy()));
    tokio::fs::write(&temp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&temp, path).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_parser::parse_transcript;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ArtifactStore {
        ArtifactStore::new(dir.path().join("raw"), dir.path().join("json"))
    }

    #[tokio::test]
    async fn archive_keeps_the_first_copy() {
        let dir = TempDir::new().unwrap();
        let artifacts = store(&dir);
        artifacts.prepare().await.unwrap();

        let first = artifacts.archive_raw("s.tty", b"original").await.unwrap();
        let second = artifacts.archive_raw("s.tty", b"changed").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"original");
        assert!(!dir.path().join("raw").join(".s.tty.partial").exists());
    }

    #[tokio::test]
    async fn structured_document_marks_session_processed() {
        let dir = TempDir::new().unwrap();
        let artifacts = store(&dir);
        artifacts.prepare().await.unwrap();
        let raw = concat!(
            "Script started on 2024-01-01 10:00:00+0000 [TERM=\"xterm\" TTY=\"pts/0\" COLUMNS=\"80\" LINES=\"24\"]\n",
            "Script done on 2024-01-01 10:00:01+0000 [COMMAND_EXIT_CODE=\"1\"]\n",
        );
        let session = parse_transcript("s1", raw.as_bytes()).unwrap();
        let document = SessionDocument {
            honeypot_id: "hp".into(),
            protocol: "ssh".into(),
            session,
        };

        assert!(!artifacts.is_processed("s1").await);
        let path = artifacts.write_structured(&document).await.unwrap();
        assert!(artifacts.is_processed("s1").await);

        let json: serde_json::Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["honeypot_id"], "hp");
        assert_eq!(json["terminal"]["type"], "xterm");
        assert_eq!(json["exit_code"], 1);
    }

    #[tokio::test]
    async fn write_into_missing_directory_is_a_storage_error() {
        let dir = TempDir::new().unwrap();
        let artifacts = store(&dir);
        let result = artifacts.archive_raw("s.tty", b"data").await;
        assert!(matches!(result, Err(StorageError::WriteFailed(_))));
    }
}
