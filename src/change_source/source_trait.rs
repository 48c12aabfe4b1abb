use std::path::{Path, PathBuf};

use log::debug;
use notify::RecommendedWatcher;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use crate::error_handling::types::SourceError;

/// A strategy for discovering capture files that may be ready for ingestion.
///
/// Implementations push candidate paths into the channel they are started
/// with. They may emit the same path any number of times; deduplication is the
/// pipeline's job.
pub trait CandidateSource: Send {
    /// Human readable description for startup logs.
    fn describe(&self) -> String;

    /// Starts emitting candidates. Must be called from within a tokio runtime.
    fn start(self: Box<Self>, candidates: Sender<PathBuf>) -> Result<SourceHandle, SourceError>;
}

/// Running candidate source; dropping the subscription stops emission.
pub struct SourceHandle {
    task: JoinHandle<()>,
    watcher: Option<RecommendedWatcher>,
}

impl SourceHandle {
    pub fn new(task: JoinHandle<()>, watcher: Option<RecommendedWatcher>) -> Self {
        Self { task, watcher }
    }

    /// Unsubscribes from filesystem notifications and stops the emitting task.
    pub async fn shutdown(self) {
        drop(self.watcher);
        self.task.abort();
        let _ = self.task.await;
        debug!("Candidate source stopped");
    }
}

/// Whether `path` looks like a capture file with the given extension.
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(extension)
}

/// Lists capture files directly inside `dir`, sorted by name.
pub async fn scan_directory(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !has_extension(&path, extension) {
            continue;
        }
        // Follows symlinks, unlike `DirEntry::file_type`.
        if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_file()) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}
