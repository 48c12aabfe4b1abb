use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc::Sender;
use tokio::time::MissedTickBehavior;

use super::source_trait::{scan_directory, CandidateSource, SourceHandle};
use crate::error_handling::types::SourceError;
use crate::ingestion::ArtifactStore;

/// Periodic directory scan.
///
/// Each scan emits every capture file that has no structured artifact yet.
/// Unfinished transcripts keep being emitted until they complete.
pub struct PollSource {
    dir: PathBuf,
    extension: String,
    interval: Duration,
    artifacts: ArtifactStore,
}

impl PollSource {
    pub fn new<P: Into<PathBuf>, E: Into<String>>(
        dir: P,
        extension: E,
        interval: Duration,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            interval,
            artifacts,
        }
    }

    async fn unprocessed(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut unprocessed = Vec::new();
        for path in scan_directory(&self.dir, &self.extension).await? {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !self.artifacts.is_processed(stem).await {
                unprocessed.push(path);
            }
        }
        Ok(unprocessed)
    }

    async fn run(self, candidates: Sender<PathBuf>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let found = match self.unprocessed().await {
                Ok(found) => found,
                Err(e) => {
                    warn!("Failed to scan {}: {}", self.dir.display(), e);
                    continue;
                }
            };
            if !found.is_empty() {
                debug!("Scan of {} found {} candidate(s)", self.dir.display(), found.len());
            }
            for path in found {
                if candidates.send(path).await.is_err() {
                    return;
                }
            }
        }
    }
}

impl CandidateSource for PollSource {
    fn describe(&self) -> String {
        format!(
            "poll source on {} (*.{}, every {:?})",
            self.dir.display(),
            self.extension,
            self.interval
        )
    }

    fn start(self: Box<Self>, candidates: Sender<PathBuf>) -> Result<SourceHandle, SourceError> {
        info!(
            "Polling {} for *.{} files every {:?}",
            self.dir.display(),
            self.extension,
            self.interval
        );
        let task = tokio::spawn(self.run(candidates));
        Ok(SourceHandle::new(task, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    fn setup() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("sessions")).unwrap();
        std::fs::create_dir_all(dir.path().join("json")).unwrap();
        let artifacts = ArtifactStore::new(dir.path().join("raw"), dir.path().join("json"));
        (dir, artifacts)
    }

    #[tokio::test]
    async fn emits_only_unprocessed_captures() {
        let (dir, artifacts) = setup();
        let sessions = dir.path().join("sessions");
        std::fs::write(sessions.join("done.tty"), "x").unwrap();
        std::fs::write(sessions.join("todo.tty"), "x").unwrap();
        std::fs::write(sessions.join("other.log"), "x").unwrap();
        std::fs::write(dir.path().join("json/done.json"), "{}").unwrap();

        let source = Box::new(PollSource::new(
            &sessions,
            "tty",
            Duration::from_millis(20),
            artifacts,
        ));
        let (tx, mut rx) = mpsc::channel(16);
        let handle = source.start(tx).unwrap();

        for _ in 0..2 {
            let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got, sessions.join("todo.tty"));
        }
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn missing_directory_keeps_polling() {
        let (dir, artifacts) = setup();
        let sessions = dir.path().join("later");
        let source = Box::new(PollSource::new(
            &sessions,
            "tty",
            Duration::from_millis(20),
            artifacts,
        ));
        let (tx, mut rx) = mpsc::channel(16);
        let handle = source.start(tx).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::create_dir_all(&sessions).unwrap();
        std::fs::write(sessions.join("new.tty"), "x").unwrap();

        let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, sessions.join("new.tty"));
        handle.shutdown().await;
    }
}
