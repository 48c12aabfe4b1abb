use std::collections::HashMap;
use std::fs::Metadata;
use std::path::Path;
use std::time::SystemTime;

use log::{debug, error, info};
use tokio::sync::Mutex;

use crate::error_handling::types::{IngestError, StorageError};
use crate::ingestion::artifacts::{ArtifactStore, SessionDocument};
use crate::ingestion::context::IngestContext;
use crate::session_parser::{parse_transcript, Session, TranscriptError};
use crate::storage::{RawLogRecord, RecordStore, SessionEvent};

/// Successful outcome of [`Pipeline::process`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The session was parsed and fully persisted by this call.
    Ingested(Session),
    /// A structured artifact already exists; nothing was read or written.
    AlreadyProcessed,
    /// The transcript is still being written.
    NotReady,
    /// The file failed as malformed before and has not changed since.
    Quarantined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fingerprint {
    len: u64,
    modified: Option<SystemTime>,
}

impl Fingerprint {
    fn of(metadata: &Metadata) -> Self {
        Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        }
    }
}

/// State guarded by the ingestion lock.
#[derive(Default)]
struct IngestState {
    /// Malformed files by session id, with the fingerprint they failed with
    quarantined: HashMap<String, Fingerprint>,
}

/// Turns candidate paths into stored sessions, exactly once per session.
///
/// Every call to [`process`](Pipeline::process) runs under one process-wide
/// lock, acquired before the idempotency check and released when the call
/// returns, so two notifications for the same file never interleave their
/// writes. Write order is raw archive, raw-log reference, event, structured
/// artifact; the artifact comes last because its existence is what marks the
/// session as done. Any failure before it leaves the file a candidate and the
/// next attempt replays the whole sequence, relying on the earlier steps being
/// repeatable.
pub struct Pipeline<S> {
    context: IngestContext<S>,
    artifacts: ArtifactStore,
    state: Mutex<IngestState>,
}

impl<S: RecordStore> Pipeline<S> {
    pub fn new(context: IngestContext<S>, artifacts: ArtifactStore) -> Self {
        Self {
            context,
            artifacts,
            state: Mutex::new(IngestState::default()),
        }
    }

    pub fn context(&self) -> &IngestContext<S> {
        &self.context
    }

    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    #[cfg(test)]
    pub(crate) async fn quarantined_count(&self) -> usize {
        self.state.lock().await.quarantined.len()
    }

    pub async fn process(&self, path: &Path) -> Result<IngestOutcome, IngestError> {
        let mut state = self.state.lock().await;

        let (session_id, file_name) = capture_names(path)?;
        if self.artifacts.is_processed(&session_id).await {
            debug!("[{}] Already processed, skipping", session_id);
            return Ok(IngestOutcome::AlreadyProcessed);
        }

        let read_error = |source: std::io::Error| IngestError::Read {
            path: path.to_path_buf(),
            source,
        };
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound
                    && state.quarantined.remove(&session_id).is_some()
                {
                    debug!("[{}] Quarantined file is gone, forgetting it", session_id);
                }
                return Err(read_error(e));
            }
        };
        let fingerprint = Fingerprint::of(&metadata);
        if state.quarantined.get(&session_id) == Some(&fingerprint) {
            debug!("[{}] Unchanged since it was found malformed", session_id);
            return Ok(IngestOutcome::Quarantined);
        }
        let raw = tokio::fs::read(path).await.map_err(read_error)?;

        let session = match parse_transcript(&session_id, &raw) {
            Ok(session) => session,
            Err(TranscriptError::Incomplete) => {
                debug!("[{}] Transcript not finished yet", session_id);
                return Ok(IngestOutcome::NotReady);
            }
            Err(TranscriptError::Malformed(reason)) => {
                error!(
                    "[{}] Malformed transcript {}: {}; leaving it for inspection",
                    session_id,
                    path.display(),
                    reason
                );
                state.quarantined.insert(session_id, fingerprint);
                return Err(IngestError::Malformed {
                    path: path.to_path_buf(),
                    reason,
                });
            }
        };
        state.quarantined.remove(&session_id);

        self.persist(&session, &file_name, &raw).await?;
        info!(
            "[{}] Successfully processed session {} ({} command(s))",
            session_id,
            file_name,
            session.commands.len()
        );
        Ok(IngestOutcome::Ingested(session))
    }

    async fn persist(&self, session: &Session, file_name: &str, raw: &[u8]) -> Result<(), StorageError> {
        let honeypot_id = self.context.honeypot_id().await?;
        let protocol = self.context.protocol();
        let store = self.context.store();

        let raw_path = self.artifacts.archive_raw(file_name, raw).await?;
        let raw_log = RawLogRecord::for_session(
            honeypot_id,
            protocol,
            session,
            file_name,
            &raw_path.to_string_lossy(),
        );
        let raw_log_id = store.upsert_raw_log(&raw_log).await?;

        let event = SessionEvent::for_session(honeypot_id, protocol, session, &raw_log_id);
        let event_id = store.upsert_event(&event).await?;
        debug!(
            "[{}] Stored raw log {} and event {}",
            session.session_id, raw_log_id, event_id
        );

        let document = SessionDocument {
            honeypot_id: honeypot_id.to_string(),
            protocol: protocol.to_string(),
            session: session.clone(),
        };
        self.artifacts.write_structured(&document).await?;
        Ok(())
    }
}

/// Session id (file stem) and file name of a capture path.
pub fn capture_names(path: &Path) -> Result<(String, String), IngestError> {
    let invalid = || IngestError::InvalidPath(path.to_path_buf());
    let stem = path.file_stem().and_then(|s| s.to_str()).ok_or_else(invalid)?;
    let name = path.file_name().and_then(|s| s.to_str()).ok_or_else(invalid)?;
    if stem.is_empty() {
        return Err(invalid());
    }
    Ok((stem.to_string(), name.to_string()))
}
