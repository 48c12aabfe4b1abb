use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, trace, warn};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::time::Instant;

use super::source_trait::{has_extension, CandidateSource, SourceHandle};
use crate::error_handling::types::SourceError;

const EVENT_QUEUE: usize = 256;

/// Event-driven candidate source.
///
/// Subscribes to create/modify notifications for the capture directory (not
/// its subdirectories). Transcripts are appended to while the session is live,
/// so modify events matter as much as create events: the file only becomes
/// parseable once the done marker lands. Each notification (re)arms a grace
/// timer for its path; the path is emitted once no further notification
/// arrived for the grace period.
pub struct WatchSource {
    dir: PathBuf,
    extension: String,
    grace: Duration,
}

impl WatchSource {
    pub fn new<P: Into<PathBuf>, E: Into<String>>(dir: P, extension: E, grace: Duration) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
            grace,
        }
    }
}

impl CandidateSource for WatchSource {
    fn describe(&self) -> String {
        format!(
            "watch source on {} (*.{}, grace {:?})",
            self.dir.display(),
            self.extension,
            self.grace
        )
    }

    fn start(self: Box<Self>, candidates: Sender<PathBuf>) -> Result<SourceHandle, SourceError> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    // Channel closed means the source is shutting down.
                    let _ = event_tx.blocking_send(event);
                }
                Err(e) => warn!("File watch error: {}", e),
            },
            notify::Config::default(),
        )?;
        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;
        info!("Watching {} for *.{} files", self.dir.display(), self.extension);

        let task = tokio::spawn(debounce_events(
            event_rx,
            candidates,
            self.extension,
            self.grace,
        ));
        Ok(SourceHandle::new(task, Some(watcher)))
    }
}

/// Forwards paths from raw notifications to `candidates` once each has been
/// quiet for `grace`.
pub(crate) async fn debounce_events(
    mut events: Receiver<Event>,
    candidates: Sender<PathBuf>,
    extension: String,
    grace: Duration,
) {
    let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

    loop {
        let next_due = pending.values().min().copied();
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let (gone, touched) = classify(event);
                for path in gone {
                    if pending.remove(&path).is_some() {
                        trace!("{} went away before its grace period ended", path.display());
                    }
                }
                for path in touched {
                    if has_extension(&path, &extension) {
                        trace!("Notification for {}", path.display());
                        pending.insert(path, Instant::now() + grace);
                    }
                }
            }
            _ = sleep_until(next_due) => {
                let now = Instant::now();
                let due: Vec<PathBuf> = pending
                    .iter()
                    .filter(|(_, deadline)| **deadline <= now)
                    .map(|(path, _)| path.clone())
                    .collect();
                for path in due {
                    pending.remove(&path);
                    debug!("Candidate ready: {}", path.display());
                    if candidates.send(path).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Splits a notification into paths that no longer exist under their name and
/// paths whose content may have changed.
fn classify(event: Event) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut paths = event.paths;
    match event.kind {
        EventKind::Create(_) => (Vec::new(), paths),
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            (paths, Vec::new())
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            let to = paths.split_off(1);
            (paths, to)
        }
        EventKind::Modify(_) => (Vec::new(), paths),
        kind => {
            trace!("Ignoring {:?} for {:?}", kind, paths);
            (Vec::new(), Vec::new())
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
