use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::change_source::{scan_directory, CandidateSource, PollSource, WatchSource};
use crate::configuration::{Config, SourceMode};
use crate::error_handling::types::*;
use crate::ingestion::{ArtifactStore, HoneypotIdentity, IngestContext, IngestOutcome, Pipeline};
use crate::storage::{DatabaseStorage, RecordStore};

const CANDIDATE_QUEUE: usize = 256;

/// Owns the daemon lifecycle: startup, backlog, candidate loop and shutdown.
pub struct Controller {
    config: Config,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs until `shutdown` resolves.
    ///
    /// The change source is subscribed before the backlog scan, so a file
    /// written while the backlog is being processed is seen either by the scan
    /// or by the source (or both; the pipeline skips the second one).
    pub async fn run<F>(&self, shutdown: F) -> Result<(), ControllerError>
    where
        F: Future<Output = ()>,
    {
        let pipeline = self.start_pipeline().await?;

        let (tx, rx) = mpsc::channel(CANDIDATE_QUEUE);
        let source = self.build_source(pipeline.artifacts().clone());
        info!("Starting {}", source.describe());
        let handle = source.start(tx)?;

        let result = self.serve(&pipeline, rx, shutdown).await;

        handle.shutdown().await;
        info!("Controller stopped");
        result
    }

    /// Processes the backlog, then every candidate from `candidates` until
    /// `shutdown` resolves or the channel closes. Candidates queued while the
    /// backlog runs wait in the channel.
    async fn serve<S, F>(
        &self,
        pipeline: &Arc<Pipeline<S>>,
        mut candidates: mpsc::Receiver<PathBuf>,
        shutdown: F,
    ) -> Result<(), ControllerError>
    where
        S: RecordStore + 'static,
        F: Future<Output = ()>,
    {
        self.process_backlog(pipeline).await?;

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                candidate = candidates.recv() => match candidate {
                    Some(path) => {
                        dispatch(Arc::clone(pipeline), path).await;
                    }
                    None => {
                        warn!("Candidate source stopped emitting");
                        break;
                    }
                },
            }
        }
        Ok(())
    }

    /// Processes the files already in the capture directory and returns how
    /// many sessions were ingested.
    pub async fn run_once(&self) -> Result<usize, ControllerError> {
        let pipeline = self.start_pipeline().await?;
        self.process_backlog(&pipeline).await
    }

    async fn start_pipeline(&self) -> Result<Arc<Pipeline<DatabaseStorage>>, ControllerError> {
        let config = &self.config;

        tokio::fs::create_dir_all(&config.capture_dir)
            .await
            .map_err(SourceError::from)?;
        let artifacts = ArtifactStore::new(&config.raw_dir, &config.json_dir);
        artifacts.prepare().await?;

        info!("Connecting to datastore");
        let storage = DatabaseStorage::connect(&config.database_url).await?;
        let identity = HoneypotIdentity::new(&config.honeypot_name, &config.protocol);
        let context = IngestContext::init(storage, identity).await?;

        Ok(Arc::new(Pipeline::new(context, artifacts)))
    }

    fn build_source(&self, artifacts: ArtifactStore) -> Box<dyn CandidateSource> {
        let config = &self.config;
        match config.mode {
            SourceMode::Watch => Box::new(WatchSource::new(
                &config.capture_dir,
                &config.extension,
                config.grace_period(),
            )),
            SourceMode::Poll => Box::new(PollSource::new(
                &config.capture_dir,
                &config.extension,
                config.scan_interval(),
                artifacts,
            )),
        }
    }

    async fn process_backlog<S>(&self, pipeline: &Arc<Pipeline<S>>) -> Result<usize, ControllerError>
    where
        S: RecordStore + 'static,
    {
        let backlog = scan_directory(&self.config.capture_dir, &self.config.extension)
            .await
            .map_err(SourceError::from)?;
        info!("Processing backlog of {} file(s)", backlog.len());

        let mut ingested = 0;
        for path in backlog {
            if let Some(IngestOutcome::Ingested(_)) = dispatch(Arc::clone(pipeline), path).await {
                ingested += 1;
            }
        }
        info!("Backlog done, {} session(s) ingested", ingested);
        Ok(ingested)
    }
}

/// Processes one candidate on its own task so a panic is contained to that file.
async fn dispatch<S>(pipeline: Arc<Pipeline<S>>, path: PathBuf) -> Option<IngestOutcome>
where
    S: RecordStore + 'static,
{
    let display = path.display().to_string();
    let task = tokio::spawn(async move { pipeline.process(&path).await });
    match task.await {
        Ok(Ok(outcome)) => {
            debug!("{}: {:?}", display, outcome_label(&outcome));
            Some(outcome)
        }
        Ok(Err(e)) => {
            match e {
                // Already reported by the pipeline.
                IngestError::Malformed { .. } => {}
                ref e if e.is_vanished() => debug!("{} vanished before processing", display),
                e => error!("Failed to process {}: {}", display, e),
            }
            None
        }
        Err(e) => {
            error!("Processing {} aborted: {}", display, e);
            None
        }
    }
}

fn outcome_label(outcome: &IngestOutcome) -> &'static str {
    match outcome {
        IngestOutcome::Ingested(_) => "ingested",
        IngestOutcome::AlreadyProcessed => "already processed",
        IngestOutcome::NotReady => "not ready",
        IngestOutcome::Quarantined => "quarantined",
    }
}
