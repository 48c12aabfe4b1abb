//! Ingestion pipeline.
//!
//! Converts candidate capture paths into durable effects: an archived raw copy,
//! a raw-log reference, a structured event and the structured artifact that
//! marks the session as done.
//!
//! Re-exports:
//! - [`Pipeline`] and [`IngestOutcome`]: the locked `process(path)` entry point.
//! - [`IngestContext`], [`HoneypotIdentity`]: process-wide state.
//! - [`ArtifactStore`], [`SessionDocument`]: filesystem artifacts.

pub mod artifacts;
pub mod context;
pub mod pipeline;

pub use artifacts::{ArtifactStore, SessionDocument};
pub use context::{HoneypotIdentity, IngestContext};
pub use pipeline::{capture_names, IngestOutcome, Pipeline};
