//! Record Store Trait
//!
//! This module defines the `RecordStore` trait, the interface the ingestion
//! pipeline uses to reach the datastore.
//!
//! Implementors are responsible for:
//! - Looking up and registering the honeypot identity
//! - Persisting raw-log references
//! - Persisting structured session events
//!
//! Every write must tolerate being repeated: the pipeline re-runs its whole
//! sequence after a partial failure, so raw-log references and events are
//! upserted on their natural keys instead of blindly inserted.

use std::future::Future;

use crate::error_handling::types::StorageError;
use crate::storage::types::{HoneypotRecord, RawLogRecord, SessionEvent};

pub trait RecordStore: Send + Sync {
    /// Finds the honeypot registered under `name`.
    fn find_honeypot(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<HoneypotRecord>, StorageError>> + Send;

    /// Registers a new honeypot.
    fn insert_honeypot(
        &self,
        honeypot: &HoneypotRecord,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Stores `raw_log` unless a reference for the same honeypot and file name
    /// exists, and returns the id of the stored row.
    fn upsert_raw_log(
        &self,
        raw_log: &RawLogRecord,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Stores `event` unless an event for the same honeypot and session exists,
    /// and returns the id of the stored row.
    fn upsert_event(
        &self,
        event: &SessionEvent,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;
}
