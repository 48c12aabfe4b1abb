//! Storage subsystem
//!
//! This module provides the abstraction and implementation for persisting the
//! honeypot registration, raw-log references and structured session events.
//!
//! Components:
//! - `storage_trait`: the RecordStore trait defining a uniform API.
//! - `types`: records exchanged with the store.
//! - `database_storage`: ORM-based SQLite implementation using SeaORM.
//! - `db_entities`: SeaORM entity models for the database backend.

pub mod database_storage;
pub mod db_entities;
pub mod storage_trait;
pub mod types;

pub use database_storage::DatabaseStorage;
pub use storage_trait::RecordStore;
pub use types::{HoneypotRecord, RawLogMeta, RawLogRecord, SessionEvent};
