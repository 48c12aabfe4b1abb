use std::path::PathBuf;

use thiserror::Error;

use crate::session_parser::MalformedReason;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlError(String),
    #[error("Missing value: {0}")]
    MissingValue(String),
    #[error("Value out of range: {0}")]
    NotInRange(String),
}

/// Failures of the persistence layer, database and filesystem alike.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Storage write failed: {0}")]
    WriteFailed(String),
    #[error("Storage read failed: {0}")]
    ReadFailed(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("File watching error: {0}")]
    Notify(#[from] notify::Error),
    #[error("Capture directory error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failed outcome of a single `Pipeline::process` call.
///
/// None of these terminate the candidate loop; they are logged by the caller
/// and the file either waits for operator action (`Malformed`) or is retried on
/// the next emission (`Storage`, `Read`).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Malformed transcript {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: MalformedReason },
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Unable to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Not a capture file name: {}", .0.display())]
    InvalidPath(PathBuf),
}

impl IngestError {
    /// The candidate no longer exists, e.g. it was renamed or deleted after
    /// being reported.
    pub fn is_vanished(&self) -> bool {
        matches!(self, IngestError::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("Configuration error: {0}")]
    ConfigurationError(#[from] ConfigError),
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
    #[error("Candidate source error: {0}")]
    SourceError(#[from] SourceError),
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),
}
