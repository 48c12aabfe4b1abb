//! Data types produced by the transcript parser.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Terminal geometry and identity announced by the start marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalInfo {
    /// `TERM` value, e.g. `xterm`
    #[serde(rename = "type")]
    pub term_type: String,
    /// `TTY` value, e.g. `pts/0`
    pub device: String,
    pub columns: u32,
    pub lines: u32,
}

/// A fully parsed honeypot session.
///
/// Built once per complete transcript and never modified afterwards. Parsing
/// the same bytes again always yields an equal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stem of the capture file name
    pub session_id: String,
    /// Attacker address, when the honeypot recorded one
    pub source_address: Option<String>,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    /// Whole seconds between `start_time` and `end_time`, never negative
    pub duration_seconds: i64,
    pub exit_code: i32,
    pub terminal: TerminalInfo,
    /// Commands in order of appearance
    pub commands: Vec<String>,
}

/// Which marker line a timestamp came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Start,
    End,
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Start => write!(f, "start"),
            Marker::End => write!(f, "end"),
        }
    }
}

/// Why a complete transcript could not be turned into a [`Session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    MissingStartMarker,
    MissingEndMarker,
    InvalidTimestamp { marker: Marker, value: String },
    InvalidNumber { attribute: &'static str, value: String },
    NegativeDuration { seconds: i64 },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::MissingStartMarker => {
                write!(f, "start marker missing or lacking required attributes")
            }
            MalformedReason::MissingEndMarker => {
                write!(f, "end marker missing or lacking exit code")
            }
            MalformedReason::InvalidTimestamp { marker, value } => {
                write!(f, "unparsable {} timestamp '{}'", marker, value)
            }
            MalformedReason::InvalidNumber { attribute, value } => {
                write!(f, "invalid {} value '{}'", attribute, value)
            }
            MalformedReason::NegativeDuration { seconds } => {
                write!(f, "session ends {}s before it starts", -seconds)
            }
        }
    }
}

/// Parse failure classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptError {
    /// The termination marker has not been written yet; try again later.
    Incomplete,
    /// The transcript is complete but structurally broken.
    Malformed(MalformedReason),
}

impl fmt::Display for TranscriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptError::Incomplete => write!(f, "transcript is not finished yet"),
            TranscriptError::Malformed(reason) => write!(f, "malformed transcript: {}", reason),
        }
    }
}

impl std::error::Error for TranscriptError {}

impl From<MalformedReason> for TranscriptError {
    fn from(reason: MalformedReason) -> Self {
        TranscriptError::Malformed(reason)
    }
}
