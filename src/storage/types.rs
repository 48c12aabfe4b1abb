use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session_parser::{Session, TerminalInfo, PARSER_VERSION};

/// Event type recorded for every ingested transcript.
pub const SESSION_EVENT_TYPE: &str = "session";

/// Registration of the honeypot this ingester works for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoneypotRecord {
    pub id: String,
    pub name: String,
    pub protocol: String,
    /// Deployment family, `IT` for the SSH honeypot
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HoneypotRecord {
    pub fn new(name: &str, protocol: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            protocol: protocol.to_string(),
            kind: "IT".to_string(),
            status: "running".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogMeta {
    /// Original capture file name
    pub filename: String,
    pub parser_version: String,
}

/// Pointer to an archived raw transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLogRecord {
    pub id: String,
    pub honeypot_id: String,
    pub protocol: String,
    pub timestamp: DateTime<FixedOffset>,
    pub source_address: Option<String>,
    /// Location of the archived copy
    pub raw_data: String,
    pub meta: RawLogMeta,
}

impl RawLogRecord {
    pub fn for_session(
        honeypot_id: &str,
        protocol: &str,
        session: &Session,
        filename: &str,
        raw_data: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            honeypot_id: honeypot_id.to_string(),
            protocol: protocol.to_string(),
            timestamp: session.start_time,
            source_address: session.source_address.clone(),
            raw_data: raw_data.to_string(),
            meta: RawLogMeta {
                filename: filename.to_string(),
                parser_version: PARSER_VERSION.to_string(),
            },
        }
    }
}

/// Structured event describing one parsed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: String,
    pub honeypot_id: String,
    pub protocol: String,
    pub event_type: String,
    pub timestamp: DateTime<FixedOffset>,
    pub source_address: Option<String>,
    pub session_id: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub duration_seconds: i64,
    pub commands: Vec<String>,
    pub terminal_info: TerminalInfo,
    pub exit_code: i32,
    pub raw_log_id: String,
}

impl SessionEvent {
    pub fn for_session(
        honeypot_id: &str,
        protocol: &str,
        session: &Session,
        raw_log_id: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            honeypot_id: honeypot_id.to_string(),
            protocol: protocol.to_string(),
            event_type: SESSION_EVENT_TYPE.to_string(),
            timestamp: session.start_time,
            source_address: session.source_address.clone(),
            session_id: session.session_id.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            duration_seconds: session.duration_seconds,
            commands: session.commands.clone(),
            terminal_info: session.terminal.clone(),
            exit_code: session.exit_code,
            raw_log_id: raw_log_id.to_string(),
        }
    }
}
