//! Session transcript parsing.
//!
//! Turns the text recorded by `script(1)` inside the SSH honeypot into a
//! [`Session`]. This module performs no I/O:
//! - `types`: the parsed record and the failure classification.
//! - `parser`: marker extraction, duration check and command extraction.

pub mod parser;
pub mod types;

pub use parser::{extract_commands, parse_transcript, PARSER_VERSION};
pub use types::{MalformedReason, Marker, Session, TerminalInfo, TranscriptError};
