use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset};
use log::trace;
use regex::{Captures, Regex};

use super::types::{MalformedReason, Marker, Session, TerminalInfo, TranscriptError};

/// Version tag stored alongside every raw-log reference.
pub const PARSER_VERSION: &str = "1.0";

/// Literal written by `script(1)` once the recorded shell has exited.
pub const DONE_MARKER: &str = "Script done on";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";

fn start_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"Script started on (.*?) \[TERM="(.*?)" TTY="(.*?)" COLUMNS="(\d+)" LINES="(\d+)"(?: SOURCE_IP="(.*?)")?\]"#,
        )
        .expect("start marker pattern is valid")
    })
}

fn end_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"Script done on (.*?) \[COMMAND_EXIT_CODE="(\d+)"\]"#)
            .expect("end marker pattern is valid")
    })
}

fn prompt_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Greedy prefix: the capture starts after the last `# ` or `$ ` on the line.
    RE.get_or_init(|| Regex::new(r"^.*@.*:.*[#$] (.*)$").expect("prompt pattern is valid"))
}

/// Parses a raw transcript into a [`Session`].
///
/// `session_id` is the capture file stem. The bytes are decoded as UTF-8 with
/// invalid sequences replaced, so any input yields either a session or a
/// classified failure:
/// - [`TranscriptError::Incomplete`] while the done marker is absent,
/// - [`TranscriptError::Malformed`] when a marker is broken or the timestamps
///   run backwards.
pub fn parse_transcript(session_id: &str, raw: &[u8]) -> Result<Session, TranscriptError> {
    let content = String::from_utf8_lossy(raw);

    if !content.contains(DONE_MARKER) {
        return Err(TranscriptError::Incomplete);
    }

    let start = start_marker()
        .captures(&content)
        .ok_or(MalformedReason::MissingStartMarker)?;
    let start_time = parse_timestamp(&start, 1, Marker::Start)?;
    let terminal = TerminalInfo {
        term_type: start[2].to_string(),
        device: start[3].to_string(),
        columns: parse_number(&start[4], "COLUMNS")?,
        lines: parse_number(&start[5], "LINES")?,
    };
    let source_address = start.get(6).map(|m| m.as_str().to_string());

    let end = end_marker()
        .captures(&content)
        .ok_or(MalformedReason::MissingEndMarker)?;
    let end_time = parse_timestamp(&end, 1, Marker::End)?;
    let exit_code: i32 = parse_number(&end[2], "COMMAND_EXIT_CODE")?;

    let duration_seconds = (end_time - start_time).num_seconds();
    if end_time < start_time {
        return Err(MalformedReason::NegativeDuration {
            seconds: duration_seconds,
        }
        .into());
    }

    let commands = extract_commands(&content);
    trace!(
        "[{}] parsed {} command(s) over {}s",
        session_id,
        commands.len(),
        duration_seconds
    );

    Ok(Session {
        session_id: session_id.to_string(),
        source_address,
        start_time,
        end_time,
        duration_seconds,
        exit_code,
        terminal,
        commands,
    })
}

/// Collects the commands typed at shell prompts, in order of appearance.
///
/// Lines are evaluated independently. A prompt with nothing after it yields no
/// entry.
pub fn extract_commands(content: &str) -> Vec<String> {
    content
        .split('\n')
        .filter_map(|line| prompt_line().captures(line))
        .filter_map(|caps| {
            let command = caps.get(1)?.as_str().trim();
            (!command.is_empty()).then(|| command.to_string())
        })
        .collect()
}

fn parse_timestamp(
    caps: &Captures<'_>,
    group: usize,
    marker: Marker,
) -> Result<DateTime<FixedOffset>, MalformedReason> {
    let value = caps[group].trim();
    DateTime::parse_from_str(value, TIMESTAMP_FORMAT).map_err(|_| {
        MalformedReason::InvalidTimestamp {
            marker,
            value: value.to_string(),
        }
    })
}

fn parse_number<T: std::str::FromStr>(
    value: &str,
    attribute: &'static str,
) -> Result<T, MalformedReason> {
    value.parse().map_err(|_| MalformedReason::InvalidNumber {
        attribute,
        value: value.to_string(),
    })
}
