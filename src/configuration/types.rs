use clap::ValueEnum;
use serde::Deserialize;

/// How new capture files are discovered while running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Filesystem notifications, debounced by the grace period.
    Watch,
    /// Directory scan every scan interval.
    Poll,
}

pub const DEFAULT_DATABASE_URL: &str = "sqlite://honeytrace.sqlite3?mode=rwc";
pub const DEFAULT_HONEYPOT_NAME: &str = "ssh-honeypot";
pub const DEFAULT_PROTOCOL: &str = "ssh";
pub const DEFAULT_CAPTURE_DIR: &str = "/data/ssh_sessions";
pub const DEFAULT_RAW_DIR: &str = "/data/raw";
pub const DEFAULT_JSON_DIR: &str = "/data/json";
pub const DEFAULT_EXTENSION: &str = "tty";
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 1000;
