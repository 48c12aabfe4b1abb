use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::parser::ValueSource;
use clap::{ArgMatches, Args, CommandFactory, FromArgMatches, Parser};
use log::{debug, info};
use serde::Deserialize;

use super::types::*;
use crate::error_handling::types::ConfigError;

/// Runtime settings of the ingestion daemon.
///
/// Every field can come from the command line, from the environment variable
/// named in its `env` attribute, or from a TOML file with the same keys (see
/// [`Config::from_file`]). Omitted keys take the defaults in
/// [`types`](super::types).
#[derive(Args, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Datastore connection string
    #[arg(long, env = "DATABASE_URL", default_value = DEFAULT_DATABASE_URL)]
    pub database_url: String,

    /// Name identifying this honeypot in the datastore
    #[arg(long, env = "HONEYPOT_NAME", default_value = DEFAULT_HONEYPOT_NAME)]
    pub honeypot_name: String,

    /// Protocol recorded on every row
    #[arg(long, env = "HONEYPOT_PROTOCOL", default_value = DEFAULT_PROTOCOL)]
    pub protocol: String,

    /// Directory the recorder writes transcripts into
    #[arg(long, env = "CAPTURE_DIR", default_value = DEFAULT_CAPTURE_DIR)]
    pub capture_dir: PathBuf,

    /// Directory receiving byte-exact copies of ingested transcripts
    #[arg(long, env = "RAW_LOGS_DIR", default_value = DEFAULT_RAW_DIR)]
    pub raw_dir: PathBuf,

    /// Directory receiving `<session_id>.json` artifacts
    #[arg(long, env = "JSON_LOGS_DIR", default_value = DEFAULT_JSON_DIR)]
    pub json_dir: PathBuf,

    /// Capture file extension, without the dot
    #[arg(long, env = "CAPTURE_EXTENSION", default_value = DEFAULT_EXTENSION)]
    pub extension: String,

    #[arg(long, env = "SOURCE_MODE", value_enum, default_value_t = SourceMode::Watch)]
    pub mode: SourceMode,

    /// Seconds between directory scans in poll mode
    #[arg(long, env = "SCAN_INTERVAL_SECS", default_value_t = DEFAULT_SCAN_INTERVAL_SECS)]
    pub scan_interval_secs: u64,

    /// Quiet time after the last change notification before a file is tried
    #[arg(long, env = "GRACE_PERIOD_MS", default_value_t = DEFAULT_GRACE_PERIOD_MS)]
    pub grace_period_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            honeypot_name: DEFAULT_HONEYPOT_NAME.to_string(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            capture_dir: PathBuf::from(DEFAULT_CAPTURE_DIR),
            raw_dir: PathBuf::from(DEFAULT_RAW_DIR),
            json_dir: PathBuf::from(DEFAULT_JSON_DIR),
            extension: DEFAULT_EXTENSION.to_string(),
            mode: SourceMode::Watch,
            scan_interval_secs: DEFAULT_SCAN_INTERVAL_SECS,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file.
    ///
    /// The result is validated before being returned.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        let config = Config::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Config, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("database_url", self.database_url.trim().is_empty()),
            ("honeypot_name", self.honeypot_name.trim().is_empty()),
            ("protocol", self.protocol.trim().is_empty()),
            ("capture_dir", self.capture_dir.as_os_str().is_empty()),
            ("raw_dir", self.raw_dir.as_os_str().is_empty()),
            ("json_dir", self.json_dir.as_os_str().is_empty()),
            ("extension", self.extension.trim().is_empty()),
        ];
        if let Some((key, _)) = required.iter().find(|(_, missing)| *missing) {
            return Err(ConfigError::MissingValue(key.to_string()));
        }
        if self.extension.starts_with('.') {
            return Err(ConfigError::NotInRange(format!(
                "extension must not start with a dot: {}",
                self.extension
            )));
        }
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::NotInRange(
                "scan_interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Command line of the `honeytrace` binary.
#[derive(Parser, Debug)]
#[command(name = "honeytrace")]
#[command(version)]
#[command(about = "Ingests recorded SSH honeypot sessions into a datastore")]
pub struct Cli {
    /// Read settings from this TOML file; flags and environment variables
    /// still override it
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Process the files already present, then exit
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub once: bool,

    #[command(flatten)]
    pub settings: Config,
}

impl Cli {
    /// Parses `args`, keeping the matches so the origin of every setting can
    /// be told apart from its default.
    pub fn try_parse_with_sources<I, T>(args: I) -> Result<(Cli, ArgMatches), clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Cli::command().try_get_matches_from(args)?;
        let cli = Cli::from_arg_matches(&matches)?;
        Ok((cli, matches))
    }

    /// Resolves the effective configuration.
    ///
    /// With `--config`, the file replaces the defaults; settings given as flags
    /// or environment variables still take precedence over it.
    pub fn into_config(self, matches: &ArgMatches) -> Result<Config, ConfigError> {
        let Some(path) = self.config else {
            self.settings.validate()?;
            return Ok(self.settings);
        };
        let mut config = Config::read_file(&path)?;
        config.apply_explicit(&self.settings, matches);
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Copies every setting that `matches` saw on the command line or in the
    /// environment from `explicit` into `self`.
    fn apply_explicit(&mut self, explicit: &Config, matches: &ArgMatches) {
        macro_rules! take_explicit {
            ($($field:ident),* $(,)?) => {
                $(
                    if let Some(source) = explicit_source(matches, stringify!($field)) {
                        info!("{} from {} overrides the configuration file", stringify!($field), source);
                        self.$field = explicit.$field.clone();
                    }
                )*
            };
        }
        take_explicit!(
            database_url,
            honeypot_name,
            protocol,
            capture_dir,
            raw_dir,
            json_dir,
            extension,
            mode,
            scan_interval_secs,
            grace_period_ms,
        );
    }
}

fn explicit_source(matches: &ArgMatches, id: &str) -> Option<&'static str> {
    match matches.value_source(id) {
        Some(ValueSource::CommandLine) => Some("the command line"),
        Some(ValueSource::EnvVariable) => Some("the environment"),
        _ => None,
    }
}
