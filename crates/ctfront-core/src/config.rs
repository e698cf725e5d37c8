//! Configuration loading and typed config structures for ctfront.
//!
//! The configuration lives in `ctfront.yaml` (or the path named by
//! `CTFRONT_CONFIG`). Every field is optional; a missing file yields
//! [`CtfrontConfig::default`], which runs the demo Source into one debug Sink.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "CTFRONT_CONFIG";

/// Configuration file used when [`CONFIG_PATH_ENV`] is not set.
pub const DEFAULT_CONFIG_PATH: &str = "ctfront.yaml";

/// Shortest accepted gap between polls of a remote scoreboard.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Shortest accepted gap between demo actions.
pub const MIN_DEMO_INTERVAL: Duration = Duration::from_millis(10);

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CtfrontConfig {
    /// Which Source to run and how.
    #[serde(default)]
    pub source: SourceConfig,

    /// Sinks to run, in registration order.
    #[serde(default = "default_sinks")]
    pub sinks: Vec<SinkConfig>,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for CtfrontConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            sinks: default_sinks(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CtfrontConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `CTFRONT_URL` overrides `source.url`
    /// - `CTFRONT_BACKEND` overrides `source.backend`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.source.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string. No environment overrides are
    /// applied.
    ///
    /// An empty document yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }
}

/// Source selection and per-backend settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceConfig {
    /// Backend name: `auto`, `ctfd`, `rctf`, `angstrom`, `demo` or `replay`.
    ///
    /// Validated when the Source is built, not when the file is parsed.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Scoreboard URL. Required by `auto` and every platform backend.
    #[serde(default)]
    pub url: Option<String>,

    /// Seconds between polls of a remote scoreboard.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// CTFd API token or rCTF team token. Those backends only fetch
    /// challenges and solves when one is set.
    #[serde(default)]
    pub api_token: Option<String>,

    /// JSON file of recorded snapshots for the replay backend.
    #[serde(default)]
    pub replay_path: Option<String>,

    /// Milliseconds between replayed snapshots.
    #[serde(default = "default_replay_interval_ms")]
    pub replay_interval_ms: u64,

    /// Seed for the demo backend. Random when unset.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Milliseconds between demo actions.
    #[serde(default = "default_demo_interval_ms")]
    pub demo_interval_ms: u64,
}

impl SourceConfig {
    /// Override fields from `CTFRONT_URL` and `CTFRONT_BACKEND` when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Gap between polls of a remote scoreboard, at least
    /// [`MIN_POLL_INTERVAL`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs).max(MIN_POLL_INTERVAL)
    }

    /// Gap between demo actions, at least [`MIN_DEMO_INTERVAL`].
    pub fn demo_interval(&self) -> Duration {
        Duration::from_millis(self.demo_interval_ms).max(MIN_DEMO_INTERVAL)
    }

    /// Gap between replayed snapshots. Zero plays the recording at once.
    pub const fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay_interval_ms)
    }

    /// Override fields from an arbitrary key lookup.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("CTFRONT_URL") {
            self.url = Some(val);
        }
        if let Some(val) = lookup("CTFRONT_BACKEND") {
            self.backend = val;
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            url: None,
            poll_interval_secs: default_poll_interval_secs(),
            api_token: None,
            replay_path: None,
            replay_interval_ms: default_replay_interval_ms(),
            seed: None,
            demo_interval_ms: default_demo_interval_ms(),
        }
    }
}

/// One configured Sink.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    /// Line-per-event log on stdout.
    Debug,
    /// Live ranking table.
    Board(BoardConfig),
}

impl SinkConfig {
    /// The `kind` name this entry was configured with.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Board(_) => "board",
        }
    }
}

/// Settings for the board Sink.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoardConfig {
    /// Number of ranking rows shown before the cut.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Regexes for team names that stay visible below the cut.
    #[serde(default)]
    pub focus_teams: Vec<String>,

    /// Milliseconds between idle redraws.
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            focus_teams: Vec::new(),
            refresh_ms: default_refresh_ms(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_sinks() -> Vec<SinkConfig> {
    vec![SinkConfig::Debug]
}

fn default_backend() -> String {
    "demo".to_owned()
}

const fn default_poll_interval_secs() -> u64 {
    30
}

const fn default_replay_interval_ms() -> u64 {
    1000
}

const fn default_demo_interval_ms() -> u64 {
    1000
}

const fn default_max_length() -> usize {
    20
}

const fn default_refresh_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_owned()
}
