//! Environment-driven configuration
//!
//! Read once when a session is opened.

use super::error::{LoggerError, Result};
use super::index::DEFAULT_INDEX_DIR;
use super::log_level::LogLevel;
use super::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_LOGFILE: &str = "SIPLOG_LOGFILE_FILE";
pub const ENV_LEVEL: &str = "SIPLOG_LVL";
pub const ENV_BACKEND: &str = "SIPLOG_BEND";
pub const ENV_INDEX_DIR: &str = "SIPLOG_INDEX_DIR";
pub const ENV_COLOR: &str = "SIPLOG_COLOR";

pub const DEFAULT_LOG_PATH: &str = "/var/log/sip.log";

/// Which backend a session writes through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Standard error, one line per write
    #[default]
    Stderr,
    /// Synchronous append to the log file
    Logfile,
    /// Append to the log file from the background worker
    LogfileAsync,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Stderr => "stderr",
            BackendKind::Logfile => "logfile",
            BackendKind::LogfileAsync => "logfile_async",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stderr" => Ok(BackendKind::Stderr),
            "logfile" => Ok(BackendKind::Logfile),
            "logfile_async" => Ok(BackendKind::LogfileAsync),
            other => Err(LoggerError::config(
                ENV_BACKEND,
                format!("unknown backend '{}'", other),
            )),
        }
    }
}

/// Session configuration
///
/// # Example
///
/// ```
/// use rust_session_logger::{BackendKind, LogConfig, LogLevel};
///
/// let config = LogConfig::default()
///     .with_path("/tmp/sip.log")
///     .with_backend(BackendKind::LogfileAsync)
///     .with_level(LogLevel::Info)
///     .without_index();
/// assert!(config.index_dir.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub path: PathBuf,
    pub level: LogLevel,
    pub backend: BackendKind,
    /// `None` disables index side files
    pub index_dir: Option<PathBuf>,
    pub timestamp_format: TimestampFormat,
    /// Colour the stderr prefix by severity (needs the `console` feature)
    pub colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_LOG_PATH),
            level: LogLevel::Debug,
            backend: BackendKind::Stderr,
            index_dir: Some(PathBuf::from(DEFAULT_INDEX_DIR)),
            timestamp_format: TimestampFormat::default(),
            colors: false,
        }
    }
}

impl LogConfig {
    /// Build a configuration from the process environment.
    ///
    /// Unknown level or backend names keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup(ENV_LOGFILE) {
            config.path = PathBuf::from(path);
        }
        if let Some(level) = lookup(ENV_LEVEL).and_then(|l| l.parse().ok()) {
            config.level = level;
        }
        if let Some(backend) = lookup(ENV_BACKEND).and_then(|b| b.parse().ok()) {
            config.backend = backend;
        }
        if let Some(dir) = lookup(ENV_INDEX_DIR) {
            config.index_dir = match dir.as_str() {
                "" | "none" => None,
                _ => Some(PathBuf::from(dir)),
            };
        }
        if let Some(colors) = lookup(ENV_COLOR) {
            config.colors = matches!(colors.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }

        config
    }

    /// Load a configuration from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn with_index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn without_index(mut self) -> Self {
        self.index_dir = None;
        self
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    #[must_use]
    pub fn with_colors(mut self, colors: bool) -> Self {
        self.colors = colors;
        self
    }
}
