//! Bridge configuration - TOML file plus environment overrides
//!
//! Only `runtime` and `iteration` are consulted on hot paths; those values are
//! published process-wide through `apply` and read back with `settings`.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::logging::{parse_level, LogConfig, LogFormat, LogOutput};

/// File name searched for by `BridgeConfig::discover`
pub const CONFIG_FILE_NAME: &str = ".pybridge.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub logging: LoggingSection,

    #[serde(default)]
    pub runtime: RuntimeSection,

    #[serde(default)]
    pub iteration: IterationSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Directory for daily-rotated log files; stderr when absent
    #[serde(default)]
    pub file: Option<PathBuf>,

    #[serde(default = "default_false")]
    pub span_events: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSection {
    /// Trace event for every acquire/release
    #[serde(default = "default_false")]
    pub trace_refcounts: bool,

    /// Panic (debug builds) when raising over a pending error
    #[serde(default = "default_false")]
    pub strict_indicator: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSection {
    #[serde(default = "default_true")]
    pub reserve_from_length_hint: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Pretty,
            file: None,
            span_events: false,
        }
    }
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            trace_refcounts: false,
            strict_indicator: false,
        }
    }
}

impl Default for IterationSection {
    fn default() -> Self {
        Self {
            reserve_from_length_hint: true,
        }
    }
}

fn default_level() -> String { "info".to_string() }
fn default_true() -> bool { true }
fn default_false() -> bool { false }

/// Failure to load a configuration file
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: io::Error },
    Parse { path: Option<PathBuf>, source: toml::de::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path: Some(path), source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path: None, source } => write!(f, "failed to parse config: {}", source),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: Some(path.to_path_buf()),
            source,
        })
    }

    /// Parse configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse { path: None, source })
    }

    /// `PYBRIDGE_CONFIG` file if set, else defaults; `PYBRIDGE_LOG_LEVEL` wins over both
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os("PYBRIDGE_CONFIG") {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };

        if let Ok(level) = std::env::var("PYBRIDGE_LOG_LEVEL") {
            config.logging.level = level;
        }
        Ok(config)
    }

    /// Load the nearest `.pybridge.toml` in `start` or its parents
    ///
    /// `None` when there is no such file; a file that fails to load is
    /// reported rather than skipped.
    pub fn discover(start: &Path) -> Option<Result<Self, ConfigError>> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file())
            .map(|path| Self::load(&path))
    }

    /// Subscriber settings for `logging::init_with_config`
    pub fn log_config(&self) -> LogConfig {
        let mut config = LogConfig::new()
            .with_format(self.logging.format)
            .with_span_events(self.logging.span_events);

        if let Some(level) = parse_level(&self.logging.level) {
            config = config.with_level(level);
        }
        if let Some(directory) = &self.logging.file {
            config = config.with_output(LogOutput::File {
                directory: directory.clone(),
                prefix: "pybridge".to_string(),
            });
        }
        config
    }

    /// Snapshot of the values the runtime reads
    pub fn settings(&self) -> Settings {
        Settings {
            trace_refcounts: self.runtime.trace_refcounts,
            strict_indicator: self.runtime.strict_indicator,
            reserve_from_length_hint: self.iteration.reserve_from_length_hint,
        }
    }
}

/// Runtime-visible settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub trace_refcounts: bool,
    pub strict_indicator: bool,
    pub reserve_from_length_hint: bool,
}

impl Default for Settings {
    fn default() -> Self {
        BridgeConfig::default().settings()
    }
}

static SETTINGS: Lazy<RwLock<Settings>> = Lazy::new(|| RwLock::new(Settings::default()));

/// Current settings
#[inline]
pub fn settings() -> Settings {
    *SETTINGS.read()
}

/// Publish the runtime sections of `config`
pub fn apply(config: &BridgeConfig) {
    *SETTINGS.write() = config.settings();
}
