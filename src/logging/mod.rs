//! Logging infrastructure - structured tracing for the bridge
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Per-subsystem targets (`heap`, `error`, `iter`, `call`, `convert`, `types`)
//! - Zero-cost when disabled
//! - Console or rolling-file output, pretty/compact/JSON formats
//!
//! The library never installs a subscriber on its own; `init` does.

use std::path::PathBuf;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::runtime::PyObject;

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, trace, warn, Level};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, multi-line
    #[default]
    Pretty,
    /// One line per event
    Compact,
    /// Structured JSON lines
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// Daily-rotated file
    File { directory: PathBuf, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Emit span enter/close events
    pub span_events: bool,
    /// Extra filter directives, e.g. `"pybridge::adapters=trace"`
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // PYBRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Some(level) = std::env::var("PYBRIDGE_LOG_LEVEL").ok().and_then(|v| parse_level(&v)) {
            config.level = level;
        }

        // PYBRIDGE_LOG_FORMAT: pretty, compact, json
        if let Some(format) = std::env::var("PYBRIDGE_LOG_FORMAT").ok().and_then(|v| LogFormat::parse(&v)) {
            config.format = format;
        }

        // PYBRIDGE_LOG_FILE: directory for rotated log files
        if let Ok(directory) = std::env::var("PYBRIDGE_LOG_FILE") {
            config.output = LogOutput::File {
                directory: PathBuf::from(directory),
                prefix: "pybridge".to_string(),
            };
        }

        config.span_events = std::env::var("PYBRIDGE_LOG_SPANS").is_ok();
        config
    }
}

/// Parse a level name, case-insensitive
pub fn parse_level(value: &str) -> Option<Level> {
    match value.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}

/// Initialize logging from the environment
pub fn init() -> Option<WorkerGuard> {
    init_with_config(LogConfig::from_env())
}

/// Install the global subscriber
///
/// Only the first call has an effect. The returned guard flushes the
/// non-blocking writer when dropped; keep it alive for the program's lifetime.
pub fn init_with_config(config: LogConfig) -> Option<WorkerGuard> {
    let mut guard = None;
    LOGGER_INITIALIZED.get_or_init(|| {
        guard = install(&config);
    });
    guard
}

fn install(config: &LogConfig) -> Option<WorkerGuard> {
    let filter = build_filter(config);
    let spans = span_events_config(config.span_events);

    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, prefix))
        }
    };

    let layer = match config.format {
        LogFormat::Pretty => fmt::layer().with_writer(writer).pretty().with_span_events(spans).boxed(),
        LogFormat::Compact => fmt::layer().with_writer(writer).compact().with_span_events(spans).boxed(),
        LogFormat::Json => fmt::layer().with_writer(writer).json().with_span_events(spans).boxed(),
    };

    // another subscriber may already be installed by the host
    match tracing_subscriber::registry().with(layer.with_filter(filter)).try_init() {
        Ok(()) => Some(guard),
        Err(_) => None,
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base = EnvFilter::builder()
        .with_default_directive(config.level.into())
        .from_env_lossy();

    match &config.filter {
        Some(directives) => directives.split(',').fold(base, |filter, directive| {
            match directive.trim().parse() {
                Ok(parsed) => filter.add_directive(parsed),
                Err(_) => {
                    warn!("Invalid filter directive: {}", directive);
                    filter
                }
            }
        }),
        None => base,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Bridge-specific logging functions
// ============================================================================

#[inline]
pub fn log_alloc(obj: PyObject, type_name: &str) {
    trace!(target: "heap", event = "alloc", object = ?obj, type_name, "object allocated");
}

#[inline]
pub fn log_acquire(obj: PyObject, count: usize) {
    trace!(target: "heap", event = "acquire", object = ?obj, count, "reference acquired");
}

#[inline]
pub fn log_release(obj: PyObject, count: usize) {
    trace!(target: "heap", event = "release", object = ?obj, count, "reference released");
}

#[inline]
pub fn log_dealloc(obj: PyObject, type_name: &str) {
    trace!(target: "heap", event = "dealloc", object = ?obj, type_name, "object deallocated");
}

#[inline]
pub fn log_raise(kind: &str, message: &str) {
    debug!(target: "error", event = "raise", kind, message, "error raised");
}

#[inline]
pub fn log_clear(kind: &str) {
    debug!(target: "error", event = "clear", kind, "error cleared");
}

pub fn log_type_registered(name: &str, rust_type: &str) {
    debug!(target: "types", event = "type_registered", name, rust_type, "native type registered");
}

#[inline]
pub fn log_iteration_start(type_name: &str) {
    trace!(target: "iter", event = "iteration_start", type_name, "foreign iteration started");
}

#[inline]
pub fn log_iteration_end(elements: usize) {
    trace!(target: "iter", event = "iteration_end", elements, "foreign iteration exhausted");
}

#[inline]
pub fn log_call(function: &str, args: usize) {
    trace!(target: "call", event = "call", function, args, "peer call");
}

#[inline]
pub fn log_call_failed(function: &str) {
    debug!(target: "call", event = "call_failed", function, "peer call raised");
}

/// `site` names what was being converted, e.g. `"element"` or `"argument"`
#[inline]
pub fn log_conversion_failed(site: &str, index: usize) {
    debug!(target: "convert", event = "conversion_failed", site, index, "conversion failed");
}

pub fn log_runtime_init() {
    info!(target: "runtime", event = "runtime_init", "pybridge initialized");
}

pub fn log_runtime_shutdown(live_objects: usize) {
    info!(target: "runtime", event = "runtime_shutdown", live_objects, "pybridge shutting down");
}
