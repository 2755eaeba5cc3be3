//! Structured logging setup.
//!
//! Tracing-based logging with environment variable configuration, span
//! events for the dispatch path, and human-readable or JSON output.
//!
//! Initialization is optional: the crate only emits `tracing` events, so
//! embedders with their own subscriber can ignore this module entirely.

use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace level: most detailed debugging information.
    Trace,
    /// Debug level: detailed debugging information.
    Debug,
    /// Info level: important lifecycle events.
    Info,
    /// Warn level: potential issues.
    Warn,
    /// Error level: error information.
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable formatted output.
    Pretty,
    /// Compact format.
    Compact,
    /// JSON format for production environments.
    Json,
}

/// Log configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level.
    pub level: LogLevel,
    /// Log format.
    pub format: LogFormat,
    /// Whether to show thread IDs.
    pub show_thread_ids: bool,
    /// Whether to show target module.
    pub show_target: bool,
    /// Whether to show span events (dispatch enter/exit).
    pub show_span_events: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            show_thread_ids: false,
            show_target: true,
            show_span_events: false,
        }
    }
}

impl LogConfig {
    /// Creates a log configuration for development environments.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            show_thread_ids: false,
            show_target: true,
            show_span_events: true,
        }
    }

    /// Creates a log configuration for production environments.
    #[must_use]
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            show_thread_ids: true,
            show_target: true,
            show_span_events: false,
        }
    }

    /// Creates a log configuration for test environments.
    #[must_use]
    pub fn test() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            show_thread_ids: false,
            show_target: false,
            show_span_events: false,
        }
    }
}

fn build_layer(config: &LogConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("unihttp={}", config.level)));

    let span_events = if config.show_span_events {
        FmtSpan::ENTER | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_timer(fmt::time::time())
        .with_thread_ids(config.show_thread_ids)
        .with_target(config.show_target)
        .with_span_events(span_events);

    match config.format {
        LogFormat::Pretty => fmt_layer.pretty().with_filter(env_filter).boxed(),
        LogFormat::Compact => fmt_layer.compact().with_filter(env_filter).boxed(),
        LogFormat::Json => fmt_layer.json().with_filter(env_filter).boxed(),
    }
}

/// Initializes the logging system.
///
/// Panics if a global subscriber is already set; use [`try_init_logging`]
/// where double initialization is possible.
///
/// # Examples
///
/// ```no_run
/// use unihttp::logging::{init_logging, LogConfig};
///
/// init_logging(&LogConfig::development());
/// ```
pub fn init_logging(config: &LogConfig) {
    tracing_subscriber::registry().with(build_layer(config)).init();
}

/// Attempts to initialize the logging system, ignoring duplicate
/// initialization errors. Suitable for tests.
pub fn try_init_logging(config: &LogConfig) {
    let _ = tracing_subscriber::registry()
        .with(build_layer(config))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
    }

    #[test]
    fn test_log_level_display() {
        assert_eq!(LogLevel::Debug.to_string(), "debug");
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }

    #[test]
    fn test_log_config_presets() {
        let dev = LogConfig::development();
        assert_eq!(dev.level, LogLevel::Debug);
        assert!(dev.show_span_events);

        let prod = LogConfig::production();
        assert_eq!(prod.format, LogFormat::Json);
        assert!(prod.show_thread_ids);

        let test = LogConfig::test();
        assert_eq!(test.level, LogLevel::Warn);
        assert_eq!(test.format, LogFormat::Compact);
    }

    #[test]
    fn test_try_init_logging_is_idempotent() {
        try_init_logging(&LogConfig::test());
        try_init_logging(&LogConfig::test());
    }
}
