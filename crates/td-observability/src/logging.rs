//! Logging infrastructure for Triage Desk.
//!
//! Structured logging through the tracing ecosystem. `RUST_LOG` overrides the
//! configured level when set.

use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

/// Crates whose events are kept by the default filter.
const CRATES: [&str; 3] = ["td_core", "td_observability", "triage_desk"];

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level.
    pub level: Level,
    /// Whether to use JSON format.
    pub json_format: bool,
    /// Whether to log span open/close events.
    pub include_spans: bool,
    /// Whether to include file/line info.
    pub include_location: bool,
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: false,
            include_location: false,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    /// Verbose output for local work.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            json_format: false,
            include_spans: true,
            include_location: true,
            include_target: true,
        }
    }

    /// JSON output for log aggregation.
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            json_format: true,
            include_spans: false,
            include_location: false,
            include_target: true,
        }
    }

    /// Builds a config from a level name such as `"debug"`. Unknown names
    /// fall back to `info`.
    pub fn from_settings(level: &str, json_format: bool) -> Self {
        let base = if json_format {
            Self::production()
        } else {
            Self::default()
        };
        Self {
            level: Level::from_str(level.trim()).unwrap_or(Level::INFO),
            ..base
        }
    }

    fn filter_directives(&self) -> String {
        CRATES
            .iter()
            .map(|krate| format!("{}={}", krate, self.level))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Initializes logging with the default configuration.
pub fn init_logging() -> Result<(), TryInitError> {
    init_logging_with_config(LoggingConfig::default())
}

/// Initializes logging with the given configuration. Output goes to stderr.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with_config(config: LoggingConfig) -> Result<(), TryInitError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    if config.json_format {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_span_events(span_events)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_target(config.include_target);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(LoggingConfig::default().level, Level::INFO);
        assert!(!LoggingConfig::default().json_format);
        assert_eq!(LoggingConfig::development().level, Level::DEBUG);
        assert!(LoggingConfig::production().json_format);
    }

    #[test]
    fn test_from_settings() {
        let config = LoggingConfig::from_settings("Debug", true);
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.json_format);

        assert_eq!(LoggingConfig::from_settings("loud", false).level, Level::INFO);
    }

    #[test]
    fn test_filter_covers_workspace_crates() {
        let directives = LoggingConfig::development().filter_directives();
        assert_eq!(
            directives,
            "td_core=DEBUG,td_observability=DEBUG,triage_desk=DEBUG"
        );
    }
}
