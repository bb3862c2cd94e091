//! Logging setup for Waypoint services.
//!
//! Built on `tracing-subscriber`. Dispatch opens a `dispatch` span per
//! message, so enabling `logging.span_events` shows each message's lifecycle.
//!
//! ```rust,ignore
//! use waypoint_runtime::{config::load_config, logging};
//!
//! let config = load_config()?;
//! logging::init_from_config(&config.logging);
//! ```
//!
//! Extra directives can be layered over a loaded config:
//!
//! ```rust,ignore
//! LoggingBuilder::from_config(&config.logging)
//!     .directive("waypoint_framework::dispatcher=trace")
//!     .try_init()?;
//! ```

use std::ffi::OsStr;
use std::path::Path;

use tracing::warn;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};

const DEFAULT_LOG_FILE: &str = "waypoint.log";

impl SpanEventConfig {
    fn to_fmt_span(&self) -> FmtSpan {
        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(enabled, _)| *enabled)
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

/// Initializes logging from a [`LoggingConfig`].
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// A [`LoggingConfig`] plus filter directives, ready to install.
#[derive(Debug)]
pub struct LoggingBuilder<'a> {
    config: &'a LoggingConfig,
    level: tracing::Level,
    directives: Vec<String>,
}

impl<'a> LoggingBuilder<'a> {
    pub fn from_config(config: &'a LoggingConfig) -> Self {
        Self {
            config,
            level: config.level.to_tracing_level(),
            directives: config
                .filters
                .iter()
                .map(|(module, level)| format!("{module}={level}"))
                .collect(),
        }
    }

    /// Overrides the configured base level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `waypoint_framework=trace`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    /// `RUST_LOG` if set, otherwise the base level, plus directives.
    /// Directives that fail to parse are skipped.
    fn build_filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        self.directives.iter().filter_map(|d| d.parse::<Directive>().ok()).fold(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base)),
            EnvFilter::add_directive,
        )
    }

    /// Installs the global subscriber, failing if one is already set.
    pub fn try_init(self) -> Result<(), TryInitError> {
        let filter = self.build_filter();
        let config = self.config;
        let span_events = config.span_events.to_fmt_span();

        macro_rules! install {
            ($layer:expr) => {
                tracing_subscriber::registry()
                    .with($layer)
                    .with(filter)
                    .try_init()
            };
        }

        macro_rules! with_format {
            ($writer:expr) => {{
                let layer = fmt::layer()
                    .with_writer($writer)
                    .with_span_events(span_events)
                    .with_thread_ids(config.thread_ids)
                    .with_file(config.file_location)
                    .with_line_number(config.file_location);
                match config.format {
                    #[cfg(feature = "json-log")]
                    LogFormat::Json => install!(layer.json()),
                    LogFormat::Compact => install!(layer.compact()),
                    LogFormat::Full => install!(layer),
                    LogFormat::Pretty => install!(layer.pretty()),
                }
            }};
        }

        match (config.output, &config.file_path) {
            (LogOutput::Stdout, _) => with_format!(std::io::stdout),
            (LogOutput::Stderr, _) => with_format!(std::io::stderr),
            (LogOutput::File, Some(path)) => {
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                let file = path
                    .file_name()
                    .unwrap_or_else(|| OsStr::new(DEFAULT_LOG_FILE));
                let appender = match config.rotation {
                    LogRotation::Never => tracing_appender::rolling::never(dir, file),
                    LogRotation::Hourly => tracing_appender::rolling::hourly(dir, file),
                    LogRotation::Daily => tracing_appender::rolling::daily(dir, file),
                };
                with_format!(appender)
            }
            (LogOutput::File, None) => {
                warn!("File output requested but no file path configured, falling back to stdout");
                with_format!(std::io::stdout)
            }
        }
    }
}
