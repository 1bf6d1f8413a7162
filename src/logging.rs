//! Logging configuration using tracing
//!
//! Structured logging to stderr. The line prefix comes from an explicit
//! [`LoggingConfig`] handed to [`init`]; `RUST_LOG` still overrides the level.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default line prefix. `SEVERITY` and `TIMESTAMP` are substituted per event.
pub const DEFAULT_TEMPLATE: &str = "[Issue Synchronizer] [SEVERITY] TIMESTAMP";

/// Output style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// One line per event, prefixed by the configured template
    #[default]
    Template,
    /// Multi-line human readable output with targets and line numbers
    Pretty,
}

/// Logger settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset (e.g. "info", "issue_syncer=debug")
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Prefix template for [`LogFormat::Template`]
    #[serde(default = "default_template")]
    pub template: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            template: default_template(),
        }
    }
}

impl LoggingConfig {
    /// Template-formatted logging with a custom prefix
    pub fn with_template(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            ..Self::default()
        }
    }
}

/// Event formatter that renders `template` before the event fields.
pub struct TemplateFormat {
    template: String,
}

impl TemplateFormat {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    fn prefix(&self, severity: &str, timestamp: &str) -> String {
        self.template
            .replace("SEVERITY", severity)
            .replace("TIMESTAMP", timestamp)
    }
}

impl<S, N> FormatEvent<S, N> for TemplateFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let prefix = self.prefix(event.metadata().level().as_str(), &timestamp);
        write!(writer, "{} ", prefix)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Initialize the tracing subscriber
///
/// # Example RUST_LOG values
/// - `RUST_LOG=debug` - Show debug and above
/// - `RUST_LOG=issue_syncer=trace,reqwest=info` - Different levels per crate
///
/// # Errors
/// Returns an error if the subscriber has already been initialized
pub fn init(config: &LoggingConfig) -> crate::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format {
        LogFormat::Template => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .event_format(TemplateFormat::new(config.template.clone())),
            )
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true)
                    .pretty(),
            )
            .try_init(),
    };

    result.map_err(|e| crate::SyncError::Other(format!("Failed to initialize tracing: {}", e)))
}

/// Initialize logging for tests (no-op if already initialized)
pub fn init_test() {
    let _ = init(&LoggingConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_prefix() {
        let format = TemplateFormat::new(DEFAULT_TEMPLATE);
        assert_eq!(
            format.prefix("WARN", "2025-01-01T00:00:00.000Z"),
            "[Issue Synchronizer] [WARN] 2025-01-01T00:00:00.000Z"
        );
    }

    #[test]
    fn test_custom_template() {
        let format = TemplateFormat::new("TIMESTAMP SEVERITY |");
        assert_eq!(format.prefix("INFO", "t0"), "t0 INFO |");
    }

    #[test]
    fn test_config_from_yaml() {
        let config: LoggingConfig = serde_yaml::from_str("format: pretty\nlevel: debug\n").unwrap();
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.level, "debug");
        assert_eq!(config.template, DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_init_test_helper() {
        // Should never panic
        init_test();
        init_test();
    }

    #[test]
    fn test_logging_macros() {
        init_test();
        tracing::debug!("This is a debug message");
        tracing::info!(issue = "cases/1", "Structured message");
        tracing::warn!("This is a warning message");
    }
}
