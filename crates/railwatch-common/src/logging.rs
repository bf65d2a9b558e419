//! ---
//! rw_section: "01-core-functionality"
//! rw_subsection: "module"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Shared primitives and utilities for the service runtime."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use std::fs;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::{self, time::UtcTime};
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "RAILWATCH_LOG";
const DEFAULT_DIRECTIVE: &str = "info";

static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// Console output style. The rolling file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structured-json" | "json" => Ok(LogFormat::StructuredJson),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format `{other}`; expected structured-json or pretty")),
        }
    }
}

/// Install the global subscriber: console output in `config.format` plus a
/// daily JSON file `<prefix>.<date>.log` under `config.directory`.
///
/// The filter comes from `RAILWATCH_LOG`, then `RUST_LOG`, then `info`. Per-tick
/// broadcast events sit at `trace`, so the default stays readable. Calling this
/// again once a subscriber is installed leaves the first one in place.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    let file_writer = daily_file_writer(service_name, config)?;

    let installed = tracing_subscriber::registry()
        .with(env_filter())
        .with(console_layer(config.format))
        .with(
            fmt::layer()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_writer(file_writer),
        )
        .try_init()
        .is_ok();

    if installed {
        info!(service = %service_name, log_dir = %config.directory.display(), format = ?config.format, "tracing initialised");
    } else {
        debug!(service = %service_name, "tracing subscriber already installed");
    }
    Ok(())
}

fn daily_file_writer(service_name: &str, config: &LoggingConfig) -> Result<NonBlocking> {
    fs::create_dir_all(&config.directory)
        .with_context(|| format!("unable to create log directory {}", config.directory.display()))?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(&config.directory)
        .with_context(|| format!("unable to open log file in {}", config.directory.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // The first guard flushes for the life of the process.
    let _ = FILE_GUARD.set(guard);
    Ok(writer)
}

fn console_layer<S>(format: LogFormat) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    let layer = fmt::layer::<S>().with_timer(UtcTime::rfc_3339());
    match format {
        LogFormat::StructuredJson => layer.json().with_target(false).boxed(),
        LogFormat::Pretty => layer.with_target(true).boxed(),
    }
}

fn env_filter() -> EnvFilter {
    let directive = filter_directive(
        std::env::var(LOG_ENV).ok(),
        std::env::var(EnvFilter::DEFAULT_ENV).ok(),
    );
    EnvFilter::try_new(&directive).unwrap_or_else(|err| {
        eprintln!("invalid log directive `{directive}` ({err}); using `{DEFAULT_DIRECTIVE}`");
        EnvFilter::new(DEFAULT_DIRECTIVE)
    })
}

fn filter_directive(railwatch_log: Option<String>, rust_log: Option<String>) -> String {
    railwatch_log
        .into_iter()
        .chain(rust_log)
        .find(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DIRECTIVE.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn log_format_parses_aliases() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::StructuredJson));
        assert_eq!("Pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn directive_prefers_railwatch_log_then_rust_log() {
        let own = Some("railwatch_hub=debug".to_owned());
        let rust = Some("warn".to_owned());
        assert_eq!(filter_directive(own, rust.clone()), "railwatch_hub=debug");
        assert_eq!(filter_directive(Some("  ".into()), rust), "warn");
        assert_eq!(filter_directive(None, None), DEFAULT_DIRECTIVE);
    }

    #[test]
    fn init_creates_log_directory() {
        let dir = tempdir().unwrap();
        let config = LoggingConfig {
            directory: dir.path().join("logs"),
            format: LogFormat::Pretty,
            file_prefix: Some("test".into()),
        };
        init_tracing("railwatch-test", &config).unwrap();
        assert!(config.directory.is_dir());
    }
}
