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
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_server_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8000))
}

fn default_keepalive_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_tick_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_defect_probability() -> f64 {
    0.05
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9899))
}

/// Primary configuration object for the RailWatch daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
///
/// `source` is `None` when no file was found and built-in defaults apply.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: Option<PathBuf>,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "RAILWATCH_CONFIG";

    /// Load configuration together with the effective source path.
    ///
    /// `explicit` (the `--config` flag) wins, then `RAILWATCH_CONFIG`; a path
    /// named either way must exist and parse. Otherwise the first existing
    /// candidate is used, and the built-in defaults when none exist.
    pub fn load_with_source<P: AsRef<Path>>(
        explicit: Option<&Path>,
        candidates: &[P],
    ) -> Result<LoadedAppConfig> {
        let env_path = std::env::var(Self::ENV_CONFIG_PATH)
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        Self::resolve(explicit.map(Path::to_path_buf).or(env_path), candidates)
    }

    fn resolve<P: AsRef<Path>>(explicit: Option<PathBuf>, candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Some(path) = explicit {
            let config = Self::from_path(&path)?;
            return Ok(LoadedAppConfig {
                config,
                source: Some(path),
            });
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if path.exists() {
                let config = Self::from_path(path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: Some(path.to_path_buf()),
                });
            }
        }

        debug!(
            inspected = %candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            "no configuration file found; using defaults"
        );
        Ok(LoadedAppConfig {
            config: Self::default(),
            source: None,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<AppConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.stream.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Listener and per-connection settings for the websocket endpoint.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_listen")]
    pub listen: SocketAddr,
    #[serde(default = "default_keepalive_interval", rename = "keepalive_interval_secs")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub keepalive_interval: Duration,
    #[serde(default = "default_send_timeout", rename = "send_timeout_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub send_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_server_listen(),
            keepalive_interval: default_keepalive_interval(),
            send_timeout: default_send_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.keepalive_interval.is_zero() {
            return Err(anyhow!("server.keepalive_interval_secs must be greater than zero"));
        }
        if self.send_timeout.is_zero() {
            return Err(anyhow!("server.send_timeout_ms must be greater than zero"));
        }
        Ok(())
    }
}

/// Settings for the synthetic telemetry stream.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default = "default_tick_interval", rename = "tick_interval_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub tick_interval: Duration,
    #[serde(default = "default_defect_probability")]
    pub defect_probability: f64,
    /// Fixed RNG seed; entropy is used when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            tick_interval: default_tick_interval(),
            defect_probability: default_defect_probability(),
            seed: None,
        }
    }
}

impl StreamConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(anyhow!("stream.tick_interval_ms must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.defect_probability) {
            return Err(anyhow!(
                "stream.defect_probability must lie within [0, 1], got {}",
                self.defect_probability
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            listen: default_metrics_listen(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn empty_document_yields_defaults() {
        let config: AppConfig = "".parse().unwrap();
        assert_eq!(config.server.listen.port(), 8000);
        assert_eq!(config.server.keepalive_interval, Duration::from_secs(30));
        assert_eq!(config.stream.tick_interval, Duration::from_millis(250));
        assert_eq!(config.stream.defect_probability, 0.05);
        assert!(config.stream.seed.is_none());
        assert_eq!(config.logging.format, LogFormat::StructuredJson);
    }

    #[test]
    fn parses_all_sections() {
        let config: AppConfig = r#"
            [server]
            listen = "127.0.0.1:9000"
            keepalive_interval_secs = 10
            send_timeout_ms = 750

            [stream]
            tick_interval_ms = 100
            defect_probability = 0.5
            seed = 7

            [logging]
            directory = "/tmp/railwatch"
            format = "pretty"

            [metrics]
            enabled = false
        "#
        .parse()
        .unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.server.keepalive_interval, Duration::from_secs(10));
        assert_eq!(config.server.send_timeout, Duration::from_millis(750));
        assert_eq!(config.stream.tick_interval, Duration::from_millis(100));
        assert_eq!(config.stream.seed, Some(7));
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn shipped_sample_matches_defaults() {
        let sample: AppConfig = include_str!("../../../configs/railwatch.toml")
            .parse()
            .unwrap();
        let defaults = AppConfig::default();
        assert_eq!(sample.server.listen, defaults.server.listen);
        assert_eq!(sample.server.send_timeout, defaults.server.send_timeout);
        assert_eq!(sample.stream.tick_interval, defaults.stream.tick_interval);
        assert_eq!(sample.metrics.listen, defaults.metrics.listen);
    }

    #[test]
    fn rejects_out_of_range_defect_probability() {
        let err = "[stream]\ndefect_probability = 1.5\n"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("defect_probability"));
    }

    #[test]
    fn rejects_zero_intervals() {
        assert!("[stream]\ntick_interval_ms = 0\n".parse::<AppConfig>().is_err());
        assert!("[server]\nsend_timeout_ms = 0\n".parse::<AppConfig>().is_err());
        assert!("[server]\nkeepalive_interval_secs = 0\n"
            .parse::<AppConfig>()
            .is_err());
    }

    #[test]
    fn missing_candidates_fall_back_to_defaults() {
        let loaded = AppConfig::resolve(None, &["does/not/exist.toml"]).unwrap();
        assert!(loaded.source.is_none());
        assert_eq!(loaded.config.stream.tick_interval, Duration::from_millis(250));
    }

    #[test]
    fn first_existing_candidate_wins() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "[stream]\nseed = 42")?;
        file.flush()?;
        let loaded = AppConfig::resolve(None, &[Path::new("missing.toml"), file.path()])?;
        assert_eq!(loaded.source.as_deref(), Some(file.path()));
        assert_eq!(loaded.config.stream.seed, Some(42));
        Ok(())
    }

    #[test]
    fn explicit_path_must_exist() -> Result<()> {
        let mut fallback = NamedTempFile::new()?;
        writeln!(fallback, "[stream]\nseed = 1")?;
        fallback.flush()?;

        let err = AppConfig::resolve(Some(PathBuf::from("does/not/exist.toml")), &[fallback.path()])
            .unwrap_err();
        assert!(format!("{err:#}").contains("does/not/exist.toml"));

        let loaded = AppConfig::resolve(Some(fallback.path().to_path_buf()), &["configs/other.toml"])?;
        assert_eq!(loaded.config.stream.seed, Some(1));
        Ok(())
    }

    #[test]
    fn missing_env_config_path_is_an_error() -> Result<()> {
        let mut fallback = NamedTempFile::new()?;
        writeln!(fallback, "[stream]\nseed = 1")?;
        fallback.flush()?;

        std::env::set_var(AppConfig::ENV_CONFIG_PATH, "does/not/exist-env.toml");
        let result = AppConfig::load_with_source(None, &[fallback.path()]);
        std::env::remove_var(AppConfig::ENV_CONFIG_PATH);

        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("exist-env.toml"));
        Ok(())
    }
}
