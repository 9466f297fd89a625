//! Configuration management for the dashboard client
//!
//! Layered loading: struct defaults, then an optional TOML file, then
//! `SENSORVIEW_*` environment overrides, then validation. `init-config`
//! writes the default layer back out as a starter file.

use crate::error::{Result, SensorViewError};
use crate::model::GeoPoint;
use crate::poll::PollConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, time::Duration};
use tracing::{debug, info};
use url::Url;

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Backend connection
    pub backend: BackendConfig,

    /// Polling behavior
    pub poll: PollSettings,

    /// Report export
    pub report: ReportSettings,

    /// Map view
    pub map: MapSettings,

    /// Notice toasts
    pub notices: NoticeSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Backend base URL (e.g. "http://127.0.0.1:8000")
    pub url: Url,

    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,
}

/// Polling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    /// Delay between poll ticks
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

/// Report export configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Directory report files are written into
    pub out_dir: PathBuf,

    /// How far past the end bound the boundary reading may sit
    #[serde(with = "humantime_serde")]
    pub boundary_margin: Duration,
}

/// Map view configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MapSettings {
    /// Positions for nodes that do not report their own location
    pub assigned: BTreeMap<String, GeoPoint>,
}

/// Notice toast configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoticeSettings {
    /// Auto-dismiss delay
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8000".parse().unwrap(),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("."),
            boundary_margin: Duration::from_secs(3600),
        }
    }
}

impl Default for NoticeSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Default location: `<config dir>/sensorview/config.toml`
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sensorview")
            .join("config.toml")
    }

    /// Layered load: defaults, then the TOML file when present, then
    /// environment overrides
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);

        let mut config = if path.exists() {
            let content = tokio::fs::read_to_string(&path).await?;
            debug!(path = %path.display(), "loaded configuration file");
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = env::var("SENSORVIEW_BACKEND_URL") {
            self.backend.url = url.parse().map_err(|e| {
                SensorViewError::config(format!("Invalid SENSORVIEW_BACKEND_URL: {e}"))
            })?;
        }

        if let Ok(timeout) = env::var("SENSORVIEW_FETCH_TIMEOUT") {
            self.backend.fetch_timeout = Duration::from_secs(timeout.parse().map_err(|e| {
                SensorViewError::config(format!("Invalid SENSORVIEW_FETCH_TIMEOUT: {e}"))
            })?);
        }

        if let Ok(interval) = env::var("SENSORVIEW_POLL_INTERVAL") {
            self.poll.interval = Duration::from_secs(interval.parse().map_err(|e| {
                SensorViewError::config(format!("Invalid SENSORVIEW_POLL_INTERVAL: {e}"))
            })?);
        }

        if let Ok(dir) = env::var("SENSORVIEW_REPORT_DIR") {
            self.report.out_dir = PathBuf::from(dir);
        }

        if let Ok(level) = env::var("RUST_LOG") {
            self.logging.level = level;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.backend.url.scheme() != "http" && self.backend.url.scheme() != "https" {
            return Err(SensorViewError::config(
                "backend URL must use http or https scheme",
            ));
        }

        if self.poll.interval.is_zero() {
            return Err(SensorViewError::config(
                "poll interval must be greater than zero",
            ));
        }

        if self.backend.fetch_timeout.is_zero() {
            return Err(SensorViewError::config(
                "fetch timeout must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Polling parameters for view subscriptions
    pub fn poll_config(&self) -> PollConfig {
        PollConfig {
            interval: self.poll.interval,
            fetch_timeout: self.backend.fetch_timeout,
        }
    }

    /// Write the default configuration as a starter file, atomically.
    /// Refuses to clobber an existing file.
    pub async fn write_template(path: &Path) -> Result<()> {
        if path.exists() {
            return Err(SensorViewError::config(format!(
                "{} already exists, not overwriting",
                path.display()
            )));
        }

        let content = toml::to_string_pretty(&Self::default())?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, path).await?;

        info!("Wrote starter configuration to {}", path.display());
        Ok(())
    }
}
