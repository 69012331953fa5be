//! Configuration layer: typed settings with layered precedence (file → env).

use std::num::NonZeroUsize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "flusso";
const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:5000/api/";
const DEFAULT_API_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SWEEP_INTERVAL_MS: u64 = 20_000;
const DEFAULT_STORE_CAPACITY: usize = 256;

/// Fully-resolved client settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub api: ApiSettings,
    pub hub: HubSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Base endpoint; always ends with `/` so relative joins stay inside it.
    pub base_url: Url,
    pub timeout: Duration,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HubSettings {
    pub sweep_interval: Duration,
    pub store_capacity: NonZeroUsize,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (files, then environment
/// variables prefixed `FLUSSO__`).
pub fn load(config_file: Option<&Path>) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = config_file {
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FLUSSO").separator("__"));

    let raw: RawSettings = builder.build()?.try_deserialize()?;
    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    api: RawApiSettings,
    hub: RawHubSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawHubSettings {
    sweep_interval_ms: Option<u64>,
    store_capacity: Option<usize>,
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let level = match raw.logging.level.as_deref() {
            Some(value) => LevelFilter::from_str(value).map_err(|_| {
                LoadError::invalid("logging.level", format!("`{value}` is not a log level"))
            })?,
            None => LevelFilter::INFO,
        };
        let format = if raw.logging.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };

        let base_url = raw.api.base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL);
        let mut base_url = Url::parse(base_url)
            .map_err(|err| LoadError::invalid("api.base_url", err.to_string()))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let timeout_seconds = raw.api.timeout_seconds.unwrap_or(DEFAULT_API_TIMEOUT_SECS);
        if timeout_seconds == 0 {
            return Err(LoadError::invalid("api.timeout_seconds", "must be non-zero"));
        }

        let sweep_interval_ms = raw
            .hub
            .sweep_interval_ms
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_MS);
        if sweep_interval_ms == 0 {
            return Err(LoadError::invalid(
                "hub.sweep_interval_ms",
                "must be non-zero",
            ));
        }

        let store_capacity = raw.hub.store_capacity.unwrap_or(DEFAULT_STORE_CAPACITY);
        let store_capacity = NonZeroUsize::new(store_capacity)
            .ok_or_else(|| LoadError::invalid("hub.store_capacity", "must be non-zero"))?;

        Ok(Self {
            logging: LoggingSettings { level, format },
            api: ApiSettings {
                base_url,
                timeout: Duration::from_secs(timeout_seconds),
                token: raw.api.token,
            },
            hub: HubSettings {
                sweep_interval: Duration::from_millis(sweep_interval_ms),
                store_capacity,
            },
        })
    }
}
