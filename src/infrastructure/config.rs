use crate::application::display::{
    DEFAULT_DATE_FORMAT, DEFAULT_TIME_FORMAT, DisplayFormat, DisplayZone, is_valid_format,
};
use crate::application::timestamp::{
    DEFAULT_FALLBACK_SPACING_SECS, TimestampNormalizer, TimestampUnit,
};
use crate::domain::channel::{CatalogError, ChannelCatalog, DEFAULT_CHANNEL};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const ENV_PREFIX: &str = "TRAFFIC_SYNC";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
    #[error("invalid channel list: {0}")]
    Channels(#[from] CatalogError),
    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub sync: SyncSettings,
    #[serde(default)]
    pub display: DisplaySettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SyncSettings {
    pub base_url: String,
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    #[serde(default = "default_channel")]
    pub default_channel: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub timestamp_unit: TimestampUnit,
    #[serde(default = "default_fallback_spacing_secs")]
    pub fallback_spacing_secs: i64,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: i64,
    #[serde(default = "default_true")]
    pub channel_in_path: bool,
    /// Honor `HTTP_PROXY`/`NO_PROXY` from the environment for sensor requests
    #[serde(default = "default_true")]
    pub use_system_proxy: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplaySettings {
    /// Offset from UTC; the host's local zone when unset
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
    #[serde(default = "default_time_format")]
    pub time_format: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            utc_offset_minutes: None,
            time_format: default_time_format(),
            date_format: default_date_format(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_channels() -> Vec<String> {
    vec!["lane_1".to_string(), "lane_2".to_string(), "lane_3".to_string()]
}

fn default_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_fallback_spacing_secs() -> i64 {
    DEFAULT_FALLBACK_SPACING_SECS
}

fn default_stale_after_secs() -> i64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_time_format() -> String {
    DEFAULT_TIME_FORMAT.to_string()
}

fn default_date_format() -> String {
    DEFAULT_DATE_FORMAT.to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1:8088".to_string()
}

/// Load `config/sync.{toml,yaml,json}` (optional) overlaid by
/// `TRAFFIC_SYNC__<SECTION>__<KEY>` environment variables.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/sync").required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("sync.channels"),
        )
        .build()?;

    AppConfig::from_settings(settings)
}

impl AppConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> Result<Self, ConfigError> {
        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base_url = self.sync.base_url.trim();
        if base_url.is_empty() {
            return Err(invalid("sync.base_url", "must not be empty"));
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(invalid("sync.base_url", "must start with http:// or https://"));
        }
        if self.sync.poll_interval_ms == 0 {
            return Err(invalid("sync.poll_interval_ms", "must be greater than zero"));
        }
        if self.sync.request_timeout_ms == 0 {
            return Err(invalid("sync.request_timeout_ms", "must be greater than zero"));
        }
        if self.sync.fallback_spacing_secs <= 0 {
            return Err(invalid("sync.fallback_spacing_secs", "must be greater than zero"));
        }
        if self.sync.stale_after_secs < 0 {
            return Err(invalid("sync.stale_after_secs", "must not be negative"));
        }
        self.channel_catalog()?;
        self.display_format()?;
        Ok(())
    }

    pub fn channel_catalog(&self) -> Result<ChannelCatalog, ConfigError> {
        Ok(ChannelCatalog::new(
            self.sync.channels.clone(),
            &self.sync.default_channel,
        )?)
    }

    pub fn display_format(&self) -> Result<DisplayFormat, ConfigError> {
        let zone = DisplayZone::from_offset_minutes(self.display.utc_offset_minutes)
            .ok_or_else(|| invalid("display.utc_offset_minutes", "offset out of range"))?;

        for (key, format) in [
            ("display.time_format", &self.display.time_format),
            ("display.date_format", &self.display.date_format),
        ] {
            if !is_valid_format(format) {
                return Err(invalid(key, &format!("unsupported format string {:?}", format)));
            }
        }

        Ok(DisplayFormat {
            zone,
            time_format: self.display.time_format.clone(),
            date_format: self.display.date_format.clone(),
        })
    }

    pub fn timestamp_normalizer(&self) -> Result<TimestampNormalizer, ConfigError> {
        Ok(TimestampNormalizer::new(
            self.sync.timestamp_unit,
            self.sync.fallback_spacing_secs,
            self.display_format()?.zone,
        ))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.sync.request_timeout_ms)
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}
