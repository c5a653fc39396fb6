use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::geocode::GeocoderId;

/// Top-level configuration stored on disk.
///
/// Every field has a serde default so config files written by older
/// versions keep parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Optional default geocoder id, e.g. "census" or "nominatim".
    /// Unset means the Census geocoder.
    pub geocoder: Option<String>,

    /// Optional US Census API key. Geocoding works without one, just with
    /// tighter rate limits; the `CENSUS_API_KEY` environment variable takes
    /// precedence over this field.
    pub census_api_key: Option<String>,

    /// Per-network-call timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Retries per weather-service sub-call after the first attempt.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between retry attempts, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// How many nearby stations to rank and report.
    #[serde(default = "default_station_limit")]
    pub station_limit: usize,
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_station_limit() -> usize {
    4
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocoder: None,
            census_api_key: None,
            request_timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            station_limit: default_station_limit(),
        }
    }
}

impl Config {
    /// Return the configured geocoder as a strongly-typed id. Census is the
    /// default when nothing is configured.
    pub fn geocoder_id(&self) -> Result<GeocoderId> {
        match self.geocoder.as_deref() {
            Some(s) => GeocoderId::try_from(s),
            None => Ok(GeocoderId::Census),
        }
    }

    pub fn set_geocoder(&mut self, id: GeocoderId) {
        self.geocoder = Some(id.as_str().to_string());
    }

    /// The Census API key, if any. Environment wins over the config file so
    /// a key never has to be written to disk.
    pub fn census_api_key(&self) -> Option<String> {
        std::env::var("CENSUS_API_KEY").ok().filter(|k| !k.is_empty()).or_else(|| {
            self.census_api_key.clone()
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Load config from disk, or return the defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weathervane", "weathervane")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
