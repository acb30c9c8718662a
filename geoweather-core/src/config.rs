use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, time::Duration};

use crate::{
    model::{Coordinates, UnitSystem},
    present::LabelSource,
    provider::{RetryPolicy, openweather::DEFAULT_BASE_URL},
    store::default_data_dir,
};

/// API key baked in at build time, used when the config file has none.
const BUILD_API_KEY: Option<&str> = option_env!("GEOWEATHER_API_KEY");

/// Timeout and retry settings for the provider request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// 1 means no retry.
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_attempts: 1,
            backoff_ms: 200,
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::capped(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }
}

/// Where fixes come from. Without coordinates an IP lookup is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timeout_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            timeout_secs: 10,
        }
    }
}

impl LocationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Configured fixed coordinates, if both halves are set.
    pub fn fixed(&self) -> Result<Option<Coordinates>> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Ok(Some(
                Coordinates::new(lat, lon).context("Invalid coordinates in [location] config")?,
            )),
            (None, None) => Ok(None),
            _ => Err(anyhow!(
                "Both latitude and longitude must be set in [location] config, or neither."
            )),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// units = "metric"
/// label_source = "region"
///
/// [location]
/// latitude = 52.52
/// longitude = 13.40
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub units: UnitSystem,
    pub label_source: LabelSource,
    /// Overrides the region detected from the locale.
    pub region: Option<String>,
    /// Overrides the platform data directory for the snapshot file.
    pub store_dir: Option<PathBuf>,
    pub fetch: FetchConfig,
    pub location: LocationConfig,
}

impl Config {
    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        let path = Self::config_file_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return empty.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "geoweather", "geoweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }

    /// API key from the config file, falling back to the build-time key.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .or(BUILD_API_KEY)
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api_key = Some(api_key.trim().to_string());
    }

    /// Directory holding the snapshot file.
    pub fn snapshot_dir(&self) -> Result<PathBuf> {
        match &self.store_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Set or clear the fixed location.
    pub fn set_fixed_location(&mut self, coordinates: Option<Coordinates>) {
        self.location.latitude = coordinates.map(|c| c.latitude());
        self.location.longitude = coordinates.map(|c| c.longitude());
    }
}
