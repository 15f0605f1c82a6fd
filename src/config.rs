//! Configuration loading
//!
//! Settings live in `spotcast.toml` under the platform config directory
//! (`~/.config/spotcast/` on Linux) unless a path is given on the command line.
//! Every section has defaults except `[[spots]]`. API keys are never read from
//! the file, only from the environment.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::data::weather::{default_models, ModelHorizon};
use crate::data::{AirtableStore, OpenMeteoClient, Spot, WorldTidesClient};

/// File name looked up in the config directory
pub const CONFIG_FILE: &str = "spotcast.toml";

/// Environment variable holding the Airtable API key
pub const AIRTABLE_KEY_VAR: &str = "AIRTABLE_API_KEY";

/// Environment variable holding the WorldTides API key
pub const WORLD_TIDES_KEY_VAR: &str = "WORLD_TIDES_API_KEY";

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Environment variable {0} is not set")]
    MissingKey(&'static str),

    #[error("Unknown spot: {0}")]
    UnknownSpot(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub tides: TidesConfig,
    pub weather: WeatherConfig,
    pub spots: Vec<Spot>,
}

/// `[store]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub base_url: String,
    /// Airtable base holding both tables
    pub base_id: String,
    pub forecasts_table: String,
    pub spots_table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.airtable.com/v0".to_string(),
            base_id: String::new(),
            forecasts_table: "Forecasts".to_string(),
            spots_table: "SpotCharacteristics".to_string(),
        }
    }
}

/// `[tides]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TidesConfig {
    pub base_url: String,
    /// Seconds of heights requested per fetch start
    pub heights_length: u32,
}

impl Default for TidesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.worldtides.info/api/v3".to_string(),
            heights_length: 1,
        }
    }
}

/// `[weather]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub base_url: String,
    pub timezone: String,
    pub forecast_days: u32,
    pub models: Vec<ModelHorizon>,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            timezone: "Europe/Berlin".to_string(),
            forecast_days: 14,
            models: default_models(),
        }
    }
}

/// Secrets taken from the environment
#[derive(Clone)]
pub struct ApiKeys {
    pub airtable: String,
    pub world_tides: String,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys").finish_non_exhaustive()
    }
}

impl ApiKeys {
    /// Reads both keys from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads both keys through `lookup`; empty values count as missing
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::MissingKey(name))
        };
        Ok(Self {
            airtable: read(AIRTABLE_KEY_VAR)?,
            world_tides: read(WORLD_TIDES_KEY_VAR)?,
        })
    }
}

impl Config {
    /// Default config file location, if the platform has a config directory
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "spotcast")?;
        Some(project_dirs.config_dir().join(CONFIG_FILE))
    }

    /// Loads from `path`, or from the default location when `path` is `None`.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            Some(path) => {
                warn!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            None => {
                warn!("no config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Loads and validates the file at `path`
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;

        info!(path = %path.display(), spots = config.spots.len(), "loaded configuration");
        Ok(config)
    }

    /// Checks cross-field rules serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, spot) in self.spots.iter().enumerate() {
            if self.spots[..i].iter().any(|other| other.id == spot.id) {
                return Err(ConfigError::Invalid(format!("duplicate spot id {:?}", spot.id)));
            }
        }

        for model in &self.weather.models {
            if model.end_hours <= model.start_hours {
                return Err(ConfigError::Invalid(format!(
                    "model {} has an empty horizon",
                    model.name
                )));
            }
        }

        if self.tides.heights_length == 0 {
            return Err(ConfigError::Invalid("tides.heights_length must be positive".into()));
        }
        Ok(())
    }

    /// Position of a configured spot in the rotation order
    pub fn spot_index(&self, id: &str) -> Result<usize, ConfigError> {
        self.spots
            .iter()
            .position(|spot| spot.id == id)
            .ok_or_else(|| ConfigError::UnknownSpot(id.to_string()))
    }

    /// Store client for the configured base
    pub fn store_client(&self, keys: &ApiKeys) -> Result<AirtableStore, ConfigError> {
        if self.store.base_id.trim().is_empty() {
            return Err(ConfigError::Invalid("store.base_id is not set".into()));
        }
        Ok(AirtableStore::new(keys.airtable.clone(), self.store.base_id.clone())
            .with_base_url(self.store.base_url.clone())
            .with_tables(
                self.store.forecasts_table.clone(),
                self.store.spots_table.clone(),
            ))
    }

    /// Tide provider client
    pub fn tides_client(&self, keys: &ApiKeys) -> WorldTidesClient {
        WorldTidesClient::new(keys.world_tides.clone())
            .with_base_url(self.tides.base_url.clone())
            .with_heights_length(self.tides.heights_length)
    }

    /// Wind source client
    pub fn weather_client(&self) -> OpenMeteoClient {
        OpenMeteoClient::new()
            .with_base_url(self.weather.base_url.clone())
            .with_timezone(self.weather.timezone.clone())
            .with_forecast_days(self.weather.forecast_days)
            .with_models(self.weather.models.clone())
    }
}
