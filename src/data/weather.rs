//! Open-Meteo wind forecast client
//!
//! Fetches hourly wind speed, gusts and direction for a spot from several
//! forecast models, each covering its own horizon (hours ahead of now), and
//! turns them into [`WindForecastRecord`]s.

use async_trait::async_trait;
use chrono::{NaiveDateTime, Timelike, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{CompassDirection, Spot, WindForecastRecord};
use crate::civil_time;

/// Base URL for the Open-Meteo API
const OPEN_METEO_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

/// Model whose hourly output is kept for every hour, not only even ones
pub const HIGH_RES_MODEL: &str = "meteofrance_arome_france_hd";

/// First local hour of the day kept in forecasts
const FIRST_HOUR: u32 = 6;

/// Last local hour of the day kept in forecasts
const LAST_HOUR: u32 = 22;

/// Errors that can occur when fetching wind data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),

    /// Invalid time format in response
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),
}

/// A forecast model and the horizon, in hours ahead of now, it is used for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHorizon {
    pub name: String,
    /// Inclusive start, hours ahead
    pub start_hours: f64,
    /// Exclusive end, hours ahead
    pub end_hours: f64,
}

/// Default model chain: high resolution first, then regional, then global
pub fn default_models() -> Vec<ModelHorizon> {
    vec![
        ModelHorizon {
            name: HIGH_RES_MODEL.to_string(),
            start_hours: 0.0,
            end_hours: 32.0,
        },
        ModelHorizon {
            name: "meteofrance_arpege_europe".to_string(),
            start_hours: 32.0,
            end_hours: 80.0,
        },
        ModelHorizon {
            name: "gfs_seamless".to_string(),
            start_hours: 80.0,
            end_hours: 336.0,
        },
    ]
}

/// Source of wind forecasts for a spot
#[async_trait]
pub trait WindSource: Send + Sync {
    async fn wind_forecasts(&self, spot: &Spot) -> Result<Vec<WindForecastRecord>, WeatherError>;
}

/// Client for fetching wind data from Open-Meteo API
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    client: Client,
    base_url: String,
    timezone: String,
    forecast_days: u32,
    models: Vec<ModelHorizon>,
}

impl Default for OpenMeteoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenMeteoClient {
    /// Create a new client with default settings
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: OPEN_METEO_BASE_URL.to_string(),
            timezone: "Europe/Berlin".to_string(),
            forecast_days: 14,
            models: default_models(),
        }
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the timezone the API reports local times in
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// Override the number of forecast days requested
    pub fn with_forecast_days(mut self, days: u32) -> Self {
        self.forecast_days = days;
        self
    }

    /// Override the model chain
    pub fn with_models(mut self, models: Vec<ModelHorizon>) -> Self {
        self.models = models;
        self
    }

    /// Fetch hourly wind for one model
    async fn fetch_model(
        &self,
        lat: f64,
        lon: f64,
        model: &str,
    ) -> Result<HourlyWind, WeatherError> {
        let url = format!(
            "{}?latitude={}&longitude={}&forecast_days={}&hourly=windspeed_10m,winddirection_10m,windgusts_10m&windspeed_unit=kn&models={}&timezone={}",
            self.base_url, lat, lon, self.forecast_days, model, self.timezone
        );

        let response = self.client.get(&url).send().await?;
        let text = response.text().await?;
        let api_response: OpenMeteoResponse = serde_json::from_str(&text)?;

        Ok(api_response.hourly)
    }
}

#[async_trait]
impl WindSource for OpenMeteoClient {
    async fn wind_forecasts(&self, spot: &Spot) -> Result<Vec<WindForecastRecord>, WeatherError> {
        let fetches = self
            .models
            .iter()
            .map(|model| self.fetch_model(spot.latitude, spot.longitude, &model.name));
        let results = futures::future::join_all(fetches).await;

        let now = civil_time::to_civil(Utc::now());
        let mut forecasts = Vec::new();
        let mut succeeded = false;
        let mut last_error = None;

        for (model, result) in self.models.iter().zip(results) {
            let parsed = result.and_then(|hourly| parse_hourly(&spot.id, model, &hourly, now));
            match parsed {
                Ok(records) => {
                    debug!(spot_id = %spot.id, model = %model.name, count = records.len(), "parsed wind forecasts");
                    succeeded = true;
                    forecasts.extend(records);
                }
                Err(e) => {
                    warn!(spot_id = %spot.id, model = %model.name, error = %e, "wind model fetch failed");
                    last_error = Some(e);
                }
            }
        }

        // A spot is only failed when no model answered
        match last_error {
            Some(e) if !succeeded => Err(e),
            _ => Ok(forecasts),
        }
    }
}

/// Whether a forecast at local `hour` is kept for the given model
pub fn is_within_time_range(hour: u32, model: &str) -> bool {
    let in_day = (FIRST_HOUR..=LAST_HOUR).contains(&hour);
    if model == HIGH_RES_MODEL {
        in_day
    } else {
        in_day && hour % 2 == 0
    }
}

/// Turn one model's hourly arrays into records, keeping only hours in range
fn parse_hourly(
    spot_id: &str,
    model: &ModelHorizon,
    hourly: &HourlyWind,
    now: NaiveDateTime,
) -> Result<Vec<WindForecastRecord>, WeatherError> {
    let len = hourly.time.len();

    if hourly.windspeed_10m.len() != len
        || hourly.winddirection_10m.len() != len
        || hourly.windgusts_10m.len() != len
    {
        return Err(WeatherError::MissingField(
            "hourly arrays have inconsistent lengths".to_string(),
        ));
    }

    let mut forecasts = Vec::new();

    for i in 0..len {
        let raw = &hourly.time[i];
        let time = parse_datetime(raw)?;

        if !is_within_time_range(time.hour(), &model.name) {
            continue;
        }

        let hours_ahead = (time - now).num_seconds() as f64 / 3600.0;
        if hours_ahead < model.start_hours || hours_ahead >= model.end_hours {
            continue;
        }

        // Models leave trailing hours empty past their own range
        let (Some(speed), Some(degrees), Some(gust)) = (
            hourly.windspeed_10m[i],
            hourly.winddirection_10m[i],
            hourly.windgusts_10m[i],
        ) else {
            continue;
        };

        forecasts.push(WindForecastRecord {
            timestamp_raw: raw.clone(),
            spot_id: spot_id.to_string(),
            wind_speed: speed.round() as i64,
            wind_gust: gust.round() as i64,
            wind_direction: CompassDirection::from_degrees(degrees),
            wind_degrees: degrees,
            model: model.name.clone(),
        });
    }

    Ok(forecasts)
}

/// Parse a datetime string in ISO 8601 format (e.g., "2024-07-15T05:30") to NaiveDateTime
fn parse_datetime(datetime_str: &str) -> Result<NaiveDateTime, WeatherError> {
    NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%dT%H:%M")
        .map_err(|_| WeatherError::InvalidTimeFormat(datetime_str.to_string()))
}

/// Open-Meteo API response structure
#[derive(Debug, Deserialize)]
struct OpenMeteoResponse {
    hourly: HourlyWind,
}

/// Hourly wind data from Open-Meteo
#[derive(Debug, Deserialize)]
struct HourlyWind {
    time: Vec<String>,
    windspeed_10m: Vec<Option<f64>>,
    winddirection_10m: Vec<Option<f64>>,
    windgusts_10m: Vec<Option<f64>>,
}
