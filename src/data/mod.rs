//! Core data models for spotcast
//!
//! This module contains the data types shared by the tide pipeline, the
//! reconciliation engine and the collaborator clients (tides, wind, store).

pub mod spot;
pub mod store;
pub mod tides;
pub mod weather;

#[cfg(test)]
pub(crate) mod fakes;

pub use spot::{CompassDirection, RelativeDirection, Spot};
pub use store::{AirtableStore, ForecastStore, StoreError};
pub use tides::{TideProvider, TidesError, WorldTidesClient};
pub use weather::{OpenMeteoClient, WeatherError, WindSource};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Length of a day bucket in seconds
pub const DAY_SECONDS: i64 = 86_400;

/// Kind of a tide extreme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtremeType {
    High,
    Low,
}

impl fmt::Display for ExtremeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtremeType::High => write!(f, "High"),
            ExtremeType::Low => write!(f, "Low"),
        }
    }
}

/// Descriptive tide level derived from the day's reference levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TideDescription {
    Low,
    Mid,
    High,
}

impl fmt::Display for TideDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TideDescription::Low => write!(f, "low"),
            TideDescription::Mid => write!(f, "mid"),
            TideDescription::High => write!(f, "high"),
        }
    }
}

/// A UTC-aligned 24-hour window, identified by its start in unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayBucket(i64);

impl DayBucket {
    /// Bucket containing the given unix timestamp
    pub fn containing(unix_seconds: i64) -> Self {
        Self(unix_seconds.div_euclid(DAY_SECONDS) * DAY_SECONDS)
    }

    /// Bucket containing the given instant
    pub fn of(instant: DateTime<Utc>) -> Self {
        Self::containing(instant.timestamp())
    }

    /// Inclusive start in unix seconds
    pub fn start(&self) -> i64 {
        self.0
    }

    /// Exclusive end in unix seconds
    pub fn end(&self) -> i64 {
        self.0 + DAY_SECONDS
    }
}

impl fmt::Display for DayBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DateTime::from_timestamp(self.0, 0) {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d")),
            None => write!(f, "{}", self.0),
        }
    }
}

/// A single tide height reading from the height provider
#[derive(Debug, Clone, PartialEq)]
pub struct TideSample {
    /// Instant of the reading
    pub timestamp_utc: DateTime<Utc>,
    /// Height in meters
    pub height: f64,
}

/// Identity of an extreme within one run: its day bucket and position in that day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtremeId {
    pub day: DayBucket,
    pub index: usize,
}

/// A high or low tide event for a day bucket
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremeEvent {
    pub id: ExtremeId,
    pub kind: ExtremeType,
    /// Civil hours since the epoch, with fractional part
    pub hour: f64,
    /// Height in meters
    pub height: f64,
}

/// Per-day reference heights used to classify samples
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayReferenceLevels {
    pub low: f64,
    pub mid: f64,
    pub high: f64,
}

impl DayReferenceLevels {
    /// Builds the levels from the lowest low and the highest high
    pub fn new(low: f64, high: f64) -> Self {
        Self {
            low,
            mid: (low + high) / 2.0,
            high,
        }
    }
}

/// Classified tide reading for a spot
#[derive(Debug, Clone, PartialEq)]
pub struct TideRecord {
    /// Civil wall-clock time of the reading
    pub timestamp_local: NaiveDateTime,
    pub spot_id: String,
    pub tide_height: f64,
    pub tide_description: TideDescription,
    /// Civil time of the attached extreme, formatted `HH:MM`
    pub extreme_hour_local: Option<String>,
    pub extreme_type: Option<ExtremeType>,
}

/// Wind forecast for a spot at one forecast hour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindForecastRecord {
    /// Forecast timestamp exactly as returned by the wind source (e.g. "2024-07-15T14:00")
    pub timestamp_raw: String,
    pub spot_id: String,
    /// Wind speed in knots, rounded
    pub wind_speed: i64,
    /// Gust speed in knots, rounded
    pub wind_gust: i64,
    pub wind_direction: CompassDirection,
    pub wind_degrees: f64,
    pub model: String,
}

/// Forecast row as written to the store: wind data plus optional tide data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedForecastRecord {
    pub timestamp: String,
    pub wind_direction: CompassDirection,
    pub wind_speed: i64,
    pub wind_gust: i64,
    pub model: String,
    pub relative_direction: RelativeDirection,
    pub wind_degrees: f64,
    pub spot_id: String,
    pub spot_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tide_height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tide_description: Option<TideDescription>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extreme_hour: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extreme_type: Option<ExtremeType>,
}

/// Fields of a persisted forecast row that take part in matching
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExistingFields {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, rename = "spotId")]
    pub spot_id: Option<String>,
}

/// Forecast row already present in the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingForecastRecord {
    /// Opaque store handle
    pub id: String,
    #[serde(default)]
    pub fields: ExistingFields,
}

/// Update of an existing row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpdateRecord {
    pub id: String,
    pub fields: CombinedForecastRecord,
}
