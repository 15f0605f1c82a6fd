//! WorldTides API client for tide extrema and heights
//!
//! Provides the [`TideProvider`] trait consumed by the tide pipeline and its
//! HTTP implementation against the WorldTides v3 API.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use super::{DayBucket, ExtremeType, TideSample};

/// Base URL for the WorldTides v3 API
const WORLD_TIDES_BASE_URL: &str = "https://www.worldtides.info/api/v3";

/// Errors that can occur when fetching tide data
///
/// `Http`, `Api` and `Parse` are remote fetch failures: the pipeline logs them
/// and skips the affected day or sample.
#[derive(Debug, Error)]
pub enum TidesError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with an error payload or status
    #[error("Tide API error: {0}")]
    Api(String),

    /// Failed to parse JSON response
    #[error("Failed to parse tide response: {0}")]
    Parse(#[from] serde_json::Error),

    /// A day has no High or no Low extreme, so reference levels are undefined
    #[error("No high or low extreme available for {day}")]
    MissingExtrema { day: DayBucket },
}

impl TidesError {
    /// Whether this error came from the remote provider
    pub fn is_remote_fetch(&self) -> bool {
        !matches!(self, TidesError::MissingExtrema { .. })
    }
}

/// A high or low tide event as returned by the provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawExtreme {
    /// Unix timestamp of the event
    pub dt: i64,
    #[serde(rename = "type")]
    pub kind: ExtremeType,
    /// Height in meters
    pub height: f64,
}

/// Source of tide extrema and tide heights for a location
#[async_trait]
pub trait TideProvider: Send + Sync {
    /// Extrema in `[start, end)`, unix seconds
    async fn extremes(
        &self,
        latitude: f64,
        longitude: f64,
        start: i64,
        end: i64,
    ) -> Result<Vec<RawExtreme>, TidesError>;

    /// Heights starting at `start`, unix seconds
    async fn heights(
        &self,
        latitude: f64,
        longitude: f64,
        start: i64,
    ) -> Result<Vec<TideSample>, TidesError>;
}

/// Client for the WorldTides API
#[derive(Debug, Clone)]
pub struct WorldTidesClient {
    client: Client,
    api_key: String,
    base_url: String,
    /// Length of each heights request in seconds
    heights_length: u32,
}

impl WorldTidesClient {
    /// Create a new client with the default base URL
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: WORLD_TIDES_BASE_URL.to_string(),
            heights_length: 1,
        }
    }

    /// Override the base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the heights request length in seconds
    pub fn with_heights_length(mut self, seconds: u32) -> Self {
        self.heights_length = seconds;
        self
    }

    async fn get_text(&self, url: &str) -> Result<String, TidesError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(TidesError::Api(format!("status {}: {}", status.as_u16(), text)));
        }
        Ok(text)
    }
}

#[async_trait]
impl TideProvider for WorldTidesClient {
    async fn extremes(
        &self,
        latitude: f64,
        longitude: f64,
        start: i64,
        end: i64,
    ) -> Result<Vec<RawExtreme>, TidesError> {
        let url = format!(
            "{}?extremes&start={}&end={}&lat={}&lon={}&key={}",
            self.base_url, start, end, latitude, longitude, self.api_key
        );
        let text = self.get_text(&url).await?;
        parse_extremes(&text)
    }

    async fn heights(
        &self,
        latitude: f64,
        longitude: f64,
        start: i64,
    ) -> Result<Vec<TideSample>, TidesError> {
        let url = format!(
            "{}?heights&length={}&start={}&lat={}&lon={}&key={}",
            self.base_url, self.heights_length, start, latitude, longitude, self.api_key
        );
        let text = self.get_text(&url).await?;
        parse_heights(&text)
    }
}

/// Parse an extremes response body
fn parse_extremes(text: &str) -> Result<Vec<RawExtreme>, TidesError> {
    let response: ExtremesResponse = serde_json::from_str(text)?;
    if let Some(error) = response.error {
        return Err(TidesError::Api(error));
    }
    Ok(response.extremes)
}

/// Parse a heights response body into samples
fn parse_heights(text: &str) -> Result<Vec<TideSample>, TidesError> {
    let response: HeightsResponse = serde_json::from_str(text)?;
    if let Some(error) = response.error {
        return Err(TidesError::Api(error));
    }

    response
        .heights
        .into_iter()
        .map(|h| {
            let timestamp_utc = DateTime::from_timestamp(h.dt, 0)
                .ok_or_else(|| TidesError::Api(format!("timestamp out of range: {}", h.dt)))?;
            Ok(TideSample {
                timestamp_utc,
                height: h.height,
            })
        })
        .collect()
}

/// WorldTides extremes response
#[derive(Debug, Deserialize)]
struct ExtremesResponse {
    #[serde(default)]
    extremes: Vec<RawExtreme>,
    #[serde(default)]
    error: Option<String>,
}

/// WorldTides heights response
#[derive(Debug, Deserialize)]
struct HeightsResponse {
    #[serde(default)]
    heights: Vec<RawHeight>,
    #[serde(default)]
    error: Option<String>,
}

/// A single height entry
#[derive(Debug, Deserialize)]
struct RawHeight {
    dt: i64,
    height: f64,
}
