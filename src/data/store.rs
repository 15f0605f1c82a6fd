//! Forecast store client (Airtable)
//!
//! Lists the forecast rows already persisted for a spot, writes batches of
//! created/updated rows, and rotates the per-spot processing status. Airtable
//! accepts at most 10 records per write call; callers are responsible for
//! batching.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{CombinedForecastRecord, ExistingForecastRecord, UpdateRecord};

/// Base URL for the Airtable REST API
const AIRTABLE_BASE_URL: &str = "https://api.airtable.com/v0";

/// Status written to the spot that was just processed
const STATUS_PROCESSED: &str = "Processed";

/// Status written to the spot that should be processed next
const STATUS_NEXT: &str = "Next";

/// Errors that can occur when talking to the forecast store
#[derive(Debug, Error)]
pub enum StoreError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The store answered with a non-success status
    #[error("Store returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Failed to parse the store response
    #[error("Failed to parse store response: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Persistent forecast table
#[async_trait]
pub trait ForecastStore: Send + Sync {
    /// All persisted forecast rows for a spot
    async fn list_forecasts(&self, spot_id: &str)
        -> Result<Vec<ExistingForecastRecord>, StoreError>;

    /// Update existing rows in one call
    async fn update_forecasts(&self, records: &[UpdateRecord]) -> Result<(), StoreError>;

    /// Create new rows in one call
    async fn create_forecasts(&self, records: &[CombinedForecastRecord]) -> Result<(), StoreError>;

    /// Mark `current` as processed and `next` as the next spot to process
    async fn update_spot_status(&self, current: &str, next: &str) -> Result<(), StoreError>;
}

/// Client for an Airtable base holding the forecasts and spots tables
#[derive(Debug, Clone)]
pub struct AirtableStore {
    client: Client,
    api_key: String,
    base_url: String,
    base_id: String,
    forecasts_table: String,
    spots_table: String,
}

impl AirtableStore {
    /// Creates a store for the given base with default table names
    pub fn new(api_key: impl Into<String>, base_id: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: AIRTABLE_BASE_URL.to_string(),
            base_id: base_id.into(),
            forecasts_table: "Forecasts".to_string(),
            spots_table: "SpotCharacteristics".to_string(),
        }
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the table names
    pub fn with_tables(
        mut self,
        forecasts_table: impl Into<String>,
        spots_table: impl Into<String>,
    ) -> Self {
        self.forecasts_table = forecasts_table.into();
        self.spots_table = spots_table.into();
        self
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.base_id, table)
    }

    /// Sends a request and turns non-success statuses into errors carrying the body
    async fn send(&self, request: RequestBuilder) -> Result<String, StoreError> {
        let response = request.bearer_auth(&self.api_key).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl ForecastStore for AirtableStore {
    async fn list_forecasts(
        &self,
        spot_id: &str,
    ) -> Result<Vec<ExistingForecastRecord>, StoreError> {
        let url = self.table_url(&self.forecasts_table);
        let formula = spot_filter_formula(spot_id);
        let mut records = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("filterByFormula", formula.as_str())]);
            if let Some(ref token) = offset {
                request = request.query(&[("offset", token.as_str())]);
            }

            let body = self.send(request).await?;
            let page: ListResponse = serde_json::from_str(&body)?;
            debug!(spot_id, page_len = page.records.len(), "fetched forecast page");

            records.extend(page.records);
            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        Ok(records)
    }

    async fn update_forecasts(&self, records: &[UpdateRecord]) -> Result<(), StoreError> {
        let url = self.table_url(&self.forecasts_table);
        let body = RecordsPayload { records };
        self.send(self.client.patch(&url).json(&body)).await?;
        Ok(())
    }

    async fn create_forecasts(&self, records: &[CombinedForecastRecord]) -> Result<(), StoreError> {
        let url = self.table_url(&self.forecasts_table);
        let body = RecordsPayload {
            records: create_payload(records),
        };
        self.send(self.client.post(&url).json(&body)).await?;
        Ok(())
    }

    async fn update_spot_status(&self, current: &str, next: &str) -> Result<(), StoreError> {
        let url = self.table_url(&self.spots_table);
        let body = RecordsPayload {
            records: vec![
                StatusUpdate::new(current, STATUS_PROCESSED),
                StatusUpdate::new(next, STATUS_NEXT),
            ],
        };
        self.send(self.client.patch(&url).json(&body)).await?;
        Ok(())
    }
}

/// Airtable formula selecting one spot's rows
fn spot_filter_formula(spot_id: &str) -> String {
    format!("{{spotId}} = \"{}\"", spot_id.replace('"', "\\\""))
}

fn create_payload(records: &[CombinedForecastRecord]) -> Vec<CreateRecord<'_>> {
    records.iter().map(|fields| CreateRecord { fields }).collect()
}

/// One page of the list endpoint
#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    records: Vec<ExistingForecastRecord>,
    #[serde(default)]
    offset: Option<String>,
}

/// `{"records": [...]}` request body
#[derive(Debug, Serialize)]
struct RecordsPayload<T: Serialize> {
    records: T,
}

#[derive(Debug, Serialize)]
struct CreateRecord<'a> {
    fields: &'a CombinedForecastRecord,
}

#[derive(Debug, Serialize)]
struct StatusUpdate<'a> {
    id: &'a str,
    fields: StatusFields,
}

impl<'a> StatusUpdate<'a> {
    fn new(id: &'a str, status: &'static str) -> Self {
        Self {
            id,
            fields: StatusFields {
                forecast_status: status,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusFields {
    forecast_status: &'static str,
}
