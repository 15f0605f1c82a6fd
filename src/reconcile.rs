//! Forecast reconciliation against the persisted store
//!
//! Three steps, all for one spot:
//! 1. [`merge`] wind records with tide records into combined rows
//! 2. [`diff`] the combined rows against the existing snapshot
//! 3. [`apply`] the resulting plan in batches of [`BATCH_SIZE`]
//!
//! A failing batch aborts the rest of the plan. Batches already written stay
//! written.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info};

use crate::data::{
    CombinedForecastRecord, ExistingForecastRecord, ForecastStore, Spot, StoreError, TideRecord,
    UpdateRecord, WindForecastRecord,
};

/// Maximum number of records per store write
pub const BATCH_SIZE: usize = 10;

/// Maximum distance in milliseconds between a wind and a tide timestamp that still match
const MERGE_TOLERANCE_MS: i64 = 60_000;

/// Naive timestamp layouts accepted besides RFC 3339
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Which kind of store write failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStage {
    Update,
    Create,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStage::Update => write!(f, "update"),
            WriteStage::Create => write!(f, "create"),
        }
    }
}

/// Errors raised while reconciling forecasts
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A store write failed; no further batch was attempted
    #[error("{stage} batch {batch} for spot {spot_id} failed: {source}")]
    RemoteWrite {
        spot_id: String,
        stage: WriteStage,
        batch: usize,
        #[source]
        source: StoreError,
    },

    /// A timestamp could not be normalized to an instant
    #[error("Cannot normalize timestamp {0:?}")]
    InvalidKey(String),
}

/// Create/update operations computed for one spot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub to_create: Vec<CombinedForecastRecord>,
    pub to_update: Vec<UpdateRecord>,
}

impl ReconciliationPlan {
    /// Total number of records in the plan
    pub fn len(&self) -> usize {
        self.to_create.len() + self.to_update.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// What [`apply`] wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub updated: usize,
    pub created: usize,
    pub update_batches: usize,
    pub create_batches: usize,
}

/// Parses a store or wind timestamp into a wall-clock instant.
///
/// RFC 3339 values (`2024-07-15T14:00:00.000Z`) are read at their UTC reading;
/// offset-less values (`2024-07-15T14:00`) are read as written.
pub fn normalize_timestamp(raw: &str) -> Result<NaiveDateTime, ReconcileError> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.naive_utc());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| ReconcileError::InvalidKey(raw.to_string()))
}

/// Combines each wind record with the matching tide record, if any.
///
/// A tide record matches when it belongs to the spot and its civil timestamp
/// is strictly less than a minute away from the wind timestamp.
pub fn merge(
    spot: &Spot,
    wind: &[WindForecastRecord],
    tides: &[TideRecord],
) -> Vec<CombinedForecastRecord> {
    wind.iter()
        .map(|forecast| {
            let tide = normalize_timestamp(&forecast.timestamp_raw)
                .ok()
                .and_then(|at| {
                    tides.iter().find(|tide| {
                        tide.spot_id == spot.id
                            && (tide.timestamp_local - at).num_milliseconds().abs()
                                < MERGE_TOLERANCE_MS
                    })
                });

            if tide.is_none() && !tides.is_empty() {
                debug!(spot_id = %spot.id, timestamp = %forecast.timestamp_raw, "no matching tide record");
            }

            CombinedForecastRecord {
                timestamp: forecast.timestamp_raw.clone(),
                wind_direction: forecast.wind_direction,
                wind_speed: forecast.wind_speed,
                wind_gust: forecast.wind_gust,
                model: forecast.model.clone(),
                relative_direction: spot.relative_direction(forecast.wind_direction),
                wind_degrees: forecast.wind_degrees,
                spot_id: spot.id.clone(),
                spot_name: spot.name.clone(),
                tide_height: tide.map(|t| t.tide_height),
                tide_description: tide.map(|t| t.tide_description),
                extreme_hour: tide.and_then(|t| t.extreme_hour_local.clone()),
                extreme_type: tide.and_then(|t| t.extreme_type),
            }
        })
        .collect()
}

/// Splits combined rows into updates of existing rows and new rows.
///
/// A row updates an existing one when both carry the same spot id and their
/// timestamps normalize to the same instant. Rows whose timestamp cannot be
/// normalized are always created.
pub fn diff(
    combined: Vec<CombinedForecastRecord>,
    existing: &[ExistingForecastRecord],
) -> ReconciliationPlan {
    let mut index: HashMap<(&str, NaiveDateTime), &str> = HashMap::new();
    for record in existing {
        let (Some(timestamp), Some(spot_id)) = (&record.fields.timestamp, &record.fields.spot_id)
        else {
            continue;
        };
        match normalize_timestamp(timestamp) {
            Ok(at) => {
                index.entry((spot_id.as_str(), at)).or_insert(record.id.as_str());
            }
            Err(e) => debug!(id = %record.id, error = %e, "skipping existing row"),
        }
    }

    let mut plan = ReconciliationPlan::default();
    for record in combined {
        let existing_id = match normalize_timestamp(&record.timestamp) {
            Ok(at) => index
                .get(&(record.spot_id.as_str(), at))
                .map(|id| id.to_string()),
            Err(e) => {
                debug!(spot_id = %record.spot_id, error = %e, "routing row to create");
                None
            }
        };

        match existing_id {
            Some(id) => plan.to_update.push(UpdateRecord { id, fields: record }),
            None => plan.to_create.push(record),
        }
    }
    plan
}

/// Writes the plan: every update batch, then every create batch.
///
/// Stops at the first failing batch and reports it.
pub async fn apply(
    store: &dyn ForecastStore,
    spot_id: &str,
    plan: &ReconciliationPlan,
) -> Result<ApplySummary, ReconcileError> {
    let mut summary = ApplySummary::default();
    let write_error =
        |stage: WriteStage, batch: usize, source: StoreError| ReconcileError::RemoteWrite {
            spot_id: spot_id.to_string(),
            stage,
            batch,
            source,
        };

    for (batch, chunk) in plan.to_update.chunks(BATCH_SIZE).enumerate() {
        store
            .update_forecasts(chunk)
            .await
            .map_err(|e| write_error(WriteStage::Update, batch, e))?;
        summary.updated += chunk.len();
        summary.update_batches += 1;
        debug!(spot_id, batch, len = chunk.len(), "updated forecast batch");
    }

    for (batch, chunk) in plan.to_create.chunks(BATCH_SIZE).enumerate() {
        store
            .create_forecasts(chunk)
            .await
            .map_err(|e| write_error(WriteStage::Create, batch, e))?;
        summary.created += chunk.len();
        summary.create_batches += 1;
        debug!(spot_id, batch, len = chunk.len(), "created forecast batch");
    }

    info!(
        spot_id,
        updated = summary.updated,
        created = summary.created,
        "forecasts written"
    );
    Ok(summary)
}
