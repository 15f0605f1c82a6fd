//! Builds classified tide records for the forecast hours of one spot
//!
//! For every fetch start the builder looks up the day's extrema through the
//! run's [`ExtremeCache`], derives reference levels, fetches heights and turns
//! each admitted height into a [`TideRecord`]. A failing day or start is logged
//! and skipped; the remaining starts still produce records.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

use super::{admits_local_hour, classify, sample_local_hour, ExtremeAssigner};
use crate::cache::ExtremeCache;
use crate::civil_time;
use crate::data::{
    DayBucket, ExistingForecastRecord, Spot, TideProvider, TideRecord, TidesError,
    WindForecastRecord,
};
use crate::reconcile::normalize_timestamp;

/// UTC fetch starts for the wind hours that have no stored row yet.
///
/// Wind timestamps are civil wall-clock values; they are converted to UTC,
/// sorted ascending and deduplicated.
pub fn timestamps_to_fetch(
    wind: &[WindForecastRecord],
    existing: &[ExistingForecastRecord],
) -> Vec<DateTime<Utc>> {
    let stored: HashSet<NaiveDateTime> = existing
        .iter()
        .filter_map(|record| record.fields.timestamp.as_deref())
        .filter_map(|timestamp| normalize_timestamp(timestamp).ok())
        .collect();

    let mut starts: Vec<DateTime<Utc>> = wind
        .iter()
        .filter_map(|forecast| match normalize_timestamp(&forecast.timestamp_raw) {
            Ok(at) => Some(at),
            Err(e) => {
                debug!(error = %e, "wind timestamp not usable for tides");
                None
            }
        })
        .filter(|at| !stored.contains(at))
        .map(civil_time::civil_to_utc)
        .collect();

    starts.sort();
    starts.dedup();
    starts
}

/// Drives cache lookups, classification and extreme assignment for one spot
pub struct TideRecordBuilder<'a> {
    provider: &'a dyn TideProvider,
    spot: &'a Spot,
    assigner: ExtremeAssigner,
    skipped_starts: usize,
}

impl<'a> TideRecordBuilder<'a> {
    pub fn new(provider: &'a dyn TideProvider, spot: &'a Spot) -> Self {
        Self {
            provider,
            spot,
            assigner: ExtremeAssigner::new(),
            skipped_starts: 0,
        }
    }

    /// Builds records for every start, in ascending order of `starts`
    pub async fn build(
        &mut self,
        cache: &mut ExtremeCache,
        starts: &[DateTime<Utc>],
    ) -> Vec<TideRecord> {
        let mut records = Vec::new();

        for &start in starts {
            match self.records_for_start(cache, start).await {
                Ok(batch) => records.extend(batch),
                Err(e) => {
                    if e.is_remote_fetch() {
                        warn!(spot_id = %self.spot.id, %start, error = %e, "tide lookup failed");
                    } else {
                        warn!(spot_id = %self.spot.id, %start, error = %e, "skipping tide start");
                    }
                    self.skipped_starts += 1;
                }
            }
        }

        info!(
            spot_id = %self.spot.id,
            starts = starts.len(),
            records = records.len(),
            skipped = self.skipped_starts,
            extrema_lookups = cache.provider_calls(),
            "built tide records"
        );
        records
    }

    /// Starts that produced no records because a lookup failed
    pub fn skipped_starts(&self) -> usize {
        self.skipped_starts
    }

    async fn records_for_start(
        &mut self,
        cache: &mut ExtremeCache,
        start: DateTime<Utc>,
    ) -> Result<Vec<TideRecord>, TidesError> {
        let day = cache.extrema_for(self.provider, DayBucket::of(start)).await?;
        let levels = day.levels()?;
        let samples = self
            .provider
            .heights(self.spot.latitude, self.spot.longitude, start.timestamp())
            .await?;

        let mut records = Vec::with_capacity(samples.len());
        for sample in samples {
            if !admits_local_hour(sample_local_hour(&sample)) {
                continue;
            }

            let civil = civil_time::to_civil(sample.timestamp_utc);
            let extreme = self
                .assigner
                .assign(civil_time::civil_epoch_hour_floor(civil), &day.events);

            records.push(TideRecord {
                timestamp_local: civil,
                spot_id: self.spot.id.clone(),
                tide_height: sample.height,
                tide_description: classify(sample.height, &levels),
                extreme_hour_local: extreme.map(|e| civil_time::format_epoch_hour(e.hour)),
                extreme_type: extreme.map(|e| e.kind),
            });
        }
        Ok(records)
    }
}
