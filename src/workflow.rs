//! One end-to-end forecast run for one spot
//!
//! Loads the stored rows, fetches wind, builds tide records when the spot has
//! tides, reconciles, writes, then hands the "Next" status to the following
//! spot in the rotation.

use std::fmt;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::cache::ExtremeCache;
use crate::data::{ForecastStore, Spot, StoreError, TideProvider, WeatherError, WindSource};
use crate::reconcile::{self, ApplySummary, ReconcileError};
use crate::tide::{timestamps_to_fetch, TideRecordBuilder};

/// Step of a run that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Snapshot,
    Wind,
    Write,
    Status,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Snapshot => write!(f, "loading stored forecasts"),
            Stage::Wind => write!(f, "fetching wind forecasts"),
            Stage::Write => write!(f, "writing forecasts"),
            Stage::Status => write!(f, "updating spot status"),
        }
    }
}

/// Terminal failure of a run
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{spot_id}: loading stored forecasts failed: {source}")]
    Snapshot {
        spot_id: String,
        #[source]
        source: StoreError,
    },

    #[error("{spot_id}: fetching wind forecasts failed: {source}")]
    Wind {
        spot_id: String,
        #[source]
        source: WeatherError,
    },

    #[error("{spot_id}: writing forecasts failed: {source}")]
    Write {
        spot_id: String,
        #[source]
        source: ReconcileError,
    },

    #[error("{spot_id}: updating spot status failed: {source}")]
    Status {
        spot_id: String,
        #[source]
        source: StoreError,
    },
}

impl WorkflowError {
    pub fn stage(&self) -> Stage {
        match self {
            WorkflowError::Snapshot { .. } => Stage::Snapshot,
            WorkflowError::Wind { .. } => Stage::Wind,
            WorkflowError::Write { .. } => Stage::Write,
            WorkflowError::Status { .. } => Stage::Status,
        }
    }

    pub fn spot_id(&self) -> &str {
        match self {
            WorkflowError::Snapshot { spot_id, .. }
            | WorkflowError::Wind { spot_id, .. }
            | WorkflowError::Write { spot_id, .. }
            | WorkflowError::Status { spot_id, .. } => spot_id,
        }
    }
}

/// Counts from a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub spot_id: String,
    pub existing: usize,
    pub wind_records: usize,
    pub tide_records: usize,
    pub skipped_tide_starts: usize,
    pub extrema_lookups: usize,
    pub written: ApplySummary,
    pub status_rotated: bool,
}

/// Collaborators shared by every run
#[derive(Clone, Copy)]
pub struct ForecastRun<'a> {
    store: &'a dyn ForecastStore,
    wind: &'a dyn WindSource,
    tides: &'a dyn TideProvider,
}

impl<'a> ForecastRun<'a> {
    pub fn new(
        store: &'a dyn ForecastStore,
        wind: &'a dyn WindSource,
        tides: &'a dyn TideProvider,
    ) -> Self {
        Self { store, wind, tides }
    }

    /// Runs the whole pipeline for `spot`, then marks `next` as the next spot
    pub async fn run(&self, spot: &Spot, next: Option<&Spot>) -> Result<RunReport, WorkflowError> {
        let spot_id = spot.id.clone();
        info!(spot_id = %spot.id, name = %spot.name, "starting forecast run");

        let existing = self
            .store
            .list_forecasts(&spot.id)
            .await
            .map_err(|source| WorkflowError::Snapshot {
                spot_id: spot_id.clone(),
                source,
            })?;

        let wind = self
            .wind
            .wind_forecasts(spot)
            .await
            .map_err(|source| WorkflowError::Wind {
                spot_id: spot_id.clone(),
                source,
            })?;

        let mut report = RunReport {
            spot_id: spot_id.clone(),
            existing: existing.len(),
            wind_records: wind.len(),
            ..Default::default()
        };

        let tide_records = if spot.has_tides {
            let starts = timestamps_to_fetch(&wind, &existing);
            let mut cache = ExtremeCache::new(spot.latitude, spot.longitude);
            let mut builder = TideRecordBuilder::new(self.tides, spot);
            let records = builder.build(&mut cache, &starts).await;
            report.skipped_tide_starts = builder.skipped_starts();
            report.extrema_lookups = cache.provider_calls();
            records
        } else {
            debug!(spot_id = %spot.id, "spot has no tides");
            Vec::new()
        };
        report.tide_records = tide_records.len();

        let combined = reconcile::merge(spot, &wind, &tide_records);
        let plan = reconcile::diff(combined, &existing);
        info!(
            spot_id = %spot.id,
            create = plan.to_create.len(),
            update = plan.to_update.len(),
            "reconciled forecasts"
        );

        report.written = reconcile::apply(self.store, &spot.id, &plan)
            .await
            .map_err(|source| WorkflowError::Write {
                spot_id: spot_id.clone(),
                source,
            })?;

        let next_record = next.and_then(|n| n.record_id.as_deref());
        match (spot.record_id.as_deref(), next_record) {
            (Some(current), Some(next)) => {
                self.store
                    .update_spot_status(current, next)
                    .await
                    .map_err(|source| WorkflowError::Status {
                        spot_id: spot_id.clone(),
                        source,
                    })?;
                report.status_rotated = true;
            }
            _ => debug!(spot_id = %spot.id, "spot record ids unknown, status left unchanged"),
        }

        info!(spot_id = %spot.id, "forecast run completed");
        Ok(report)
    }
}

/// Runs the spots at `indices` one after another.
///
/// A failing spot is logged and the next one still runs. Returns how many
/// spots failed.
pub async fn run_spots(runner: &ForecastRun<'_>, spots: &[Spot], indices: &[usize]) -> usize {
    let mut failures = 0;
    for &index in indices {
        let Some(spot) = spots.get(index) else {
            continue;
        };
        let next = next_in_rotation(spots, index);
        match runner.run(spot, next).await {
            Ok(report) => debug!(?report, "spot finished"),
            Err(e) => {
                error!(spot_id = e.spot_id(), stage = %e.stage(), error = %e, "forecast run failed");
                failures += 1;
            }
        }
    }
    failures
}

/// The spot after `index` in the configured order, wrapping around
pub fn next_in_rotation(spots: &[Spot], index: usize) -> Option<&Spot> {
    if spots.is_empty() {
        return None;
    }
    spots.get((index + 1) % spots.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fakes::{existing, raw_extreme, sample, utc, FakeStore, FakeTides, FakeWind};
    use crate::data::weather::{ModelHorizon, OpenMeteoClient, HIGH_RES_MODEL};
    use crate::data::{CompassDirection, DayBucket, ExtremeType, TideDescription, WindForecastRecord};

    fn spot(id: &str, record_id: Option<&str>) -> Spot {
        Spot {
            id: id.to_string(),
            name: id.to_uppercase(),
            latitude: 50.888,
            longitude: 1.660,
            has_tides: true,
            direction: Some(CompassDirection::NorthWest),
            record_id: record_id.map(str::to_string),
        }
    }

    fn wind(timestamp: &str) -> WindForecastRecord {
        WindForecastRecord {
            timestamp_raw: timestamp.to_string(),
            spot_id: "wissant".to_string(),
            wind_speed: 20,
            wind_gust: 27,
            wind_direction: CompassDirection::NorthWest,
            wind_degrees: 315.0,
            model: "meteofrance_arome_france_hd".to_string(),
        }
    }

    fn tides() -> FakeTides {
        let mut tides = FakeTides::default();
        tides.extremes.insert(
            DayBucket::of(utc(2024, 7, 15, 0, 0)).start(),
            vec![
                raw_extreme(utc(2024, 7, 15, 9, 0), ExtremeType::Low, 0.3),
                raw_extreme(utc(2024, 7, 15, 13, 0), ExtremeType::High, 1.2),
            ],
        );
        let noon = utc(2024, 7, 15, 10, 0);
        tides.heights.insert(noon.timestamp(), vec![sample(noon, 0.85)]);
        tides
    }

    #[tokio::test]
    async fn test_run_creates_new_rows_with_tides() {
        let store = FakeStore::with_existing(vec![existing(
            "rec14",
            "2024-07-15T14:00:00.000Z",
            "wissant",
        )]);
        let wind = FakeWind {
            records: vec![wind("2024-07-15T12:00"), wind("2024-07-15T14:00")],
        };
        let tides = tides();
        let current = spot("wissant", Some("recW"));
        let next = spot("audresselles", Some("recA"));

        let report = ForecastRun::new(&store, &wind, &tides)
            .run(&current, Some(&next))
            .await
            .expect("run");

        assert_eq!(report.existing, 1);
        assert_eq!(report.wind_records, 2);
        assert_eq!(report.tide_records, 1);
        assert_eq!(report.extrema_lookups, 1);
        assert_eq!(report.written.created, 1);
        assert_eq!(report.written.updated, 1);
        assert!(report.status_rotated);

        let creates = store.creates.lock().unwrap();
        let created = &creates[0][0];
        assert_eq!(created.timestamp, "2024-07-15T12:00");
        assert_eq!(created.tide_description, Some(TideDescription::Mid));
        assert_eq!(created.spot_name, "WISSANT");

        let updates = store.updates.lock().unwrap();
        assert_eq!(updates[0][0].id, "rec14");
        assert!(updates[0][0].fields.tide_height.is_none());

        let statuses = store.status_updates.lock().unwrap();
        assert_eq!(*statuses, vec![("recW".to_string(), "recA".to_string())]);
    }

    #[tokio::test]
    async fn test_run_without_tides_skips_provider() {
        let store = FakeStore::default();
        let wind = FakeWind {
            records: vec![wind("2024-07-15T12:00")],
        };
        let tides = tides();
        let mut current = spot("wissant", None);
        current.has_tides = false;

        let report = ForecastRun::new(&store, &wind, &tides)
            .run(&current, None)
            .await
            .expect("run");

        assert_eq!(report.tide_records, 0);
        assert_eq!(tides.extreme_call_count(), 0);
        assert_eq!(tides.height_call_count(), 0);
        assert!(!report.status_rotated);
        assert!(store.status_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_failure_names_stage() {
        let store = FakeStore {
            fail_list: true,
            ..Default::default()
        };
        let wind = FakeWind::default();
        let tides = FakeTides::default();

        let err = ForecastRun::new(&store, &wind, &tides)
            .run(&spot("wissant", None), None)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Snapshot);
        assert_eq!(err.spot_id(), "wissant");
        assert!(err.to_string().contains("loading stored forecasts"));
    }

    #[tokio::test]
    async fn test_write_failure_skips_status_rotation() {
        let store = FakeStore {
            fail_create_call: Some(0),
            ..Default::default()
        };
        let wind = FakeWind {
            records: vec![wind("2024-07-15T12:00")],
        };
        let tides = tides();

        let err = ForecastRun::new(&store, &wind, &tides)
            .run(&spot("wissant", Some("recW")), Some(&spot("x", Some("recX"))))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Write);
        assert!(store.status_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_wind_failure_skips_writes_and_status_rotation() {
        let store = FakeStore::default();
        let wind = OpenMeteoClient::new()
            .with_base_url("http://127.0.0.1:1")
            .with_models(vec![ModelHorizon {
                name: HIGH_RES_MODEL.to_string(),
                start_hours: 0.0,
                end_hours: 32.0,
            }]);
        let tides = tides();

        let err = ForecastRun::new(&store, &wind, &tides)
            .run(&spot("wissant", Some("recW")), Some(&spot("x", Some("recX"))))
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Wind);
        assert_eq!(err.spot_id(), "wissant");
        assert!(store.creates.lock().unwrap().is_empty());
        assert!(store.status_updates.lock().unwrap().is_empty());
        assert_eq!(tides.extreme_call_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_spot_does_not_stop_others() {
        let store = FakeStore::default();
        let wind = FakeWind {
            records: vec![wind("2024-07-15T12:00")],
        };
        let tides = FakeTides::default();
        let spots = vec![spot("a", None), spot("b", None)];
        let runner = ForecastRun::new(&store, &wind, &tides);

        let failures = run_spots(&runner, &spots, &[0, 1]).await;
        assert_eq!(failures, 0);
        assert_eq!(store.creates.lock().unwrap().len(), 2);

        let failing = FakeStore {
            fail_create_call: Some(0),
            ..Default::default()
        };
        let runner = ForecastRun::new(&failing, &wind, &tides);
        let failures = run_spots(&runner, &spots, &[0, 1]).await;
        assert_eq!(failures, 1);
        assert_eq!(*failing.create_attempts.lock().unwrap(), 2);
    }

    #[test]
    fn test_rotation_wraps_around() {
        let spots = vec![spot("a", None), spot("b", None), spot("c", None)];
        assert_eq!(next_in_rotation(&spots, 0).map(|s| s.id.as_str()), Some("b"));
        assert_eq!(next_in_rotation(&spots, 2).map(|s| s.id.as_str()), Some("a"));
        assert!(next_in_rotation(&[], 0).is_none());
    }
}
