//! Per-run cache of tide extrema by UTC day bucket
//!
//! Provides an `ExtremeCache` that asks the tide provider for a day's extrema
//! the first time that day is needed and answers later lookups from memory.
//! A cache belongs to one run for one location and is dropped with it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::DateTime;
use tracing::{debug, info};

use crate::civil_time;
use crate::data::tides::RawExtreme;
use crate::data::{
    DayBucket, DayReferenceLevels, ExtremeEvent, ExtremeId, ExtremeType, TideProvider, TidesError,
};

/// Extrema of one day bucket, sorted by civil hour, and the levels derived from them
#[derive(Debug, Clone, PartialEq)]
pub struct DayExtremes {
    pub day: DayBucket,
    pub events: Vec<ExtremeEvent>,
    levels: Option<DayReferenceLevels>,
}

impl DayExtremes {
    /// Builds the day's events and reference levels from provider output
    pub fn from_raw(day: DayBucket, raw: &[RawExtreme]) -> Self {
        let mut events: Vec<(ExtremeType, f64, f64)> = raw
            .iter()
            .filter_map(|extreme| {
                let at = DateTime::from_timestamp(extreme.dt, 0)?;
                let hour = civil_time::civil_epoch_hours(civil_time::to_civil(at));
                Some((extreme.kind, hour, extreme.height))
            })
            .collect();
        events.sort_by(|a, b| a.1.total_cmp(&b.1));

        let events = events
            .into_iter()
            .enumerate()
            .map(|(index, (kind, hour, height))| ExtremeEvent {
                id: ExtremeId { day, index },
                kind,
                hour,
                height,
            })
            .collect();

        Self {
            day,
            events,
            levels: reference_levels(raw),
        }
    }

    /// Reference levels, or `MissingExtrema` if the day lacks a High or a Low
    pub fn levels(&self) -> Result<DayReferenceLevels, TidesError> {
        self.levels
            .ok_or(TidesError::MissingExtrema { day: self.day })
    }
}

/// Lowest low, highest high and their midpoint
fn reference_levels(raw: &[RawExtreme]) -> Option<DayReferenceLevels> {
    let heights_of = |kind: ExtremeType| {
        raw.iter()
            .filter(move |extreme| extreme.kind == kind)
            .map(|extreme| extreme.height)
    };

    let low = heights_of(ExtremeType::Low).reduce(f64::min)?;
    let high = heights_of(ExtremeType::High).reduce(f64::max)?;
    Some(DayReferenceLevels::new(low, high))
}

/// Memoizes day extrema for one location
#[derive(Debug, Clone)]
pub struct ExtremeCache {
    latitude: f64,
    longitude: f64,
    days: HashMap<DayBucket, DayExtremes>,
    provider_calls: usize,
}

impl ExtremeCache {
    /// Creates an empty cache for a location
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            days: HashMap::new(),
            provider_calls: 0,
        }
    }

    /// Returns the extrema for `day`, fetching them on first use.
    ///
    /// Provider failures are returned as-is and not remembered, so a later
    /// call for the same day retries the fetch.
    pub async fn extrema_for(
        &mut self,
        provider: &dyn TideProvider,
        day: DayBucket,
    ) -> Result<&DayExtremes, TidesError> {
        match self.days.entry(day) {
            Entry::Occupied(entry) => {
                debug!(%day, "extrema cache hit");
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                self.provider_calls += 1;
                let raw = provider
                    .extremes(self.latitude, self.longitude, day.start(), day.end())
                    .await?;
                info!(%day, count = raw.len(), "fetched tide extrema");
                Ok(entry.insert(DayExtremes::from_raw(day, &raw)))
            }
        }
    }

    /// Number of provider lookups made so far
    pub fn provider_calls(&self) -> usize {
        self.provider_calls
    }

    /// Number of days held
    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::fakes::{raw_extreme, utc, FakeTides};

    fn july_15() -> DayBucket {
        DayBucket::of(utc(2024, 7, 15, 0, 0))
    }

    fn provider_with_day() -> FakeTides {
        let mut tides = FakeTides::default();
        tides.extremes.insert(
            july_15().start(),
            vec![
                raw_extreme(utc(2024, 7, 15, 13, 0), ExtremeType::High, 1.2),
                raw_extreme(utc(2024, 7, 15, 9, 0), ExtremeType::Low, 0.3),
                raw_extreme(utc(2024, 7, 15, 21, 30), ExtremeType::Low, 0.5),
                raw_extreme(utc(2024, 7, 15, 2, 15), ExtremeType::High, 1.1),
            ],
        );
        tides
    }

    #[tokio::test]
    async fn test_same_day_fetched_once() {
        let tides = provider_with_day();
        let mut cache = ExtremeCache::new(50.9, 1.66);

        for _ in 0..5 {
            let day = cache.extrema_for(&tides, july_15()).await.expect("extrema");
            assert_eq!(day.events.len(), 4);
        }

        assert_eq!(tides.extreme_call_count(), 1);
        assert_eq!(cache.provider_calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_requests_full_day_window() {
        let tides = provider_with_day();
        let mut cache = ExtremeCache::new(50.9, 1.66);
        cache.extrema_for(&tides, july_15()).await.unwrap();

        let calls = tides.extreme_calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(july_15().start(), july_15().start() + 86_400)]);
    }

    #[tokio::test]
    async fn test_distinct_days_fetched_separately() {
        let tides = provider_with_day();
        let mut cache = ExtremeCache::new(50.9, 1.66);
        let next_day = DayBucket::of(utc(2024, 7, 16, 8, 0));

        cache.extrema_for(&tides, july_15()).await.unwrap();
        cache.extrema_for(&tides, next_day).await.unwrap();
        cache.extrema_for(&tides, july_15()).await.unwrap();

        assert_eq!(tides.extreme_call_count(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mut tides = provider_with_day();
        tides.failing_days.insert(july_15().start());
        let mut cache = ExtremeCache::new(50.9, 1.66);

        assert!(cache.extrema_for(&tides, july_15()).await.is_err());
        assert!(cache.extrema_for(&tides, july_15()).await.is_err());

        assert_eq!(tides.extreme_call_count(), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_events_sorted_with_civil_hours() {
        let tides = provider_with_day();
        let mut cache = ExtremeCache::new(50.9, 1.66);
        let day = cache.extrema_for(&tides, july_15()).await.unwrap();

        let kinds: Vec<ExtremeType> = day.events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![ExtremeType::High, ExtremeType::Low, ExtremeType::High, ExtremeType::Low]
        );
        for (index, event) in day.events.iter().enumerate() {
            assert_eq!(event.id, ExtremeId { day: july_15(), index });
        }

        // 09:00 UTC in July is 11:00 civil
        let low = &day.events[1];
        let civil = utc(2024, 7, 15, 11, 0).timestamp() as f64 / 3600.0;
        assert!((low.hour - civil).abs() < 1e-9);
    }

    #[test]
    fn test_levels_use_lowest_low_and_highest_high() {
        let tides = provider_with_day();
        let raw = &tides.extremes[&july_15().start()];
        let day = DayExtremes::from_raw(july_15(), raw);

        let levels = day.levels().expect("levels");
        assert!((levels.low - 0.3).abs() < 1e-9);
        assert!((levels.high - 1.2).abs() < 1e-9);
        assert!((levels.mid - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_missing_low_means_missing_extrema() {
        let raw = vec![raw_extreme(utc(2024, 7, 15, 13, 0), ExtremeType::High, 1.2)];
        let day = DayExtremes::from_raw(july_15(), &raw);

        assert!(matches!(
            day.levels(),
            Err(TidesError::MissingExtrema { day }) if day == july_15()
        ));
    }

    #[test]
    fn test_empty_day_means_missing_extrema() {
        let day = DayExtremes::from_raw(july_15(), &[]);
        assert!(day.events.is_empty());
        assert!(day.levels().is_err());
    }
}
