//! In-memory collaborators for unit tests

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::tides::RawExtreme;
use super::{
    CombinedForecastRecord, ExistingFields, ExistingForecastRecord, ExtremeType, ForecastStore,
    Spot, StoreError, TideProvider, TideSample, TidesError, UpdateRecord, WeatherError,
    WindForecastRecord, WindSource,
};

/// Tide provider answering from fixed tables, recording every call
#[derive(Debug, Default)]
pub struct FakeTides {
    pub extremes: HashMap<i64, Vec<RawExtreme>>,
    pub heights: HashMap<i64, Vec<TideSample>>,
    pub failing_days: HashSet<i64>,
    pub failing_heights: HashSet<i64>,
    pub extreme_calls: Mutex<Vec<(i64, i64)>>,
    pub height_calls: Mutex<Vec<i64>>,
}

impl FakeTides {
    pub fn extreme_call_count(&self) -> usize {
        self.extreme_calls.lock().unwrap().len()
    }

    pub fn height_call_count(&self) -> usize {
        self.height_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TideProvider for FakeTides {
    async fn extremes(
        &self,
        _latitude: f64,
        _longitude: f64,
        start: i64,
        end: i64,
    ) -> Result<Vec<RawExtreme>, TidesError> {
        self.extreme_calls.lock().unwrap().push((start, end));
        if self.failing_days.contains(&start) {
            return Err(TidesError::Api("extremes unavailable".to_string()));
        }
        Ok(self.extremes.get(&start).cloned().unwrap_or_default())
    }

    async fn heights(
        &self,
        _latitude: f64,
        _longitude: f64,
        start: i64,
    ) -> Result<Vec<TideSample>, TidesError> {
        self.height_calls.lock().unwrap().push(start);
        if self.failing_heights.contains(&start) {
            return Err(TidesError::Api("heights unavailable".to_string()));
        }
        Ok(self.heights.get(&start).cloned().unwrap_or_default())
    }
}

/// Wind source returning a fixed list
#[derive(Debug, Default)]
pub struct FakeWind {
    pub records: Vec<WindForecastRecord>,
}

#[async_trait]
impl WindSource for FakeWind {
    async fn wind_forecasts(&self, _spot: &Spot) -> Result<Vec<WindForecastRecord>, WeatherError> {
        Ok(self.records.clone())
    }
}

/// Store holding a fixed snapshot and recording writes
#[derive(Debug, Default)]
pub struct FakeStore {
    pub existing: Vec<ExistingForecastRecord>,
    pub fail_list: bool,
    /// Zero-based index of the update call that fails
    pub fail_update_call: Option<usize>,
    /// Zero-based index of the create call that fails
    pub fail_create_call: Option<usize>,
    pub updates: Mutex<Vec<Vec<UpdateRecord>>>,
    pub creates: Mutex<Vec<Vec<CombinedForecastRecord>>>,
    pub update_attempts: Mutex<usize>,
    pub create_attempts: Mutex<usize>,
    pub status_updates: Mutex<Vec<(String, String)>>,
}

impl FakeStore {
    pub fn with_existing(existing: Vec<ExistingForecastRecord>) -> Self {
        Self {
            existing,
            ..Default::default()
        }
    }

    fn failure() -> StoreError {
        StoreError::Status {
            status: 422,
            body: "{\"error\":{\"type\":\"INVALID_REQUEST\"}}".to_string(),
        }
    }
}

#[async_trait]
impl ForecastStore for FakeStore {
    async fn list_forecasts(
        &self,
        spot_id: &str,
    ) -> Result<Vec<ExistingForecastRecord>, StoreError> {
        if self.fail_list {
            return Err(Self::failure());
        }
        Ok(self
            .existing
            .iter()
            .filter(|r| r.fields.spot_id.as_deref() == Some(spot_id))
            .cloned()
            .collect())
    }

    async fn update_forecasts(&self, records: &[UpdateRecord]) -> Result<(), StoreError> {
        let mut attempts = self.update_attempts.lock().unwrap();
        let call = *attempts;
        *attempts += 1;
        if self.fail_update_call == Some(call) {
            return Err(Self::failure());
        }
        self.updates.lock().unwrap().push(records.to_vec());
        Ok(())
    }

    async fn create_forecasts(&self, records: &[CombinedForecastRecord]) -> Result<(), StoreError> {
        let mut attempts = self.create_attempts.lock().unwrap();
        let call = *attempts;
        *attempts += 1;
        if self.fail_create_call == Some(call) {
            return Err(Self::failure());
        }
        self.creates.lock().unwrap().push(records.to_vec());
        Ok(())
    }

    async fn update_spot_status(&self, current: &str, next: &str) -> Result<(), StoreError> {
        self.status_updates
            .lock()
            .unwrap()
            .push((current.to_string(), next.to_string()));
        Ok(())
    }
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

pub fn raw_extreme(at: DateTime<Utc>, kind: ExtremeType, height: f64) -> RawExtreme {
    RawExtreme {
        dt: at.timestamp(),
        kind,
        height,
    }
}

pub fn sample(at: DateTime<Utc>, height: f64) -> TideSample {
    TideSample {
        timestamp_utc: at,
        height,
    }
}

pub fn existing(id: &str, timestamp: &str, spot_id: &str) -> ExistingForecastRecord {
    ExistingForecastRecord {
        id: id.to_string(),
        fields: ExistingFields {
            timestamp: Some(timestamp.to_string()),
            spot_id: Some(spot_id.to_string()),
        },
    }
}
