//! Nearest-reference tide classification and the local-hour sample window

use crate::civil_time;
use crate::data::{DayReferenceLevels, TideDescription, TideSample};

/// First civil hour of the day for which samples are emitted
const FIRST_ADMITTED_HOUR: u32 = 4;

/// Last civil hour of the day for which samples are emitted
const LAST_ADMITTED_HOUR: u32 = 22;

/// Classifies a height against the day's reference levels.
///
/// The closest level wins. On equal distances the earlier label in the order
/// low, mid, high is kept.
pub fn classify(height: f64, levels: &DayReferenceLevels) -> TideDescription {
    let candidates = [
        (TideDescription::Mid, levels.mid),
        (TideDescription::High, levels.high),
    ];

    let mut best = TideDescription::Low;
    let mut best_distance = (height - levels.low).abs();
    for (description, level) in candidates {
        let distance = (height - level).abs();
        if distance < best_distance {
            best = description;
            best_distance = distance;
        }
    }
    best
}

/// Whether a sample at this civil hour of day is emitted
pub fn admits_local_hour(hour: u32) -> bool {
    (FIRST_ADMITTED_HOUR..=LAST_ADMITTED_HOUR).contains(&hour)
}

/// Civil hour of day of a sample
///
/// Heights are requested without a provider timezone, so the hour is always
/// derived from the UTC instant.
pub fn sample_local_hour(sample: &TideSample) -> u32 {
    civil_time::civil_hour(sample.timestamp_utc)
}
