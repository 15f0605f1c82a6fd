//! Greedy forward-window attachment of tide extrema to samples

use std::collections::HashSet;

use crate::data::{ExtremeEvent, ExtremeId};

/// Width of the forward window in hours
const WINDOW_HOURS: i64 = 2;

/// Tracks which extrema have already been attached during a run.
///
/// Extrema themselves stay immutable; consumption lives in this set so the same
/// event can never be attached to two samples, even across fetch starts.
#[derive(Debug, Default)]
pub struct ExtremeAssigner {
    consumed: HashSet<ExtremeId>,
}

impl ExtremeAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches the first unconsumed extreme with
    /// `sample_hour <= hour < sample_hour + 2`, scanning `events` in order.
    ///
    /// `events` must be sorted by ascending hour. Both hours are on the civil
    /// clock.
    pub fn assign<'a>(
        &mut self,
        sample_hour: i64,
        events: &'a [ExtremeEvent],
    ) -> Option<&'a ExtremeEvent> {
        let lower = sample_hour as f64;
        let upper = (sample_hour + WINDOW_HOURS) as f64;

        let event = events.iter().find(|event| {
            event.hour >= lower && event.hour < upper && !self.consumed.contains(&event.id)
        })?;
        self.consumed.insert(event.id);
        Some(event)
    }

    /// Number of extrema attached so far
    pub fn consumed_count(&self) -> usize {
        self.consumed.len()
    }
}
