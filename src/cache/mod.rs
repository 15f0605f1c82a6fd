//! Cache module for tide extrema lookups
//!
//! This module provides a per-run, per-location cache keyed by UTC day bucket.
//! Each bucket is fetched from the tide provider at most once per run; failed
//! lookups are not stored so a later request for the same day retries.

mod extremes;

pub use extremes::{DayExtremes, ExtremeCache};
