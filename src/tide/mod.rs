//! Tide pipeline: classification, extreme assignment and record building
//!
//! Turns raw provider heights and extrema into [`TideRecord`]s for one spot.
//!
//! [`TideRecord`]: crate::data::TideRecord

pub mod assign;
pub mod builder;
pub mod classify;

pub use assign::ExtremeAssigner;
pub use builder::{timestamps_to_fetch, TideRecordBuilder};
pub use classify::{admits_local_hour, classify, sample_local_hour};
