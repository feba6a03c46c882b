//! Post-processing of day-bucketed datastore results: reducers, calendar
//! regrouping, and range filling for statements that returned nothing.

pub mod fill;
pub mod reducers;
pub mod regroup;

pub use fill::{fill, FillPlan};
pub use reducers::{Accumulator, Reducer};
pub use regroup::{regroup, timestamp_ms};
