//! Travel-time statistics.
//!
//! Pure functions turn a filtered set of measurements into percentile
//! summaries, an unpredictability ranking by hour, traffic pattern buckets and
//! reliability curves. [`analyzer`] wraps them with store access and filter
//! validation; [`writetos3`] publishes finished reports.

pub mod analyzer;
pub mod patterns;
pub mod reliability;
pub mod summary;
pub mod types;
pub mod utility;
pub mod variance;
pub mod writetos3;
