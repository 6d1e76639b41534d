//! Output rows produced by the analytics engine. All durations are minutes.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::filter::FilterSpec;
use crate::models::Direction;
use crate::predictions::types::AccuracyRow;

/// Percentile summary for one direction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub direction: Direction,
    pub sample_count: usize,
    pub mean: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// `None` when the mean is zero.
    pub coefficient_of_variation: Option<f64>,
}

/// Spread of travel times within one (hour, direction) bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VarianceRow {
    pub hour: u8,
    pub direction: Direction,
    pub mean_minutes: f64,
    pub std_dev_minutes: f64,
    pub coefficient_of_variation: Option<f64>,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficPattern {
    VeryFast,
    Fast,
    Moderate,
    Slow,
    VerySlow,
}

impl TrafficPattern {
    pub const ALL: [TrafficPattern; 5] = [
        TrafficPattern::VeryFast,
        TrafficPattern::Fast,
        TrafficPattern::Moderate,
        TrafficPattern::Slow,
        TrafficPattern::VerySlow,
    ];
}

/// Upper bounds (inclusive) of the first four traffic pattern buckets.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PatternThresholds {
    pub very_fast_max: f64,
    pub fast_max: f64,
    pub moderate_max: f64,
    pub slow_max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrafficPatternRow {
    pub category: TrafficPattern,
    pub count: usize,
    pub percentage: f64,
    /// Exclusive lower bound; `None` for the fastest bucket.
    pub min_minutes: Option<f64>,
    /// Inclusive upper bound; `None` for the slowest bucket.
    pub max_minutes: Option<f64>,
}

/// "`confidence_level`% of trips finish within `duration_minutes`."
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReliabilityRow {
    pub direction: Direction,
    pub confidence_level: u8,
    pub duration_minutes: i64,
}

/// Everything the dashboard needs for one filter, as a single JSON document.
#[derive(Debug, Serialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub filter: FilterSpec,
    pub summaries: Vec<Summary>,
    pub hourly_variance: Vec<VarianceRow>,
    pub traffic_patterns: Vec<TrafficPatternRow>,
    pub reliability: Vec<ReliabilityRow>,
    pub accuracy: Vec<AccuracyRow>,
}
