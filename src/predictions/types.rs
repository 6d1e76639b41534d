//! Output rows for forecast accuracy and heatmaps. All durations are minutes.

use serde::Serialize;

use crate::models::{Direction, TrafficModel};

/// Accuracy of one traffic model's forecasts for a (direction, weekday, hour)
/// bucket. Positive bias means the forecast over-estimated the trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyRow {
    pub direction: Direction,
    pub day_of_week: u8,
    pub hour_local: u8,
    pub prediction_count: usize,
    pub avg_predicted_minutes: f64,
    pub avg_actual_minutes: f64,
    pub avg_error_minutes: f64,
    pub avg_bias_minutes: f64,
    pub rmse_minutes: f64,
}

/// Pooled accuracy of one traffic model across every bucket of a route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelAccuracy {
    pub traffic_model: TrafficModel,
    pub prediction_count: usize,
    pub avg_error_minutes: f64,
    pub avg_bias_minutes: f64,
    pub rmse_minutes: f64,
}

/// Mean forecast for one (weekday, hour) cell of the upcoming week.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub day_of_week: u8,
    pub hour_local: u8,
    pub predicted_minutes: f64,
    pub prediction_count: usize,
}
