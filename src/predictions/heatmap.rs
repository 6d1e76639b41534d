use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::analytics::utility::{mean, round_to};
use crate::models::{Direction, PredictionRecord, TrafficModel};
use crate::predictions::types::HeatmapCell;

/// Averages upcoming forecasts (target at or after `now`) per weekday and
/// hour. Cells are ordered by weekday then hour; empty cells are absent.
pub fn prediction_heatmap(
    predictions: &[PredictionRecord],
    direction: Direction,
    traffic_model: TrafficModel,
    now: DateTime<Utc>,
) -> Vec<HeatmapCell> {
    let mut cells: BTreeMap<(u8, u8), Vec<f64>> = BTreeMap::new();
    for p in predictions.iter().filter(|p| {
        p.direction == direction && p.traffic_model == traffic_model && p.predicted_for >= now
    }) {
        cells
            .entry((p.day_of_week, p.hour_local))
            .or_default()
            .push(p.predicted_minutes());
    }

    cells
        .into_iter()
        .map(|((day_of_week, hour_local), minutes)| HeatmapCell {
            day_of_week,
            hour_local,
            predicted_minutes: round_to(mean(&minutes), 1),
            prediction_count: minutes.len(),
        })
        .collect()
}
