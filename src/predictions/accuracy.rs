//! Forecast error, bias and RMSE over linked forecasts.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::analytics::utility::{round_to, seconds_to_minutes};
use crate::models::{Direction, Measurement, PredictionRecord, TrafficModel};
use crate::predictions::types::{AccuracyRow, ModelAccuracy};
use crate::store::PredictionStore;

/// Running sums in seconds; converted to minutes only on output.
#[derive(Debug, Default)]
struct ErrorSums {
    count: usize,
    predicted: f64,
    actual: f64,
    abs_error: f64,
    error: f64,
    squared_error: f64,
}

impl ErrorSums {
    fn add(&mut self, prediction: &PredictionRecord, actual: &Measurement) {
        let predicted = prediction.predicted_duration_seconds as f64;
        let observed = actual.duration_in_traffic_seconds as f64;
        let diff = predicted - observed;

        self.count += 1;
        self.predicted += predicted;
        self.actual += observed;
        self.abs_error += diff.abs();
        self.error += diff;
        self.squared_error += diff * diff;
    }

    fn avg_minutes(&self, total: f64) -> f64 {
        round_to(seconds_to_minutes(total / self.count as f64), 1)
    }

    fn rmse_minutes(&self) -> f64 {
        round_to(
            seconds_to_minutes((self.squared_error / self.count as f64).sqrt()),
            1,
        )
    }
}

/// A forecast only counts if it was made strictly before its target time.
fn participates(prediction: &PredictionRecord) -> bool {
    prediction.predicted_at < prediction.predicted_for
}

/// Groups linked forecasts by the forecast's own (direction, weekday, hour)
/// bucket. Rows are ordered by direction, weekday, then hour.
pub fn accuracy_rows(linked: &[(PredictionRecord, Measurement)]) -> Vec<AccuracyRow> {
    let mut groups: BTreeMap<(Direction, u8, u8), ErrorSums> = BTreeMap::new();
    for (prediction, actual) in linked.iter().filter(|(p, _)| participates(p)) {
        groups
            .entry((prediction.direction, prediction.day_of_week, prediction.hour_local))
            .or_default()
            .add(prediction, actual);
    }

    groups
        .into_iter()
        .map(|((direction, day_of_week, hour_local), sums)| AccuracyRow {
            direction,
            day_of_week,
            hour_local,
            prediction_count: sums.count,
            avg_predicted_minutes: sums.avg_minutes(sums.predicted),
            avg_actual_minutes: sums.avg_minutes(sums.actual),
            avg_error_minutes: sums.avg_minutes(sums.abs_error),
            avg_bias_minutes: sums.avg_minutes(sums.error),
            rmse_minutes: sums.rmse_minutes(),
        })
        .collect()
}

/// Pools every participating forecast of one model. `None` if there are none.
pub fn model_accuracy(
    traffic_model: TrafficModel,
    linked: &[(PredictionRecord, Measurement)],
) -> Option<ModelAccuracy> {
    let mut sums = ErrorSums::default();
    for (prediction, actual) in linked
        .iter()
        .filter(|(p, _)| p.traffic_model == traffic_model && participates(p))
    {
        sums.add(prediction, actual);
    }

    if sums.count == 0 {
        return None;
    }

    Some(ModelAccuracy {
        traffic_model,
        prediction_count: sums.count,
        avg_error_minutes: sums.avg_minutes(sums.abs_error),
        avg_bias_minutes: sums.avg_minutes(sums.error),
        rmse_minutes: sums.rmse_minutes(),
    })
}

/// Per-bucket accuracy of one model's forecasts for a route.
#[tracing::instrument(skip(store))]
pub fn get_prediction_accuracy<S: PredictionStore>(
    store: &S,
    route_id: &str,
    traffic_model: TrafficModel,
) -> Result<Vec<AccuracyRow>> {
    let linked = store.fetch_linked_predictions(route_id, traffic_model)?;
    Ok(accuracy_rows(&linked))
}

/// One pooled accuracy line per traffic model that has linked forecasts.
#[tracing::instrument(skip(store))]
pub fn accuracy_overview<S: PredictionStore>(store: &S, route_id: &str) -> Result<Vec<ModelAccuracy>> {
    let mut overview = Vec::new();
    for model in TrafficModel::ALL {
        let linked = store.fetch_linked_predictions(route_id, model)?;
        if let Some(row) = model_accuracy(model, &linked) {
            overview.push(row);
        }
    }
    Ok(overview)
}
