//! Persistence for measurements, forecasts and the links between them.
//!
//! Both stores are append-only. [`CsvStore`] keeps one CSV file per record
//! kind in a data directory; [`MemoryStore`] holds the same records in memory.

mod csv_store;
mod memory;

pub use csv_store::CsvStore;
pub use memory::MemoryStore;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::filter::FilterSpec;
use crate::models::{Measurement, PredictionRecord, TrafficModel};

pub trait MeasurementStore {
    /// Appends a measurement, assigning its `id`. Returns the stored record.
    fn append_measurement(&mut self, measurement: Measurement) -> Result<Measurement>;

    /// Measurements accepted by [`FilterSpec::matches`], in insertion order.
    fn fetch_measurements(&self, filter: &FilterSpec) -> Result<Vec<Measurement>>;
}

pub trait PredictionStore {
    /// Appends a forecast, assigning its `id`. Any link on the input is dropped.
    fn append_prediction(&mut self, prediction: PredictionRecord) -> Result<PredictionRecord>;

    /// All forecasts for a route, with links resolved.
    fn fetch_predictions(&self, route_id: &str) -> Result<Vec<PredictionRecord>>;

    /// Unlinked forecasts for a route whose target time is before `now`.
    fn fetch_unlinked_predictions(
        &self,
        route_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PredictionRecord>>;

    /// Linked forecasts for a route and model, joined with their measurement.
    fn fetch_linked_predictions(
        &self,
        route_id: &str,
        traffic_model: TrafficModel,
    ) -> Result<Vec<(PredictionRecord, Measurement)>>;

    /// Records a link. Returns `false` without writing if the forecast is
    /// unknown or already linked.
    fn persist_link(&mut self, prediction_id: u64, measurement_id: u64) -> Result<bool>;
}

/// Joins linked forecasts with their measurements. Shared by both stores.
fn join_linked(
    predictions: Vec<PredictionRecord>,
    measurements: &[Measurement],
    traffic_model: TrafficModel,
) -> Vec<(PredictionRecord, Measurement)> {
    let by_id: std::collections::HashMap<u64, &Measurement> =
        measurements.iter().map(|m| (m.id, m)).collect();

    predictions
        .into_iter()
        .filter(|p| p.traffic_model == traffic_model)
        .filter_map(|p| {
            let actual = p.actual_measurement_id.and_then(|id| by_id.get(&id))?;
            let actual = (*actual).clone();
            Some((p, actual))
        })
        .collect()
}
