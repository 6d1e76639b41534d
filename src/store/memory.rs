use anyhow::Result;
use chrono::{DateTime, Utc};

use super::{MeasurementStore, PredictionStore, join_linked};
use crate::filter::FilterSpec;
use crate::models::{Measurement, PredictionRecord, TrafficModel};

/// In-memory store. Ids start at 1 and follow insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    measurements: Vec<Measurement>,
    predictions: Vec<PredictionRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MeasurementStore for MemoryStore {
    fn append_measurement(&mut self, mut measurement: Measurement) -> Result<Measurement> {
        measurement.id = self.measurements.len() as u64 + 1;
        self.measurements.push(measurement.clone());
        Ok(measurement)
    }

    fn fetch_measurements(&self, filter: &FilterSpec) -> Result<Vec<Measurement>> {
        Ok(self
            .measurements
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect())
    }
}

impl PredictionStore for MemoryStore {
    fn append_prediction(&mut self, mut prediction: PredictionRecord) -> Result<PredictionRecord> {
        prediction.id = self.predictions.len() as u64 + 1;
        prediction.actual_measurement_id = None;
        self.predictions.push(prediction.clone());
        Ok(prediction)
    }

    fn fetch_predictions(&self, route_id: &str) -> Result<Vec<PredictionRecord>> {
        Ok(self
            .predictions
            .iter()
            .filter(|p| p.route_id == route_id)
            .cloned()
            .collect())
    }

    fn fetch_unlinked_predictions(
        &self,
        route_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PredictionRecord>> {
        Ok(self
            .predictions
            .iter()
            .filter(|p| p.route_id == route_id && !p.is_linked() && p.predicted_for < now)
            .cloned()
            .collect())
    }

    fn fetch_linked_predictions(
        &self,
        route_id: &str,
        traffic_model: TrafficModel,
    ) -> Result<Vec<(PredictionRecord, Measurement)>> {
        let predictions = self.fetch_predictions(route_id)?;
        Ok(join_linked(predictions, &self.measurements, traffic_model))
    }

    fn persist_link(&mut self, prediction_id: u64, measurement_id: u64) -> Result<bool> {
        match self.predictions.iter_mut().find(|p| p.id == prediction_id) {
            Some(p) if p.actual_measurement_id.is_none() => {
                p.actual_measurement_id = Some(measurement_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
