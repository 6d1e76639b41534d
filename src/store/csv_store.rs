use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{MeasurementStore, PredictionStore, join_linked};
use crate::filter::FilterSpec;
use crate::models::{Measurement, PredictionRecord, TrafficModel};

const MEASUREMENTS_FILE: &str = "measurements.csv";
const PREDICTIONS_FILE: &str = "predictions.csv";
const LINKS_FILE: &str = "links.csv";

/// One row of the link log. The first row for a prediction is authoritative.
#[derive(Debug, Serialize, Deserialize)]
struct LinkRow {
    prediction_id: u64,
    measurement_id: u64,
    linked_at: DateTime<Utc>,
}

/// Append-only CSV files under a data directory.
///
/// Rows are never rewritten: links live in their own log and are resolved on
/// read, so a forecast's link can be set once and never changed. Known
/// prediction ids and the link map are loaded once and kept current by this
/// handle, so linking does not rescan the files.
#[derive(Debug)]
pub struct CsvStore {
    dir: PathBuf,
    next_measurement_id: u64,
    next_prediction_id: u64,
    prediction_ids: HashSet<u64>,
    links: HashMap<u64, u64>,
}

impl CsvStore {
    /// Opens (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;

        let measurements: Vec<Measurement> = read_rows(&dir.join(MEASUREMENTS_FILE))?;
        let predictions: Vec<PredictionRecord> = read_rows(&dir.join(PREDICTIONS_FILE))?;

        let next_measurement_id = measurements.iter().map(|m| m.id).max().unwrap_or(0) + 1;
        let next_prediction_id = predictions.iter().map(|p| p.id).max().unwrap_or(0) + 1;
        let prediction_ids = predictions.iter().map(|p| p.id).collect();
        let links = load_links(&dir.join(LINKS_FILE))?;
        debug!(
            dir = %dir.display(),
            measurements = measurements.len(),
            predictions = predictions.len(),
            links = links.len(),
            "Opened CSV store"
        );

        Ok(Self {
            dir,
            next_measurement_id,
            next_prediction_id,
            prediction_ids,
            links,
        })
    }

    fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }

    fn all_predictions(&self) -> Result<Vec<PredictionRecord>> {
        let mut predictions: Vec<PredictionRecord> = read_rows(&self.path(PREDICTIONS_FILE))?;
        for p in &mut predictions {
            p.actual_measurement_id = self.links.get(&p.id).copied();
        }
        Ok(predictions)
    }
}

impl MeasurementStore for CsvStore {
    fn append_measurement(&mut self, mut measurement: Measurement) -> Result<Measurement> {
        measurement.id = self.next_measurement_id;
        append_row(&self.path(MEASUREMENTS_FILE), &measurement)?;
        self.next_measurement_id += 1;
        Ok(measurement)
    }

    fn fetch_measurements(&self, filter: &FilterSpec) -> Result<Vec<Measurement>> {
        let rows: Vec<Measurement> = read_rows(&self.path(MEASUREMENTS_FILE))?;
        Ok(rows.into_iter().filter(|m| filter.matches(m)).collect())
    }
}

impl PredictionStore for CsvStore {
    fn append_prediction(&mut self, mut prediction: PredictionRecord) -> Result<PredictionRecord> {
        prediction.id = self.next_prediction_id;
        prediction.actual_measurement_id = None;
        append_row(&self.path(PREDICTIONS_FILE), &prediction)?;
        self.prediction_ids.insert(prediction.id);
        self.next_prediction_id += 1;
        Ok(prediction)
    }

    fn fetch_predictions(&self, route_id: &str) -> Result<Vec<PredictionRecord>> {
        Ok(self
            .all_predictions()?
            .into_iter()
            .filter(|p| p.route_id == route_id)
            .collect())
    }

    fn fetch_unlinked_predictions(
        &self,
        route_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PredictionRecord>> {
        Ok(self
            .fetch_predictions(route_id)?
            .into_iter()
            .filter(|p| !p.is_linked() && p.predicted_for < now)
            .collect())
    }

    fn fetch_linked_predictions(
        &self,
        route_id: &str,
        traffic_model: TrafficModel,
    ) -> Result<Vec<(PredictionRecord, Measurement)>> {
        let predictions = self.fetch_predictions(route_id)?;
        let measurements = self.fetch_measurements(&FilterSpec::for_route(route_id))?;
        Ok(join_linked(predictions, &measurements, traffic_model))
    }

    fn persist_link(&mut self, prediction_id: u64, measurement_id: u64) -> Result<bool> {
        if self.links.contains_key(&prediction_id) || !self.prediction_ids.contains(&prediction_id) {
            return Ok(false);
        }

        let row = LinkRow {
            prediction_id,
            measurement_id,
            linked_at: Utc::now(),
        };
        append_row(&self.path(LINKS_FILE), &row)?;
        self.links.insert(prediction_id, measurement_id);
        Ok(true)
    }
}

/// Reads the link log into a prediction -> measurement map. The first row for
/// a prediction wins.
fn load_links(path: &Path) -> Result<HashMap<u64, u64>> {
    let rows: Vec<LinkRow> = read_rows(path)?;
    let mut links = HashMap::new();
    for row in rows {
        links.entry(row.prediction_id).or_insert(row.measurement_id);
    }
    Ok(links)
}

/// Appends one record to a CSV file, writing the header only when the file is
/// created.
fn append_row<T: Serialize>(path: &Path, row: &T) -> Result<()> {
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, "Appending CSV record");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);

    writer.serialize(row)?;
    writer.flush()?;

    Ok(())
}

/// Reads every record of a CSV file. A missing file reads as empty.
fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut rows = Vec::new();

    for result in rdr.deserialize() {
        let record: T = result.with_context(|| format!("malformed row in {}", path.display()))?;
        rows.push(record);
    }

    Ok(rows)
}
