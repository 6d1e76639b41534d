use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};

use crate::analytics::patterns::{classify, thresholds};
use crate::analytics::reliability::reliability;
use crate::analytics::summary::summarize_by_direction;
use crate::analytics::types::{
    AnalyticsReport, ReliabilityRow, Summary, TrafficPatternRow, VarianceRow,
};
use crate::analytics::variance::hourly_variance;
use crate::filter::FilterSpec;
use crate::models::{Measurement, TrafficModel};
use crate::predictions::accuracy::get_prediction_accuracy;
use crate::store::{MeasurementStore, PredictionStore};

/// Validates the filter, then loads the matching measurements.
fn load<S: MeasurementStore>(store: &S, filter: &FilterSpec) -> Result<Vec<Measurement>> {
    filter.validate()?;
    let rows = store.fetch_measurements(filter)?;
    debug!(sample_count = rows.len(), "Loaded measurements");
    Ok(rows)
}

/// One [`Summary`] per direction that has measurements.
#[tracing::instrument(skip(store))]
pub fn get_statistical_summary<S: MeasurementStore>(
    store: &S,
    filter: &FilterSpec,
) -> Result<Vec<Summary>> {
    Ok(summarize_by_direction(&load(store, filter)?))
}

#[tracing::instrument(skip(store))]
pub fn get_hourly_variance<S: MeasurementStore>(
    store: &S,
    filter: &FilterSpec,
) -> Result<Vec<VarianceRow>> {
    Ok(hourly_variance(&load(store, filter)?))
}

/// Five pattern rows, or none when the filter matches no measurements.
#[tracing::instrument(skip(store))]
pub fn get_traffic_patterns<S: MeasurementStore>(
    store: &S,
    filter: &FilterSpec,
) -> Result<Vec<TrafficPatternRow>> {
    let rows = load(store, filter)?;
    Ok(traffic_patterns(&rows))
}

fn traffic_patterns(rows: &[Measurement]) -> Vec<TrafficPatternRow> {
    let summaries = summarize_by_direction(rows);
    match thresholds(&summaries) {
        Some(t) => {
            let minutes: Vec<f64> = rows.iter().map(Measurement::minutes).collect();
            classify(&minutes, &t)
        }
        None => Vec::new(),
    }
}

#[tracing::instrument(skip(store))]
pub fn get_reliability_metrics<S: MeasurementStore>(
    store: &S,
    filter: &FilterSpec,
    levels: &[u8],
) -> Result<Vec<ReliabilityRow>> {
    Ok(reliability(&load(store, filter)?, levels))
}

/// Builds every report section from a single fetch so the sections agree.
/// Best-guess accuracy is included when the filter names a route.
#[tracing::instrument(skip(store))]
pub fn build_report<S>(store: &S, filter: &FilterSpec, levels: &[u8]) -> Result<AnalyticsReport>
where
    S: MeasurementStore + PredictionStore,
{
    let rows = load(store, filter)?;

    let accuracy = match &filter.route_id {
        Some(route_id) => get_prediction_accuracy(store, route_id, TrafficModel::BestGuess)?,
        None => Vec::new(),
    };

    let report = AnalyticsReport {
        generated_at: Utc::now(),
        filter: filter.clone(),
        summaries: summarize_by_direction(&rows),
        hourly_variance: hourly_variance(&rows),
        traffic_patterns: traffic_patterns(&rows),
        reliability: reliability(&rows, levels),
        accuracy,
    };

    info!(
        sample_count = rows.len(),
        directions = report.summaries.len(),
        accuracy_rows = report.accuracy.len(),
        "Report built"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::reliability::DEFAULT_CONFIDENCE_LEVELS;
    use crate::filter::FilterError;
    use crate::models::{Direction, Localizer};
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::America::Los_Angeles;

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        let localizer = Localizer::new(Los_Angeles);
        for (i, minutes) in [60u32, 70, 80, 90, 100, 110, 120].iter().enumerate() {
            let at = Utc.with_ymd_and_hms(2024, 3, 11 + i as u32, 15, 0, 0).unwrap();
            store
                .append_measurement(Measurement::new(
                    "commute",
                    Direction::Outbound,
                    at,
                    minutes * 50,
                    minutes * 60,
                    localizer.stamp(at),
                ))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_malformed_filter_fails_before_fetch() {
        let store = seeded();
        let filter = FilterSpec {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 20),
            end_date: NaiveDate::from_ymd_opt(2024, 3, 1),
            ..Default::default()
        };

        let err = get_statistical_summary(&store, &filter).unwrap_err();
        assert!(err.downcast_ref::<FilterError>().is_some());
    }

    #[test]
    fn test_empty_filter_result_is_not_an_error() {
        let store = seeded();
        let filter = FilterSpec::for_route("nowhere");

        assert!(get_statistical_summary(&store, &filter).unwrap().is_empty());
        assert!(get_traffic_patterns(&store, &filter).unwrap().is_empty());
        assert!(get_reliability_metrics(&store, &filter, &DEFAULT_CONFIDENCE_LEVELS)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_report_sections_agree_on_sample_count() {
        let store = seeded();
        let filter = FilterSpec::for_route("commute");
        let report = build_report(&store, &filter, &DEFAULT_CONFIDENCE_LEVELS).unwrap();

        let summary_count: usize = report.summaries.iter().map(|s| s.sample_count).sum();
        let variance_count: usize = report.hourly_variance.iter().map(|v| v.sample_count).sum();
        let pattern_count: usize = report.traffic_patterns.iter().map(|p| p.count).sum();

        assert_eq!(summary_count, 7);
        assert_eq!(variance_count, 7);
        assert_eq!(pattern_count, 7);
        assert_eq!(report.reliability.len(), 5);
        assert!(report.accuracy.is_empty());
    }

    #[test]
    fn test_weekday_filter_drops_weekend_samples() {
        let store = seeded();
        // 2024-03-11 (Mon) .. 2024-03-17 (Sun)
        let filter = FilterSpec {
            weekdays_only: true,
            ..Default::default()
        };
        let summaries = get_statistical_summary(&store, &filter).unwrap();
        assert_eq!(summaries[0].sample_count, 5);
        assert_eq!(summaries[0].max, 100.0);
    }
}
