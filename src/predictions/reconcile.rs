//! Links forecasts to the measurement that observed the trip they predicted.

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::filter::FilterSpec;
use crate::models::{Direction, Measurement, PredictionRecord};
use crate::store::{MeasurementStore, PredictionStore};

/// Largest gap between a forecast's target time and a matching measurement.
pub const MATCH_TOLERANCE_MINUTES: i64 = 30;

pub fn match_tolerance() -> TimeDelta {
    TimeDelta::minutes(MATCH_TOLERANCE_MINUTES)
}

/// One route's measurements, split by direction and sorted by `measured_at`.
pub struct MeasurementIndex {
    by_direction: HashMap<Direction, Vec<(DateTime<Utc>, u64)>>,
}

impl MeasurementIndex {
    pub fn new(measurements: &[Measurement]) -> Self {
        let mut by_direction: HashMap<Direction, Vec<(DateTime<Utc>, u64)>> = HashMap::new();
        for m in measurements {
            by_direction
                .entry(m.direction)
                .or_default()
                .push((m.measured_at, m.id));
        }
        for series in by_direction.values_mut() {
            series.sort();
        }
        Self { by_direction }
    }

    /// Id of the measurement nearest to `target` within `tolerance`
    /// (inclusive). On equal distance the earlier measurement wins.
    pub fn closest(
        &self,
        direction: Direction,
        target: DateTime<Utc>,
        tolerance: TimeDelta,
    ) -> Option<u64> {
        let series = self.by_direction.get(&direction)?;
        let idx = series.partition_point(|(at, _)| *at < target);

        let before = idx.checked_sub(1).map(|i| series[i]);
        let after = series.get(idx).copied();

        let best = match (before, after) {
            (Some(b), Some(a)) => {
                if target - b.0 <= a.0 - target {
                    b
                } else {
                    a
                }
            }
            (Some(b), None) => b,
            (None, Some(a)) => a,
            (None, None) => return None,
        };

        ((best.0 - target).abs() <= tolerance).then_some(best.1)
    }
}

/// Pairs each candidate with its nearest measurement. Candidates without a
/// match inside the tolerance are left out and stay unlinked.
pub fn match_predictions(
    candidates: &[PredictionRecord],
    index: &MeasurementIndex,
    tolerance: TimeDelta,
) -> Vec<(u64, u64)> {
    candidates
        .iter()
        .filter(|p| !p.is_linked())
        .filter_map(|p| {
            index
                .closest(p.direction, p.predicted_for, tolerance)
                .map(|measurement_id| (p.id, measurement_id))
        })
        .collect()
}

/// Links every past, unlinked forecast of `route_id` that has a measurement
/// within the tolerance window. Returns how many links were written.
///
/// Already-linked forecasts are never touched, so running this twice without
/// new measurements links nothing the second time.
#[tracing::instrument(skip(store))]
pub fn reconcile<S>(store: &mut S, route_id: &str, now: DateTime<Utc>) -> Result<usize>
where
    S: MeasurementStore + PredictionStore,
{
    let candidates = store.fetch_unlinked_predictions(route_id, now)?;
    if candidates.is_empty() {
        debug!("No unlinked predictions to reconcile");
        return Ok(0);
    }

    let measurements = store.fetch_measurements(&FilterSpec::for_route(route_id))?;
    let index = MeasurementIndex::new(&measurements);
    let matches = match_predictions(&candidates, &index, match_tolerance());

    let mut linked = 0;
    for (prediction_id, measurement_id) in matches {
        if store.persist_link(prediction_id, measurement_id)? {
            linked += 1;
        }
    }

    info!(
        candidates = candidates.len(),
        linked,
        unmatched = candidates.len() - linked,
        "Reconciliation complete"
    );
    Ok(linked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Localizer, TrafficModel};
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use chrono_tz::America::Los_Angeles;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 13, 15, 0, 0).unwrap()
    }

    fn add_measurement(store: &mut MemoryStore, direction: Direction, at: DateTime<Utc>) -> u64 {
        let stamp = Localizer::new(Los_Angeles).stamp(at);
        store
            .append_measurement(Measurement::new("r", direction, at, 1500, 1800, stamp))
            .unwrap()
            .id
    }

    fn add_prediction(
        store: &mut MemoryStore,
        model: TrafficModel,
        target: DateTime<Utc>,
    ) -> u64 {
        let stamp = Localizer::new(Los_Angeles).stamp(target);
        let p = PredictionRecord::new(
            "r",
            Direction::Outbound,
            model,
            target - TimeDelta::days(1),
            target,
            1700,
            stamp,
        );
        store.append_prediction(p).unwrap().id
    }

    #[test]
    fn test_closest_picks_nearest() {
        let mut store = MemoryStore::new();
        add_measurement(&mut store, Direction::Outbound, base() - TimeDelta::minutes(10));
        let near = add_measurement(&mut store, Direction::Outbound, base() + TimeDelta::minutes(4));
        add_measurement(&mut store, Direction::Inbound, base());

        let rows = store.fetch_measurements(&FilterSpec::default()).unwrap();
        let index = MeasurementIndex::new(&rows);

        assert_eq!(
            index.closest(Direction::Outbound, base(), match_tolerance()),
            Some(near)
        );
    }

    #[test]
    fn test_closest_tie_prefers_earlier() {
        let mut store = MemoryStore::new();
        let later = add_measurement(&mut store, Direction::Outbound, base() + TimeDelta::minutes(5));
        let earlier = add_measurement(&mut store, Direction::Outbound, base() - TimeDelta::minutes(5));
        assert_ne!(later, earlier);

        let rows = store.fetch_measurements(&FilterSpec::default()).unwrap();
        let index = MeasurementIndex::new(&rows);
        assert_eq!(
            index.closest(Direction::Outbound, base(), match_tolerance()),
            Some(earlier)
        );
    }

    #[test]
    fn test_tolerance_boundary() {
        let mut store = MemoryStore::new();
        let exact = add_measurement(&mut store, Direction::Outbound, base() + TimeDelta::minutes(30));
        let rows = store.fetch_measurements(&FilterSpec::default()).unwrap();
        let index = MeasurementIndex::new(&rows);

        assert_eq!(
            index.closest(Direction::Outbound, base(), match_tolerance()),
            Some(exact)
        );
        assert_eq!(
            index.closest(
                Direction::Outbound,
                base() - TimeDelta::minutes(1),
                match_tolerance()
            ),
            None
        );
    }

    #[test]
    fn test_reconcile_links_once() {
        let mut store = MemoryStore::new();
        let m = add_measurement(&mut store, Direction::Outbound, base() + TimeDelta::minutes(2));
        add_prediction(&mut store, TrafficModel::BestGuess, base());
        add_prediction(&mut store, TrafficModel::Pessimistic, base());
        let now = base() + TimeDelta::hours(1);

        assert_eq!(reconcile(&mut store, "r", now).unwrap(), 2);
        assert_eq!(reconcile(&mut store, "r", now).unwrap(), 0);

        let predictions = store.fetch_predictions("r").unwrap();
        assert!(predictions.iter().all(|p| p.actual_measurement_id == Some(m)));
    }

    #[test]
    fn test_reconcile_skips_future_and_unmatched() {
        let mut store = MemoryStore::new();
        add_measurement(&mut store, Direction::Outbound, base());
        let far = add_prediction(&mut store, TrafficModel::BestGuess, base() + TimeDelta::minutes(31));
        add_prediction(&mut store, TrafficModel::BestGuess, base() + TimeDelta::hours(5));
        let now = base() + TimeDelta::hours(1);

        assert_eq!(reconcile(&mut store, "r", now).unwrap(), 0);

        // a later measurement makes the stale forecast linkable
        let m = add_measurement(&mut store, Direction::Outbound, base() + TimeDelta::minutes(45));
        assert_eq!(reconcile(&mut store, "r", now).unwrap(), 1);
        let linked = store
            .fetch_predictions("r")
            .unwrap()
            .into_iter()
            .find(|p| p.id == far)
            .unwrap();
        assert_eq!(linked.actual_measurement_id, Some(m));
    }
}
