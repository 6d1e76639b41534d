use std::collections::BTreeMap;

use crate::analytics::types::Summary;
use crate::analytics::utility::{
    coefficient_of_variation, mean, percentile, round_to, sorted, stddev,
};
use crate::models::{Direction, Measurement};

/// Summarizes one direction's minute durations. Returns `None` for empty input.
pub fn summarize(direction: Direction, samples: &[f64]) -> Option<Summary> {
    if samples.is_empty() {
        return None;
    }

    let sorted = sorted(samples);
    let avg = mean(&sorted);
    let sd = stddev(&sorted, avg);
    let p = |level: f64| percentile(&sorted, level).map(|v| round_to(v, 1));

    Some(Summary {
        direction,
        sample_count: sorted.len(),
        mean: round_to(avg, 1),
        median: p(50.0)?,
        p75: p(75.0)?,
        p90: p(90.0)?,
        p95: p(95.0)?,
        std_dev: round_to(sd, 1),
        min: round_to(sorted[0], 1),
        max: round_to(sorted[sorted.len() - 1], 1),
        coefficient_of_variation: coefficient_of_variation(sd, avg).map(|cv| round_to(cv, 3)),
    })
}

/// Splits measurements into per-direction minute series, outbound first.
pub fn minutes_by_direction(measurements: &[Measurement]) -> BTreeMap<Direction, Vec<f64>> {
    let mut series: BTreeMap<Direction, Vec<f64>> = BTreeMap::new();
    for m in measurements {
        series.entry(m.direction).or_default().push(m.minutes());
    }
    series
}

/// One [`Summary`] per direction present in `measurements`.
pub fn summarize_by_direction(measurements: &[Measurement]) -> Vec<Summary> {
    minutes_by_direction(measurements)
        .into_iter()
        .filter_map(|(direction, minutes)| summarize(direction, &minutes))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Localizer;
    use chrono::{TimeZone, Utc};
    use chrono_tz::America::Los_Angeles;

    #[test]
    fn test_summarize_known_values() {
        let s = summarize(Direction::Outbound, &[50.0, 10.0, 40.0, 20.0, 30.0]).unwrap();

        assert_eq!(s.sample_count, 5);
        assert_eq!(s.mean, 30.0);
        assert_eq!(s.median, 30.0);
        assert_eq!(s.p90, 46.0);
        assert_eq!(s.min, 10.0);
        assert_eq!(s.max, 50.0);
        assert_eq!(s.std_dev, 14.1);
        assert_eq!(s.coefficient_of_variation, Some(0.471));
    }

    #[test]
    fn test_summarize_scenario() {
        let samples = [60.0, 70.0, 80.0, 90.0, 100.0, 110.0, 120.0];
        let s = summarize(Direction::Inbound, &samples).unwrap();

        assert_eq!(s.mean, 90.0);
        assert_eq!(s.median, 90.0);
        assert_eq!(s.p90, 114.0);
        assert_eq!(s.std_dev, 20.0);
        assert_eq!(s.coefficient_of_variation, Some(0.222));
    }

    #[test]
    fn test_summarize_even_length_median() {
        let s = summarize(Direction::Outbound, &[10.0, 20.0, 30.0, 40.0]).unwrap();
        assert_eq!(s.median, 25.0);
    }

    #[test]
    fn test_summarize_empty_is_none() {
        assert!(summarize(Direction::Outbound, &[]).is_none());
    }

    #[test]
    fn test_summarize_zero_mean_has_no_cv() {
        let s = summarize(Direction::Outbound, &[0.0, 0.0]).unwrap();
        assert_eq!(s.coefficient_of_variation, None);
    }

    #[test]
    fn test_summarize_by_direction_omits_missing_direction() {
        let localizer = Localizer::new(Los_Angeles);
        let at = Utc.with_ymd_and_hms(2024, 3, 13, 15, 0, 0).unwrap();
        let rows: Vec<Measurement> = [1200, 1800, 2400]
            .iter()
            .map(|&secs| {
                Measurement::new("r", Direction::Inbound, at, secs, secs, localizer.stamp(at))
            })
            .collect();

        let summaries = summarize_by_direction(&rows);
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].direction, Direction::Inbound);
        assert_eq!(summaries[0].mean, 30.0);
    }
}
