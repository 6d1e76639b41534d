use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::analytics::types::VarianceRow;
use crate::analytics::utility::{coefficient_of_variation, mean, round_to, stddev};
use crate::models::{Direction, Measurement};

/// Ranks (hour, direction) buckets by coefficient of variation, most
/// unpredictable first.
///
/// Buckets are built in one pass and visited in (hour, direction) order; the
/// sort is stable, so equal CVs keep that order. Buckets without a CV (zero
/// mean) sort last.
pub fn hourly_variance(measurements: &[Measurement]) -> Vec<VarianceRow> {
    let mut buckets: BTreeMap<(u8, Direction), Vec<f64>> = BTreeMap::new();
    for m in measurements {
        buckets
            .entry((m.hour_local, m.direction))
            .or_default()
            .push(m.minutes());
    }

    let mut ranked: Vec<(Option<f64>, VarianceRow)> = buckets
        .into_iter()
        .map(|((hour, direction), minutes)| {
            let avg = mean(&minutes);
            let sd = stddev(&minutes, avg);
            let cv = coefficient_of_variation(sd, avg);
            let row = VarianceRow {
                hour,
                direction,
                mean_minutes: round_to(avg, 1),
                std_dev_minutes: round_to(sd, 1),
                coefficient_of_variation: cv.map(|v| round_to(v, 3)),
                sample_count: minutes.len(),
            };
            (cv, row)
        })
        .collect();

    ranked.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    ranked.into_iter().map(|(_, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Localizer;
    use chrono::{DateTime, TimeZone, Utc};
    use chrono_tz::America::Los_Angeles;

    fn at_hour(utc_hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 13, utc_hour, minute, 0).unwrap()
    }

    fn m(direction: Direction, at: DateTime<Utc>, minutes: u32) -> Measurement {
        let stamp = Localizer::new(Los_Angeles).stamp(at);
        Measurement::new("r", direction, at, minutes * 60, minutes * 60, stamp)
    }

    #[test]
    fn test_ranks_most_unpredictable_first() {
        let rows = vec![
            // 08:00 local: steady
            m(Direction::Outbound, at_hour(15, 0), 30),
            m(Direction::Outbound, at_hour(15, 20), 30),
            // 09:00 local: erratic
            m(Direction::Outbound, at_hour(16, 0), 20),
            m(Direction::Outbound, at_hour(16, 20), 60),
        ];

        let ranked = hourly_variance(&rows);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].hour, 9);
        assert_eq!(ranked[0].mean_minutes, 40.0);
        assert_eq!(ranked[0].std_dev_minutes, 20.0);
        assert_eq!(ranked[0].coefficient_of_variation, Some(0.5));
        assert_eq!(ranked[1].hour, 8);
        assert_eq!(ranked[1].coefficient_of_variation, Some(0.0));
    }

    #[test]
    fn test_zero_mean_bucket_has_no_cv_and_sorts_last() {
        let rows = vec![
            // 07:00 local: every sample zero
            m(Direction::Outbound, at_hour(14, 0), 0),
            m(Direction::Outbound, at_hour(14, 20), 0),
            // 08:00 local: steady
            m(Direction::Outbound, at_hour(15, 0), 30),
            m(Direction::Outbound, at_hour(15, 20), 30),
        ];

        let ranked = hourly_variance(&rows);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].hour, 8);
        assert_eq!(ranked[0].coefficient_of_variation, Some(0.0));
        assert_eq!(ranked[1].hour, 7);
        assert_eq!(ranked[1].mean_minutes, 0.0);
        assert_eq!(ranked[1].coefficient_of_variation, None);
        assert_eq!(ranked[1].sample_count, 2);
    }

    #[test]
    fn test_ties_keep_hour_then_direction_order() {
        let rows = vec![
            m(Direction::Inbound, at_hour(16, 0), 30),
            m(Direction::Outbound, at_hour(16, 0), 30),
            m(Direction::Outbound, at_hour(15, 0), 30),
        ];

        let ranked = hourly_variance(&rows);
        let keys: Vec<_> = ranked.iter().map(|r| (r.hour, r.direction)).collect();
        assert_eq!(
            keys,
            vec![
                (8, Direction::Outbound),
                (9, Direction::Outbound),
                (9, Direction::Inbound)
            ]
        );
    }

    #[test]
    fn test_bucket_counts_sum_to_direction_total() {
        let rows: Vec<_> = (0..12)
            .map(|i| {
                let direction = if i % 3 == 0 {
                    Direction::Inbound
                } else {
                    Direction::Outbound
                };
                m(direction, at_hour(12 + (i % 5), 0), 20 + i)
            })
            .collect();

        let ranked = hourly_variance(&rows);
        for direction in Direction::ALL {
            let bucketed: usize = ranked
                .iter()
                .filter(|r| r.direction == direction)
                .map(|r| r.sample_count)
                .sum();
            let total = rows.iter().filter(|r| r.direction == direction).count();
            assert_eq!(bucketed, total);
        }
    }
}
