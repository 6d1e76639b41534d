use crate::analytics::summary::minutes_by_direction;
use crate::analytics::types::ReliabilityRow;
use crate::analytics::utility::{percentile, sorted};
use crate::models::Measurement;

pub const DEFAULT_CONFIDENCE_LEVELS: [u8; 5] = [50, 75, 80, 90, 95];

/// Builds "N% of trips finish within T minutes" rows, ordered by direction then
/// ascending confidence level. Levels are deduplicated; small samples are not
/// suppressed.
pub fn reliability(measurements: &[Measurement], levels: &[u8]) -> Vec<ReliabilityRow> {
    let mut levels: Vec<u8> = levels.iter().copied().filter(|&l| l <= 100).collect();
    levels.sort_unstable();
    levels.dedup();

    let mut rows = Vec::new();
    for (direction, minutes) in minutes_by_direction(measurements) {
        let sorted = sorted(&minutes);
        for &level in &levels {
            if let Some(value) = percentile(&sorted, level as f64) {
                rows.push(ReliabilityRow {
                    direction,
                    confidence_level: level,
                    duration_minutes: value.round() as i64,
                });
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, Localizer};
    use chrono::{TimeZone, Utc};
    use chrono_tz::America::Los_Angeles;

    fn rows_for(direction: Direction, minutes: &[u32]) -> Vec<Measurement> {
        let at = Utc.with_ymd_and_hms(2024, 3, 13, 15, 0, 0).unwrap();
        let stamp = Localizer::new(Los_Angeles).stamp(at);
        minutes
            .iter()
            .map(|&m| Measurement::new("r", direction, at, m * 60, m * 60, stamp))
            .collect()
    }

    #[test]
    fn test_reliability_rounds_to_whole_minutes() {
        let rows = rows_for(Direction::Outbound, &[60, 70, 80, 90, 100, 110, 120]);
        let out = reliability(&rows, &DEFAULT_CONFIDENCE_LEVELS);

        let durations: Vec<(u8, i64)> = out
            .iter()
            .map(|r| (r.confidence_level, r.duration_minutes))
            .collect();
        assert_eq!(durations, vec![(50, 90), (75, 105), (80, 108), (90, 114), (95, 117)]);
    }

    #[test]
    fn test_reliability_is_monotonic() {
        let rows = rows_for(Direction::Inbound, &[41, 29, 33, 58, 37, 30, 45, 62, 31]);
        let out = reliability(&rows, &[95, 50, 90, 75]);

        let levels: Vec<u8> = out.iter().map(|r| r.confidence_level).collect();
        assert_eq!(levels, vec![50, 75, 90, 95]);
        assert!(out.windows(2).all(|w| w[0].duration_minutes <= w[1].duration_minutes));
    }

    #[test]
    fn test_reliability_single_sample() {
        let rows = rows_for(Direction::Outbound, &[42]);
        let out = reliability(&rows, &DEFAULT_CONFIDENCE_LEVELS);

        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|r| r.duration_minutes == 42));
    }

    #[test]
    fn test_reliability_orders_by_direction() {
        let mut rows = rows_for(Direction::Inbound, &[30, 40]);
        rows.extend(rows_for(Direction::Outbound, &[20, 25]));
        let out = reliability(&rows, &[50]);

        assert_eq!(out[0].direction, Direction::Outbound);
        assert_eq!(out[0].duration_minutes, 23);
        assert_eq!(out[1].direction, Direction::Inbound);
        assert_eq!(out[1].duration_minutes, 35);
    }
}
