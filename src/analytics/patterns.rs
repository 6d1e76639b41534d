use crate::analytics::types::{PatternThresholds, Summary, TrafficPattern, TrafficPatternRow};
use crate::analytics::utility::round_to;

/// Derives bucket boundaries from per-direction summaries.
///
/// Means and standard deviations are averaged across directions before the
/// boundaries are placed at `mean - 0.5σ`, `mean`, `mean + 0.5σ` and
/// `mean + 1.5σ`. Returns `None` when there are no summaries.
pub fn thresholds(summaries: &[Summary]) -> Option<PatternThresholds> {
    if summaries.is_empty() {
        return None;
    }

    let n = summaries.len() as f64;
    let overall_mean = summaries.iter().map(|s| s.mean).sum::<f64>() / n;
    let overall_sd = summaries.iter().map(|s| s.std_dev).sum::<f64>() / n;

    Some(PatternThresholds {
        very_fast_max: overall_mean - 0.5 * overall_sd,
        fast_max: overall_mean,
        moderate_max: overall_mean + 0.5 * overall_sd,
        slow_max: overall_mean + 1.5 * overall_sd,
    })
}

/// Buckets are closed on the upper side: a value equal to a boundary belongs
/// to the faster bucket.
pub fn categorize(minutes: f64, t: &PatternThresholds) -> TrafficPattern {
    if minutes <= t.very_fast_max {
        TrafficPattern::VeryFast
    } else if minutes <= t.fast_max {
        TrafficPattern::Fast
    } else if minutes <= t.moderate_max {
        TrafficPattern::Moderate
    } else if minutes <= t.slow_max {
        TrafficPattern::Slow
    } else {
        TrafficPattern::VerySlow
    }
}

/// Counts pooled samples (all directions) per bucket. All five buckets are
/// always returned, in order from fastest to slowest.
pub fn classify(minutes: &[f64], t: &PatternThresholds) -> Vec<TrafficPatternRow> {
    let mut counts = [0usize; 5];
    for &value in minutes {
        counts[categorize(value, t) as usize] += 1;
    }

    let total = minutes.len();
    let bounds = [
        (None, Some(t.very_fast_max)),
        (Some(t.very_fast_max), Some(t.fast_max)),
        (Some(t.fast_max), Some(t.moderate_max)),
        (Some(t.moderate_max), Some(t.slow_max)),
        (Some(t.slow_max), None),
    ];

    TrafficPattern::ALL
        .iter()
        .zip(counts)
        .zip(bounds)
        .map(|((&category, count), (lower, upper))| TrafficPatternRow {
            category,
            count,
            percentage: if total == 0 {
                0.0
            } else {
                round_to(count as f64 / total as f64 * 100.0, 1)
            },
            min_minutes: lower.map(|v: f64| round_to(v, 1)),
            max_minutes: upper.map(|v: f64| round_to(v, 1)),
        })
        .collect()
}
