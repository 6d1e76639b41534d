//! Query-time measurement filter shared by every analytics query.

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Direction, Measurement};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("end date {end} is before start date {start}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
}

/// Optional predicates over measurements.
///
/// Dates are inclusive and compared against the local measurement date.
/// `matches` is the only translation of a filter into a predicate; stores must
/// go through it so sample counts agree between reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterSpec {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub direction: Option<Direction>,
    pub route_id: Option<String>,
    pub exclude_holidays: bool,
    pub weekdays_only: bool,
}

impl FilterSpec {
    pub fn for_route(route_id: &str) -> Self {
        Self {
            route_id: Some(route_id.to_string()),
            ..Default::default()
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Rejects contradictory bounds before any store is queried.
    pub fn validate(&self) -> Result<(), FilterError> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(FilterError::InvertedDateRange { start, end });
            }
        }
        Ok(())
    }

    pub fn matches(&self, m: &Measurement) -> bool {
        let date = m.measured_at_local.date();

        if self.start_date.is_some_and(|start| date < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| date > end) {
            return false;
        }
        if self.direction.is_some_and(|d| d != m.direction) {
            return false;
        }
        if self.route_id.as_deref().is_some_and(|r| r != m.route_id) {
            return false;
        }
        if self.exclude_holidays && m.is_holiday {
            return false;
        }
        if self.weekdays_only && !(1..=5).contains(&m.day_of_week) {
            return false;
        }
        true
    }
}
