//! Core records: observed trips and forecasts, plus the local-time stamp
//! attached to both when they are created.

use chrono::{DateTime, Datelike, NaiveDateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::holidays::is_holiday;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown direction '{0}' (expected outbound or inbound)")]
    UnknownDirection(String),
    #[error("unknown traffic model '{0}' (expected best_guess, pessimistic or optimistic)")]
    UnknownTrafficModel(String),
}

/// Travel direction relative to the route's configured origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outbound,
    Inbound,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Outbound, Direction::Inbound];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Outbound => "outbound",
            Direction::Inbound => "inbound",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "outbound" => Ok(Direction::Outbound),
            "inbound" => Ok(Direction::Inbound),
            other => Err(ParseError::UnknownDirection(other.to_string())),
        }
    }
}

/// Forecast variant requested from the directions provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficModel {
    BestGuess,
    Pessimistic,
    Optimistic,
}

impl TrafficModel {
    pub const ALL: [TrafficModel; 3] = [
        TrafficModel::BestGuess,
        TrafficModel::Pessimistic,
        TrafficModel::Optimistic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficModel::BestGuess => "best_guess",
            TrafficModel::Pessimistic => "pessimistic",
            TrafficModel::Optimistic => "optimistic",
        }
    }
}

impl fmt::Display for TrafficModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrafficModel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best_guess" => Ok(TrafficModel::BestGuess),
            "pessimistic" => Ok(TrafficModel::Pessimistic),
            "optimistic" => Ok(TrafficModel::Optimistic),
            other => Err(ParseError::UnknownTrafficModel(other.to_string())),
        }
    }
}

/// Local calendar facts for an instant. Computed once, then stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalStamp {
    pub local: NaiveDateTime,
    /// 0 = Sunday .. 6 = Saturday
    pub day_of_week: u8,
    pub hour_local: u8,
    pub is_holiday: bool,
}

/// Converts UTC instants into route-local bucket keys for a fixed time zone.
#[derive(Debug, Clone, Copy)]
pub struct Localizer {
    tz: Tz,
}

impl Localizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn stamp(&self, instant: DateTime<Utc>) -> LocalStamp {
        let local = instant.with_timezone(&self.tz).naive_local();
        LocalStamp {
            local,
            day_of_week: local.weekday().num_days_from_sunday() as u8,
            hour_local: local.hour() as u8,
            is_holiday: is_holiday(local.date()),
        }
    }
}

/// One observed trip. `id` is assigned by the store on append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub id: u64,
    pub route_id: String,
    pub direction: Direction,
    pub measured_at: DateTime<Utc>,
    pub measured_at_local: NaiveDateTime,
    pub duration_seconds: u32,
    pub duration_in_traffic_seconds: u32,
    pub day_of_week: u8,
    pub hour_local: u8,
    pub is_holiday: bool,
}

impl Measurement {
    pub fn new(
        route_id: &str,
        direction: Direction,
        measured_at: DateTime<Utc>,
        duration_seconds: u32,
        duration_in_traffic_seconds: u32,
        stamp: LocalStamp,
    ) -> Self {
        Self {
            id: 0,
            route_id: route_id.to_string(),
            direction,
            measured_at,
            measured_at_local: stamp.local,
            duration_seconds,
            duration_in_traffic_seconds,
            day_of_week: stamp.day_of_week,
            hour_local: stamp.hour_local,
            is_holiday: stamp.is_holiday,
        }
    }

    /// Congested travel time in minutes, the value every statistic is built on.
    pub fn minutes(&self) -> f64 {
        self.duration_in_traffic_seconds as f64 / 60.0
    }
}

/// One forecast for a future departure.
///
/// `actual_measurement_id` is filled in by reconciliation at most once. It is
/// resolved from the link log on read and never written to the forecast rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: u64,
    pub route_id: String,
    pub direction: Direction,
    pub traffic_model: TrafficModel,
    pub predicted_at: DateTime<Utc>,
    pub predicted_for: DateTime<Utc>,
    pub predicted_for_local: NaiveDateTime,
    pub predicted_duration_seconds: u32,
    #[serde(default, skip_serializing)]
    pub actual_measurement_id: Option<u64>,
    pub day_of_week: u8,
    pub hour_local: u8,
    pub is_holiday: bool,
}

impl PredictionRecord {
    pub fn new(
        route_id: &str,
        direction: Direction,
        traffic_model: TrafficModel,
        predicted_at: DateTime<Utc>,
        predicted_for: DateTime<Utc>,
        predicted_duration_seconds: u32,
        stamp: LocalStamp,
    ) -> Self {
        Self {
            id: 0,
            route_id: route_id.to_string(),
            direction,
            traffic_model,
            predicted_at,
            predicted_for,
            predicted_for_local: stamp.local,
            predicted_duration_seconds,
            actual_measurement_id: None,
            day_of_week: stamp.day_of_week,
            hour_local: stamp.hour_local,
            is_holiday: stamp.is_holiday,
        }
    }

    pub fn is_linked(&self) -> bool {
        self.actual_measurement_id.is_some()
    }

    pub fn predicted_minutes(&self) -> f64 {
        self.predicted_duration_seconds as f64 / 60.0
    }
}
