//! Trait and types for querying a travel-time provider.

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::models::TrafficModel;

/// One travel-time question: how long from `origin` to `destination` when
/// leaving at `departure`, under `traffic_model`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TravelTimeRequest {
    pub origin: String,
    pub destination: String,
    pub departure: DateTime<Utc>,
    pub traffic_model: TrafficModel,
}

/// Baseline and congested durations in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TravelTime {
    pub duration_seconds: u32,
    pub duration_in_traffic_seconds: u32,
}

/// Abstraction over a directions provider (e.g., Google Maps).
#[async_trait::async_trait]
pub trait DirectionsApi: Send + Sync {
    async fn travel_time(&self, request: &TravelTimeRequest) -> Result<TravelTime>;
}
