//! Requests forecasts for upcoming departure slots and stores them.

use anyhow::Result;
use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use std::time::Duration;
use tracing::{Instrument, error, info, info_span};

use crate::config::RoutesConfig;
use crate::models::{Direction, Localizer, PredictionRecord, TrafficModel};
use crate::services::directions_api::{DirectionsApi, TravelTimeRequest};
use crate::store::PredictionStore;

pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    /// Number of local calendar days to cover, starting today.
    pub days: u32,
    /// Local hours of day to forecast.
    pub hours: Vec<u8>,
    pub traffic_models: Vec<TrafficModel>,
    /// Delay between consecutive provider requests.
    pub pacing: Duration,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            days: 7,
            hours: (6..=20).collect(),
            traffic_models: TrafficModel::ALL.to_vec(),
            pacing: DEFAULT_PACING,
        }
    }
}

/// Local hourly departure slots from today through `days` days, strictly
/// after `now`, in ascending order. Hours that do not exist locally (DST gap)
/// are skipped.
pub fn target_slots(
    localizer: &Localizer,
    now: DateTime<Utc>,
    days: u32,
    hours: &[u8],
) -> Vec<DateTime<Utc>> {
    let tz = localizer.tz();
    let today = now.with_timezone(&tz).date_naive();

    let mut slots = Vec::new();
    for offset in 0..days {
        let Some(date) = today.checked_add_days(Days::new(offset as u64)) else {
            continue;
        };
        for &hour in hours {
            let Some(time) = NaiveTime::from_hms_opt(hour as u32, 0, 0) else {
                continue;
            };
            let Some(local) = tz.from_local_datetime(&date.and_time(time)).earliest() else {
                continue;
            };
            let slot = local.with_timezone(&Utc);
            if slot > now {
                slots.push(slot);
            }
        }
    }
    slots.sort();
    slots.dedup();
    slots
}

/// Requests and stores forecasts for every route, slot, direction and model.
/// Requests run one at a time with `options.pacing` between them; failures
/// are logged and skipped. Returns the number stored.
#[tracing::instrument(skip(api, store, config))]
pub async fn generate_predictions<A, S>(
    api: &A,
    store: &mut S,
    config: &RoutesConfig,
    options: &GeneratorOptions,
    now: DateTime<Utc>,
) -> Result<usize>
where
    A: DirectionsApi + ?Sized,
    S: PredictionStore,
{
    let localizer = config.localizer();
    let slots = target_slots(&localizer, now, options.days, &options.hours);
    info!(slots = slots.len(), routes = config.routes.len(), "Generating predictions");

    let mut stored = 0;
    let mut first_request = true;

    for route in &config.routes {
        let span = info_span!("predict_route", route_id = %route.id);
        let mut route_stored = 0;

        for &slot in &slots {
            for direction in Direction::ALL {
                let (from, to) = route.endpoints(direction);
                for &traffic_model in &options.traffic_models {
                    if !first_request && !options.pacing.is_zero() {
                        tokio::time::sleep(options.pacing).await;
                    }
                    first_request = false;

                    let request = TravelTimeRequest {
                        origin: from.to_string(),
                        destination: to.to_string(),
                        departure: slot,
                        traffic_model,
                    };

                    match api.travel_time(&request).instrument(span.clone()).await {
                        Ok(t) => {
                            store.append_prediction(PredictionRecord::new(
                                &route.id,
                                direction,
                                traffic_model,
                                now,
                                slot,
                                t.duration_in_traffic_seconds,
                                localizer.stamp(slot),
                            ))?;
                            route_stored += 1;
                        }
                        Err(e) => {
                            error!(
                                parent: &span,
                                error = %e,
                                %slot,
                                %direction,
                                %traffic_model,
                                "Forecast request failed"
                            );
                        }
                    }
                }
            }
        }

        info!(parent: &span, stored = route_stored, "Route forecasts stored");
        stored += route_stored;
    }

    Ok(stored)
}
