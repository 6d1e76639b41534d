//! Periodic sampling of live travel times into the measurement store.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{Instrument, error, info, info_span};

use crate::config::RoutesConfig;
use crate::models::{Direction, Measurement, TrafficModel};
use crate::services::directions_api::{DirectionsApi, TravelTimeRequest};
use crate::store::MeasurementStore;

/// Samples every configured route in both directions at `now` and appends one
/// measurement per successful request. A failing request is logged and
/// skipped; store failures abort the round. Returns the number stored.
pub async fn collect_once<A, S>(
    api: &A,
    store: &mut S,
    config: &RoutesConfig,
    now: DateTime<Utc>,
) -> Result<usize>
where
    A: DirectionsApi + ?Sized,
    S: MeasurementStore,
{
    let localizer = config.localizer();
    let stamp = localizer.stamp(now);
    let mut stored = 0;

    for route in &config.routes {
        for direction in Direction::ALL {
            let span = info_span!("sample_route", route_id = %route.id, direction = %direction);

            let (from, to) = route.endpoints(direction);
            let request = TravelTimeRequest {
                origin: from.to_string(),
                destination: to.to_string(),
                departure: now,
                traffic_model: TrafficModel::BestGuess,
            };

            match api.travel_time(&request).instrument(span.clone()).await {
                Ok(t) => {
                    let m = store.append_measurement(Measurement::new(
                        &route.id,
                        direction,
                        now,
                        t.duration_seconds,
                        t.duration_in_traffic_seconds,
                        stamp,
                    ))?;
                    info!(
                        parent: &span,
                        measurement_id = m.id,
                        minutes = m.minutes(),
                        "Measurement stored"
                    );
                    stored += 1;
                }
                Err(e) => {
                    error!(parent: &span, error = %e, "Travel time request failed");
                }
            }
        }
    }

    Ok(stored)
}

/// Runs [`collect_once`] every `sample_rate` for `num_samples` rounds
/// (0 = until the process is stopped).
#[tracing::instrument(skip(api, store, config))]
pub async fn run_collector<A, S>(
    api: &A,
    store: &mut S,
    config: &RoutesConfig,
    sample_rate: Duration,
    num_samples: usize,
) -> Result<usize>
where
    A: DirectionsApi + ?Sized,
    S: MeasurementStore,
{
    if num_samples == 0 {
        info!("Sampling indefinitely. Press Ctrl+C to stop.");
    } else {
        info!(num_samples, "Starting sample collection");
    }

    let mut sample_count = 0;
    let mut total = 0;

    loop {
        if num_samples > 0 && sample_count >= num_samples {
            break;
        }
        sample_count += 1;

        let stored = collect_once(api, store, config, Utc::now()).await?;
        total += stored;
        info!(sample = sample_count, stored, "Sample round complete");

        if num_samples == 0 || sample_count < num_samples {
            tokio::time::sleep(sample_rate).await;
        }
    }

    info!(total, "Finished collecting");
    Ok(total)
}
