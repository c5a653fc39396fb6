//! Weather aggregation: one point resolution, then four independent
//! fetches joined into a [`WeatherBundle`].
//!
//! The point resolution is the only load-bearing call. Each of the four
//! sub-calls carries its own retry budget, and a sub-call that still fails
//! degrades its one bundle field to `Unavailable` with the reason. A single
//! down sub-endpoint must not block the other three.

use crate::error::WeatherError;
use crate::model::{Location, Outcome, WeatherBundle};
use crate::nws::{NwsClient, NwsError};
use crate::stations;

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    /// How many nearby stations to rank and report.
    pub station_limit: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self { station_limit: 4 }
    }
}

/// Fetch everything the service publishes for a location in one pass.
///
/// Fails only when the point metadata itself cannot be resolved; after
/// that, every field of the bundle is written exactly once by its own call
/// path, degraded or not. No caching: each invocation is a fresh set of
/// network calls.
pub async fn aggregate(
    client: &NwsClient,
    location: &Location,
    options: AggregateOptions,
) -> Result<WeatherBundle, WeatherError> {
    let point =
        client.point(location.latitude, location.longitude).await.map_err(|err| match err {
            NwsError::PointNotCovered => WeatherError::PointNotCovered {
                latitude: location.latitude,
                longitude: location.longitude,
            },
            NwsError::Upstream { reason, source } => WeatherError::Unavailable { reason, source },
        })?;

    let (forecast, hourly, alerts, station_observations) = tokio::join!(
        client.forecast(&point),
        client.forecast_hourly(&point),
        client.active_alerts(location.latitude, location.longitude),
        stations::find_nearby_at(client, &point, location, options.station_limit),
    );

    Ok(WeatherBundle {
        forecast: into_outcome("forecast", forecast),
        hourly: into_outcome("hourly", hourly),
        alerts: into_outcome("alerts", alerts),
        stations: into_outcome("stations", station_observations),
    })
}

fn into_outcome<T, E: std::fmt::Display>(field: &'static str, result: Result<T, E>) -> Outcome<T> {
    match result {
        Ok(value) => Outcome::Available(value),
        Err(err) => {
            tracing::warn!(field, error = %err, "bundle field degraded to unavailable");
            Outcome::Unavailable { reason: err.to_string() }
        }
    }
}
