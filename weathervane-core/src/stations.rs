//! Nearest-station lookup: grid-cell station list, ranked by great-circle
//! distance to the queried location.

use haversine::{Location as HaversineLocation, Units, distance};

use crate::error::StationError;
use crate::model::{Location, Station};
use crate::nws::{NwsClient, NwsError, StationMeta};

/// Distances within this of each other count as equal; ties keep the
/// service's original relative order.
const TIE_TOLERANCE_MILES: f64 = 0.01;

/// Rank the grid cell's observation stations by distance to `location`,
/// ascending, and attach each station's latest observation.
///
/// A failed observation fetch leaves that station in the result with
/// `observation: None`; station presence and observation presence are
/// independent signals.
pub async fn find_nearby(
    client: &NwsClient,
    location: &Location,
    max: usize,
) -> Result<Vec<Station>, StationError> {
    let point =
        client.point(location.latitude, location.longitude).await.map_err(|err| match err {
            NwsError::PointNotCovered => StationError::PointNotCovered {
                latitude: location.latitude,
                longitude: location.longitude,
            },
            NwsError::Upstream { reason, source } => StationError::Unavailable { reason, source },
        })?;

    find_nearby_at(client, &point, location, max).await
}

/// Same as [`find_nearby`] but for a point the caller already resolved;
/// the aggregator uses this to avoid a second metadata round trip.
pub(crate) async fn find_nearby_at(
    client: &NwsClient,
    point: &crate::nws::GridPoint,
    location: &Location,
    max: usize,
) -> Result<Vec<Station>, StationError> {
    let listed = client.stations(point).await.map_err(|err| match err {
        // The station list is fetched for a point that already resolved, so
        // a 404 here is an upstream fault, not a coverage gap.
        NwsError::PointNotCovered => StationError::Unavailable {
            reason: "station list missing for a covered point".to_string(),
            source: None,
        },
        NwsError::Upstream { reason, source } => StationError::Unavailable { reason, source },
    })?;

    attach_observations(client, listed, location, max).await
}

async fn attach_observations(
    client: &NwsClient,
    listed: Vec<StationMeta>,
    location: &Location,
    max: usize,
) -> Result<Vec<Station>, StationError> {
    let ranked = rank_by_distance(listed, location.latitude, location.longitude, max);

    let mut stations = Vec::with_capacity(ranked.len());
    for (meta, distance_miles) in ranked {
        let observation = match client.latest_observation(&meta.id).await {
            Ok(observation) => Some(observation),
            Err(err) => {
                tracing::warn!(station = %meta.id, error = %err, "latest observation unavailable");
                None
            }
        };

        stations.push(Station {
            id: meta.id,
            name: meta.name,
            latitude: meta.latitude,
            longitude: meta.longitude,
            distance_miles,
            observation,
        });
    }

    Ok(stations)
}

/// Stable sort on the distance quantized to [`TIE_TOLERANCE_MILES`], then
/// truncate to `max`.
fn rank_by_distance(
    listed: Vec<StationMeta>,
    latitude: f64,
    longitude: f64,
    max: usize,
) -> Vec<(StationMeta, f64)> {
    let mut with_distance: Vec<(StationMeta, f64)> = listed
        .into_iter()
        .map(|meta| {
            let miles = distance(
                HaversineLocation { latitude, longitude },
                HaversineLocation { latitude: meta.latitude, longitude: meta.longitude },
                Units::Miles,
            );
            (meta, miles)
        })
        .collect();

    with_distance.sort_by_key(|(_, miles)| (miles / TIE_TOLERANCE_MILES).round() as i64);
    with_distance.truncate(max);
    with_distance
}
