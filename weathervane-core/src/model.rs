use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// A resolved location: coordinates plus the normalized administrative
/// fields a geocoding provider was able to supply.
///
/// Immutable once resolved; lives only for the duration of one lookup
/// session. Persistence of the display address is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    /// The provider's matched/display form of the input address.
    pub matched_address: String,
    pub city: Option<String>,
    pub county: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl Location {
    /// A location known only by coordinates, e.g. an airport from the
    /// local dataset. No geocoding involved.
    pub fn from_coordinates(latitude: f64, longitude: f64, label: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            matched_address: label.into(),
            city: None,
            county: None,
            state: None,
            zip: None,
        }
    }
}

/// The latest observation reported by a station, already unit-normalized
/// for display (°F, mph).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub temperature_f: Option<f64>,
    pub wind_speed_mph: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub description: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
}

/// An observation station ranked by proximity to a location.
///
/// `observation` is `None` when the station's latest-observation fetch
/// failed; station presence and observation presence are independent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Great-circle distance to the queried location, in miles.
    pub distance_miles: f64,
    pub observation: Option<Observation>,
}

/// One period of a forecast (daily or hourly), in the order the service
/// returned it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPeriod {
    pub name: String,
    pub start_time: DateTime<FixedOffset>,
    pub end_time: DateTime<FixedOffset>,
    pub temperature: f64,
    pub temperature_unit: String,
    pub wind_speed: Option<String>,
    pub wind_direction: Option<String>,
    pub short_forecast: String,
    pub detailed_forecast: Option<String>,
    pub precipitation_pct: Option<f64>,
}

/// An active weather alert for an area.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub event: String,
    pub severity: String,
    pub urgency: Option<String>,
    pub headline: Option<String>,
    pub description: Option<String>,
    pub area: String,
    pub effective: Option<DateTime<Utc>>,
    pub expires: Option<DateTime<Utc>>,
}

/// A bundle field: present with a value, or degraded with the reason the
/// sub-call failed. This is what lets one down sub-endpoint leave the other
/// three intact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Outcome<T> {
    Available(T),
    Unavailable { reason: String },
}

impl<T> Outcome<T> {
    pub fn available(&self) -> Option<&T> {
        match self {
            Outcome::Available(value) => Some(value),
            Outcome::Unavailable { .. } => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Outcome::Available(_))
    }

    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Outcome::Available(_) => None,
            Outcome::Unavailable { reason } => Some(reason),
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for Outcome<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Available(value),
            Err(err) => Outcome::Unavailable { reason: err.to_string() },
        }
    }
}

/// Everything one aggregation pass produces for a location. Each field is
/// written exactly once by its own call path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherBundle {
    pub forecast: Outcome<Vec<ForecastPeriod>>,
    pub hourly: Outcome<Vec<ForecastPeriod>>,
    pub alerts: Outcome<Vec<Alert>>,
    pub stations: Outcome<Vec<Station>>,
}

/// One row of the locally cached airport dataset.
///
/// `code` is the unique key within the dataset. `selected` marks airports
/// of interest for repeated lookups; filtering never touches it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AirportRecord {
    pub code: String,
    pub name: String,
    pub municipality: Option<String>,
    /// ISO region, e.g. "US-MT".
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub selected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_from_result() {
        let ok: Outcome<u32> = Ok::<_, std::io::Error>(7).into();
        assert!(ok.is_available());
        assert_eq!(ok.available(), Some(&7));

        let err: Outcome<u32> =
            Err::<u32, _>(std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out")).into();
        assert!(!err.is_available());
        assert_eq!(err.unavailable_reason(), Some("timed out"));
    }

    #[test]
    fn location_from_coordinates_has_no_admin_fields() {
        let loc = Location::from_coordinates(45.78, -111.15, "KBZN");
        assert_eq!(loc.matched_address, "KBZN");
        assert!(loc.city.is_none() && loc.state.is_none() && loc.zip.is_none());
    }
}
