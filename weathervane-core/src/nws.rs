//! Client for the National Weather Service API (api.weather.gov).
//!
//! Point metadata maps coordinates onto the service's forecast grid and
//! carries the URLs for that grid cell's forecast, hourly forecast, and
//! observation-station list. Every other call hangs off those URLs or a
//! station identifier. Only the fields the core displays are deserialized;
//! the rest of each payload is ignored.

use chrono::{DateTime, FixedOffset, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::Config;
use crate::model::{Alert, ForecastPeriod, Observation};
use crate::retry::{RetryPolicy, send_with_retry};
use crate::units::{self, SpeedUnit, TemperatureUnit};

const NWS_BASE_URL: &str = "https://api.weather.gov";

/// Failures at the weather-service client layer. Callers translate these
/// into their own taxonomy (`StationError`, `WeatherError`, or a degraded
/// bundle field).
#[derive(Debug, Error)]
pub enum NwsError {
    /// The service publishes no grid for these coordinates (HTTP 404 from
    /// `/points`). Expected for locations outside the US.
    #[error("the weather service does not cover this point")]
    PointNotCovered,

    #[error("{reason}")]
    Upstream {
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },
}

impl NwsError {
    fn upstream(reason: impl Into<String>) -> Self {
        NwsError::Upstream { reason: reason.into(), source: None }
    }

    fn transport(reason: impl Into<String>, source: reqwest::Error) -> Self {
        NwsError::Upstream { reason: reason.into(), source: Some(source) }
    }
}

/// Point metadata for one coordinate pair: the grid-cell resource URLs the
/// service assigned to it.
#[derive(Debug, Clone)]
pub struct GridPoint {
    pub forecast_url: String,
    pub forecast_hourly_url: String,
    pub stations_url: String,
}

/// A station as listed for a grid cell, before ranking and before any
/// observation is attached.
#[derive(Debug, Clone)]
pub struct StationMeta {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone)]
pub struct NwsClient {
    http: Client,
    base_url: String,
    retry: RetryPolicy,
}

impl NwsClient {
    pub fn new(http: Client) -> Self {
        Self { http, base_url: NWS_BASE_URL.to_string(), retry: RetryPolicy::default() }
    }

    /// Build a client from config: per-call timeout, identifying
    /// User-Agent (the service requires one), retry budget.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(crate::geocode::USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_url: NWS_BASE_URL.to_string(),
            retry: RetryPolicy::new(config.max_retries, config.retry_backoff()),
        })
    }

    /// Point the client at a different host. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolve the grid-cell metadata for a coordinate pair.
    pub async fn point(&self, latitude: f64, longitude: f64) -> Result<GridPoint, NwsError> {
        // The service rejects more than four decimal places with a redirect.
        let url = format!("{}/points/{:.4},{:.4}", self.base_url, latitude, longitude);

        let response = send_with_retry(self.retry, || self.http.get(&url).send())
            .await
            .map_err(|e| NwsError::transport("failed to reach the weather service", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(NwsError::PointNotCovered);
        }
        let status = response.status();
        if !status.is_success() {
            return Err(NwsError::upstream(format!(
                "point lookup failed with status {status}"
            )));
        }

        let parsed: PointResponse = response
            .json()
            .await
            .map_err(|e| NwsError::transport("failed to parse point metadata", e))?;

        Ok(GridPoint {
            forecast_url: parsed.properties.forecast,
            forecast_hourly_url: parsed.properties.forecast_hourly,
            stations_url: parsed.properties.observation_stations,
        })
    }

    /// The 7-period (day/night) forecast for a grid cell, in service order.
    pub async fn forecast(&self, point: &GridPoint) -> Result<Vec<ForecastPeriod>, NwsError> {
        let parsed: ForecastResponse = self.get_json(&point.forecast_url, "forecast").await?;
        Ok(parsed.properties.periods.into_iter().map(WirePeriod::into_period).collect())
    }

    /// The hourly forecast for a grid cell, in service order.
    pub async fn forecast_hourly(
        &self,
        point: &GridPoint,
    ) -> Result<Vec<ForecastPeriod>, NwsError> {
        let parsed: ForecastResponse =
            self.get_json(&point.forecast_hourly_url, "hourly forecast").await?;
        Ok(parsed.properties.periods.into_iter().map(WirePeriod::into_period).collect())
    }

    /// Active alerts covering a point, in service order.
    pub async fn active_alerts(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Vec<Alert>, NwsError> {
        let url =
            format!("{}/alerts/active?point={:.4},{:.4}", self.base_url, latitude, longitude);
        let parsed: AlertsResponse = self.get_json(&url, "active alerts").await?;

        Ok(parsed
            .features
            .into_iter()
            .map(|feature| {
                let p = feature.properties;
                Alert {
                    id: p.id,
                    event: p.event,
                    severity: p.severity,
                    urgency: p.urgency,
                    headline: p.headline,
                    description: p.description,
                    area: p.area_desc,
                    effective: p.effective.map(|t| t.with_timezone(&Utc)),
                    expires: p.expires.map(|t| t.with_timezone(&Utc)),
                }
            })
            .collect())
    }

    /// The observation stations listed for a grid cell, in service order.
    pub async fn stations(&self, point: &GridPoint) -> Result<Vec<StationMeta>, NwsError> {
        let parsed: StationsResponse =
            self.get_json(&point.stations_url, "station list").await?;

        Ok(parsed
            .features
            .into_iter()
            .map(|feature| StationMeta {
                id: feature.properties.station_identifier,
                name: feature.properties.name,
                // GeoJSON order: [longitude, latitude].
                latitude: feature.geometry.coordinates[1],
                longitude: feature.geometry.coordinates[0],
            })
            .collect())
    }

    /// The latest observation for one station, unit-normalized for display.
    pub async fn latest_observation(&self, station_id: &str) -> Result<Observation, NwsError> {
        let url = format!("{}/stations/{}/observations/latest", self.base_url, station_id);
        let parsed: ObservationResponse =
            self.get_json(&url, "latest observation").await?;
        Ok(normalize_observation(parsed.properties))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T, NwsError> {
        let response = send_with_retry(self.retry, || self.http.get(url).send())
            .await
            .map_err(|e| NwsError::transport(format!("failed to fetch {what}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NwsError::upstream(format!(
                "{what} request failed with status {status}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| NwsError::transport(format!("failed to parse {what} payload"), e))
    }
}

fn normalize_observation(props: ObservationProperties) -> Observation {
    let temperature_f = quantity_as(props.temperature, |value, code| {
        let unit = code.unwrap_or(TemperatureUnit::Celsius);
        units::to_fahrenheit(value, unit).ok()
    });
    let wind_speed_mph = quantity_as(props.wind_speed, |value, code| {
        let unit = code.unwrap_or(SpeedUnit::KilometersPerHour);
        units::to_mph(value, unit).ok()
    });
    let wind_direction_deg =
        props.wind_direction.and_then(|q| q.value);

    Observation {
        temperature_f,
        wind_speed_mph,
        wind_direction_deg,
        description: props.text_description.filter(|s| !s.is_empty()),
        observed_at: props.timestamp,
    }
}

fn quantity_as<U>(
    quantity: Option<Quantity>,
    convert: impl Fn(f64, Option<U>) -> Option<f64>,
) -> Option<f64>
where
    U: UnitCode,
{
    let quantity = quantity?;
    let value = quantity.value?;
    let unit = quantity.unit_code.as_deref().and_then(U::parse);
    convert(value, unit)
}

/// Internal helper so `quantity_as` can parse either unit enum.
trait UnitCode: Sized {
    fn parse(code: &str) -> Option<Self>;
}

impl UnitCode for TemperatureUnit {
    fn parse(code: &str) -> Option<Self> {
        TemperatureUnit::from_unit_code(code)
    }
}

impl UnitCode for SpeedUnit {
    fn parse(code: &str) -> Option<Self> {
        SpeedUnit::from_unit_code(code)
    }
}

#[derive(Debug, Deserialize)]
struct PointResponse {
    properties: PointProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointProperties {
    forecast: String,
    forecast_hourly: String,
    observation_stations: String,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: ForecastProperties,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    periods: Vec<WirePeriod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePeriod {
    name: String,
    start_time: DateTime<FixedOffset>,
    end_time: DateTime<FixedOffset>,
    temperature: f64,
    temperature_unit: String,
    wind_speed: Option<String>,
    wind_direction: Option<String>,
    short_forecast: String,
    detailed_forecast: Option<String>,
    probability_of_precipitation: Option<Quantity>,
}

impl WirePeriod {
    fn into_period(self) -> ForecastPeriod {
        ForecastPeriod {
            name: self.name,
            start_time: self.start_time,
            end_time: self.end_time,
            temperature: self.temperature,
            temperature_unit: self.temperature_unit,
            wind_speed: self.wind_speed,
            wind_direction: self.wind_direction,
            short_forecast: self.short_forecast,
            detailed_forecast: self.detailed_forecast.filter(|s| !s.is_empty()),
            precipitation_pct: self.probability_of_precipitation.and_then(|q| q.value),
        }
    }
}

/// A `{value, unitCode}` quantity as the service reports numeric fields.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Quantity {
    value: Option<f64>,
    unit_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StationsResponse {
    features: Vec<StationFeature>,
}

#[derive(Debug, Deserialize)]
struct StationFeature {
    properties: StationFeatureProperties,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StationFeatureProperties {
    station_identifier: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    coordinates: [f64; 2],
}

#[derive(Debug, Deserialize)]
struct AlertsResponse {
    #[serde(default)]
    features: Vec<AlertFeature>,
}

#[derive(Debug, Deserialize)]
struct AlertFeature {
    properties: AlertProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertProperties {
    id: String,
    event: String,
    severity: String,
    urgency: Option<String>,
    headline: Option<String>,
    description: Option<String>,
    area_desc: String,
    effective: Option<DateTime<FixedOffset>>,
    expires: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize)]
struct ObservationResponse {
    properties: ObservationProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ObservationProperties {
    timestamp: Option<DateTime<Utc>>,
    text_description: Option<String>,
    temperature: Option<Quantity>,
    wind_speed: Option<Quantity>,
    wind_direction: Option<Quantity>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn point_body(server_uri: &str) -> String {
        format!(
            r#"{{
                "properties": {{
                    "forecast": "{server_uri}/gridpoints/TOP/31,80/forecast",
                    "forecastHourly": "{server_uri}/gridpoints/TOP/31,80/forecast/hourly",
                    "observationStations": "{server_uri}/gridpoints/TOP/31,80/stations"
                }}
            }}"#
        )
    }

    const FORECAST: &str = r#"{
        "properties": {
            "periods": [
                {
                    "name": "Tonight",
                    "startTime": "2025-06-04T18:00:00-05:00",
                    "endTime": "2025-06-05T06:00:00-05:00",
                    "temperature": 58,
                    "temperatureUnit": "F",
                    "windSpeed": "5 to 10 mph",
                    "windDirection": "NW",
                    "shortForecast": "Partly Cloudy",
                    "detailedForecast": "Partly cloudy, with a low around 58.",
                    "probabilityOfPrecipitation": { "unitCode": "wmoUnit:percent", "value": 20 }
                },
                {
                    "name": "Thursday",
                    "startTime": "2025-06-05T06:00:00-05:00",
                    "endTime": "2025-06-05T18:00:00-05:00",
                    "temperature": 74,
                    "temperatureUnit": "F",
                    "windSpeed": "10 mph",
                    "windDirection": "W",
                    "shortForecast": "Sunny",
                    "detailedForecast": "",
                    "probabilityOfPrecipitation": { "unitCode": "wmoUnit:percent", "value": null }
                }
            ]
        }
    }"#;

    const OBSERVATION: &str = r#"{
        "properties": {
            "timestamp": "2025-06-04T17:53:00+00:00",
            "textDescription": "Mostly Clear",
            "temperature": { "unitCode": "wmoUnit:degC", "value": 20.0 },
            "windSpeed": { "unitCode": "wmoUnit:km_h-1", "value": 16.0 },
            "windDirection": { "unitCode": "wmoUnit:degree_(angle)", "value": 310 }
        }
    }"#;

    fn client(server: &MockServer) -> NwsClient {
        NwsClient::new(Client::new())
            .with_base_url(server.uri())
            .with_retry_policy(RetryPolicy::new(2, Duration::from_millis(1)))
    }

    #[tokio::test]
    async fn point_resolves_grid_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/points/39.0458,-76.6413"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(point_body(&server.uri()), "application/json"),
            )
            .mount(&server)
            .await;

        let point = client(&server).point(39.0458, -76.6413).await.unwrap();
        assert!(point.forecast_url.ends_with("/forecast"));
        assert!(point.forecast_hourly_url.ends_with("/hourly"));
        assert!(point.stations_url.ends_with("/stations"));
    }

    #[tokio::test]
    async fn point_404_is_not_covered() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        // Somewhere in the North Atlantic.
        let err = client(&server).point(48.0, -30.0).await.unwrap_err();
        assert!(matches!(err, NwsError::PointNotCovered));
    }

    #[tokio::test]
    async fn forecast_preserves_service_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gridpoints/TOP/31,80/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(FORECAST, "application/json"))
            .mount(&server)
            .await;

        let point = GridPoint {
            forecast_url: format!("{}/gridpoints/TOP/31,80/forecast", server.uri()),
            forecast_hourly_url: String::new(),
            stations_url: String::new(),
        };
        let periods = client(&server).forecast(&point).await.unwrap();

        assert_eq!(periods.len(), 2);
        assert_eq!(periods[0].name, "Tonight");
        assert_eq!(periods[1].name, "Thursday");
        assert_eq!(periods[0].precipitation_pct, Some(20.0));
        assert_eq!(periods[1].precipitation_pct, None);
        // Empty detailed forecast collapses to None.
        assert!(periods[1].detailed_forecast.is_none());
    }

    #[tokio::test]
    async fn observation_is_unit_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stations/KBWI/observations/latest"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(OBSERVATION, "application/json"),
            )
            .mount(&server)
            .await;

        let obs = client(&server).latest_observation("KBWI").await.unwrap();
        // 20 °C = 68 °F; 16 km/h ≈ 9.94 mph.
        assert!((obs.temperature_f.unwrap() - 68.0).abs() < 1e-6);
        assert!((obs.wind_speed_mph.unwrap() - 9.9419).abs() < 1e-3);
        assert_eq!(obs.wind_direction_deg, Some(310.0));
        assert_eq!(obs.description.as_deref(), Some("Mostly Clear"));
    }

    #[tokio::test]
    async fn transient_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stations/KBWI/observations/latest"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/stations/KBWI/observations/latest"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(OBSERVATION, "application/json"),
            )
            .mount(&server)
            .await;

        let obs = client(&server).latest_observation("KBWI").await;
        assert!(obs.is_ok(), "one 502 within the retry budget must not surface");
    }

    #[tokio::test]
    async fn missing_observation_values_stay_absent() {
        let server = MockServer::start().await;
        let body = r#"{
            "properties": {
                "timestamp": null,
                "textDescription": "",
                "temperature": { "unitCode": "wmoUnit:degC", "value": null },
                "windSpeed": null,
                "windDirection": null
            }
        }"#;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
            .mount(&server)
            .await;

        let obs = client(&server).latest_observation("KMSO").await.unwrap();
        assert!(obs.temperature_f.is_none());
        assert!(obs.wind_speed_mph.is_none());
        assert!(obs.description.is_none());
    }
}
