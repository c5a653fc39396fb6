use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{error::GeocodeError, model::Location};

use super::Geocoder;

const CENSUS_BASE_URL: &str = "https://geocoding.geo.census.gov";
const BENCHMARK: &str = "Public_AR_Current";

/// US Census Bureau onelineaddress geocoder. Works without a key; an API
/// key only raises the rate limits.
#[derive(Debug, Clone)]
pub struct CensusGeocoder {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CensusGeocoder {
    pub fn new(http: Client, api_key: Option<String>) -> Self {
        Self { http, base_url: CENSUS_BASE_URL.to_string(), api_key }
    }

    /// Point the geocoder at a different host. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Geocoder for CensusGeocoder {
    async fn resolve(&self, address: &str) -> Result<Location, GeocodeError> {
        let url = format!("{}/geocoder/locations/onelineaddress", self.base_url);

        let mut params = vec![
            ("address", address),
            ("benchmark", BENCHMARK),
            ("format", "json"),
        ];
        if let Some(key) = self.api_key.as_deref() {
            params.push(("key", key));
        }

        let res = self
            .http
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| GeocodeError::transport("failed to reach Census geocoder", e))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| GeocodeError::transport("failed to read Census response body", e))?;

        if !status.is_success() {
            return Err(GeocodeError::unavailable(format!(
                "Census request failed with status {status}: {}",
                truncate_body(&body),
            )));
        }

        let parsed: CensusResponse = serde_json::from_str(&body).map_err(|e| {
            GeocodeError::unavailable(format!("failed to parse Census JSON: {e}"))
        })?;

        let best = parsed
            .result
            .address_matches
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NoMatch { address: address.to_string() })?;

        let components = best.address_components.unwrap_or_default();

        Ok(Location {
            latitude: best.coordinates.y,
            longitude: best.coordinates.x,
            matched_address: best.matched_address,
            city: components.city.filter(|s| !s.is_empty()),
            // The onelineaddress endpoint does not report a county.
            county: None,
            state: components.state.filter(|s| !s.is_empty()),
            zip: components.zip.filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct CensusResponse {
    result: CensusResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CensusResult {
    #[serde(default)]
    address_matches: Vec<CensusMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CensusMatch {
    coordinates: CensusCoordinates,
    matched_address: String,
    address_components: Option<CensusComponents>,
}

#[derive(Debug, Deserialize)]
struct CensusCoordinates {
    /// Longitude.
    x: f64,
    /// Latitude.
    y: f64,
}

#[derive(Debug, Default, Deserialize)]
struct CensusComponents {
    city: Option<String>,
    state: Option<String>,
    zip: Option<String>,
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX { format!("{}...", &body[..MAX]) } else { body.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MATCHED: &str = r#"{
        "result": {
            "addressMatches": [
                {
                    "matchedAddress": "4600 SILVER HILL RD, WASHINGTON, DC, 20233",
                    "coordinates": { "x": -76.92744, "y": 38.845985 },
                    "addressComponents": {
                        "city": "WASHINGTON",
                        "state": "DC",
                        "zip": "20233"
                    }
                }
            ]
        }
    }"#;

    const NO_MATCH: &str = r#"{ "result": { "addressMatches": [] } }"#;

    fn geocoder(server: &MockServer) -> CensusGeocoder {
        CensusGeocoder::new(Client::new(), None).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn resolves_a_matched_address() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/geocoder/locations/onelineaddress"))
            .and(query_param("benchmark", BENCHMARK))
            .respond_with(ResponseTemplate::new(200).set_body_raw(MATCHED, "application/json"))
            .mount(&server)
            .await;

        let location =
            geocoder(&server).resolve("4600 Silver Hill Rd, Washington DC").await.unwrap();

        // Inside the DC bounding box.
        assert!(location.latitude > 38.7 && location.latitude < 39.0);
        assert!(location.longitude > -77.2 && location.longitude < -76.8);
        assert_eq!(location.city.as_deref(), Some("WASHINGTON"));
        assert_eq!(location.state.as_deref(), Some("DC"));
        assert_eq!(location.zip.as_deref(), Some("20233"));
    }

    #[tokio::test]
    async fn zero_matches_is_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(NO_MATCH, "application/json"))
            .mount(&server)
            .await;

        let err = geocoder(&server).resolve("nowhere at all").await.unwrap_err();
        assert!(matches!(err, GeocodeError::NoMatch { .. }));
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = geocoder(&server).resolve("1 Main St").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn api_key_is_sent_when_configured() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("key", "CENSUS_KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(MATCHED, "application/json"))
            .mount(&server)
            .await;

        let geocoder = CensusGeocoder::new(Client::new(), Some("CENSUS_KEY".into()))
            .with_base_url(server.uri());
        assert!(geocoder.resolve("4600 Silver Hill Rd").await.is_ok());
    }
}
