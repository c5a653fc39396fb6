use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{error::GeocodeError, model::Location};

use super::Geocoder;

const NOMINATIM_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Nominatim (OpenStreetMap) search geocoder. No credential, worldwide
/// coverage, strict rate limits.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    http: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(http: Client) -> Self {
        Self { http, base_url: NOMINATIM_BASE_URL.to_string() }
    }

    /// Point the geocoder at a different host. Used by tests.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn resolve(&self, address: &str) -> Result<Location, GeocodeError> {
        let url = format!("{}/search", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", address),
                ("format", "json"),
                ("limit", "1"),
                ("addressdetails", "1"),
            ])
            .send()
            .await
            .map_err(|e| GeocodeError::transport("failed to reach Nominatim", e))?;

        let status = res.status();
        let body = res
            .text()
            .await
            .map_err(|e| GeocodeError::transport("failed to read Nominatim response body", e))?;

        if !status.is_success() {
            return Err(GeocodeError::unavailable(format!(
                "Nominatim request failed with status {status}"
            )));
        }

        let parsed: Vec<NominatimPlace> = serde_json::from_str(&body).map_err(|e| {
            GeocodeError::unavailable(format!("failed to parse Nominatim JSON: {e}"))
        })?;

        let place = parsed
            .into_iter()
            .next()
            .ok_or_else(|| GeocodeError::NoMatch { address: address.to_string() })?;

        // Nominatim serializes coordinates as strings.
        let latitude = place.lat.parse::<f64>().map_err(|_| {
            GeocodeError::unavailable(format!("Nominatim returned malformed latitude '{}'", place.lat))
        })?;
        let longitude = place.lon.parse::<f64>().map_err(|_| {
            GeocodeError::unavailable(format!("Nominatim returned malformed longitude '{}'", place.lon))
        })?;

        let address_details = place.address.unwrap_or_default();
        let city = address_details
            .city
            .or(address_details.town)
            .or(address_details.village)
            .filter(|s| !s.is_empty());

        Ok(Location {
            latitude,
            longitude,
            matched_address: place
                .display_name
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| address.to_string()),
            city,
            county: address_details.county.filter(|s| !s.is_empty()),
            state: address_details.state.filter(|s| !s.is_empty()),
            zip: address_details.postcode.filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
    postcode: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BOZEMAN: &str = r#"[
        {
            "lat": "45.679957",
            "lon": "-111.044756",
            "display_name": "Bozeman, Gallatin County, Montana, United States",
            "address": {
                "town": "Bozeman",
                "county": "Gallatin County",
                "state": "Montana",
                "postcode": "59715"
            }
        }
    ]"#;

    fn geocoder(server: &MockServer) -> NominatimGeocoder {
        NominatimGeocoder::new(Client::new()).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn resolves_with_administrative_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(BOZEMAN, "application/json"))
            .mount(&server)
            .await;

        let location = geocoder(&server).resolve("Bozeman MT").await.unwrap();

        // Inside the Bozeman bounding box.
        assert!(location.latitude > 45.6 && location.latitude < 45.8);
        assert!(location.longitude > -111.2 && location.longitude < -110.9);
        assert_eq!(location.city.as_deref(), Some("Bozeman"));
        assert_eq!(location.county.as_deref(), Some("Gallatin County"));
        assert_eq!(location.state.as_deref(), Some("Montana"));
        assert_eq!(location.zip.as_deref(), Some("59715"));
    }

    #[tokio::test]
    async fn empty_result_list_is_no_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("[]", "application/json"))
            .mount(&server)
            .await;

        let err = geocoder(&server).resolve("xyzzy").await.unwrap_err();
        assert!(matches!(err, GeocodeError::NoMatch { .. }));
    }

    #[tokio::test]
    async fn gateway_timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(504))
            .mount(&server)
            .await;

        let err = geocoder(&server).resolve("1 Main St").await.unwrap_err();
        assert!(matches!(err, GeocodeError::Unavailable { .. }));
    }
}
