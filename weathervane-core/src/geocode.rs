use crate::{
    Config,
    error::GeocodeError,
    geocode::{census::CensusGeocoder, nominatim::NominatimGeocoder},
    model::Location,
};
use async_trait::async_trait;
use std::{convert::TryFrom, fmt::Debug};

pub mod census;
pub mod nominatim;

/// User-Agent sent to both geocoding backends; Nominatim rejects anonymous
/// clients.
pub(crate) const USER_AGENT: &str = "weathervane/0.1 (weather lookup CLI)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeocoderId {
    Census,
    Nominatim,
}

impl GeocoderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeocoderId::Census => "census",
            GeocoderId::Nominatim => "nominatim",
        }
    }

    pub const fn all() -> &'static [GeocoderId] {
        &[GeocoderId::Census, GeocoderId::Nominatim]
    }
}

impl std::fmt::Display for GeocoderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for GeocoderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "census" => Ok(GeocoderId::Census),
            "nominatim" => Ok(GeocoderId::Nominatim),
            _ => Err(anyhow::anyhow!(
                "Unknown geocoder '{value}'. Supported geocoders: census, nominatim."
            )),
        }
    }
}

/// The one capability a geocoding backend must provide. No backend-specific
/// fields leak past this boundary; both produce the same [`Location`] shape.
///
/// Resolution is a single attempt per provider. Retrying with the alternate
/// provider is an explicit caller decision, never automatic.
#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    async fn resolve(&self, address: &str) -> Result<Location, GeocodeError>;
}

fn http_client(config: &Config) -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout())
        .user_agent(USER_AGENT)
        .build()
        .map_err(anyhow::Error::from)
}

/// Construct a geocoder from config and an explicit [`GeocoderId`].
pub fn geocoder_from_config(
    id: GeocoderId,
    config: &Config,
) -> anyhow::Result<Box<dyn Geocoder>> {
    let http = http_client(config)?;

    let boxed: Box<dyn Geocoder> = match id {
        GeocoderId::Census => {
            let api_key = config.census_api_key();
            if api_key.is_none() {
                tracing::warn!(
                    "no Census API key configured; geocoding proceeds unauthenticated with \
                     tighter rate limits"
                );
            }
            Box::new(CensusGeocoder::new(http, api_key))
        }
        GeocoderId::Nominatim => Box::new(NominatimGeocoder::new(http)),
    };

    Ok(boxed)
}

/// Construct the configured default geocoder.
pub fn default_geocoder_from_config(config: &Config) -> anyhow::Result<Box<dyn Geocoder>> {
    let id = config.geocoder_id()?;
    geocoder_from_config(id, config)
}
