//! Core library for the `weathervane` CLI.
//!
//! This crate defines:
//! - Geocoding over two interchangeable backends (Census, Nominatim)
//! - A National Weather Service client with bounded retries
//! - Nearest-station ranking and partial-failure weather aggregation
//! - Unit normalization and airport dataset filtering
//!
//! It is used by `weathervane-cli`, but can also be reused by other
//! binaries or services. The library performs outbound HTTPS calls only;
//! it opens no ports and persists nothing except its own configuration.

pub mod aggregate;
pub mod airports;
pub mod config;
pub mod error;
pub mod geocode;
pub mod model;
pub mod nws;
pub mod retry;
pub mod stations;
pub mod units;

pub use aggregate::{AggregateOptions, aggregate};
pub use config::Config;
pub use error::{ConversionError, GeocodeError, SelectionError, StationError, WeatherError};
pub use geocode::{Geocoder, GeocoderId, default_geocoder_from_config, geocoder_from_config};
pub use model::{
    AirportRecord, Alert, ForecastPeriod, Location, Observation, Outcome, Station, WeatherBundle,
};
pub use nws::NwsClient;
pub use stations::find_nearby;
