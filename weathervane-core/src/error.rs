//! Error taxonomy shared across the core.
//!
//! Every failure mode is representable as "this one lookup did not succeed"
//! with a reason; nothing here is intended to abort the process.

use thiserror::Error;

/// Failures while resolving an address to coordinates.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The provider returned zero (or only ambiguous) matches.
    #[error("no match found for address '{address}'")]
    NoMatch { address: String },

    /// The provider could not be reached or answered with a non-2xx status.
    #[error("geocoding service unavailable: {reason}")]
    Unavailable {
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },
}

impl GeocodeError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        GeocodeError::Unavailable { reason: reason.into(), source: None }
    }

    pub fn transport(reason: impl Into<String>, source: reqwest::Error) -> Self {
        GeocodeError::Unavailable { reason: reason.into(), source: Some(source) }
    }
}

/// Failures while locating observation stations near a point.
#[derive(Debug, Error)]
pub enum StationError {
    /// The coordinates fall outside the weather service's coverage area.
    /// Expected for non-US locations; non-fatal to the caller.
    #[error("coordinates ({latitude}, {longitude}) are outside the weather service coverage area")]
    PointNotCovered { latitude: f64, longitude: f64 },

    #[error("station lookup unavailable: {reason}")]
    Unavailable {
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },
}

/// Failures of the weather aggregation as a whole.
///
/// Only the initial point-metadata resolution is load-bearing; any later
/// sub-call failure degrades a single bundle field instead of surfacing here.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("coordinates ({latitude}, {longitude}) are outside the weather service coverage area")]
    PointNotCovered { latitude: f64, longitude: f64 },

    #[error("weather service unavailable: {reason}")]
    Unavailable {
        reason: String,
        #[source]
        source: Option<reqwest::Error>,
    },
}

/// Failures of the unit normalizer.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// Input was NaN or infinite.
    #[error("cannot convert non-finite value {0}")]
    InvalidValue(f64),
}

/// Failures of the airport selector.
#[derive(Debug, Error)]
pub enum SelectionError {
    #[error("requested {requested} airports but only {available} are available")]
    InsufficientData { requested: usize, available: usize },
}
