//! Unit normalization for every downstream display step.
//!
//! Conversions are pure and return the unrounded value; callers that only
//! need display precision apply [`round_degree`] / [`round_tenth`] at format
//! time. The weather service reports quantities with WMO unit codes such as
//! `wmoUnit:degC` or `wmoUnit:km_h-1`; the `from_unit_code` constructors map
//! those onto the enums here.

use crate::error::ConversionError;

// Exact by definition: 1 mph = 0.44704 m/s, 1 mile = 1609.344 m.
const METERS_PER_SECOND_PER_MPH: f64 = 0.44704;
const METERS_PER_MILE: f64 = 1609.344;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

impl TemperatureUnit {
    /// Parse a WMO unit code, with or without its namespace prefix.
    pub fn from_unit_code(code: &str) -> Option<Self> {
        match strip_namespace(code) {
            "degC" => Some(TemperatureUnit::Celsius),
            "degF" => Some(TemperatureUnit::Fahrenheit),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemperatureUnit::Celsius => "C",
            TemperatureUnit::Fahrenheit => "F",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedUnit {
    MetersPerSecond,
    KilometersPerHour,
    MilesPerHour,
}

impl SpeedUnit {
    pub fn from_unit_code(code: &str) -> Option<Self> {
        match strip_namespace(code) {
            "m_s-1" => Some(SpeedUnit::MetersPerSecond),
            "km_h-1" => Some(SpeedUnit::KilometersPerHour),
            "mi_h-1" => Some(SpeedUnit::MilesPerHour),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Miles,
}

impl DistanceUnit {
    pub fn from_unit_code(code: &str) -> Option<Self> {
        match strip_namespace(code) {
            "m" => Some(DistanceUnit::Meters),
            "km" => Some(DistanceUnit::Kilometers),
            "mi" => Some(DistanceUnit::Miles),
            _ => None,
        }
    }
}

fn strip_namespace(code: &str) -> &str {
    code.rsplit(':').next().unwrap_or(code)
}

fn check_finite(value: f64) -> Result<f64, ConversionError> {
    if value.is_finite() { Ok(value) } else { Err(ConversionError::InvalidValue(value)) }
}

/// General temperature conversion; converting to the source unit is the
/// identity.
pub fn convert_temperature(
    value: f64,
    from: TemperatureUnit,
    to: TemperatureUnit,
) -> Result<f64, ConversionError> {
    let value = check_finite(value)?;
    let celsius = match from {
        TemperatureUnit::Celsius => value,
        TemperatureUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0,
    };
    Ok(match to {
        TemperatureUnit::Celsius => celsius,
        TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
    })
}

pub fn convert_speed(value: f64, from: SpeedUnit, to: SpeedUnit) -> Result<f64, ConversionError> {
    let value = check_finite(value)?;
    let mps = match from {
        SpeedUnit::MetersPerSecond => value,
        SpeedUnit::KilometersPerHour => value / 3.6,
        SpeedUnit::MilesPerHour => value * METERS_PER_SECOND_PER_MPH,
    };
    Ok(match to {
        SpeedUnit::MetersPerSecond => mps,
        SpeedUnit::KilometersPerHour => mps * 3.6,
        SpeedUnit::MilesPerHour => mps / METERS_PER_SECOND_PER_MPH,
    })
}

pub fn convert_distance(
    value: f64,
    from: DistanceUnit,
    to: DistanceUnit,
) -> Result<f64, ConversionError> {
    let value = check_finite(value)?;
    let meters = match from {
        DistanceUnit::Meters => value,
        DistanceUnit::Kilometers => value * 1000.0,
        DistanceUnit::Miles => value * METERS_PER_MILE,
    };
    Ok(match to {
        DistanceUnit::Meters => meters,
        DistanceUnit::Kilometers => meters / 1000.0,
        DistanceUnit::Miles => meters / METERS_PER_MILE,
    })
}

pub fn to_fahrenheit(value: f64, from: TemperatureUnit) -> Result<f64, ConversionError> {
    convert_temperature(value, from, TemperatureUnit::Fahrenheit)
}

pub fn to_celsius(value: f64, from: TemperatureUnit) -> Result<f64, ConversionError> {
    convert_temperature(value, from, TemperatureUnit::Celsius)
}

pub fn to_mph(value: f64, from: SpeedUnit) -> Result<f64, ConversionError> {
    convert_speed(value, from, SpeedUnit::MilesPerHour)
}

pub fn to_miles(value: f64, from: DistanceUnit) -> Result<f64, ConversionError> {
    convert_distance(value, from, DistanceUnit::Miles)
}

/// Display rounding for temperatures: nearest whole degree.
pub fn round_degree(value: f64) -> f64 {
    value.round()
}

/// Display rounding for wind speed and distance: one decimal place.
pub fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-6;

    #[test]
    fn celsius_to_fahrenheit_known_points() {
        assert!((to_fahrenheit(0.0, TemperatureUnit::Celsius).unwrap() - 32.0).abs() < TOLERANCE);
        assert!((to_fahrenheit(100.0, TemperatureUnit::Celsius).unwrap() - 212.0).abs() < TOLERANCE);
        assert!((to_celsius(-40.0, TemperatureUnit::Fahrenheit).unwrap() - -40.0).abs() < TOLERANCE);
    }

    #[test]
    fn conversion_to_own_unit_is_identity() {
        assert_eq!(to_fahrenheit(71.5, TemperatureUnit::Fahrenheit).unwrap(), 71.5);
        assert_eq!(to_mph(12.3, SpeedUnit::MilesPerHour).unwrap(), 12.3);
        assert_eq!(to_miles(4.2, DistanceUnit::Miles).unwrap(), 4.2);
    }

    #[test]
    fn round_trips_stay_within_tolerance() {
        for v in [-40.0, -7.3, 0.0, 0.1, 23.7, 451.0] {
            let f = convert_temperature(v, TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit)
                .unwrap();
            let back =
                convert_temperature(f, TemperatureUnit::Fahrenheit, TemperatureUnit::Celsius)
                    .unwrap();
            assert!((back - v).abs() < TOLERANCE, "temperature round trip for {v}");

            let mph = convert_speed(v, SpeedUnit::KilometersPerHour, SpeedUnit::MilesPerHour)
                .unwrap();
            let back = convert_speed(mph, SpeedUnit::MilesPerHour, SpeedUnit::KilometersPerHour)
                .unwrap();
            assert!((back - v).abs() < TOLERANCE, "speed round trip for {v}");

            let miles = convert_distance(v, DistanceUnit::Meters, DistanceUnit::Miles).unwrap();
            let back = convert_distance(miles, DistanceUnit::Miles, DistanceUnit::Meters).unwrap();
            assert!((back - v).abs() < TOLERANCE, "distance round trip for {v}");
        }
    }

    #[test]
    fn kmh_to_mph_matches_expected_factor() {
        let mph = to_mph(100.0, SpeedUnit::KilometersPerHour).unwrap();
        assert!((mph - 62.1371192).abs() < 1e-4);
    }

    #[test]
    fn non_finite_input_is_rejected() {
        assert!(matches!(
            to_fahrenheit(f64::NAN, TemperatureUnit::Celsius),
            Err(ConversionError::InvalidValue(_))
        ));
        assert!(matches!(
            to_mph(f64::INFINITY, SpeedUnit::MetersPerSecond),
            Err(ConversionError::InvalidValue(_))
        ));
    }

    #[test]
    fn unit_codes_parse_with_and_without_namespace() {
        assert_eq!(TemperatureUnit::from_unit_code("wmoUnit:degC"), Some(TemperatureUnit::Celsius));
        assert_eq!(TemperatureUnit::from_unit_code("degF"), Some(TemperatureUnit::Fahrenheit));
        assert_eq!(SpeedUnit::from_unit_code("wmoUnit:km_h-1"), Some(SpeedUnit::KilometersPerHour));
        assert_eq!(SpeedUnit::from_unit_code("wmoUnit:m_s-1"), Some(SpeedUnit::MetersPerSecond));
        assert_eq!(DistanceUnit::from_unit_code("wmoUnit:m"), Some(DistanceUnit::Meters));
        assert!(TemperatureUnit::from_unit_code("wmoUnit:percent").is_none());
    }

    #[test]
    fn display_rounding() {
        assert_eq!(round_degree(71.5), 72.0);
        assert_eq!(round_degree(-0.4), -0.0);
        assert_eq!(round_tenth(12.34), 12.3);
        assert_eq!(round_tenth(12.36), 12.4);
    }
}
