use serde::{Deserialize, Serialize};

use crate::error::CoordinatesError;

/// A single geographic fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    /// Build a fix, rejecting values outside lat [-90, 90] / lng [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordinatesError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(CoordinatesError::Latitude(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoordinatesError::Longitude(longitude));
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl std::fmt::Display for Coordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Unit system requested from the provider (`units=` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitSystem {
    /// Kelvin, m/s.
    Standard,
    /// Celsius, m/s.
    #[default]
    Metric,
    /// Fahrenheit, mph.
    Imperial,
}

impl UnitSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitSystem::Standard => "standard",
            UnitSystem::Metric => "metric",
            UnitSystem::Imperial => "imperial",
        }
    }

    pub const fn all() -> &'static [UnitSystem] {
        &[UnitSystem::Standard, UnitSystem::Metric, UnitSystem::Imperial]
    }
}

impl std::fmt::Display for UnitSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for UnitSystem {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "standard" => Ok(UnitSystem::Standard),
            "metric" => Ok(UnitSystem::Metric),
            "imperial" => Ok(UnitSystem::Imperial),
            _ => Err(anyhow::anyhow!(
                "Unknown unit system '{value}'. Supported: standard, metric, imperial."
            )),
        }
    }
}

/// Primary weather condition of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Category, e.g. "Rain".
    pub main: String,
    pub description: String,
    /// Provider icon code, e.g. "10d".
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    /// hPa
    pub pressure: i64,
    /// Percent.
    pub humidity: i64,
    pub sea_level: Option<i64>,
    pub grnd_level: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
    /// Direction in degrees.
    pub deg: i64,
    pub gust: Option<f64>,
}

/// Sunrise and sunset as unix epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SunTimes {
    pub sunrise: i64,
    pub sunset: i64,
}

/// Precipitation volume over the last hour, in mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Precipitation {
    pub one_hour: f64,
}

/// One complete weather reading for a single place and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub condition: Condition,
    pub measurements: Measurements,
    pub wind: Wind,
    pub sun: SunTimes,
    pub rain: Option<Precipitation>,
    pub place: String,
    pub country: String,
    pub coordinates: Coordinates,
    /// Units the values were requested in.
    pub units: UnitSystem,
    /// Provider observation time, epoch seconds.
    pub observed_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinates_accept_bounds() {
        assert!(Coordinates::new(90.0, 180.0).is_ok());
        assert!(Coordinates::new(-90.0, -180.0).is_ok());
        assert!(Coordinates::new(0.0, 0.0).is_ok());
    }

    #[test]
    fn coordinates_reject_out_of_range() {
        assert!(matches!(
            Coordinates::new(90.5, 0.0),
            Err(CoordinatesError::Latitude(_))
        ));
        assert!(matches!(
            Coordinates::new(0.0, -180.1),
            Err(CoordinatesError::Longitude(_))
        ));
        assert!(Coordinates::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn unit_system_as_str_roundtrip() {
        for units in UnitSystem::all() {
            let parsed = UnitSystem::try_from(units.as_str()).expect("roundtrip should succeed");
            assert_eq!(*units, parsed);
        }
    }

    #[test]
    fn unknown_unit_system_error() {
        let err = UnitSystem::try_from("kelvinish").unwrap_err();
        assert!(err.to_string().contains("Unknown unit system"));
    }

    #[test]
    fn unit_system_serializes_lowercase() {
        let json = serde_json::to_string(&UnitSystem::Imperial).unwrap();
        assert_eq!(json, "\"imperial\"");
    }
}
