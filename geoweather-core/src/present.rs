//! Projection of a snapshot into ready-to-print display fields.

use std::fmt::Display;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};

use crate::model::{UnitSystem, WeatherSnapshot};

/// Asset shown when an icon code is not in [`ICON_TABLE`].
pub const DEFAULT_ICON: &str = "snowing";

/// Provider icon code to display asset.
pub const ICON_TABLE: &[(&str, &str)] = &[
    ("01d", "sunny"),
    ("01n", "sunny_night"),
    ("02d", "cloudy"),
    ("02n", "cloudy_night"),
    ("03d", "cloud"),
    ("03n", "cloud"),
    ("04d", "clouds"),
    ("04n", "clouds"),
    ("09d", "heavy_rain"),
    ("09n", "heavy_rain"),
    ("10d", "rain"),
    ("10n", "heavy_rain"),
    ("11d", "thunder"),
    ("11n", "thunder"),
    ("13d", "snowing"),
    ("13n", "snowing"),
    ("50d", "fog"),
    ("50n", "fog"),
];

/// Regions whose locale shows temperatures in Fahrenheit.
const FAHRENHEIT_REGIONS: &[&str] = &["US", "LR", "MM"];

pub fn icon_for(code: &str) -> &'static str {
    ICON_TABLE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, asset)| *asset)
        .unwrap_or(DEFAULT_ICON)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureLabel {
    Celsius,
    Fahrenheit,
    Kelvin,
}

impl TemperatureLabel {
    /// Label chosen from the locale region alone. The value is not converted.
    ///
    /// `region` must be an upper-case region code; anything else reads as °C.
    pub fn for_region(region: &str) -> Self {
        if FAHRENHEIT_REGIONS.contains(&region) {
            Self::Fahrenheit
        } else {
            Self::Celsius
        }
    }

    pub fn for_units(units: UnitSystem) -> Self {
        match units {
            UnitSystem::Standard => Self::Kelvin,
            UnitSystem::Metric => Self::Celsius,
            UnitSystem::Imperial => Self::Fahrenheit,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
            Self::Kelvin => "K",
        }
    }
}

impl Display for TemperatureLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the temperature label comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelSource {
    /// Locale region (US, LR, MM show °F), whatever units were requested.
    #[default]
    Region,
    /// The unit system the snapshot was fetched in.
    Units,
}

impl LabelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Region => "region",
            Self::Units => "units",
        }
    }

    pub fn resolve(&self, region: &str, units: UnitSystem) -> TemperatureLabel {
        match self {
            Self::Region => TemperatureLabel::for_region(region),
            Self::Units => TemperatureLabel::for_units(units),
        }
    }
}

impl TryFrom<&str> for LabelSource {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "region" => Ok(Self::Region),
            "units" => Ok(Self::Units),
            _ => Err(anyhow::anyhow!(
                "Unknown label source '{value}'. Supported: region, units."
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayFields {
    pub condition: String,
    pub description: String,
    pub icon: &'static str,
    pub temperature: String,
    pub humidity: String,
    pub wind: String,
    pub sunrise: String,
    pub sunset: String,
    pub place: String,
    pub country: String,
}

/// Project with the label taken from `locale_region`, times in the local zone.
pub fn project(snapshot: &WeatherSnapshot, locale_region: &str) -> DisplayFields {
    let label = TemperatureLabel::for_region(locale_region);
    if label != TemperatureLabel::for_units(snapshot.units) {
        tracing::warn!(
            region = locale_region,
            units = %snapshot.units,
            label = %label,
            "Temperature label does not match the requested unit system"
        );
    }

    project_in(snapshot, label, &Local)
}

pub fn project_in<Tz>(snapshot: &WeatherSnapshot, label: TemperatureLabel, tz: &Tz) -> DisplayFields
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    DisplayFields {
        condition: snapshot.condition.main.clone(),
        description: snapshot.condition.description.clone(),
        icon: icon_for(&snapshot.condition.icon),
        temperature: format!("{}{label}", decimal(snapshot.measurements.temp)),
        humidity: format!("{}%", snapshot.measurements.humidity),
        wind: format!("{} km/h", decimal(snapshot.wind.speed)),
        sunrise: clock_time(snapshot.sun.sunrise, tz),
        sunset: clock_time(snapshot.sun.sunset, tz),
        place: snapshot.place.clone(),
        country: snapshot.country.clone(),
    }
}

/// Always keeps a fractional part: `1.0`, not `1`.
fn decimal(value: f64) -> String {
    format!("{value:?}")
}

/// Epoch seconds as zero-padded 24h `HH:MM` in `tz`.
pub fn clock_time<Tz>(epoch_secs: i64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match DateTime::from_timestamp(epoch_secs, 0) {
        Some(utc) => utc.with_timezone(tz).format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// Region part of a POSIX locale string: `en_US.UTF-8` -> `US`.
pub fn region_from_locale(locale: &str) -> Option<String> {
    let without_codeset = locale.split(['.', '@']).next()?;
    let (_, region) = without_codeset.split_once(['_', '-'])?;

    if region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(region.to_ascii_uppercase())
    } else {
        None
    }
}

/// Region of the process locale (`LC_ALL`, then `LC_MESSAGES`, then `LANG`).
pub fn detect_region() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|value| !value.is_empty())
        .and_then(|value| region_from_locale(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Condition, Coordinates, Measurements, SunTimes, Wind};
    use chrono::{FixedOffset, Utc};

    fn snapshot(icon: &str) -> WeatherSnapshot {
        WeatherSnapshot {
            condition: Condition {
                main: "Clear".into(),
                description: "clear sky".into(),
                icon: icon.into(),
            },
            measurements: Measurements {
                temp: 21.5,
                feels_like: 21.0,
                temp_min: 19.0,
                temp_max: 23.0,
                pressure: 1018,
                humidity: 40,
                sea_level: None,
                grnd_level: None,
            },
            wind: Wind {
                speed: 5.5,
                deg: 90,
                gust: None,
            },
            sun: SunTimes {
                sunrise: 0,
                sunset: 43_200,
            },
            rain: None,
            place: "Lisbon".into(),
            country: "PT".into(),
            coordinates: Coordinates::new(38.72, -9.14).unwrap(),
            units: UnitSystem::Metric,
            observed_at: 0,
        }
    }

    #[test]
    fn every_table_code_maps_to_its_asset() {
        for (code, asset) in ICON_TABLE {
            assert_eq!(icon_for(code), *asset, "code {code}");
        }
    }

    #[test]
    fn table_covers_all_categories_day_and_night() {
        for category in ["01", "02", "03", "04", "09", "10", "11", "13", "50"] {
            for suffix in ["d", "n"] {
                let code = format!("{category}{suffix}");
                assert!(
                    ICON_TABLE.iter().any(|(c, _)| *c == code),
                    "missing {code}"
                );
            }
        }
    }

    #[test]
    fn unknown_codes_fall_back_to_default() {
        assert_eq!(icon_for("99x"), DEFAULT_ICON);
        assert_eq!(icon_for(""), DEFAULT_ICON);
        assert_eq!(icon_for("01D"), DEFAULT_ICON);
    }

    #[test]
    fn night_rain_uses_heavy_rain_asset() {
        assert_eq!(icon_for("10d"), "rain");
        assert_eq!(icon_for("10n"), "heavy_rain");
    }

    #[test]
    fn fahrenheit_regions() {
        for region in ["US", "LR", "MM"] {
            assert_eq!(TemperatureLabel::for_region(region).as_str(), "°F");
        }
        for region in ["DE", "", "XX", "GB", "USA"] {
            assert_eq!(TemperatureLabel::for_region(region).as_str(), "°C");
        }
    }

    #[test]
    fn region_match_is_exact() {
        for region in ["us", " US", "mm", "Lr", "US "] {
            assert_eq!(TemperatureLabel::for_region(region).as_str(), "°C");
        }
    }

    #[test]
    fn label_from_units() {
        let cases = [
            (UnitSystem::Metric, TemperatureLabel::Celsius),
            (UnitSystem::Imperial, TemperatureLabel::Fahrenheit),
            (UnitSystem::Standard, TemperatureLabel::Kelvin),
        ];
        for (units, label) in cases {
            assert_eq!(TemperatureLabel::for_units(units), label);
        }
    }

    #[test]
    fn label_source_resolution() {
        assert_eq!(
            LabelSource::Region.resolve("US", UnitSystem::Metric),
            TemperatureLabel::Fahrenheit
        );
        assert_eq!(
            LabelSource::Units.resolve("US", UnitSystem::Metric),
            TemperatureLabel::Celsius
        );
        assert!(LabelSource::try_from("bogus").is_err());
    }

    #[test]
    fn epoch_zero_is_midnight_utc() {
        assert_eq!(clock_time(0, &Utc), "00:00");
    }

    #[test]
    fn local_noon_formats_as_twelve() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        // 10:00 UTC is noon at UTC+2.
        assert_eq!(clock_time(36_000, &tz), "12:00");
    }

    #[test]
    fn clock_is_zero_padded() {
        assert_eq!(clock_time(3_660 + 5 * 60, &Utc), "01:06");
    }

    #[test]
    fn project_formats_fields() {
        let fields = project_in(&snapshot("01n"), TemperatureLabel::Celsius, &Utc);

        assert_eq!(fields.icon, "sunny_night");
        assert_eq!(fields.temperature, "21.5°C");
        assert_eq!(fields.humidity, "40%");
        assert_eq!(fields.wind, "5.5 km/h");
        assert_eq!(fields.sunrise, "00:00");
        assert_eq!(fields.sunset, "12:00");
        assert_eq!(fields.place, "Lisbon");
        assert_eq!(fields.country, "PT");
        assert_eq!(fields.condition, "Clear");
        assert_eq!(fields.description, "clear sky");
    }

    #[test]
    fn whole_numbers_keep_their_decimal() {
        let mut snapshot = snapshot("01d");
        snapshot.measurements.temp = 14.0;
        snapshot.wind.speed = 1.0;

        let fields = project_in(&snapshot, TemperatureLabel::Celsius, &Utc);

        assert_eq!(fields.temperature, "14.0°C");
        assert_eq!(fields.wind, "1.0 km/h");
        assert_eq!(fields.humidity, "40%");
    }

    #[test]
    fn project_keeps_value_and_changes_only_label() {
        let fields = project(&snapshot("01d"), "US");
        assert_eq!(fields.temperature, "21.5°F");

        let fields = project(&snapshot("01d"), "DE");
        assert_eq!(fields.temperature, "21.5°C");
    }

    #[test]
    fn region_parsing() {
        assert_eq!(region_from_locale("en_US.UTF-8").as_deref(), Some("US"));
        assert_eq!(region_from_locale("de_DE@euro").as_deref(), Some("DE"));
        assert_eq!(region_from_locale("my-mm").as_deref(), Some("MM"));
        assert_eq!(region_from_locale("C"), None);
        assert_eq!(region_from_locale("POSIX"), None);
        assert_eq!(region_from_locale(""), None);
    }
}
