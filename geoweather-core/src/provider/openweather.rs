use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::{sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

use crate::{
    connectivity::{AssumeOnline, Connectivity, TcpProbe},
    error::FetchError,
    model::{
        Condition, Coordinates, Measurements, Precipitation, SunTimes, UnitSystem,
        WeatherSnapshot, Wind,
    },
};

use super::{RetryPolicy, WeatherProvider};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    base_url: String,
    http: Client,
    timeout: Duration,
    retry: RetryPolicy,
    connectivity: Arc<dyn Connectivity>,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            http: Client::new(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::none(),
            connectivity: probe_for(DEFAULT_BASE_URL),
        }
    }

    /// Point at another endpoint; the connectivity probe follows the new host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.connectivity = probe_for(&self.base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_connectivity(mut self, connectivity: Arc<dyn Connectivity>) -> Self {
        self.connectivity = connectivity;
        self
    }

    #[instrument(skip(self))]
    async fn fetch_current(
        &self,
        coordinates: Coordinates,
        units: UnitSystem,
    ) -> Result<WeatherSnapshot, FetchError> {
        if !self.connectivity.is_online().await {
            return Err(FetchError::Connectivity);
        }

        let url = format!("{}/weather", self.base_url.trim_end_matches('/'));
        debug!(%url, %coordinates, "Requesting current weather");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("lat", coordinates.latitude().to_string()),
                ("lon", coordinates.longitude().to_string()),
                ("appid", self.api_key.clone()),
                ("units", units.as_str().to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = res.status();
        let body = res.text().await.map_err(|e| self.classify_transport(e))?;

        match status {
            s if s.is_success() => {}
            StatusCode::BAD_REQUEST => return Err(FetchError::BadRequest(truncate_body(&body))),
            StatusCode::NOT_FOUND => return Err(FetchError::NotFound(truncate_body(&body))),
            s => {
                return Err(FetchError::Provider {
                    status: s.as_u16(),
                    body: truncate_body(&body),
                });
            }
        }

        let parsed: OwCurrentResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        parsed.into_snapshot(coordinates, units)
    }

    fn classify_transport(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else if err.is_connect() {
            FetchError::Connectivity
        } else {
            FetchError::Transport(err)
        }
    }
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    async fn fetch(
        &self,
        coordinates: Coordinates,
        units: UnitSystem,
    ) -> Result<WeatherSnapshot, FetchError> {
        if self.api_key.trim().is_empty() {
            return Err(FetchError::MissingApiKey);
        }

        let mut attempt = 1;
        loop {
            match self.fetch_current(coordinates, units).await {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.is_transient() && attempt < self.retry.max_attempts => {
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        error = %e,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        "Weather fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(error = %e, attempt, "Weather fetch failed");
                    return Err(e);
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: i64,
    humidity: i64,
    sea_level: Option<i64>,
    grnd_level: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    #[serde(default)]
    deg: i64,
    gust: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwSys {
    #[serde(default)]
    country: String,
    sunrise: i64,
    sunset: i64,
}

#[derive(Debug, Deserialize)]
struct OwRain {
    #[serde(rename = "1h")]
    one_hour: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    dt: i64,
    weather: Vec<OwWeather>,
    main: OwMain,
    wind: OwWind,
    sys: OwSys,
    rain: Option<OwRain>,
}

impl OwCurrentResponse {
    fn into_snapshot(
        self,
        coordinates: Coordinates,
        units: UnitSystem,
    ) -> Result<WeatherSnapshot, FetchError> {
        // The first listed condition is the primary one.
        let primary = self
            .weather
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Decode("response contained no weather condition".into()))?;

        Ok(WeatherSnapshot {
            condition: Condition {
                main: primary.main,
                description: primary.description,
                icon: primary.icon,
            },
            measurements: Measurements {
                temp: self.main.temp,
                feels_like: self.main.feels_like,
                temp_min: self.main.temp_min,
                temp_max: self.main.temp_max,
                pressure: self.main.pressure,
                humidity: self.main.humidity,
                sea_level: self.main.sea_level,
                grnd_level: self.main.grnd_level,
            },
            wind: Wind {
                speed: self.wind.speed,
                deg: self.wind.deg,
                gust: self.wind.gust,
            },
            sun: SunTimes {
                sunrise: self.sys.sunrise,
                sunset: self.sys.sunset,
            },
            rain: self.rain.map(|r| Precipitation {
                one_hour: r.one_hour,
            }),
            place: self.name,
            country: self.sys.country,
            coordinates,
            units,
            observed_at: self.dt,
        })
    }
}

fn probe_for(base_url: &str) -> Arc<dyn Connectivity> {
    match TcpProbe::for_url(base_url, PROBE_TIMEOUT) {
        Some(probe) => Arc::new(probe),
        None => Arc::new(AssumeOnline),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "coord": {"lon": 13.41, "lat": 52.52},
        "weather": [
            {"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"},
            {"id": 701, "main": "Mist", "description": "mist", "icon": "50d"}
        ],
        "base": "stations",
        "main": {
            "temp": 14.2, "feels_like": 13.6, "temp_min": 12.9, "temp_max": 15.1,
            "pressure": 1012, "humidity": 81, "sea_level": 1012, "grnd_level": 1007
        },
        "visibility": 10000,
        "wind": {"speed": 4.1, "deg": 250, "gust": 7.2},
        "rain": {"1h": 0.31},
        "clouds": {"all": 75},
        "dt": 1700000000,
        "sys": {"type": 2, "id": 2011538, "country": "DE", "sunrise": 1699943000, "sunset": 1699975000},
        "timezone": 3600,
        "id": 2950159,
        "name": "Berlin",
        "cod": 200
    }"#;

    fn berlin() -> Coordinates {
        Coordinates::new(52.52, 13.41).unwrap()
    }

    #[test]
    fn parses_full_response_and_keeps_first_condition() {
        let parsed: OwCurrentResponse = serde_json::from_str(SAMPLE).unwrap();
        let snapshot = parsed.into_snapshot(berlin(), UnitSystem::Metric).unwrap();

        assert_eq!(snapshot.condition.main, "Rain");
        assert_eq!(snapshot.condition.icon, "10d");
        assert_eq!(snapshot.measurements.humidity, 81);
        assert_eq!(snapshot.measurements.grnd_level, Some(1007));
        assert_eq!(snapshot.wind.gust, Some(7.2));
        assert_eq!(snapshot.sun.sunset, 1699975000);
        assert_eq!(snapshot.rain, Some(Precipitation { one_hour: 0.31 }));
        assert_eq!(snapshot.place, "Berlin");
        assert_eq!(snapshot.country, "DE");
        assert_eq!(snapshot.units, UnitSystem::Metric);
        assert_eq!(snapshot.observed_at, 1700000000);
    }

    #[test]
    fn optional_blocks_may_be_missing() {
        let body = r#"{
            "weather": [{"main": "Clear", "description": "clear sky", "icon": "01n"}],
            "main": {"temp": 1.0, "feels_like": -2.0, "temp_min": 0.0, "temp_max": 2.0, "pressure": 1020, "humidity": 60},
            "wind": {"speed": 1.5},
            "sys": {"sunrise": 10, "sunset": 20},
            "name": "Nowhere"
        }"#;
        let parsed: OwCurrentResponse = serde_json::from_str(body).unwrap();
        let snapshot = parsed.into_snapshot(berlin(), UnitSystem::Imperial).unwrap();

        assert_eq!(snapshot.rain, None);
        assert_eq!(snapshot.wind.gust, None);
        assert_eq!(snapshot.measurements.sea_level, None);
        assert_eq!(snapshot.country, "");
    }

    #[test]
    fn empty_condition_list_is_a_decode_error() {
        let mut value: serde_json::Value = serde_json::from_str(SAMPLE).unwrap();
        value["weather"] = serde_json::json!([]);
        let parsed: OwCurrentResponse = serde_json::from_value(value).unwrap();

        let err = parsed.into_snapshot(berlin(), UnitSystem::Metric).unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(150);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 203);
    }

    #[tokio::test]
    async fn empty_api_key_fails_before_any_io() {
        let provider = OpenWeatherProvider::new("  ".to_string())
            .with_base_url("http://127.0.0.1:9")
            .with_connectivity(Arc::new(AssumeOnline));

        let err = provider.fetch(berlin(), UnitSystem::Metric).await.unwrap_err();
        assert!(matches!(err, FetchError::MissingApiKey));
    }
}
