//! Single-shot location fixes.
//!
//! A provider returns at most one fix per call. Callers bound the call with
//! [`request_fix_within`]; providers only get the timeout as a hint.

use std::{fmt::Debug, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Coordinates, error::LocationError};

pub const IP_LOCATION_URL: &str = "http://ip-api.com/json";

/// Accuracy/power trade-off requested from the location source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    HighAccuracy,
    #[default]
    Balanced,
    LowPower,
    Passive,
}

#[async_trait]
pub trait LocationProvider: Send + Sync + Debug {
    async fn request_single_fix(
        &self,
        priority: Priority,
        timeout_hint: Duration,
    ) -> Result<Coordinates, LocationError>;
}

/// Request one fix, failing with [`LocationError::Timeout`] once `timeout` elapses.
pub async fn request_fix_within(
    provider: &dyn LocationProvider,
    priority: Priority,
    timeout: Duration,
) -> Result<Coordinates, LocationError> {
    match tokio::time::timeout(timeout, provider.request_single_fix(priority, timeout)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?timeout, "Location fix timed out");
            Err(LocationError::Timeout(timeout))
        }
    }
}

/// Always answers with the configured coordinates.
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation {
    coordinates: Coordinates,
}

impl FixedLocation {
    pub fn new(coordinates: Coordinates) -> Self {
        Self { coordinates }
    }
}

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn request_single_fix(
        &self,
        _priority: Priority,
        _timeout_hint: Duration,
    ) -> Result<Coordinates, LocationError> {
        Ok(self.coordinates)
    }
}

/// Coarse fix from the public IP address (ip-api.com response format).
#[derive(Debug, Clone)]
pub struct IpLocation {
    url: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
}

impl IpLocation {
    pub fn new() -> Self {
        Self::with_url(IP_LOCATION_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            http: Client::new(),
        }
    }
}

impl Default for IpLocation {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationProvider for IpLocation {
    async fn request_single_fix(
        &self,
        priority: Priority,
        timeout_hint: Duration,
    ) -> Result<Coordinates, LocationError> {
        // An IP lookup is city-level at best; the priority cannot improve it.
        debug!(?priority, url = %self.url, "Requesting IP-based location");

        let res = self
            .http
            .get(&self.url)
            .timeout(timeout_hint)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LocationError::Timeout(timeout_hint)
                } else {
                    LocationError::Unavailable(e.to_string())
                }
            })?;

        if !res.status().is_success() {
            return Err(LocationError::Unavailable(format!(
                "location service returned status {}",
                res.status()
            )));
        }

        let body: IpApiResponse = res
            .json()
            .await
            .map_err(|e| LocationError::Unavailable(format!("unreadable location response: {e}")))?;

        if body.status != "success" {
            return Err(LocationError::Unavailable(
                body.message.unwrap_or_else(|| body.status.clone()),
            ));
        }

        match (body.lat, body.lon) {
            (Some(lat), Some(lon)) => Ok(Coordinates::new(lat, lon)?),
            _ => Err(LocationError::Unavailable(
                "location response had no coordinates".to_string(),
            )),
        }
    }
}
