//! Error types for each stage of a lookup.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinatesError {
    #[error("Latitude {0} is outside [-90, 90]")]
    Latitude(f64),

    #[error("Longitude {0} is outside [-180, 180]")]
    Longitude(f64),
}

/// Failures of a single provider fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No network connection available")]
    Connectivity,

    #[error("No API key configured for the weather provider")]
    MissingApiKey,

    #[error("Provider rejected the request (400): {0}")]
    BadRequest(String),

    #[error("Provider has no data for this location (404): {0}")]
    NotFound(String),

    #[error("Provider request failed with status {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Provider request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connectivity | Self::Timeout(_) | Self::Transport(_) => true,
            Self::Provider { status, .. } => *status >= 500,
            Self::MissingApiKey | Self::BadRequest(_) | Self::NotFound(_) | Self::Decode(_) => {
                false
            }
        }
    }

    /// HTTP status reported by the provider, if the request got that far.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::BadRequest(_) => Some(400),
            Self::NotFound(_) => Some(404),
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Location service errors
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,

    #[error("Location service unavailable: {0}")]
    Unavailable(String),

    #[error("Location request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Location service returned an invalid fix: {0}")]
    InvalidFix(#[from] CoordinatesError),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize cached snapshot: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Unsupported cached snapshot version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },
}

/// Any failure of a full lookup: fix, fetch, then save.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LookupError {
    /// Short message for a user-facing notice.
    pub fn user_message(&self) -> String {
        match self {
            Self::Location(LocationError::PermissionDenied) => {
                "Location access is turned off. Enable it or configure fixed coordinates."
                    .to_string()
            }
            Self::Location(_) => "Could not determine your location.".to_string(),
            Self::Fetch(FetchError::Connectivity) => {
                "No internet connection available.".to_string()
            }
            Self::Fetch(FetchError::MissingApiKey) => {
                "No API key configured. Run `geoweather configure` first.".to_string()
            }
            Self::Fetch(FetchError::BadRequest(_)) => {
                "The weather service rejected the request.".to_string()
            }
            Self::Fetch(FetchError::NotFound(_)) => {
                "No weather data found for this location.".to_string()
            }
            Self::Fetch(FetchError::Provider { status, .. }) => {
                format!("The weather service returned an error ({status}).")
            }
            Self::Fetch(FetchError::Timeout(_)) => "The weather service timed out.".to_string(),
            Self::Fetch(FetchError::Decode(_)) => {
                "The weather service sent an unexpected response.".to_string()
            }
            Self::Fetch(FetchError::Transport(_)) => {
                "Network error. Check your connection.".to_string()
            }
            Self::Store(_) => "Could not save the latest weather locally.".to_string(),
        }
    }
}
