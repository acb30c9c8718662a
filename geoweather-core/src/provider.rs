use crate::{
    Config, Coordinates, UnitSystem, WeatherSnapshot, error::FetchError,
    provider::openweather::OpenWeatherProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc, time::Duration};

pub mod openweather;

#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    /// Fetch the current conditions at `coordinates`, in `units`.
    async fn fetch(
        &self,
        coordinates: Coordinates,
        units: UnitSystem,
    ) -> Result<WeatherSnapshot, FetchError>;
}

/// How many times a fetch is attempted and how long to wait in between.
///
/// Only transient failures (see [`FetchError::is_transient`]) are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retry.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }

    /// `max_attempts` of 0 or 1 is the same as [`none`](Self::none).
    pub fn capped(max_attempts: u32, backoff: Duration) -> Self {
        if max_attempts <= 1 {
            return Self::none();
        }
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Exponential backoff before attempt `attempt + 1`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Construct the OpenWeather provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.api_key().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured for the weather provider.\n\
                 Hint: run `geoweather configure` and enter your OpenWeather API key."
        )
    })?;

    let provider = OpenWeatherProvider::new(api_key.to_owned())
        .with_base_url(config.base_url())
        .with_timeout(config.fetch.timeout())
        .with_retry(config.fetch.retry_policy());

    Ok(Arc::new(provider))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn no_retry_by_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy, RetryPolicy::none());
    }

    #[test]
    fn capped_never_goes_below_one_attempt() {
        assert_eq!(RetryPolicy::capped(0, Duration::ZERO).max_attempts, 1);
    }

    #[test]
    fn single_attempt_ignores_backoff() {
        let policy = RetryPolicy::capped(1, Duration::from_millis(200));
        assert_eq!(policy, RetryPolicy::none());
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::capped(4, Duration::from_millis(100));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(400));
    }

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        if cfg.api_key().is_some() {
            // A key was injected at build time; nothing to check.
            return;
        }
        let err = provider_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
        assert!(err.to_string().contains("geoweather configure"));
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let cfg = Config {
            api_key: Some("KEY".to_string()),
            ..Config::default()
        };

        assert!(provider_from_config(&cfg).is_ok());
    }
}
