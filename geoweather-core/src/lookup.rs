//! Fix -> fetch -> save, one request at a time per call.

use std::{sync::Arc, time::Duration};

use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::{
    Config, UnitSystem, WeatherSnapshot,
    error::LookupError,
    location::{FixedLocation, IpLocation, LocationProvider, Priority, request_fix_within},
    provider::{WeatherProvider, provider_from_config},
    store::{CachedSnapshot, FileStore, SnapshotStore},
};

#[derive(Debug, Clone)]
pub struct WeatherLookup {
    location: Arc<dyn LocationProvider>,
    provider: Arc<dyn WeatherProvider>,
    store: SnapshotStore,
    units: UnitSystem,
    priority: Priority,
    location_timeout: Duration,
}

impl WeatherLookup {
    pub fn new(
        location: Arc<dyn LocationProvider>,
        provider: Arc<dyn WeatherProvider>,
        store: SnapshotStore,
    ) -> Self {
        Self {
            location,
            provider,
            store,
            units: UnitSystem::default(),
            priority: Priority::default(),
            location_timeout: Duration::from_secs(10),
        }
    }

    /// Wire up the production collaborators described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let location: Arc<dyn LocationProvider> = match config.location.fixed()? {
            Some(coordinates) => Arc::new(FixedLocation::new(coordinates)),
            None => Arc::new(IpLocation::new()),
        };

        let backing = FileStore::new(config.snapshot_dir()?);

        Ok(Self::new(
            location,
            provider_from_config(config)?,
            SnapshotStore::new(Arc::new(backing)),
        )
        .with_units(config.units)
        .with_location_timeout(config.location.timeout()))
    }

    pub fn with_units(mut self, units: UnitSystem) -> Self {
        self.units = units;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_location_timeout(mut self, timeout: Duration) -> Self {
        self.location_timeout = timeout;
        self
    }

    /// Replace the location source, e.g. with coordinates given on the command line.
    pub fn with_location(mut self, location: Arc<dyn LocationProvider>) -> Self {
        self.location = location;
        self
    }

    /// Get a fix, fetch the weather for it and persist it.
    ///
    /// The store is only written on success; a failed refresh leaves the
    /// previously cached snapshot in place.
    #[instrument(skip(self), fields(units = %self.units))]
    pub async fn refresh(&self) -> Result<WeatherSnapshot, LookupError> {
        let coordinates =
            request_fix_within(self.location.as_ref(), self.priority, self.location_timeout)
                .await?;
        info!(%coordinates, "Got location fix");

        let snapshot = self.provider.fetch(coordinates, self.units).await?;
        self.store.save(&snapshot)?;

        Ok(snapshot)
    }

    /// Run [`refresh`](Self::refresh) on the runtime and return immediately.
    ///
    /// Nothing cancels an earlier refresh; overlapping ones both complete and
    /// the last one to save wins.
    pub fn spawn_refresh(&self) -> JoinHandle<Result<WeatherSnapshot, LookupError>> {
        let lookup = self.clone();
        tokio::spawn(async move { lookup.refresh().await })
    }

    pub fn cached(&self) -> Option<WeatherSnapshot> {
        self.store.load()
    }

    pub fn cached_with_time(&self) -> Option<CachedSnapshot> {
        self.store.load_cached()
    }
}
