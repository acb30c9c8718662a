//! Core library for the `geoweather` CLI.
//!
//! This crate defines:
//! - Location fixes (fixed coordinates or IP lookup)
//! - The OpenWeather client and its failure taxonomy
//! - A single-key snapshot store for the latest reading
//! - Projection of a snapshot into display fields
//!
//! It is used by `geoweather-cli`, but can also be reused by other front ends.

pub mod config;
pub mod connectivity;
pub mod error;
pub mod location;
pub mod lookup;
pub mod model;
pub mod present;
pub mod provider;
pub mod store;

pub use config::Config;
pub use error::{FetchError, LocationError, LookupError, StoreError};
pub use location::{LocationProvider, Priority};
pub use lookup::WeatherLookup;
pub use model::{Coordinates, UnitSystem, WeatherSnapshot};
pub use present::{DisplayFields, LabelSource, TemperatureLabel, project, project_in};
pub use provider::{RetryPolicy, WeatherProvider};
pub use store::SnapshotStore;
