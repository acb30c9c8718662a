use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use geoweather_core::{
    Config, Coordinates, FetchError, LabelSource, LookupError, UnitSystem, WeatherLookup,
    location::FixedLocation,
    present::{self, detect_region},
    store::{CachedSnapshot, FileStore, SNAPSHOT_KEY, SnapshotStore},
};
use inquire::{Confirm, CustomType, Password, PasswordDisplayMode, Select};
use tracing::debug;

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "geoweather", version, about = "Current weather for where you are")]
pub struct Cli {
    /// More log output (-v info, -vv debug). `RUST_LOG` overrides this.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Set the API key, units and location source interactively.
    Configure,

    /// Show the last saved weather without touching the network.
    Show {
        /// Region used for the temperature label, e.g. "US".
        #[arg(long)]
        region: Option<String>,

        /// Print display fields as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Look up the weather for the current location and save it.
    Refresh {
        /// Latitude of a one-off fix; requires --lon.
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude of a one-off fix; requires --lat.
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,

        /// Unit system to request: standard, metric or imperial.
        #[arg(long, value_parser = parse_units)]
        units: Option<UnitSystem>,

        /// Region used for the temperature label, e.g. "US".
        #[arg(long)]
        region: Option<String>,

        /// Print display fields as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print where configuration and the saved snapshot live.
    Path,
}

fn parse_units(value: &str) -> Result<UnitSystem, String> {
    UnitSystem::try_from(value).map_err(|e| e.to_string())
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { region, json } => {
                let config = Config::load()?;
                let store = snapshot_store(&config)?;
                match store.load_cached() {
                    Some(cached) => {
                        let region = resolve_region(region, &config);
                        output::print_snapshot(
                            &cached.snapshot,
                            Some(cached.saved_at),
                            &region,
                            config.label_source,
                            json,
                        )
                    }
                    None => {
                        anyhow::bail!("No saved weather yet. Run `geoweather refresh` first.")
                    }
                }
            }
            Command::Refresh {
                lat,
                lon,
                units,
                region,
                json,
            } => {
                let config = Config::load()?;
                let fix = match (lat, lon) {
                    (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)?),
                    _ => None,
                };
                let region = resolve_region(region, &config);
                debug!(%region, label_source = config.label_source.as_str(), "Display settings");

                let show_cached = |cached: CachedSnapshot| {
                    output::print_snapshot(
                        &cached.snapshot,
                        Some(cached.saved_at),
                        &region,
                        config.label_source,
                        json,
                    )
                };

                let lookup = match build_lookup(&config, fix, units) {
                    Ok(lookup) => lookup,
                    Err(err) => {
                        output::notify(&refresh_notice(&err));
                        return match snapshot_store(&config)?.load_cached() {
                            Some(cached) => show_cached(cached),
                            None => Err(err),
                        };
                    }
                };

                match lookup.spawn_refresh().await.context("Refresh task failed")? {
                    Ok(snapshot) => {
                        output::print_snapshot(&snapshot, None, &region, config.label_source, json)
                    }
                    Err(err) => {
                        output::notify(&err.user_message());
                        match lookup.cached_with_time() {
                            Some(cached) => show_cached(cached),
                            None => Err(err.into()),
                        }
                    }
                }
            }
            Command::Path => {
                let config = Config::load()?;
                println!("config:   {}", Config::config_file_path()?.display());
                println!("snapshot: {}", store_backing(&config)?.path_for(SNAPSHOT_KEY).display());
                Ok(())
            }
        }
    }
}

/// `--region`, then the config override, then the locale. Always upper case.
fn resolve_region(flag: Option<String>, config: &Config) -> String {
    flag.or_else(|| config.region.clone())
        .or_else(detect_region)
        .map(|region| region.trim().to_ascii_uppercase())
        .unwrap_or_default()
}

/// Lookup for this run, with command-line overrides applied.
fn build_lookup(
    config: &Config,
    fix: Option<Coordinates>,
    units: Option<UnitSystem>,
) -> anyhow::Result<WeatherLookup> {
    if config.api_key().is_none() {
        return Err(LookupError::from(FetchError::MissingApiKey).into());
    }

    let mut lookup = WeatherLookup::from_config(config)?;
    if let Some(coordinates) = fix {
        lookup = lookup.with_location(Arc::new(FixedLocation::new(coordinates)));
    }
    if let Some(units) = units {
        lookup = lookup.with_units(units);
    }

    Ok(lookup)
}

fn refresh_notice(err: &anyhow::Error) -> String {
    match err.downcast_ref::<LookupError>() {
        Some(lookup_err) => lookup_err.user_message(),
        None => format!("{err:#}"),
    }
}

fn store_backing(config: &Config) -> anyhow::Result<FileStore> {
    Ok(FileStore::new(config.snapshot_dir()?))
}

fn snapshot_store(config: &Config) -> anyhow::Result<SnapshotStore> {
    Ok(SnapshotStore::new(Arc::new(store_backing(config)?)))
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Leave empty to keep the current key")
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key);
    }

    let units = Select::new("Units to request:", UnitSystem::all().to_vec())
        .with_starting_cursor(unit_index(config.units))
        .prompt()?;
    config.units = units;

    let sources = vec![LabelSource::Region.as_str(), LabelSource::Units.as_str()];
    let source = Select::new("Temperature label from:", sources)
        .with_help_message("region: °F for US/LR/MM locales; units: matches the requested units")
        .prompt()?;
    config.label_source = LabelSource::try_from(source)?;

    let use_fixed = Confirm::new("Use fixed coordinates instead of IP-based location?")
        .with_default(config.location.fixed()?.is_some())
        .prompt()?;
    if use_fixed {
        let lat = CustomType::<f64>::new("Latitude:")
            .with_error_message("Please type a number")
            .prompt()?;
        let lon = CustomType::<f64>::new("Longitude:")
            .with_error_message("Please type a number")
            .prompt()?;
        config.set_fixed_location(Some(Coordinates::new(lat, lon)?));
    } else {
        config.set_fixed_location(None);
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    if config.api_key().is_none() {
        output::notify(
            "No API key configured yet; `geoweather refresh` will fail until one is set.",
        );
    }

    // Region is only reported here; it is detected again on every run.
    let region = resolve_region(None, &config);
    let label = present::TemperatureLabel::for_region(&region);
    let shown = if region.is_empty() {
        "unknown"
    } else {
        region.as_str()
    };
    println!("Detected region: {shown} ({label})");

    Ok(())
}

fn unit_index(units: UnitSystem) -> usize {
    UnitSystem::all()
        .iter()
        .position(|u| *u == units)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_refresh_with_coordinates() {
        let cli = Cli::try_parse_from([
            "geoweather", "refresh", "--lat", "-33.9", "--lon", "18.4", "--units", "imperial",
        ])
        .expect("args should parse");

        match cli.command {
            Command::Refresh {
                lat, lon, units, ..
            } => {
                assert_eq!(lat, Some(-33.9));
                assert_eq!(lon, Some(18.4));
                assert_eq!(units, Some(UnitSystem::Imperial));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn lat_requires_lon() {
        let err = Cli::try_parse_from(["geoweather", "refresh", "--lat", "10"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_unknown_units() {
        assert!(Cli::try_parse_from(["geoweather", "refresh", "--units", "furlongs"]).is_err());
    }

    #[test]
    fn verbose_is_counted_globally() {
        let cli = Cli::try_parse_from(["geoweather", "show", "-vv", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Show { json: true, .. }));
    }

    #[test]
    fn region_flag_beats_config() {
        let config = Config {
            region: Some("DE".into()),
            ..Config::default()
        };

        assert_eq!(resolve_region(Some("US".into()), &config), "US");
        assert_eq!(resolve_region(None, &config), "DE");
    }

    #[test]
    fn region_is_upper_cased() {
        let config = Config {
            region: Some(" lr".into()),
            ..Config::default()
        };

        assert_eq!(resolve_region(Some("us".into()), &config), "US");
        assert_eq!(resolve_region(None, &config), "LR");
    }

    #[test]
    fn missing_api_key_becomes_a_fetch_notice() {
        let config = Config::default();
        if config.api_key().is_some() {
            // A key was injected at build time; nothing to check.
            return;
        }

        let err = build_lookup(&config, None, None).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<LookupError>(),
            Some(LookupError::Fetch(FetchError::MissingApiKey))
        ));
        assert_eq!(
            refresh_notice(&err),
            "No API key configured. Run `geoweather configure` first."
        );
    }

    #[test]
    fn bad_location_config_is_reported_with_context() {
        let mut config = Config {
            api_key: Some("KEY".into()),
            ..Config::default()
        };
        config.location.latitude = Some(1.0);

        let err = build_lookup(&config, None, None).unwrap_err();

        assert!(refresh_notice(&err).contains("Both latitude and longitude"));
    }

    #[test]
    fn unit_index_matches_order() {
        for (i, units) in UnitSystem::all().iter().enumerate() {
            assert_eq!(unit_index(*units), i);
        }
    }
}
