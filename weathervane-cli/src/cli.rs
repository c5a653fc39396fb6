use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::{Select, Text};

use weathervane_core::{
    AggregateOptions, AirportRecord, Config, GeocodeError, GeocoderId, Location, NwsClient,
    Outcome, Station, StationError, WeatherBundle, WeatherError, aggregate,
    airports::{self, AirportQuery},
    find_nearby, geocoder_from_config,
    units,
};

use crate::store::{self, Store};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weathervane", version, about = "Address and airport weather lookup")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the default geocoder and optional Census API key.
    Configure,

    /// Show the full weather bundle for an address.
    Show {
        /// Address; omit to pick from previously entered addresses.
        address: Option<String>,

        /// Geocoder override for this lookup: "census" or "nominatim".
        #[arg(long)]
        geocoder: Option<String>,
    },

    /// Show active weather alerts for an address.
    Alerts {
        address: Option<String>,

        #[arg(long)]
        geocoder: Option<String>,
    },

    /// Show the nearest observation stations for an address.
    Stations {
        address: Option<String>,

        #[arg(long)]
        geocoder: Option<String>,

        /// How many stations to show.
        #[arg(long)]
        max: Option<usize>,
    },

    /// Look up weather through the cached airport dataset.
    Airports {
        #[command(subcommand)]
        command: AirportCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum AirportCommand {
    /// Search the dataset and show weather for a chosen airport.
    Search {
        #[command(flatten)]
        criteria: SearchCriteria,
    },

    /// Show weather for randomly sampled airports.
    Random {
        /// How many airports to sample.
        #[arg(short = 'n', long, default_value_t = 2)]
        count: usize,

        /// Only airports with scheduled service.
        #[arg(long)]
        scheduled: bool,
    },

    /// Mark or unmark an airport for repeated lookups.
    Select {
        #[command(flatten)]
        criteria: SearchCriteria,
    },

    /// Show weather for every marked airport.
    Selected,
}

#[derive(Debug, Default, clap::Args)]
pub struct SearchCriteria {
    /// Match against the airport code, e.g. "KBZN".
    #[arg(long)]
    pub code: Option<String>,

    /// Match against the airport name.
    #[arg(long)]
    pub name: Option<String>,

    /// Match against the ISO region, e.g. "MT" or "US-MT".
    #[arg(long)]
    pub state: Option<String>,

    /// Match against the municipality.
    #[arg(long)]
    pub municipality: Option<String>,
}

impl SearchCriteria {
    fn into_query(self) -> AirportQuery {
        AirportQuery {
            code: self.code,
            name: self.name,
            state: self.state,
            municipality: self.municipality,
        }
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = Config::load()?;

        match self.command {
            Command::Configure => configure(config),
            Command::Show { address, geocoder } => {
                let store = Store::open()?;
                let Some(location) = resolve_location(&config, &store, geocoder, address).await?
                else {
                    return Ok(());
                };
                show_bundle(&config, &location).await
            }
            Command::Alerts { address, geocoder } => {
                let store = Store::open()?;
                let Some(location) = resolve_location(&config, &store, geocoder, address).await?
                else {
                    return Ok(());
                };
                show_alerts(&config, &location).await
            }
            Command::Stations { address, geocoder, max } => {
                let store = Store::open()?;
                let Some(location) = resolve_location(&config, &store, geocoder, address).await?
                else {
                    return Ok(());
                };
                show_stations(&config, &location, max.unwrap_or(config.station_limit)).await
            }
            Command::Airports { command } => run_airports(&config, command).await,
        }
    }
}

fn configure(mut config: Config) -> Result<()> {
    let ids: Vec<&str> = GeocoderId::all().iter().map(|id| id.as_str()).collect();
    let choice = Select::new("Default geocoder:", ids).prompt()?;
    let id = GeocoderId::try_from(choice)?;
    config.set_geocoder(id);

    if id == GeocoderId::Census {
        let key = Text::new("Census API key (optional, Enter to skip):").prompt()?;
        let key = key.trim();
        config.census_api_key = (!key.is_empty()).then(|| key.to_string());
        if config.census_api_key.is_none() {
            println!("No key stored; geocoding proceeds unauthenticated with rate limits.");
        }
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

/// Resolve an address to a location, prompting from history when no address
/// was given. Returns `None` after printing the reason when the lookup did
/// not succeed, so the caller can simply stop.
async fn resolve_location(
    config: &Config,
    store: &Store,
    geocoder_flag: Option<String>,
    address: Option<String>,
) -> Result<Option<Location>> {
    let address = match address {
        Some(address) => address,
        None => prompt_for_address(store)?,
    };

    let id = match geocoder_flag.as_deref() {
        Some(s) => GeocoderId::try_from(s)?,
        None => config.geocoder_id()?,
    };
    let geocoder = geocoder_from_config(id, config)?;

    match geocoder.resolve(&address).await {
        Ok(location) => {
            store.append_address(&location.matched_address)?;
            println!("\nMatched address: {}", location.matched_address);
            println!("Latitude: {}, Longitude: {}", location.latitude, location.longitude);
            Ok(Some(location))
        }
        Err(GeocodeError::NoMatch { address }) => {
            println!("\nNo match for '{address}'. Try rephrasing the address.");
            Ok(None)
        }
        Err(err @ GeocodeError::Unavailable { .. }) => {
            let other = match id {
                GeocoderId::Census => GeocoderId::Nominatim,
                GeocoderId::Nominatim => GeocoderId::Census,
            };
            println!("\n{err}");
            println!("The {id} geocoder may be down; retry with --geocoder {other}.");
            Ok(None)
        }
    }
}

const NEW_ADDRESS_CHOICE: &str = "Enter a new address";

fn prompt_for_address(store: &Store) -> Result<String> {
    let history = store.load_addresses()?;
    if history.is_empty() {
        return Ok(Text::new("Street address:").prompt()?);
    }

    let mut options = store::sorted_by_state(&history);
    options.push(NEW_ADDRESS_CHOICE.to_string());

    let choice = Select::new("Address (sorted by state):", options).prompt()?;
    if choice == NEW_ADDRESS_CHOICE {
        Ok(Text::new("Street address:").prompt()?)
    } else {
        Ok(choice)
    }
}

async fn show_bundle(config: &Config, location: &Location) -> Result<()> {
    let client = NwsClient::from_config(config)?;
    let options = AggregateOptions { station_limit: config.station_limit };

    match aggregate(&client, location, options).await {
        Ok(bundle) => {
            print_bundle(&bundle);
            Ok(())
        }
        Err(WeatherError::PointNotCovered { .. }) => {
            println!("\nThis location is outside the weather service coverage area (US only).");
            Ok(())
        }
        Err(err) => Err(err).context("weather lookup failed"),
    }
}

async fn show_alerts(config: &Config, location: &Location) -> Result<()> {
    let client = NwsClient::from_config(config)?;
    match client.active_alerts(location.latitude, location.longitude).await {
        Ok(alerts) => {
            print_alerts(&alerts);
            Ok(())
        }
        Err(err) => {
            println!("\nAlerts unavailable: {err}");
            Ok(())
        }
    }
}

async fn show_stations(config: &Config, location: &Location, max: usize) -> Result<()> {
    let client = NwsClient::from_config(config)?;
    match find_nearby(&client, location, max).await {
        Ok(stations) => {
            print_stations(&stations);
            Ok(())
        }
        Err(StationError::PointNotCovered { .. }) => {
            println!("\nThis location is outside the weather service coverage area (US only).");
            Ok(())
        }
        Err(err) => {
            println!("\nStations unavailable: {err}");
            Ok(())
        }
    }
}

async fn run_airports(config: &Config, command: AirportCommand) -> Result<()> {
    let store = Store::open()?;
    let http = reqwest::Client::builder().timeout(config.request_timeout()).build()?;

    match command {
        AirportCommand::Search { criteria } => {
            let dataset = store.load_airports(&http, false).await?;
            let Some(airport) = pick_airport(&dataset, criteria)? else {
                return Ok(());
            };
            show_bundle(config, &airport_location(&airport)).await
        }
        AirportCommand::Random { count, scheduled } => {
            let dataset = store.load_airports(&http, scheduled).await?;
            let sampled = airports::sample(&dataset, count)?;
            for airport in &sampled {
                show_airport_summary(config, airport).await?;
            }
            Ok(())
        }
        AirportCommand::Select { criteria } => {
            let dataset = store.load_airports(&http, false).await?;
            let Some(airport) = pick_airport(&dataset, criteria)? else {
                return Ok(());
            };

            let mut selected = store.load_selected_codes()?;
            if selected.contains(&airport.code) {
                selected.remove(&airport.code);
                println!("Unmarked {}.", airport.code);
            } else {
                selected.insert(airport.code.clone());
                println!("Marked {} for repeated lookups.", airport.code);
            }
            store.save_selected_codes(&selected)
        }
        AirportCommand::Selected => {
            let dataset = store.load_airports(&http, false).await?;
            let selected: Vec<&AirportRecord> =
                dataset.iter().filter(|a| a.selected).collect();
            if selected.is_empty() {
                println!("No airports are marked yet; run `weathervane airports select`.");
                return Ok(());
            }
            for airport in selected {
                show_airport_summary(config, airport).await?;
            }
            Ok(())
        }
    }
}

/// Filter the dataset by the given criteria (prompting for a term when none
/// were given) and let the user pick one match.
fn pick_airport(
    dataset: &[AirportRecord],
    criteria: SearchCriteria,
) -> Result<Option<AirportRecord>> {
    let query = criteria.into_query();
    let mut matches = if query.is_empty() {
        let term = Text::new("Airport code, name, state, or municipality:").prompt()?;
        search_any_field(dataset, term.trim())
    } else {
        airports::filter(dataset, &query)
    };

    if matches.is_empty() {
        println!("No matching airports found.");
        return Ok(None);
    }

    matches.sort_by(|a, b| {
        (a.region.as_deref(), a.municipality.as_deref(), a.name.as_str()).cmp(&(
            b.region.as_deref(),
            b.municipality.as_deref(),
            b.name.as_str(),
        ))
    });

    let labels: Vec<String> = matches.iter().map(airport_label).collect();
    let choice = Select::new("Matching airports:", labels.clone()).prompt()?;
    let index = labels.iter().position(|l| *l == choice).unwrap_or(0);
    Ok(Some(matches.swap_remove(index)))
}

/// A bare search term matches if any single criterion matches, so it spans
/// the same columns the flags do.
fn search_any_field(dataset: &[AirportRecord], term: &str) -> Vec<AirportRecord> {
    if term.is_empty() {
        return dataset.to_vec();
    }

    let queries = [
        AirportQuery { code: Some(term.to_string()), ..AirportQuery::default() },
        AirportQuery { name: Some(term.to_string()), ..AirportQuery::default() },
        AirportQuery { state: Some(term.to_string()), ..AirportQuery::default() },
        AirportQuery { municipality: Some(term.to_string()), ..AirportQuery::default() },
    ];

    let mut seen = std::collections::HashSet::new();
    let mut matches = Vec::new();
    for query in &queries {
        for airport in airports::filter(dataset, query) {
            if seen.insert(airport.code.clone()) {
                matches.push(airport);
            }
        }
    }
    matches
}

fn airport_label(airport: &AirportRecord) -> String {
    format!(
        "{} - {} ({}, {}){}",
        airport.code,
        airport.name,
        airport.region.as_deref().unwrap_or("N/A"),
        airport.municipality.as_deref().unwrap_or("N/A"),
        if airport.selected { " *" } else { "" },
    )
}

fn airport_location(airport: &AirportRecord) -> Location {
    Location::from_coordinates(
        airport.latitude,
        airport.longitude,
        format!("{} - {}", airport.code, airport.name),
    )
}

/// Condensed per-airport output for the random/selected listings.
async fn show_airport_summary(config: &Config, airport: &AirportRecord) -> Result<()> {
    let client = NwsClient::from_config(config)?;
    let location = airport_location(airport);

    println!("\n{}", airport_label(airport));
    println!("Latitude: {}, Longitude: {}", airport.latitude, airport.longitude);

    match aggregate(&client, &location, AggregateOptions { station_limit: 1 }).await {
        Ok(bundle) => {
            match &bundle.forecast {
                Outcome::Available(periods) if !periods.is_empty() => {
                    let now = &periods[0];
                    println!(
                        "{}: {}°{}, {}",
                        now.name, now.temperature, now.temperature_unit, now.short_forecast
                    );
                }
                Outcome::Available(_) => println!("Forecast: empty"),
                Outcome::Unavailable { reason } => println!("Forecast unavailable: {reason}"),
            }
            if let Outcome::Available(stations) = &bundle.stations {
                if let Some(station) = stations.first() {
                    print_station(station);
                }
            }
        }
        Err(WeatherError::PointNotCovered { .. }) => {
            println!("Outside the weather service coverage area.");
        }
        Err(err) => println!("Weather unavailable: {err}"),
    }

    Ok(())
}

fn print_bundle(bundle: &WeatherBundle) {
    match &bundle.forecast {
        Outcome::Available(periods) => {
            println!("\nForecast:");
            for period in periods {
                print!(
                    "  {}: {}°{}, {}",
                    period.name, period.temperature, period.temperature_unit,
                    period.short_forecast
                );
                if let Some(pct) = period.precipitation_pct {
                    print!(" ({pct:.0}% precip)");
                }
                println!();
            }
        }
        Outcome::Unavailable { reason } => println!("\nForecast unavailable: {reason}"),
    }

    match &bundle.hourly {
        Outcome::Available(periods) => {
            println!("\nNext hours:");
            for period in periods.iter().take(12) {
                println!(
                    "  {}: {}°{}, {}",
                    period.start_time.format("%a %I %p"),
                    period.temperature,
                    period.temperature_unit,
                    period.short_forecast
                );
            }
        }
        Outcome::Unavailable { reason } => println!("\nHourly forecast unavailable: {reason}"),
    }

    match &bundle.alerts {
        Outcome::Available(alerts) => print_alerts(alerts),
        Outcome::Unavailable { reason } => println!("\nAlerts unavailable: {reason}"),
    }

    match &bundle.stations {
        Outcome::Available(stations) => print_stations(stations),
        Outcome::Unavailable { reason } => println!("\nStations unavailable: {reason}"),
    }
}

fn print_alerts(alerts: &[weathervane_core::Alert]) {
    if alerts.is_empty() {
        println!("\nNo active weather alerts for this location.");
        return;
    }

    println!("\nActive weather alerts:");
    for alert in alerts {
        println!("  {} ({})", alert.event, alert.severity);
        if let Some(headline) = &alert.headline {
            println!("  {headline}");
        }
        println!("  Area: {}", alert.area);
        if let Some(effective) = alert.effective {
            println!("  Effective: {}", format_local(effective));
        }
        if let Some(expires) = alert.expires {
            println!("  Expires: {}", format_local(expires));
        }
        println!("  {}", "-".repeat(40));
    }
}

fn print_stations(stations: &[Station]) {
    if stations.is_empty() {
        println!("\nNo observation stations listed for this location.");
        return;
    }

    println!("\nNearest stations:");
    for station in stations {
        println!(
            "  {} - {} ({} mi)",
            station.id,
            station.name,
            units::round_tenth(station.distance_miles)
        );
        print_station(station);
    }
}

fn print_station(station: &Station) {
    match &station.observation {
        Some(obs) => {
            let temperature = obs
                .temperature_f
                .map(|t| format!("{}°F", units::round_degree(t)))
                .unwrap_or_else(|| "N/A".to_string());
            let wind = obs
                .wind_speed_mph
                .map(|w| format!("{} mph", units::round_tenth(w)))
                .unwrap_or_else(|| "N/A".to_string());
            let direction = obs
                .wind_direction_deg
                .map(|d| format!(" from {d:.0}°"))
                .unwrap_or_default();

            println!(
                "    {} | temp {} | wind {}{}",
                obs.description.as_deref().unwrap_or("No description"),
                temperature,
                wind,
                direction
            );
        }
        None => println!("    Latest observation unavailable"),
    }
}

fn format_local(time: chrono::DateTime<chrono::Utc>) -> String {
    time.with_timezone(&chrono::Local).format("%Y-%m-%d %I:%M %p").to_string()
}
