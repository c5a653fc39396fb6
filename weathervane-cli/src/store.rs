//! File-backed collaborator state: the address history and the cached
//! airport dataset. The core only ever sees plain data loaded here; all
//! reads and writes happen between user interactions, never concurrently
//! with an in-flight lookup.

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use weathervane_core::AirportRecord;

const ADDRESS_FILE: &str = "addresses.txt";
const AIRPORTS_CACHE_FILE: &str = "airports.csv";
const SELECTED_FILE: &str = "selected_airports.txt";

/// The OurAirports community dataset; one CSV covering every airport
/// worldwide.
const AIRPORTS_DOWNLOAD_URL: &str =
    "https://davidmegginson.github.io/ourairports-data/airports.csv";

pub struct Store {
    data_dir: PathBuf,
}

impl Store {
    pub fn open() -> Result<Self> {
        let dirs = ProjectDirs::from("dev", "weathervane", "weathervane")
            .ok_or_else(|| anyhow!("Could not determine platform data directory"))?;

        let data_dir = dirs.data_dir().to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Self { data_dir })
    }

    #[cfg(test)]
    fn at(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.data_dir.join(file)
    }

    /// Previously resolved addresses, in insertion order.
    pub fn load_addresses(&self) -> Result<Vec<String>> {
        read_lines(&self.path(ADDRESS_FILE))
    }

    /// Record a resolved address. Stored uppercased; duplicates are
    /// dropped here as this store's policy, not the core's.
    pub fn append_address(&self, address: &str) -> Result<()> {
        let mut addresses = self.load_addresses()?;
        let upper = address.trim().to_uppercase();
        if upper.is_empty() || addresses.contains(&upper) {
            return Ok(());
        }
        addresses.push(upper);
        write_lines(&self.path(ADDRESS_FILE), &addresses)
    }

    /// Load the airport dataset from the local cache, downloading and
    /// filtering it first if the cache does not exist yet. With
    /// `scheduled_only`, rows without scheduled service are skipped.
    pub async fn load_airports(
        &self,
        http: &reqwest::Client,
        scheduled_only: bool,
    ) -> Result<Vec<AirportRecord>> {
        let cache = self.path(AIRPORTS_CACHE_FILE);
        if !cache.exists() {
            self.download_airports(http, &cache).await?;
        }

        let selected = self.load_selected_codes()?;
        read_airports_csv(&cache, &selected, scheduled_only)
    }

    async fn download_airports(&self, http: &reqwest::Client, cache: &Path) -> Result<()> {
        println!("Airport dataset not cached yet; downloading...");

        let body = http
            .get(AIRPORTS_DOWNLOAD_URL)
            .send()
            .await
            .context("Failed to download the airport dataset")?
            .error_for_status()
            .context("Airport dataset download was rejected")?
            .text()
            .await
            .context("Failed to read the airport dataset body")?;

        let filtered = filter_us_airports_csv(&body)?;
        fs::write(cache, filtered)
            .with_context(|| format!("Failed to write airport cache: {}", cache.display()))?;

        Ok(())
    }

    /// Codes of airports marked as selected for repeated lookups.
    pub fn load_selected_codes(&self) -> Result<HashSet<String>> {
        Ok(read_lines(&self.path(SELECTED_FILE))?.into_iter().collect())
    }

    pub fn save_selected_codes(&self, codes: &HashSet<String>) -> Result<()> {
        let mut sorted: Vec<String> = codes.iter().cloned().collect();
        sorted.sort();
        write_lines(&self.path(SELECTED_FILE), &sorted)
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(contents.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let mut contents = lines.join("\n");
    contents.push('\n');
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

/// Display ordering for the history menu: sorted by the trailing state
/// code so addresses group by state.
pub fn sorted_by_state(addresses: &[String]) -> Vec<String> {
    let mut sorted = addresses.to_vec();
    sorted.sort_by_key(|addr| state_sort_key(addr));
    sorted
}

fn state_sort_key(address: &str) -> String {
    // "123 MAIN ST, TOWN, MD, 21032" sorts under "MD"; addresses without
    // a recognizable state code sort first.
    let parts: Vec<&str> = address.split(',').collect();
    if parts.len() > 1 {
        parts[parts.len() - 2].trim().to_string()
    } else {
        String::new()
    }
}

/// One row of the OurAirports CSV; only the columns this app reads.
#[derive(Debug, Deserialize)]
struct RawAirport {
    ident: String,
    name: String,
    latitude_deg: Option<f64>,
    longitude_deg: Option<f64>,
    iso_country: Option<String>,
    iso_region: Option<String>,
    municipality: Option<String>,
    scheduled_service: Option<String>,
}

impl RawAirport {
    /// US-style station identifier: K/P/T prefix, four alphabetic chars.
    /// These are the idents the weather service also knows as stations.
    fn is_us_ident(&self) -> bool {
        self.ident.len() == 4
            && self.ident.chars().all(|c| c.is_ascii_alphabetic())
            && matches!(self.ident.chars().next(), Some('K' | 'P' | 'T'))
    }

    fn has_scheduled_service(&self) -> bool {
        self.scheduled_service.as_deref().is_some_and(|s| s.eq_ignore_ascii_case("yes"))
    }
}

/// Reduce the worldwide download to the US idents this app can use, keeping
/// the header row so the cache stays a valid CSV.
fn filter_us_airports_csv(body: &str) -> Result<String> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let headers = reader.headers().context("Airport dataset has no header row")?.clone();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers).context("Failed to write airport cache header")?;

    for record in reader.records() {
        let record = record.context("Malformed row in the airport dataset")?;
        let raw: RawAirport =
            record.deserialize(Some(&headers)).context("Unexpected airport dataset columns")?;
        if raw.is_us_ident() {
            writer.write_record(&record).context("Failed to write airport cache row")?;
        }
    }

    let bytes = writer.into_inner().context("Failed to flush airport cache")?;
    String::from_utf8(bytes).context("Airport cache is not valid UTF-8")
}

fn read_airports_csv(
    path: &Path,
    selected: &HashSet<String>,
    scheduled_only: bool,
) -> Result<Vec<AirportRecord>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open airport cache: {}", path.display()))?;

    let mut airports = Vec::new();
    for row in reader.deserialize::<RawAirport>() {
        let raw = row.context("Malformed row in the airport cache")?;
        if scheduled_only && !raw.has_scheduled_service() {
            continue;
        }
        // Rows without coordinates cannot feed a weather lookup.
        let (Some(latitude), Some(longitude)) = (raw.latitude_deg, raw.longitude_deg) else {
            continue;
        };

        airports.push(AirportRecord {
            selected: selected.contains(&raw.ident),
            code: raw.ident,
            name: raw.name,
            municipality: raw.municipality.filter(|s| !s.is_empty()),
            region: raw.iso_region.filter(|s| !s.is_empty()),
            country: raw.iso_country.filter(|s| !s.is_empty()),
            latitude,
            longitude,
        });
    }

    Ok(airports)
}
