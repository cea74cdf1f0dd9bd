//! HTTP client for the Jolpica (Ergast-compatible) F1 statistics API

use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cache::ResponseCache;
use super::{is_finished_status, RaceDataSource};
use crate::config::{Settings, TtlTiers};
use crate::error::SourceError;
use crate::models::{RaceInfo, RaceResult};

/// Page size requested from the API; a season calendar and a round's
/// classification both fit in one page
const PAGE_LIMIT: u32 = 100;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// Minimum spacing between requests in milliseconds
    pub delay_ms: u64,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Max attempts per request
    pub max_retries: u32,
    /// Cache lifetimes: calendars use `medium`, results of a run round
    /// `long`, and empty results of a round not run yet `short`
    pub ttl: TtlTiers,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            base_url: settings.jolpica_base,
            delay_ms: 250,
            timeout_secs: 20,
            max_retries: 3,
            ttl: settings.ttl,
            user_agent: concat!("pitwall/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl ClientConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            base_url: settings.jolpica_base.clone(),
            ttl: settings.ttl,
            ..Self::default()
        }
    }
}

/// Jolpica API client with rate limiting, retry and optional disk cache
pub struct JolpicaClient {
    client: reqwest::Client,
    config: ClientConfig,
    cache: Option<ResponseCache>,
    last_request: Arc<Mutex<Instant>>,
}

impl JolpicaClient {
    /// Create a new client with the given configuration
    pub fn new(config: ClientConfig, cache: Option<ResponseCache>) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            config,
            cache,
            last_request: Arc::new(Mutex::new(
                Instant::now()
                    .checked_sub(Duration::from_secs(10))
                    .unwrap_or_else(Instant::now),
            )),
        })
    }

    /// Wait for rate limit
    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        let elapsed = last.elapsed();
        let delay = Duration::from_millis(self.config.delay_ms);

        if elapsed < delay {
            tokio::time::sleep(delay - elapsed).await;
        }

        *last = Instant::now();
    }

    /// Results of a round that has not been run yet expire quickly
    fn results_ttl(&self, payload: &serde_json::Value) -> u64 {
        let run = payload
            .pointer("/MRData/RaceTable/Races/0/Results/0")
            .is_some();
        if run {
            self.config.ttl.long
        } else {
            self.config.ttl.short
        }
    }

    fn races_url(&self, season: u32) -> String {
        format!("{}/{}/races.json?limit={}", self.config.base_url, season, PAGE_LIMIT)
    }

    fn results_url(&self, season: u32, round: u32) -> String {
        format!(
            "{}/{}/{}/results.json?limit={}",
            self.config.base_url, season, round, PAGE_LIMIT
        )
    }

    /// Fetch JSON with rate limiting and retry
    ///
    /// HTTP 429 backs off 0.6 s per attempt; other statuses, transport errors
    /// and undecodable bodies back off 0.4 s per attempt.
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, SourceError> {
        for attempt in 1..=self.config.max_retries {
            self.wait_for_rate_limit().await;

            let backoff = match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<serde_json::Value>().await {
                        Ok(payload) => return Ok(payload),
                        Err(e) => {
                            warn!(
                                "Undecodable response (attempt {}/{}): {}",
                                attempt, self.config.max_retries, e
                            );
                            Duration::from_millis(400 * attempt as u64)
                        }
                    }
                }
                Ok(response) if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                    warn!(
                        "Rate limited by API (attempt {}/{})",
                        attempt, self.config.max_retries
                    );
                    Duration::from_millis(600 * attempt as u64)
                }
                Ok(response) => {
                    warn!(
                        "Request failed with status {} (attempt {}/{})",
                        response.status(),
                        attempt,
                        self.config.max_retries
                    );
                    Duration::from_millis(400 * attempt as u64)
                }
                Err(e) => {
                    warn!(
                        "Request failed (attempt {}/{}): {}",
                        attempt, self.config.max_retries, e
                    );
                    Duration::from_millis(400 * attempt as u64)
                }
            };

            if attempt < self.config.max_retries {
                tokio::time::sleep(backoff).await;
            }
        }

        Err(SourceError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.config.max_retries,
        })
    }

    /// Cached GET; `ttl_for` picks the cache lifetime from the payload
    async fn get<F>(&self, url: &str, ttl_for: F) -> Result<serde_json::Value, SourceError>
    where
        F: FnOnce(&serde_json::Value) -> u64,
    {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(url)) {
            return Ok(cached);
        }

        info!("Fetching {}", url);
        let payload = self.fetch_json(url).await?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.set(url, &payload, ttl_for(&payload)) {
                warn!("Failed to cache {}: {}", url, e);
            }
        }

        Ok(payload)
    }
}

impl RaceDataSource for JolpicaClient {
    async fn races(&self, season: u32) -> Result<Vec<RaceInfo>, SourceError> {
        let payload = self
            .get(&self.races_url(season), |_| self.config.ttl.medium)
            .await?;
        parse_races(payload, season)
    }

    async fn results(&self, season: u32, round: u32) -> Result<Vec<RaceResult>, SourceError> {
        let payload = self
            .get(&self.results_url(season, round), |p| self.results_ttl(p))
            .await?;
        parse_results(payload)
    }
}

// --- Response schema -------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "MRData")]
    mr_data: MrData,
}

#[derive(Debug, Deserialize)]
struct MrData {
    #[serde(rename = "RaceTable")]
    race_table: RaceTable,
}

#[derive(Debug, Deserialize)]
struct RaceTable {
    #[serde(rename = "Races", default)]
    races: Vec<RaceRecord>,
}

#[derive(Debug, Deserialize)]
struct RaceRecord {
    round: String,
    #[serde(rename = "raceName", default)]
    race_name: String,
    #[serde(rename = "Circuit")]
    circuit: CircuitRecord,
    #[serde(default)]
    laps: Option<String>,
    #[serde(rename = "Results", default)]
    results: Vec<ResultRecord>,
}

#[derive(Debug, Deserialize)]
struct CircuitRecord {
    #[serde(rename = "circuitId", default)]
    circuit_id: String,
    #[serde(rename = "circuitName", default)]
    circuit_name: String,
    #[serde(rename = "Location", default)]
    location: LocationRecord,
}

#[derive(Debug, Default, Deserialize)]
struct LocationRecord {
    #[serde(default)]
    locality: String,
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct ResultRecord {
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    grid: Option<String>,
    #[serde(default)]
    points: Option<String>,
    #[serde(default)]
    laps: Option<String>,
    #[serde(default)]
    status: String,
    #[serde(rename = "Driver", default)]
    driver: Option<DriverRef>,
    #[serde(rename = "Constructor", default)]
    constructor: Option<ConstructorRef>,
}

#[derive(Debug, Deserialize)]
struct DriverRef {
    #[serde(rename = "driverId")]
    driver_id: String,
}

#[derive(Debug, Deserialize)]
struct ConstructorRef {
    #[serde(rename = "constructorId")]
    constructor_id: String,
}

/// Positive integer field; "0" (pit-lane start) and garbage map to None
fn parse_position(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|s| s.trim().parse::<u32>().ok()).filter(|&p| p >= 1)
}

fn parse_points(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|p| p.is_finite() && *p >= 0.0)
}

fn parse_races(payload: serde_json::Value, season: u32) -> Result<Vec<RaceInfo>, SourceError> {
    let envelope: Envelope = serde_json::from_value(payload)?;

    let races = envelope
        .mr_data
        .race_table
        .races
        .into_iter()
        .filter_map(|race| {
            let round = race.round.trim().parse::<u32>().ok()?;
            Some(RaceInfo {
                season,
                round,
                race_name: race.race_name,
                circuit_id: race.circuit.circuit_id,
                circuit_name: race.circuit.circuit_name,
                locality: race.circuit.location.locality,
                country: race.circuit.location.country,
                laps: race.laps.as_deref().and_then(|l| l.trim().parse().ok()),
            })
        })
        .collect();

    Ok(races)
}

fn parse_results(payload: serde_json::Value) -> Result<Vec<RaceResult>, SourceError> {
    let envelope: Envelope = serde_json::from_value(payload)?;

    let Some(race) = envelope.mr_data.race_table.races.into_iter().next() else {
        return Ok(Vec::new());
    };

    let results = race
        .results
        .into_iter()
        .filter_map(|record| {
            let (Some(driver), Some(constructor)) = (record.driver, record.constructor) else {
                debug!("Skipping result entry without driver or constructor");
                return None;
            };
            Some(RaceResult {
                driver_id: driver.driver_id,
                constructor_id: constructor.constructor_id,
                grid: parse_position(record.grid.as_deref()),
                position: parse_position(record.position.as_deref()),
                finished: is_finished_status(&record.status),
                points: parse_points(record.points.as_deref()),
                laps: record.laps.as_deref().and_then(|l| l.trim().parse().ok()),
            })
        })
        .collect();

    Ok(results)
}
