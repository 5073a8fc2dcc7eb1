//! Pipeline configuration and the station registry.
//!
//! `PipelineConfig` is assembled with [`PipelineConfig::builder`]. Values set on
//! the builder (typically from CLI flags) win over environment variables, which
//! win over the built-in defaults.

use crate::error::{AppError, Result};
use crate::models::Station;
use chrono::Duration;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub const DEFAULT_BASE_URL: &str = "http://meteo145.uibk.ac.at";
pub const DEFAULT_LOOKBACK_HOURS: u32 = 7;
pub const MAX_LOOKBACK_HOURS: u32 = 366 * 24;
pub const DEFAULT_RAIN_BUCKET_MINUTES: i64 = 180;
/// The feed's native sample cadence.
pub const MIN_RAIN_BUCKET_MINUTES: i64 = 10;
pub const MAX_RAIN_BUCKET_MINUTES: i64 = 7 * 24 * 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const MAX_TIMEOUT_SECS: u64 = 3600;

pub const ENV_BASE_URL: &str = "ACINN_BASE_URL";
pub const ENV_LOOKBACK_HOURS: &str = "ACINN_LOOKBACK_HOURS";
pub const ENV_RAIN_BUCKET_MINUTES: &str = "ACINN_RAIN_BUCKET_MINUTES";
pub const ENV_TIMEOUT_SECS: &str = "ACINN_TIMEOUT_SECS";
pub const ENV_SUNSHINE_MODE: &str = "ACINN_SUNSHINE_MODE";
pub const ENV_LOG_DIR: &str = "ACINN_LOG_DIR";

/// Which sunshine column is shown as "current sunshine".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SunshineMode {
    /// Hours of sunshine accumulated since UTC midnight.
    #[default]
    Cumulative,
    /// Minutes of sunshine in the latest 10-minute interval.
    PerInterval,
}

/// Settings for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Feed root without trailing slash.
    pub base_url: String,
    /// Lookback window path segment of the feed URL.
    pub lookback_hours: u32,
    /// Width of the periodic rain-sum buckets.
    pub rain_bucket: Duration,
    pub sunshine_mode: SunshineMode,
    pub request_timeout: std::time::Duration,
}

impl PipelineConfig {
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
            rain_bucket: Duration::minutes(DEFAULT_RAIN_BUCKET_MINUTES),
            sunshine_mode: SunshineMode::default(),
            request_timeout: std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PipelineConfigBuilder {
    base_url: Option<String>,
    lookback_hours: Option<u32>,
    rain_bucket_minutes: Option<i64>,
    sunshine_mode: Option<SunshineMode>,
    timeout_secs: Option<u64>,
}

impl PipelineConfigBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn lookback_hours(mut self, hours: u32) -> Self {
        self.lookback_hours = Some(hours);
        self
    }

    pub fn rain_bucket_minutes(mut self, minutes: i64) -> Self {
        self.rain_bucket_minutes = Some(minutes);
        self
    }

    pub fn sunshine_mode(mut self, mode: SunshineMode) -> Self {
        self.sunshine_mode = Some(mode);
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Fills every setting not yet given from the `ACINN_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set but cannot be parsed.
    pub fn with_env_defaults(mut self) -> Result<Self> {
        if self.base_url.is_none() {
            self.base_url = env::var(ENV_BASE_URL).ok();
        }
        if self.lookback_hours.is_none() {
            self.lookback_hours = parse_env(ENV_LOOKBACK_HOURS)?;
        }
        if self.rain_bucket_minutes.is_none() {
            self.rain_bucket_minutes = parse_env(ENV_RAIN_BUCKET_MINUTES)?;
        }
        if self.timeout_secs.is_none() {
            self.timeout_secs = parse_env(ENV_TIMEOUT_SECS)?;
        }
        if self.sunshine_mode.is_none() {
            if let Ok(raw) = env::var(ENV_SUNSHINE_MODE) {
                let mode = <SunshineMode as ValueEnum>::from_str(raw.trim(), true).map_err(|e| {
                    AppError::Config(format!("{}={}: {}", ENV_SUNSHINE_MODE, raw, e))
                })?;
                self.sunshine_mode = Some(mode);
            }
        }
        Ok(self)
    }

    /// Validates the settings and produces the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the base URL is not http(s), or the lookback,
    /// timeout or rain bucket falls outside its bounds. The rain bucket may not be
    /// shorter than the 10-minute cadence.
    pub fn build(self) -> Result<PipelineConfig> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim()
            .trim_end_matches('/')
            .to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AppError::Config(format!(
                "base URL '{}' must start with http:// or https://",
                base_url
            )));
        }

        let lookback_hours = self.lookback_hours.unwrap_or(DEFAULT_LOOKBACK_HOURS);
        if lookback_hours == 0 || lookback_hours > MAX_LOOKBACK_HOURS {
            return Err(AppError::Config(format!(
                "lookback of {} h must be between 1 and {} h",
                lookback_hours, MAX_LOOKBACK_HOURS
            )));
        }

        let bucket_minutes = self
            .rain_bucket_minutes
            .unwrap_or(DEFAULT_RAIN_BUCKET_MINUTES);
        if bucket_minutes < MIN_RAIN_BUCKET_MINUTES {
            return Err(AppError::Config(format!(
                "rain bucket of {} min is below the {} min sample cadence",
                bucket_minutes, MIN_RAIN_BUCKET_MINUTES
            )));
        }
        if bucket_minutes > MAX_RAIN_BUCKET_MINUTES {
            return Err(AppError::Config(format!(
                "rain bucket of {} min exceeds the {} min maximum",
                bucket_minutes, MAX_RAIN_BUCKET_MINUTES
            )));
        }
        let rain_bucket = Duration::try_minutes(bucket_minutes).ok_or_else(|| {
            AppError::Config(format!("rain bucket of {} min is out of range", bucket_minutes))
        })?;

        let timeout_secs = self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 || timeout_secs > MAX_TIMEOUT_SECS {
            return Err(AppError::Config(format!(
                "request timeout of {} s must be between 1 and {} s",
                timeout_secs, MAX_TIMEOUT_SECS
            )));
        }

        let config = PipelineConfig {
            base_url,
            lookback_hours,
            rain_bucket,
            sunshine_mode: self.sunshine_mode.unwrap_or_default(),
            request_timeout: std::time::Duration::from_secs(timeout_secs),
        };
        debug!("Pipeline configuration: {:?}", config);
        Ok(config)
    }
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::Config(format!("{}={}: {}", name, raw, e))),
        Err(_) => Ok(None),
    }
}

/// The ACINN stations in and around the Inn valley.
pub fn default_stations() -> Vec<Station> {
    vec![
        Station::new("innsbruck", 47.263631, 11.385571, Some(578.0)),
        Station::new("sattelberg", 47.011203, 11.480401, Some(2107.0)),
        Station::new("obergurgl", 46.867521, 11.024800, Some(1938.0)),
        Station::new("ellboegen", 47.167300, 11.457867, Some(1080.0)),
    ]
}

/// Loads a station registry from a JSON array of stations.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be read, `AppError::JsonParse` if it
/// is not valid JSON, and `AppError::Config` if [`validate_stations`] rejects it.
pub fn load_stations(path: &Path) -> Result<Vec<Station>> {
    info!("Loading station registry from {}", path.display());
    let raw = std::fs::read_to_string(path)?;
    let stations: Vec<Station> = serde_json::from_str(&raw)?;
    validate_stations(&stations)?;
    Ok(stations)
}

/// Checks a registry before any station is fetched.
///
/// # Errors
///
/// Returns `AppError::Config` for an empty registry, blank, duplicate or
/// path-like ids, and coordinates outside the map projection's domain.
pub fn validate_stations(stations: &[Station]) -> Result<()> {
    if stations.is_empty() {
        return Err(AppError::Config("station registry is empty".to_string()));
    }
    let mut seen = HashSet::new();
    for station in stations {
        let id = station.id.trim();
        if id.is_empty() || id.contains('/') {
            return Err(AppError::Config(format!(
                "invalid station id '{}'",
                station.id
            )));
        }
        if !seen.insert(id) {
            return Err(AppError::Config(format!("duplicate station id '{}'", id)));
        }
        if let Err(e) = station.map_point() {
            return Err(AppError::Config(format!("station '{}': {}", id, e)));
        }
    }
    Ok(())
}

/// Picks the stations named in `ids` (case-insensitive), preserving registry
/// order. An empty selection means every station.
///
/// # Errors
///
/// Returns `AppError::Cli` naming the first unknown id.
pub fn select_stations(registry: &[Station], ids: &[String]) -> Result<Vec<Station>> {
    if ids.is_empty() {
        return Ok(registry.to_vec());
    }
    for id in ids {
        if !registry.iter().any(|s| s.id.eq_ignore_ascii_case(id)) {
            let known: Vec<&str> = registry.iter().map(|s| s.id.as_str()).collect();
            return Err(AppError::Cli(format!(
                "Unknown station '{}'. Must be one of: {:?}",
                id, known
            )));
        }
    }
    Ok(registry
        .iter()
        .filter(|s| ids.iter().any(|id| s.id.eq_ignore_ascii_case(id)))
        .cloned()
        .collect())
}
