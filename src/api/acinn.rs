//! Provides a client for the ACINN station feed.
//!
//! The feed serves one JSON array of 10-minute records per station at
//! `{base_url}/{station_id}/{lookback_hours}`. Each station is fetched once per
//! run; the resulting table is frozen before any derivation.

use crate::config::PipelineConfig;
use crate::error::{AppError, Result};
use crate::models::ObservationTable;
use crate::pipeline::table_from_json;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, error, info};

/// An asynchronous client for fetching station feeds.
#[derive(Debug, Clone)]
pub struct StationFeedClient {
    client: Client,
    base_url: String,
    lookback_hours: u32,
}

impl StationFeedClient {
    /// Creates a client using the configuration's base URL, lookback window and
    /// request timeout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Fetch` if the HTTP client cannot be built.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            lookback_hours: config.lookback_hours,
        })
    }

    pub fn feed_url(&self, station_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, station_id, self.lookback_hours)
    }

    /// Fetches the raw feed body for one station.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Fetch` on transport failure, timeout or a non-success
    /// status, and `AppError::JsonParse` if the body is not JSON.
    pub async fn fetch_body(&self, station_id: &str) -> Result<serde_json::Value> {
        let url = self.feed_url(station_id);
        info!("Fetching station feed: {}", url);

        let response = self.client.get(&url).send().await.map_err(|e| {
            error!("Error fetching feed for {}: {}", station_id, e);
            AppError::Fetch(Arc::new(e))
        })?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                error!(
                    "Feed request to {} failed with status {}: {}",
                    url,
                    e.status().unwrap_or_default(),
                    e
                );
                if e.status() == Some(reqwest::StatusCode::NOT_FOUND) {
                    error!("Received 404 Not Found. Check the station id '{}'.", station_id);
                }
                return Err(AppError::Fetch(Arc::new(e)));
            },
        };

        let body = response.text().await.map_err(|e| {
            error!("Error reading feed body for {}: {}", station_id, e);
            AppError::Fetch(Arc::new(e))
        })?;

        let value = serde_json::from_str(&body).map_err(|e| {
            error!("Error parsing feed JSON for {}: {}", station_id, e);
            AppError::from(e)
        })?;

        debug!("Received {} bytes for {}", body.len(), station_id);
        Ok(value)
    }

    /// Fetches one station and builds its scrubbed observation table.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`fetch_body`](Self::fetch_body) and returns
    /// `AppError::Schema` if the body is not a timestamped record array.
    pub async fn fetch_table(&self, station_id: &str) -> Result<ObservationTable> {
        let body = self.fetch_body(station_id).await?;
        let table = table_from_json(station_id, &body)?;
        info!(
            "Ingested {} records for {} ({} columns)",
            table.len(),
            station_id,
            table.columns().count()
        );
        Ok(table)
    }
}
