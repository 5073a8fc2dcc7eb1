//! The per-station time-series pipeline: ingest → derive → summarize.
//!
//! - `ingest`: feed JSON to a scrubbed, time-ordered `ObservationTable`.
//! - `derive`: rain amount, periodic rain sums, daily cumulative rain/sunshine.
//! - `stats`: daily statistics and the current-value snapshot.
//!
//! Every step takes the previous table by reference and returns new data.

mod derive;
mod ingest;
mod stats;

pub use derive::*;
pub use ingest::*;
pub use stats::*;

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::models::{ObservationTable, Station, StationReport};
use tracing::debug;

/// Runs derivation and statistics on an ingested table and attaches the
/// station's map position.
pub fn process_table(
    station: &Station,
    table: &ObservationTable,
    config: &PipelineConfig,
) -> Result<StationReport> {
    let augmented = derive(table, config)?;
    let summary = summarize(&augmented, config.sunshine_mode)?;
    let map_point = station.map_point()?;
    debug!(
        "Processed station {}: {} rows, {} days",
        station.id,
        augmented.len(),
        summary.daily.days.len()
    );
    Ok(StationReport {
        station: station.clone(),
        map_point,
        table: augmented,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_stations;
    use serde_json::json;

    #[test]
    fn test_empty_feed_flows_through_every_step() {
        let station = &default_stations()[0];
        let table = table_from_json(&station.id, &json!([])).unwrap();
        assert!(table.is_empty());

        let report = process_table(station, &table, &PipelineConfig::default()).unwrap();
        assert!(report.table.is_empty());
        assert!(report.table.rain_buckets().is_empty());
        assert!(report.summary.daily.is_empty());
        assert!(report.summary.daily.rows.is_empty());
        assert!(report.summary.current.is_empty());
        assert_eq!(report.summary.current.timestamp, None);
    }

    #[test]
    fn test_processing_is_deterministic() {
        let station = &default_stations()[0];
        let body = json!([
            {"datumsec": 1_714_521_600_000_i64, "tl": 12.0, "rr": 1.2, "so": 10.0},
            {"datumsec": 1_714_522_200_000_i64, "tl": 12.4, "rr": -99.9, "so": 8.0},
        ]);
        let table = table_from_json(&station.id, &body).unwrap();
        let config = PipelineConfig::default();

        let first = process_table(station, &table, &config).unwrap();
        let second = process_table(station, &table, &config).unwrap();
        assert_eq!(first.table, second.table);
        assert_eq!(first.summary, second.summary);
    }
}
