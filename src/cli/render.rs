//! Console tables for station reports.

use crate::models::{CurrentSnapshot, DailyStatistics, RainBucket, Station};
use crate::projection::MapPoint;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS);
    table
}

fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.1}", v),
        None => "-".to_string(),
    }
}

/// One row per statistic, one column per UTC day.
pub fn daily_table(stats: &DailyStatistics) -> String {
    let mut table = new_table();
    let mut header = vec!["Statistic".to_string()];
    header.extend(stats.days.iter().map(|day| day.format("%Y-%m-%d").to_string()));
    table.set_header(header);

    for row in &stats.rows {
        let mut cells = vec![row.label.clone()];
        cells.extend(stats.days.iter().map(|day| cell(stats.value(row.key, *day))));
        table.add_row(cells);
    }
    table.to_string()
}

/// Periodic rain sums, one row per bucket end.
pub fn rain_buckets_table(buckets: &[RainBucket]) -> String {
    let mut table = new_table();
    table.set_header(vec!["Bucket end (UTC)", "Rain (mm)"]);
    for bucket in buckets {
        table.add_row(vec![
            bucket.label.format("%Y-%m-%d %H:%M").to_string(),
            cell(bucket.total),
        ]);
    }
    table.to_string()
}

pub fn snapshot_table(snapshot: &CurrentSnapshot) -> String {
    let mut table = new_table();
    table.set_header(vec!["Current", "Value", "Unit"]);
    for entry in &snapshot.entries {
        table.add_row(vec![entry.label.clone(), cell(entry.value), entry.unit.clone()]);
    }
    table.to_string()
}

pub fn stations_table(stations: &[(&Station, MapPoint)]) -> String {
    let mut table = new_table();
    table.set_header(vec![
        "Station",
        "Latitude",
        "Longitude",
        "Elevation (m)",
        "Map x (m)",
        "Map y (m)",
    ]);
    for (station, point) in stations {
        table.add_row(vec![
            station.display_name(),
            format!("{:.6}", station.latitude),
            format!("{:.6}", station.longitude),
            station
                .elevation_m
                .map(|e| format!("{:.0}", e))
                .unwrap_or_else(|| "-".to_string()),
            format!("{:.1}", point.x),
            format!("{:.1}", point.y),
        ]);
    }
    table.to_string()
}
