//! Structures produced by the statistics step and the per-station run.
//!
//! Includes:
//! - `DailyStatistics`: one labelled row per statistic, one value per UTC day.
//! - `CurrentSnapshot`: latest values in fixed display priority.
//! - `StationReport` / `RunReport`: everything a renderer needs for a run.

use super::{Column, Field, ObservationTable, Station};
use crate::projection::MapPoint;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Which aggregate a statistics row holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Mean,
    Min,
    Max,
    /// Wind direction at the day's first sample of maximal wind speed.
    DirectionAtMaxSpeed,
    /// Wind direction at the day's first sample of minimal wind speed.
    DirectionAtMinSpeed,
    /// Last valid value of a daily cumulative column.
    DayTotal,
}

/// Identifies a statistics row: the column it is computed on and the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatKey {
    pub column: Column,
    pub statistic: Statistic,
}

impl StatKey {
    pub fn new(column: Column, statistic: Statistic) -> Self {
        Self { column, statistic }
    }

    /// Human-readable row label including the unit.
    pub fn label(&self) -> String {
        let column = self.column;
        match self.statistic {
            Statistic::Mean => format!("{} mean ({})", column.label(), column.unit()),
            Statistic::Min => format!("{} min ({})", column.label(), column.unit()),
            Statistic::Max => format!("{} max ({})", column.label(), column.unit()),
            Statistic::DirectionAtMaxSpeed => format!(
                "{} at max speed ({})",
                Field::WindDirection.label(),
                Field::WindDirection.unit()
            ),
            Statistic::DirectionAtMinSpeed => format!(
                "{} at min speed ({})",
                Field::WindDirection.label(),
                Field::WindDirection.unit()
            ),
            Statistic::DayTotal => match column {
                Column::RainCum => format!("Precipitation total ({})", column.unit()),
                Column::SunshineCum => format!("Sunshine total ({})", column.unit()),
                other => format!("{} total ({})", other.label(), other.unit()),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatRow {
    pub key: StatKey,
    pub label: String,
    /// One value per entry of [`DailyStatistics::days`]; `None` if the day had no valid input.
    pub values: Vec<Option<f64>>,
}

/// Per-day statistics for one station.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyStatistics {
    pub days: Vec<NaiveDate>,
    pub rows: Vec<StatRow>,
}

impl DailyStatistics {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn row(&self, key: StatKey) -> Option<&StatRow> {
        self.rows.iter().find(|row| row.key == key)
    }

    pub fn value(&self, key: StatKey, day: NaiveDate) -> Option<f64> {
        let index = self.days.iter().position(|d| *d == day)?;
        self.row(key).and_then(|row| row.values[index])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
    pub column: Column,
    pub label: String,
    pub unit: String,
    pub value: Option<f64>,
}

/// The most recent record's values in display priority order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrentSnapshot {
    pub timestamp: Option<DateTime<Utc>>,
    pub entries: Vec<SnapshotEntry>,
}

impl CurrentSnapshot {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn get(&self, column: Column) -> Option<&SnapshotEntry> {
        self.entries.iter().find(|entry| entry.column == column)
    }

    pub fn columns(&self) -> Vec<Column> {
        self.entries.iter().map(|entry| entry.column).collect()
    }
}

/// Output of the statistics step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StationSummary {
    pub daily: DailyStatistics,
    pub current: CurrentSnapshot,
}

/// Everything produced for one station in one run.
#[derive(Debug, Clone, Serialize)]
pub struct StationReport {
    pub station: Station,
    pub map_point: MapPoint,
    pub table: ObservationTable,
    pub summary: StationSummary,
}

/// A station whose ingestion failed; the rest of the run continued.
#[derive(Debug, Clone, Serialize)]
pub struct StationFailure {
    pub station: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub reports: Vec<StationReport>,
    pub failures: Vec<StationFailure>,
}
