//! Daily statistics and the current-value snapshot.

use crate::config::SunshineMode;
use crate::error::{AppError, Result};
use crate::models::{
    Column, CurrentSnapshot, DailyStatistics, Field, ObservationTable, SnapshotEntry, StatKey,
    StatRow, Statistic, StationSummary,
};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::ops::Range;

/// Fields that get daily mean/min/max rows. Wind direction is circular and
/// only reported at the speed extremes.
pub const STAT_FIELDS: [Field; 7] = [
    Field::Temperature,
    Field::DewPoint,
    Field::Humidity,
    Field::Pressure,
    Field::WindSpeed,
    Field::RainRate,
    Field::Sunshine,
];

/// Display priority of the current-value snapshot.
pub const SNAPSHOT_ORDER: [Column; 9] = [
    Column::Raw(Field::Temperature),
    Column::Raw(Field::DewPoint),
    Column::Raw(Field::Humidity),
    Column::Raw(Field::WindSpeed),
    Column::Raw(Field::WindDirection),
    Column::Raw(Field::Pressure),
    Column::Raw(Field::RainRate),
    Column::SunshineCum,
    Column::RainCum,
];

/// Produces daily statistics and the current snapshot for a derived table.
///
/// # Errors
///
/// Returns `AppError::Logic` if the table has a rain rate or sunshine column
/// but lacks its derived cumulative column (i.e. derivation was skipped).
pub fn summarize(table: &ObservationTable, sunshine: SunshineMode) -> Result<StationSummary> {
    check_derived(table)?;
    Ok(StationSummary {
        daily: daily_statistics(table)?,
        current: current_snapshot(table, sunshine)?,
    })
}

fn check_derived(table: &ObservationTable) -> Result<()> {
    for derived in [Column::RainCum, Column::SunshineCum] {
        if table.has_column(Column::Raw(derived.source())) && !table.has_column(derived) {
            return Err(AppError::Logic(format!(
                "station '{}' has '{}' but no '{}'; derive before summarizing",
                table.station(),
                derived.source(),
                derived
            )));
        }
    }
    Ok(())
}

/// One value per UTC day for every statistic whose inputs are present.
pub fn daily_statistics(table: &ObservationTable) -> Result<DailyStatistics> {
    let ranges = table.day_ranges();
    if ranges.is_empty() {
        return Ok(DailyStatistics::default());
    }

    let mut rows = Vec::new();

    for field in STAT_FIELDS {
        let column = Column::Raw(field);
        let Some(values) = table.column(column) else {
            continue;
        };
        rows.push(stat_row(column, Statistic::Mean, per_day(&ranges, values, mean)));
        rows.push(stat_row(column, Statistic::Min, per_day(&ranges, values, min)));
        rows.push(stat_row(column, Statistic::Max, per_day(&ranges, values, max)));
    }

    let speed_column = Column::Raw(Field::WindSpeed);
    if let (Some(speed), Some(direction)) = (
        table.column(speed_column),
        table.column(Column::Raw(Field::WindDirection)),
    ) {
        let at_extreme = |wanted: Ordering| {
            ranges
                .iter()
                .map(|(_, range)| direction_at_extreme(speed, direction, range.clone(), wanted))
                .collect::<Vec<_>>()
        };
        rows.push(stat_row(
            speed_column,
            Statistic::DirectionAtMaxSpeed,
            at_extreme(Ordering::Greater),
        ));
        rows.push(stat_row(
            speed_column,
            Statistic::DirectionAtMinSpeed,
            at_extreme(Ordering::Less),
        ));
    }

    for cumulative in [Column::RainCum, Column::SunshineCum] {
        if table.has_column(cumulative) {
            let values = table.require(cumulative)?;
            rows.push(stat_row(
                cumulative,
                Statistic::DayTotal,
                per_day(&ranges, values, last_valid),
            ));
        }
    }

    Ok(DailyStatistics {
        days: ranges.into_iter().map(|(day, _)| day).collect(),
        rows,
    })
}

/// Latest row's values in [`SNAPSHOT_ORDER`]; absent columns are left out.
/// With [`SunshineMode::PerInterval`] the raw sunshine minutes take the place
/// of the cumulative hours.
pub fn current_snapshot(
    table: &ObservationTable,
    sunshine: SunshineMode,
) -> Result<CurrentSnapshot> {
    let Some(last) = table.len().checked_sub(1) else {
        return Ok(CurrentSnapshot::default());
    };

    let mut entries = Vec::new();
    for column in SNAPSHOT_ORDER {
        let column = match (column, sunshine) {
            (Column::SunshineCum, SunshineMode::PerInterval) => Column::Raw(Field::Sunshine),
            (other, _) => other,
        };
        if !table.has_column(column) {
            continue;
        }
        let values = table.require(column)?;
        entries.push(SnapshotEntry {
            column,
            label: column.label().to_string(),
            unit: column.unit().to_string(),
            value: values[last],
        });
    }

    Ok(CurrentSnapshot {
        timestamp: table.latest(),
        entries,
    })
}

fn per_day(
    ranges: &[(NaiveDate, Range<usize>)],
    values: &[Option<f64>],
    aggregate: fn(&[Option<f64>]) -> Option<f64>,
) -> Vec<Option<f64>> {
    ranges
        .iter()
        .map(|(_, range)| aggregate(&values[range.clone()]))
        .collect()
}

fn stat_row(column: Column, statistic: Statistic, values: Vec<Option<f64>>) -> StatRow {
    let key = StatKey::new(column, statistic);
    StatRow {
        key,
        label: key.label(),
        values,
    }
}

fn mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn min(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::min)
}

fn max(values: &[Option<f64>]) -> Option<f64> {
    values.iter().flatten().copied().reduce(f64::max)
}

fn last_valid(values: &[Option<f64>]) -> Option<f64> {
    values.iter().rev().flatten().next().copied()
}

/// Direction at the first sample in `range` whose speed is extreme in the
/// `wanted` sense (`Greater` for the maximum, `Less` for the minimum).
fn direction_at_extreme(
    speed: &[Option<f64>],
    direction: &[Option<f64>],
    range: Range<usize>,
    wanted: Ordering,
) -> Option<f64> {
    let mut best: Option<(usize, f64)> = None;
    for i in range {
        let Some(s) = speed[i] else {
            continue;
        };
        match best {
            Some((_, b)) if s.partial_cmp(&b) != Some(wanted) => {},
            _ => best = Some((i, s)),
        }
    }
    best.and_then(|(i, _)| direction[i])
}
