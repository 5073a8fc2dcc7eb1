//! Turns a station feed body into a scrubbed `ObservationTable`.

use crate::error::{AppError, Result};
use crate::models::{
    Column, DataQualityWarning, Field, ObservationTable, MISSING_SENTINEL, TIMESTAMP_KEY,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rayon::prelude::*;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Longest time span a single feed body may cover.
pub const MAX_FEED_SPAN_DAYS: i64 = 400;

/// A column after sentinel scrubbing.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrubbedColumn {
    pub values: Vec<Option<f64>>,
    /// Number of cells turned into missing values.
    pub scrubbed: usize,
    pub warning: Option<DataQualityWarning>,
}

/// Replaces the field's "no reading" values with `None`. Only cells matching the
/// sentinel rule change; everything else passes through unaltered.
pub fn scrub(field: Field, raw: &[Option<f64>]) -> ScrubbedColumn {
    let mut scrubbed = 0;
    let mut odd_count = 0;
    let mut odd_example = None;

    let values = raw
        .iter()
        .map(|cell| match *cell {
            Some(v) if field.is_missing(v) => {
                scrubbed += 1;
                if v != MISSING_SENTINEL {
                    odd_count += 1;
                    odd_example.get_or_insert(v);
                }
                None
            },
            other => other,
        })
        .collect();

    let warning = odd_example.map(|example| DataQualityWarning {
        column: field,
        count: odd_count,
        example,
    });

    ScrubbedColumn {
        values,
        scrubbed,
        warning,
    }
}

struct RawRow {
    timestamp: DateTime<Utc>,
    values: [Option<f64>; Field::COUNT],
}

/// Builds the observation table for `station` from a feed body.
///
/// The body must be a JSON array of objects, each carrying an integer
/// millisecond `datumsec`. A field column exists iff at least one record holds
/// its key; `null` cells are missing. Rows are ordered by timestamp (stable for
/// equal timestamps) and the millisecond value itself is not kept.
///
/// # Errors
///
/// Returns `AppError::Schema` if the body is not a record array, a record lacks
/// a usable timestamp, a known field holds a non-numeric value, or the records
/// span more than [`MAX_FEED_SPAN_DAYS`].
pub fn table_from_json(station: &str, body: &Value) -> Result<ObservationTable> {
    let records = body.as_array().ok_or_else(|| {
        AppError::Schema(format!(
            "feed for station '{}' is not a record array",
            station
        ))
    })?;

    if records.is_empty() {
        debug!("Feed for station {} holds no records", station);
        return Ok(ObservationTable::empty(station));
    }

    let mut present = [false; Field::COUNT];
    let mut rows = Vec::with_capacity(records.len());

    for (index, record) in records.iter().enumerate() {
        let object = record.as_object().ok_or_else(|| {
            AppError::Schema(format!(
                "record {} of station '{}' is not an object",
                index, station
            ))
        })?;
        rows.push(parse_record(station, index, object, &mut present)?);
    }

    rows.sort_by_key(|row| row.timestamp);
    check_span(station, &rows)?;

    let fields: Vec<(usize, Field)> = Field::ALL
        .into_iter()
        .enumerate()
        .filter(|(slot, _)| present[*slot])
        .collect();

    let scrubbed: Vec<(Field, ScrubbedColumn)> = fields
        .par_iter()
        .map(|&(slot, field)| {
            let raw: Vec<Option<f64>> = rows.iter().map(|row| row.values[slot]).collect();
            (field, scrub(field, &raw))
        })
        .collect();

    let mut columns = BTreeMap::new();
    let mut warnings = Vec::new();
    for (field, column) in scrubbed {
        if column.scrubbed > 0 {
            debug!(
                "Station {}: scrubbed {} missing values from '{}'",
                station, column.scrubbed, field
            );
        }
        if let Some(warning) = column.warning {
            warn!(
                "Station {}: {} negative value(s) in '{}' treated as missing (e.g. {})",
                station, warning.count, field, warning.example
            );
            warnings.push(warning);
        }
        columns.insert(Column::Raw(field), column.values);
    }

    let timestamps = rows.into_iter().map(|row| row.timestamp).collect();
    ObservationTable::from_parts(station, timestamps, columns, warnings)
}

fn parse_record(
    station: &str,
    index: usize,
    object: &Map<String, Value>,
    present: &mut [bool; Field::COUNT],
) -> Result<RawRow> {
    let millis = object
        .get(TIMESTAMP_KEY)
        .and_then(as_millis)
        .ok_or_else(|| {
            AppError::Schema(format!(
                "record {} of station '{}' lacks an integer '{}'",
                index, station, TIMESTAMP_KEY
            ))
        })?;
    let timestamp = Utc.timestamp_millis_opt(millis).single().ok_or_else(|| {
        AppError::Schema(format!(
            "record {} of station '{}' has out-of-range timestamp {}",
            index, station, millis
        ))
    })?;

    let mut values = [None; Field::COUNT];
    for (key, value) in object {
        let Some(field) = Field::from_key(key) else {
            continue;
        };
        let slot = field as usize;
        present[slot] = true;
        values[slot] = match value {
            Value::Null => None,
            Value::Number(n) => n.as_f64(),
            other => {
                return Err(AppError::Schema(format!(
                    "record {} of station '{}': field '{}' is not numeric ({})",
                    index, station, field, other
                )))
            },
        };
    }

    Ok(RawRow { timestamp, values })
}

fn check_span(station: &str, rows: &[RawRow]) -> Result<()> {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Ok(());
    };
    let span = last.timestamp - first.timestamp;
    if span > Duration::days(MAX_FEED_SPAN_DAYS) {
        return Err(AppError::Schema(format!(
            "feed for station '{}' spans {} days ({} to {}), more than {}",
            station,
            span.num_days(),
            first.timestamp,
            last.timestamp,
            MAX_FEED_SPAN_DAYS
        )));
    }
    Ok(())
}

fn as_millis(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
            .map(|v| v as i64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const T0: i64 = 1_714_521_600_000; // 2024-05-01T00:00:00Z
    const TEN_MIN: i64 = 600_000;

    #[rstest]
    #[case(Field::Temperature, -99.9, true)]
    #[case(Field::Temperature, -20.0, false)]
    #[case(Field::Pressure, -99.9, true)]
    #[case(Field::WindDirection, 0.0, false)]
    #[case(Field::RainRate, -99.9, true)]
    #[case(Field::RainRate, -599.4, true)]
    #[case(Field::RainRate, 0.0, false)]
    #[case(Field::Sunshine, -1.0, true)]
    #[case(Field::Sunshine, 10.0, false)]
    fn test_scrub_sentinel_rules(#[case] field: Field, #[case] raw: f64, #[case] missing: bool) {
        let column = scrub(field, &[Some(raw)]);
        assert_eq!(column.values[0].is_none(), missing);
        if !missing {
            assert_eq!(column.values[0], Some(raw));
        }
    }

    #[test]
    fn test_scrub_warns_only_for_odd_negatives() {
        let plain = scrub(Field::RainRate, &[Some(-99.9), Some(0.6)]);
        assert_eq!(plain.scrubbed, 1);
        assert!(plain.warning.is_none());

        let odd = scrub(Field::RainRate, &[Some(-599.4), Some(-99.9), Some(-3.0)]);
        assert_eq!(odd.scrubbed, 3);
        let warning = odd.warning.unwrap();
        assert_eq!(warning.count, 2);
        assert_eq!(warning.example, -599.4);
    }

    #[test]
    fn test_sentinel_scrub_leaves_other_fields_alone() {
        let body = json!([
            {"datumsec": T0, "tl": -99.9, "tp": 4.2, "p": 951.3, "rr": 0.6},
            {"datumsec": T0 + TEN_MIN, "tl": 8.1, "tp": -99.9, "p": 951.1, "rr": -599.4},
        ]);
        let table = table_from_json("innsbruck", &body).unwrap();

        let tl = table.column(Column::Raw(Field::Temperature)).unwrap();
        let tp = table.column(Column::Raw(Field::DewPoint)).unwrap();
        let p = table.column(Column::Raw(Field::Pressure)).unwrap();
        let rr = table.column(Column::Raw(Field::RainRate)).unwrap();
        assert_eq!(tl, &[None, Some(8.1)]);
        assert_eq!(tp, &[Some(4.2), None]);
        assert_eq!(p, &[Some(951.3), Some(951.1)]);
        assert_eq!(rr, &[Some(0.6), None]);
        assert_eq!(table.warnings().len(), 1);
        assert_eq!(table.warnings()[0].column, Field::RainRate);
    }

    #[test]
    fn test_rows_are_sorted_by_timestamp() {
        let body = json!([
            {"datumsec": T0 + 2 * TEN_MIN, "tl": 3.0},
            {"datumsec": T0, "tl": 1.0},
            {"datumsec": T0 + TEN_MIN, "tl": 2.0},
        ]);
        let table = table_from_json("innsbruck", &body).unwrap();
        assert_eq!(
            table.column(Column::Raw(Field::Temperature)).unwrap(),
            &[Some(1.0), Some(2.0), Some(3.0)]
        );
        assert_eq!(table.timestamps()[0].timestamp_millis(), T0);
    }

    #[test]
    fn test_column_presence_follows_feed_keys() {
        let body = json!([
            {"datumsec": T0, "tl": 1.0, "ff": null},
            {"datumsec": T0 + TEN_MIN, "tl": 2.0, "unknown": "x"},
        ]);
        let table = table_from_json("obergurgl", &body).unwrap();
        let columns: Vec<Column> = table.columns().map(|(c, _)| c).collect();
        assert_eq!(
            columns,
            vec![
                Column::Raw(Field::Temperature),
                Column::Raw(Field::WindSpeed)
            ]
        );
        assert_eq!(
            table.column(Column::Raw(Field::WindSpeed)).unwrap(),
            &[None, None]
        );
    }

    #[test]
    fn test_empty_feed_is_empty_table() {
        let table = table_from_json("sattelberg", &json!([])).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().count(), 0);
    }

    #[rstest]
    #[case(json!({"datumsec": [1, 2]}))]
    #[case(json!([1, 2, 3]))]
    #[case(json!([{"tl": 3.0}]))]
    #[case(json!([{"datumsec": "yesterday"}]))]
    #[case(json!([{"datumsec": 1_714_521_600_000_i64, "tl": "warm"}]))]
    #[case(json!([{"datumsec": 0, "rr": 1.0}, {"datumsec": 8e15, "rr": 1.0}]))]
    fn test_schema_errors(#[case] body: Value) {
        let result = table_from_json("innsbruck", &body);
        assert!(matches!(result, Err(AppError::Schema(_))));
    }

    #[test]
    fn test_float_timestamp_is_accepted_when_integral() {
        let body = json!([{"datumsec": 1_714_521_600_000.0, "tl": 1.0}]);
        let table = table_from_json("innsbruck", &body).unwrap();
        assert_eq!(table.timestamps()[0].timestamp_millis(), T0);
    }

    #[test]
    fn test_feed_span_limit() {
        let limit = Duration::days(MAX_FEED_SPAN_DAYS).num_milliseconds();
        let within = json!([{"datumsec": T0, "rr": 1.0}, {"datumsec": T0 + limit, "rr": 1.0}]);
        assert_eq!(table_from_json("innsbruck", &within).unwrap().len(), 2);

        let beyond = json!([
            {"datumsec": T0 + limit + TEN_MIN, "rr": 1.0},
            {"datumsec": T0, "rr": 1.0},
        ]);
        let err = table_from_json("innsbruck", &beyond).unwrap_err();
        assert!(matches!(err, AppError::Schema(_)));
        assert!(err.is_station_failure());
    }
}
