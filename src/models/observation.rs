//! Defines the station feed's fields, the table columns built from them, and
//! the time-indexed `ObservationTable`.
//!
//! A table is built once per station and never edited afterwards. Pipeline
//! steps that add columns return a new table (see [`ObservationTable::with_columns`]).

use crate::error::{AppError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Value the feed uses for "no reading" on most fields.
pub const MISSING_SENTINEL: f64 = -99.9;

/// Key of the millisecond-epoch timestamp in each feed record.
pub const TIMESTAMP_KEY: &str = "datumsec";

/// A scalar field carried by the station feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Temperature,
    DewPoint,
    Humidity,
    Pressure,
    WindDirection,
    WindSpeed,
    RainRate,
    Sunshine,
}

impl Field {
    pub const COUNT: usize = 8;

    pub const ALL: [Field; Field::COUNT] = [
        Field::Temperature,
        Field::DewPoint,
        Field::Humidity,
        Field::Pressure,
        Field::WindDirection,
        Field::WindSpeed,
        Field::RainRate,
        Field::Sunshine,
    ];

    /// The key used for this field in feed records.
    pub fn key(self) -> &'static str {
        match self {
            Field::Temperature => "tl",
            Field::DewPoint => "tp",
            Field::Humidity => "rf",
            Field::Pressure => "p",
            Field::WindDirection => "dd",
            Field::WindSpeed => "ff",
            Field::RainRate => "rr",
            Field::Sunshine => "so",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }

    pub fn label(self) -> &'static str {
        match self {
            Field::Temperature => "Temperature",
            Field::DewPoint => "Dew point",
            Field::Humidity => "Relative humidity",
            Field::Pressure => "Pressure",
            Field::WindDirection => "Wind direction",
            Field::WindSpeed => "Wind speed",
            Field::RainRate => "Rain rate",
            Field::Sunshine => "Sunshine duration",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Field::Temperature | Field::DewPoint => "°C",
            Field::Humidity => "%",
            Field::Pressure => "hPa",
            Field::WindDirection => "°",
            Field::WindSpeed => "m/s",
            Field::RainRate => "mm/h",
            Field::Sunshine => "min",
        }
    }

    /// Rain rate and sunshine duration treat *any* negative value as missing.
    /// The feed has shipped several different sentinels for them (-99.9, -599.4).
    pub fn uses_negative_sentinel(self) -> bool {
        matches!(self, Field::RainRate | Field::Sunshine)
    }

    /// Whether a raw feed value means "no reading" for this field.
    pub fn is_missing(self, value: f64) -> bool {
        if self.uses_negative_sentinel() {
            value < 0.0
        } else {
            value == MISSING_SENTINEL
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// A column of an [`ObservationTable`]: either a scrubbed feed field or a
/// quantity derived from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    Raw(Field),
    /// Rain per 10-minute sample (`rr / 6`), mm.
    RainAmount,
    /// Running rain sum, reset at each UTC day, mm.
    RainCum,
    /// Bucketed rain sum, forward-filled onto the table index, mm.
    RainPeriodicSum,
    /// Running sunshine sum, reset at each UTC day, hours.
    SunshineCum,
}

impl Column {
    pub fn key(self) -> &'static str {
        match self {
            Column::Raw(field) => field.key(),
            Column::RainAmount => "rr_amount",
            Column::RainCum => "rr_cum",
            Column::RainPeriodicSum => "rr_periodic_sum",
            Column::SunshineCum => "ssd_cum",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Column::Raw(field) => field.label(),
            Column::RainAmount => "Rain amount",
            Column::RainCum => "Cumulated rainsum",
            Column::RainPeriodicSum => "Periodic rainsum",
            Column::SunshineCum => "Cumulated sunshine",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Column::Raw(field) => field.unit(),
            Column::RainAmount | Column::RainCum | Column::RainPeriodicSum => "mm",
            Column::SunshineCum => "h",
        }
    }

    /// The feed field this column is computed from.
    pub fn source(self) -> Field {
        match self {
            Column::Raw(field) => field,
            Column::RainAmount | Column::RainCum | Column::RainPeriodicSum => Field::RainRate,
            Column::SunshineCum => Field::Sunshine,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for Column {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// Recorded when the loose "negative means missing" rule scrubbed values that
/// are not the usual `-99.9` sentinel. Informational only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataQualityWarning {
    pub column: Field,
    /// Number of scrubbed cells that were negative but not `-99.9`.
    pub count: usize,
    /// The first such value encountered.
    pub example: f64,
}

/// One right-closed, right-labelled rain bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RainBucket {
    /// End of the bucket; samples in `(label - width, label]` belong to it.
    pub label: DateTime<Utc>,
    /// Sum of rain amount, `None` when the bucket holds no valid sample.
    pub total: Option<f64>,
}

/// Time-indexed observations for one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationTable {
    station: String,
    timestamps: Vec<DateTime<Utc>>,
    columns: BTreeMap<Column, Vec<Option<f64>>>,
    rain_buckets: Vec<RainBucket>,
    warnings: Vec<DataQualityWarning>,
}

impl ObservationTable {
    /// A table with no rows and no columns.
    pub fn empty(station: &str) -> Self {
        Self {
            station: station.to_string(),
            timestamps: Vec::new(),
            columns: BTreeMap::new(),
            rain_buckets: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Assembles a table from already scrubbed columns.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Logic` if the timestamps are not ascending or a column
    /// length differs from the index length.
    pub fn from_parts(
        station: &str,
        timestamps: Vec<DateTime<Utc>>,
        columns: BTreeMap<Column, Vec<Option<f64>>>,
        warnings: Vec<DataQualityWarning>,
    ) -> Result<Self> {
        if timestamps.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(AppError::Logic(format!(
                "time index of station '{}' is not ascending",
                station
            )));
        }
        let table = Self {
            station: station.to_string(),
            timestamps,
            columns,
            rain_buckets: Vec::new(),
            warnings,
        };
        table.check_lengths()?;
        Ok(table)
    }

    fn check_lengths(&self) -> Result<()> {
        for (column, values) in &self.columns {
            if values.len() != self.timestamps.len() {
                return Err(AppError::Logic(format!(
                    "column '{}' of station '{}' has {} cells for {} timestamps",
                    column,
                    self.station,
                    values.len(),
                    self.timestamps.len()
                )));
            }
        }
        Ok(())
    }

    /// Returns a new table holding this table's data plus `added` columns
    /// (replacing same-named ones) and the given rain buckets. `self` is untouched.
    pub fn with_columns(
        &self,
        added: Vec<(Column, Vec<Option<f64>>)>,
        rain_buckets: Vec<RainBucket>,
    ) -> Result<Self> {
        let mut columns = self.columns.clone();
        columns.extend(added);
        let table = Self {
            station: self.station.clone(),
            timestamps: self.timestamps.clone(),
            columns,
            rain_buckets,
            warnings: self.warnings.clone(),
        };
        table.check_lengths()?;
        Ok(table)
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn latest(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    pub fn has_column(&self, column: Column) -> bool {
        self.columns.contains_key(&column)
    }

    pub fn column(&self, column: Column) -> Option<&[Option<f64>]> {
        self.columns.get(&column).map(Vec::as_slice)
    }

    /// Like [`column`](Self::column) for columns the caller knows must exist.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Logic` when the column is absent.
    pub fn require(&self, column: Column) -> Result<&[Option<f64>]> {
        self.column(column).ok_or_else(|| {
            AppError::Logic(format!(
                "column '{}' expected on station '{}' but not present",
                column, self.station
            ))
        })
    }

    /// Columns in canonical order (feed fields first, derived quantities after).
    pub fn columns(&self) -> impl Iterator<Item = (Column, &[Option<f64>])> {
        self.columns
            .iter()
            .map(|(column, values)| (*column, values.as_slice()))
    }

    pub fn rain_buckets(&self) -> &[RainBucket] {
        &self.rain_buckets
    }

    pub fn warnings(&self) -> &[DataQualityWarning] {
        &self.warnings
    }

    /// Contiguous row ranges per UTC calendar day, in index order.
    pub fn day_ranges(&self) -> Vec<(NaiveDate, Range<usize>)> {
        let mut ranges: Vec<(NaiveDate, Range<usize>)> = Vec::new();
        for (i, ts) in self.timestamps.iter().enumerate() {
            let day = ts.date_naive();
            match ranges.last_mut() {
                Some((current, range)) if *current == day => range.end = i + 1,
                _ => ranges.push((day, i..i + 1)),
            }
        }
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_field_keys_round_trip() {
        for field in Field::ALL {
            assert_eq!(Field::from_key(field.key()), Some(field));
        }
        assert_eq!(Field::from_key("datumsec"), None);
    }

    #[test]
    fn test_sentinel_rules_differ_per_field() {
        assert!(Field::Temperature.is_missing(-99.9));
        assert!(!Field::Temperature.is_missing(-12.5));
        assert!(Field::RainRate.is_missing(-599.4));
        assert!(Field::Sunshine.is_missing(-0.1));
        assert!(!Field::Sunshine.is_missing(0.0));
    }

    #[test]
    fn test_day_ranges_split_at_utc_midnight() {
        let table = ObservationTable::from_parts(
            "innsbruck",
            vec![ts(1, 23, 40), ts(1, 23, 50), ts(2, 0, 0), ts(3, 12, 0)],
            BTreeMap::new(),
            Vec::new(),
        )
        .unwrap();

        let ranges = table.day_ranges();
        assert_eq!(ranges.len(), 3);
        assert_eq!(ranges[0].1, 0..2);
        assert_eq!(ranges[1].1, 2..3);
        assert_eq!(ranges[2].0, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    }

    #[test]
    fn test_from_parts_rejects_ragged_columns() {
        let mut columns = BTreeMap::new();
        columns.insert(Column::Raw(Field::Temperature), vec![Some(1.0)]);
        let result = ObservationTable::from_parts(
            "innsbruck",
            vec![ts(1, 0, 0), ts(1, 0, 10)],
            columns,
            Vec::new(),
        );
        assert!(matches!(result, Err(AppError::Logic(_))));
    }

    #[test]
    fn test_with_columns_leaves_source_untouched() {
        let mut columns = BTreeMap::new();
        columns.insert(Column::Raw(Field::RainRate), vec![Some(6.0)]);
        let raw =
            ObservationTable::from_parts("innsbruck", vec![ts(1, 0, 0)], columns, Vec::new())
                .unwrap();

        let augmented = raw
            .with_columns(vec![(Column::RainAmount, vec![Some(1.0)])], Vec::new())
            .unwrap();

        assert!(!raw.has_column(Column::RainAmount));
        assert_eq!(augmented.column(Column::RainAmount), Some(&[Some(1.0)][..]));
        assert!(matches!(
            raw.require(Column::RainCum),
            Err(AppError::Logic(_))
        ));
    }
}
