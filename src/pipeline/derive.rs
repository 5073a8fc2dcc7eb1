//! Derived rain and sunshine quantities.

use crate::config::PipelineConfig;
use crate::error::{AppError, Result};
use crate::models::{Column, Field, ObservationTable, RainBucket};
use crate::pipeline::MAX_FEED_SPAN_DAYS;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::ops::Range;
use tracing::debug;

/// Samples per hour at the feed's 10-minute cadence.
pub const SAMPLES_PER_HOUR: f64 = 6.0;

const MINUTES_PER_HOUR: f64 = 60.0;

/// Adds `rr_amount`, `rr_cum` and `rr_periodic_sum` when the table has a rain
/// rate column, and `ssd_cum` when it has a sunshine column. Returns a new table.
///
/// # Errors
///
/// Returns `AppError::Logic` if the bucket width is not positive or the new
/// columns do not line up with the index.
pub fn derive(table: &ObservationTable, config: &PipelineConfig) -> Result<ObservationTable> {
    let days = table.day_ranges();
    let mut added = Vec::new();
    let mut buckets = Vec::new();

    if let Some(rate) = table.column(Column::Raw(Field::RainRate)) {
        let amount = rain_amount(rate);
        buckets = periodic_buckets(table.timestamps(), &amount, config.rain_bucket)?;
        let periodic = forward_fill(table.timestamps(), &buckets);
        let cumulative = daily_cumulative(&days, &amount, 1.0);
        added.push((Column::RainAmount, amount));
        added.push((Column::RainCum, cumulative));
        added.push((Column::RainPeriodicSum, periodic));
    }

    if let Some(minutes) = table.column(Column::Raw(Field::Sunshine)) {
        added.push((
            Column::SunshineCum,
            daily_cumulative(&days, minutes, MINUTES_PER_HOUR),
        ));
    }

    debug!(
        "Derived {} column(s) and {} rain bucket(s) for station {}",
        added.len(),
        buckets.len(),
        table.station()
    );
    table.with_columns(added, buckets)
}

/// Rain per 10-minute sample from an hourly rate.
pub fn rain_amount(rate: &[Option<f64>]) -> Vec<Option<f64>> {
    rate.iter()
        .map(|cell| cell.map(|r| r / SAMPLES_PER_HOUR))
        .collect()
}

/// Running sum per UTC day, divided by `divisor`. A missing input cell yields a
/// missing output cell; the running sum carries over it.
pub fn daily_cumulative(
    days: &[(NaiveDate, Range<usize>)],
    values: &[Option<f64>],
    divisor: f64,
) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for (_, range) in days {
        let mut running = 0.0;
        for i in range.clone() {
            if let Some(v) = values[i] {
                running += v;
                out[i] = Some(running / divisor);
            }
        }
    }
    out
}

/// Right-closed, right-labelled bucket sums over epoch-aligned windows of
/// `width`. Buckets run contiguously from the first sample's label to the
/// last sample's label; a bucket without a valid sample has a `None` total.
///
/// # Errors
///
/// Returns `AppError::Logic` for a non-positive width or a time span longer
/// than ingestion admits.
pub fn periodic_buckets(
    timestamps: &[DateTime<Utc>],
    amounts: &[Option<f64>],
    width: Duration,
) -> Result<Vec<RainBucket>> {
    let width_ms = width.num_milliseconds();
    if width_ms <= 0 {
        return Err(AppError::Logic(format!(
            "rain bucket width must be positive, got {} ms",
            width_ms
        )));
    }
    let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) else {
        return Ok(Vec::new());
    };

    let first_label = bucket_label(first.timestamp_millis(), width_ms);
    let last_label = bucket_label(last.timestamp_millis(), width_ms);
    let count = (last_label - first_label) / width_ms + 1;
    let max_count = Duration::days(MAX_FEED_SPAN_DAYS).num_milliseconds() / width_ms + 2;
    if count > max_count {
        return Err(AppError::Logic(format!(
            "{} rain buckets exceed the {} allowed for a {} day feed",
            count, max_count, MAX_FEED_SPAN_DAYS
        )));
    }
    let count = count as usize;

    let mut totals: Vec<Option<f64>> = vec![None; count];
    for (ts, amount) in timestamps.iter().zip(amounts) {
        if let Some(a) = amount {
            let index = ((bucket_label(ts.timestamp_millis(), width_ms) - first_label) / width_ms)
                as usize;
            *totals[index].get_or_insert(0.0) += a;
        }
    }

    totals
        .into_iter()
        .enumerate()
        .map(|(i, total)| {
            let label_ms = first_label + i as i64 * width_ms;
            let label = Utc.timestamp_millis_opt(label_ms).single().ok_or_else(|| {
                AppError::Logic(format!("bucket label {} ms out of range", label_ms))
            })?;
            Ok(RainBucket { label, total })
        })
        .collect()
}

/// End of the right-closed window holding `t_ms`: `ceil(t / width) * width`.
fn bucket_label(t_ms: i64, width_ms: i64) -> i64 {
    let rem = t_ms.rem_euclid(width_ms);
    if rem == 0 {
        t_ms
    } else {
        t_ms - rem + width_ms
    }
}

/// Each row takes the latest non-missing bucket total whose label is at or
/// before the row's timestamp; rows before any such bucket stay missing.
pub fn forward_fill(timestamps: &[DateTime<Utc>], buckets: &[RainBucket]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(timestamps.len());
    let mut next = 0;
    let mut current = None;
    for ts in timestamps {
        while next < buckets.len() && buckets[next].label <= *ts {
            if let Some(total) = buckets[next].total {
                current = Some(total);
            }
            next += 1;
        }
        out.push(current);
    }
    out
}
