//! Provides a synthetic station feed generating plausible 10-minute records.
//!
//! Used by the `demo` command to exercise the pipeline offline and by tests
//! that need realistic, reproducible feed bodies. The output has exactly the
//! shape of the real feed, including occasional `-99.9` sentinels and the odd
//! negative rain/sunshine value, so it goes through the same ingestion path.

use crate::models::{Field, MISSING_SENTINEL, TIMESTAMP_KEY};
use chrono::{DateTime, Duration, Timelike, Utc};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{Map, Value};
use std::f64::consts::PI;
use tracing::{debug, warn};

/// Probability that a single cell is replaced by the `-99.9` sentinel.
const SENTINEL_PROBABILITY: f64 = 0.01;
/// The anomalous rain sentinel seen on some feed versions.
const ODD_RAIN_SENTINEL: f64 = -599.4;
/// Longest synthetic feed generated, one 31-day month.
pub const MAX_SYNTHETIC_HOURS: u32 = 31 * 24;

/// Seeded generator of raw feed bodies.
pub struct SyntheticFeed {
    rng: StdRng,
}

impl SyntheticFeed {
    /// Creates a generator; identical seeds produce identical feeds.
    pub fn new(seed: u64) -> Self {
        debug!("Creating SyntheticFeed with seed {}", seed);
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generates `hours * 6` records at 10-minute spacing ending at `end`
    /// (rounded down to the 10-minute grid), as a JSON array. `hours` is capped
    /// at [`MAX_SYNTHETIC_HOURS`].
    pub fn records(&mut self, end: DateTime<Utc>, hours: u32) -> Value {
        if hours > MAX_SYNTHETIC_HOURS {
            warn!(
                "Capping synthetic feed at {} h (requested {} h)",
                MAX_SYNTHETIC_HOURS, hours
            );
        }
        let hours = hours.min(MAX_SYNTHETIC_HOURS);
        let end = align_to_cadence(end);
        let count = hours as i64 * 6;
        let noise = Uniform::new(-0.3, 0.3);
        let mut pressure = self.rng.gen_range(940.0..960.0);
        let mut direction: f64 = self.rng.gen_range(0.0..360.0);
        let mut raining = false;

        let records = (0..count)
            .map(|i| {
                let ts = end - Duration::minutes(10 * (count - 1 - i));
                let hour = ts.hour() as f64 + ts.minute() as f64 / 60.0;
                // Diurnal cycle peaking mid-afternoon.
                let diurnal = (2.0 * PI * (hour - 9.0) / 24.0).sin();

                let temperature = 10.0 + 8.0 * diurnal + noise.sample(&mut self.rng);
                let dew_point = temperature - 6.0 - 3.0 * diurnal.max(0.0);
                let humidity = (100.0 - 5.0 * (temperature - dew_point)).clamp(5.0, 100.0);

                pressure += self.rng.gen_range(-0.2..0.2);
                direction = (direction + self.rng.gen_range(-25.0..25.0)).rem_euclid(360.0);
                let gust = self.rng.gen_range(-1.0..1.5);
                let wind_speed: f64 = (2.5 + 2.0 * diurnal + gust).max(0.0);

                if self.rng.gen_bool(0.05) {
                    raining = !raining;
                }
                let rain_rate = if raining {
                    self.rng.gen_range(0.1..4.0)
                } else {
                    0.0
                };
                let sunshine = if (6.0..19.0).contains(&hour) && !raining {
                    self.rng.gen_range(0.0..=10.0_f64).round()
                } else {
                    0.0
                };

                let mut record = Map::new();
                record.insert(TIMESTAMP_KEY.to_string(), Value::from(ts.timestamp_millis()));
                for (field, value) in [
                    (Field::Temperature, round1(temperature)),
                    (Field::DewPoint, round1(dew_point)),
                    (Field::Humidity, humidity.round()),
                    (Field::Pressure, round1(pressure)),
                    (Field::WindDirection, direction.round()),
                    (Field::WindSpeed, round1(wind_speed)),
                    (Field::RainRate, round1(rain_rate)),
                    (Field::Sunshine, sunshine),
                ] {
                    record.insert(field.key().to_string(), Value::from(self.corrupt(field, value)));
                }
                Value::Object(record)
            })
            .collect();

        Value::Array(records)
    }

    /// Occasionally swaps a value for the sentinel the feed would send.
    fn corrupt(&mut self, field: Field, value: f64) -> f64 {
        if !self.rng.gen_bool(SENTINEL_PROBABILITY) {
            return value;
        }
        if field == Field::RainRate && self.rng.gen_bool(0.5) {
            ODD_RAIN_SENTINEL
        } else {
            MISSING_SENTINEL
        }
    }
}

fn align_to_cadence(ts: DateTime<Utc>) -> DateTime<Utc> {
    let millis = ts.timestamp_millis();
    let step = Duration::minutes(10).num_milliseconds();
    ts - Duration::milliseconds(millis.rem_euclid(step))
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_same_seed_same_feed() {
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let first = SyntheticFeed::new(42).records(end, 6);
        let second = SyntheticFeed::new(42).records(end, 6);
        assert_eq!(first, second);
    }

    #[test]
    fn test_records_end_on_cadence_grid() {
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 7, 31).unwrap();
        let body = SyntheticFeed::new(1).records(end, 2);
        let records = body.as_array().unwrap();
        assert_eq!(records.len(), 12);

        let last = records.last().unwrap()[TIMESTAMP_KEY].as_i64().unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(last, expected.timestamp_millis());
        for field in Field::ALL {
            assert!(records[0].get(field.key()).is_some());
        }
    }

    #[test]
    fn test_zero_hours_gives_empty_feed() {
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let body = SyntheticFeed::new(3).records(end, 0);
        assert_eq!(body, Value::Array(Vec::new()));
    }

    #[test]
    fn test_hours_are_capped() {
        let end = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let body = SyntheticFeed::new(9).records(end, u32::MAX);
        let records = body.as_array().unwrap();
        assert_eq!(records.len(), MAX_SYNTHETIC_HOURS as usize * 6);
    }
}
