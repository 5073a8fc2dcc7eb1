//! Station registry entries.

use crate::error::Result;
use crate::projection::{project, MapPoint};
use serde::{Deserialize, Serialize};

/// A weather station known to the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Path segment identifying the station in the feed URL (e.g. "innsbruck").
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation_m: Option<f64>,
}

impl Station {
    pub fn new(id: &str, latitude: f64, longitude: f64, elevation_m: Option<f64>) -> Self {
        Self {
            id: id.to_string(),
            latitude,
            longitude,
            elevation_m,
        }
    }

    /// The station id with its first letter capitalised, for headings.
    pub fn display_name(&self) -> String {
        let mut chars = self.id.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Map position of the station in spherical-Mercator metres.
    pub fn map_point(&self) -> Result<MapPoint> {
        project(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_capitalises() {
        let station = Station::new("obergurgl", 46.867521, 11.0248, Some(1938.0));
        assert_eq!(station.display_name(), "Obergurgl");
    }

    #[test]
    fn test_station_deserialises_without_elevation() {
        let station: Station =
            serde_json::from_str(r#"{"id":"ellboegen","latitude":47.1673,"longitude":11.457867}"#)
                .unwrap();
        assert_eq!(station.elevation_m, None);
        assert_eq!(station.id, "ellboegen");
    }
}
