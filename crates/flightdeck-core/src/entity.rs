// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Live entities delivered by each poll.
//!
//! Snapshots are unordered; identity is the entity key, never array position.

use std::fmt::Debug;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geo::GeoPoint;

/// Kind of thing a marker represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Aircraft,
    Airport,
}

/// Attributes that drive marker appearance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualInputs {
    pub kind: EntityKind,
    pub heading_deg: Option<f64>,
    pub altitude_ft: Option<f64>,
    pub speed_kts: Option<f64>,
    /// Airport traffic/ATC activity; zero for aircraft.
    pub activity: usize,
}

/// An entity that can be shown as a map marker.
pub trait LiveEntity: Clone + Debug {
    /// Stable identity across polls.
    fn key(&self) -> &str;

    /// Marker position. `None` (or an out-of-range point) means the entity
    /// cannot be placed this cycle.
    fn position(&self) -> Option<GeoPoint>;

    fn visual_inputs(&self) -> VisualInputs;
}

/// Live aircraft snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flight {
    pub flight_id: String,
    pub callsign: Option<String>,
    pub username: Option<String>,
    pub aircraft_id: Option<String>,
    pub livery_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_ft: f64,
    pub speed_kts: f64,
    pub heading_deg: f64,
    pub vertical_speed_fpm: f64,
    pub last_report: Option<DateTime<Utc>>,
}

impl Flight {
    /// Minimal flight with position and motion; optional fields empty.
    #[must_use]
    pub fn new(flight_id: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            flight_id: flight_id.into(),
            callsign: None,
            username: None,
            aircraft_id: None,
            livery_id: None,
            latitude,
            longitude,
            altitude_ft: 0.0,
            speed_kts: 0.0,
            heading_deg: 0.0,
            vertical_speed_fpm: 0.0,
            last_report: None,
        }
    }

    /// Display label: callsign when known, otherwise the flight id.
    #[must_use]
    pub fn label(&self) -> &str {
        self.callsign.as_deref().unwrap_or(&self.flight_id)
    }
}

impl LiveEntity for Flight {
    fn key(&self) -> &str {
        &self.flight_id
    }

    fn position(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.latitude, self.longitude)).filter(GeoPoint::is_valid)
    }

    fn visual_inputs(&self) -> VisualInputs {
        VisualInputs {
            kind: EntityKind::Aircraft,
            heading_deg: Some(self.heading_deg),
            altitude_ft: Some(self.altitude_ft),
            speed_kts: Some(self.speed_kts),
            activity: 0,
        }
    }
}

/// An active ATC facility at an airport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtcFacility {
    /// Facility type as reported by the API (ground, tower, approach, ...).
    pub facility_type: String,
    pub username: Option<String>,
    pub frequency_id: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Airport activity snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Airport {
    pub icao: String,
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub inbound_count: u32,
    pub outbound_count: u32,
    pub facilities: Vec<AtcFacility>,
}

impl Airport {
    /// Traffic plus staffed facilities, saturating on absurd feed counts.
    fn activity(&self) -> usize {
        let traffic = u64::from(self.inbound_count).saturating_add(u64::from(self.outbound_count));
        usize::try_from(traffic)
            .unwrap_or(usize::MAX)
            .saturating_add(self.facilities.len())
    }

    #[must_use]
    pub fn new(icao: impl Into<String>) -> Self {
        Self {
            icao: icao.into(),
            name: None,
            latitude: None,
            longitude: None,
            inbound_count: 0,
            outbound_count: 0,
            facilities: Vec::new(),
        }
    }

    /// Centroid of the facilities that report a valid position.
    #[must_use]
    pub fn facility_centroid(&self) -> Option<GeoPoint> {
        let points: Vec<GeoPoint> = self
            .facilities
            .iter()
            .filter_map(|f| Some(GeoPoint::new(f.latitude?, f.longitude?)))
            .filter(GeoPoint::is_valid)
            .collect();
        if points.is_empty() {
            return None;
        }
        let count = points.len() as f64;
        let (lat, lon) = points
            .iter()
            .fold((0.0, 0.0), |(lat, lon), p| (lat + p.lat, lon + p.lon));
        Some(GeoPoint::new(lat / count, lon / count))
    }
}

impl LiveEntity for Airport {
    fn key(&self) -> &str {
        &self.icao
    }

    fn position(&self) -> Option<GeoPoint> {
        let explicit = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)).filter(GeoPoint::is_valid),
            _ => None,
        };
        explicit.or_else(|| self.facility_centroid())
    }

    fn visual_inputs(&self) -> VisualInputs {
        VisualInputs {
            kind: EntityKind::Airport,
            heading_deg: None,
            altitude_ft: None,
            speed_kts: None,
            activity: self.activity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facility(lat: Option<f64>, lon: Option<f64>) -> AtcFacility {
        AtcFacility {
            facility_type: "Tower".to_string(),
            username: None,
            frequency_id: None,
            latitude: lat,
            longitude: lon,
        }
    }

    #[test]
    fn test_flight_with_bad_coordinates_has_no_position() {
        assert!(Flight::new("a", 95.0, 0.0).position().is_none());
        assert!(Flight::new("a", f64::NAN, 0.0).position().is_none());
        assert_eq!(Flight::new("a", 1.0, 2.0).position(), Some(GeoPoint::new(1.0, 2.0)));
    }

    #[test]
    fn test_flight_label_prefers_callsign() {
        let mut flight = Flight::new("abc-123", 0.0, 0.0);
        assert_eq!(flight.label(), "abc-123");
        flight.callsign = Some("DAL42".to_string());
        assert_eq!(flight.label(), "DAL42");
    }

    #[test]
    fn test_airport_position_falls_back_to_facilities() {
        let mut airport = Airport::new("KSFO");
        assert!(airport.position().is_none());

        airport.facilities = vec![
            facility(Some(37.0), Some(-122.0)),
            facility(Some(38.0), Some(-123.0)),
            facility(None, Some(-50.0)),
            facility(Some(200.0), Some(0.0)),
        ];
        assert_eq!(airport.position(), Some(GeoPoint::new(37.5, -122.5)));

        airport.latitude = Some(37.62);
        airport.longitude = Some(-122.38);
        assert_eq!(airport.position(), Some(GeoPoint::new(37.62, -122.38)));
    }

    #[test]
    fn test_airport_activity_counts_traffic_and_atc() {
        let mut airport = Airport::new("EGLL");
        airport.inbound_count = 3;
        airport.outbound_count = 2;
        airport.facilities = vec![facility(None, None)];
        assert_eq!(airport.visual_inputs().activity, 6);
    }

    #[test]
    fn test_airport_activity_saturates_on_huge_counts() {
        let mut airport = Airport::new("KJFK");
        airport.latitude = Some(40.64);
        airport.longitude = Some(-73.78);
        airport.inbound_count = u32::MAX;
        airport.outbound_count = 1;
        airport.facilities = vec![facility(None, None)];

        let activity = airport.visual_inputs().activity;
        assert_eq!(activity as u64, u64::from(u32::MAX) + 2);
    }
}
