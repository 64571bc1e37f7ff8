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

//! Geographic primitives shared by the route and marker layers.

use serde::{Deserialize, Serialize};

/// Mean earth radius in nautical miles.
const EARTH_RADIUS_NM: f64 = 3440.065;

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// True when both coordinates are finite and inside the WGS84 range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_valid_coordinate(self.lat, self.lon)
    }
}

/// Check a raw coordinate pair against the latitude/longitude range.
#[must_use]
pub fn is_valid_coordinate(lat: f64, lon: f64) -> bool {
    lat.is_finite()
        && lon.is_finite()
        && (-90.0..=90.0).contains(&lat)
        && (-180.0..=180.0).contains(&lon)
}

/// Planar distance in degree space, `sqrt(dlat^2 + dlon^2)`.
///
/// Not a physical distance. Used where only relative closeness matters
/// (nearest-point search, the route merge threshold).
#[must_use]
pub fn degree_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    ((a.lat - b.lat).powi(2) + (a.lon - b.lon).powi(2)).sqrt()
}

/// Great-circle distance in nautical miles.
#[must_use]
pub fn haversine_distance_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let half_dphi = (lat2 - lat1).to_radians() / 2.0;
    let half_dlambda = (lon2 - lon1).to_radians() / 2.0;

    let h = half_dphi.sin().powi(2) + phi1.cos() * phi2.cos() * half_dlambda.sin().powi(2);
    2.0 * EARTH_RADIUS_NM * h.sqrt().min(1.0).asin()
}

/// Total great-circle length of a polyline in nautical miles.
#[must_use]
pub fn path_length_nm(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_distance_nm(pair[0].lat, pair[0].lon, pair[1].lat, pair[1].lon))
        .sum()
}
