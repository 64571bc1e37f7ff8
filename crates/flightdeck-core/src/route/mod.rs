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

//! Route reconciliation for the selected flight.
//!
//! Turns raw flown-history and flight-plan points plus the live aircraft
//! position into display geometry:
//!
//! 1. clean each input (validate, order by timestamp, downsample)
//! 2. merge the plan onto the end of the flown history
//! 3. locate the live position on the flown part and split there
//! 4. pick waypoint markers and altitude-coloured micro-segments
//!
//! Any failure clears the displayed route instead of showing partial geometry.

mod clean;
mod merge;
mod waypoints;

pub use clean::{clean_points, downsample, order_points, validate_points};
pub use merge::{merge_routes, nearest_index, split_at};
pub use waypoints::{colored_segments, select_waypoints, ColoredSegment, RouteSegment, Waypoint, WaypointRole};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::RouteError;
use crate::geo::{is_valid_coordinate, path_length_nm, GeoPoint};
use crate::palette::AltitudePalette;
use crate::surface::RenderSurface;

/// One observed or planned position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Altitude in feet.
    pub altitude: f64,
    /// Milliseconds since the Unix epoch. Flight-plan waypoints usually have none.
    pub timestamp_ms: Option<i64>,
}

impl TrackPoint {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
            timestamp_ms: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    #[must_use]
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_valid_coordinate(self.latitude, self.longitude)
    }
}

/// Tunables for route reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Point budget per input array before downsampling kicks in.
    pub max_points: usize,
    /// Plan points closer than this (degrees) to the last flown point are duplicates.
    pub merge_threshold_deg: f64,
    /// Cap on waypoint markers, endpoints included.
    pub max_waypoints: usize,
    /// Micro-segments per leg for altitude colouring (0 disables).
    pub color_subdivisions: usize,
    pub palette: AltitudePalette,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            max_points: 300,
            merge_threshold_deg: 1e-4, // ~11 m
            max_waypoints: 10,
            color_subdivisions: 4,
            palette: AltitudePalette::default(),
        }
    }
}

/// Raw inputs for one reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteInput {
    pub flown: Vec<TrackPoint>,
    pub planned: Vec<TrackPoint>,
    pub live_position: Option<GeoPoint>,
}

/// Display geometry for a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteGeometry {
    pub traveled: Vec<GeoPoint>,
    pub remaining: Vec<GeoPoint>,
    pub waypoints: Vec<Waypoint>,
    pub segments: Vec<ColoredSegment>,
    /// Index of the live position in the merged route.
    pub current_index: Option<usize>,
    pub traveled_nm: f64,
    pub remaining_nm: f64,
}

impl RouteGeometry {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.traveled.is_empty() && self.remaining.is_empty() && self.waypoints.is_empty()
    }
}

/// User-visible, non-blocking message raised when a route cannot be shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteNotice {
    pub message: String,
}

/// Result of pushing a route to a surface.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    Displayed(RouteGeometry),
    Cleared(RouteNotice),
}

/// Stateless route reconciliation engine.
#[derive(Debug, Clone, Default)]
pub struct RouteReconciler {
    config: RouteConfig,
}

impl RouteReconciler {
    #[must_use]
    pub fn new(config: RouteConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    /// Compute display geometry from raw inputs.
    pub fn reconcile(&self, input: &RouteInput) -> Result<RouteGeometry, RouteError> {
        if self.config.color_subdivisions > 0 {
            self.config.palette.validate()?;
        }

        let flown = clean_points(&input.flown, self.config.max_points);
        let planned = clean_points(&input.planned, self.config.max_points);
        let merged = merge_routes(&flown, &planned, self.config.merge_threshold_deg);

        // The live position is located on the flown history; a flight with no
        // history is located on its plan.
        let localizable = if flown.is_empty() { merged.len() } else { flown.len() };
        let live = input.live_position.filter(GeoPoint::is_valid);
        let current_index = live.and_then(|position| nearest_index(&merged[..localizable], position));

        let (traveled, remaining) = match current_index {
            Some(index) => split_at(&merged, index),
            None => (merged.clone(), Vec::new()),
        };
        if let (Some(last), Some(first)) = (traveled.last(), remaining.first()) {
            if last != first {
                return Err(RouteError::BrokenSplit {
                    index: current_index.unwrap_or_default(),
                });
            }
        }

        let traveled: Vec<GeoPoint> = traveled.iter().map(TrackPoint::position).collect();
        let remaining: Vec<GeoPoint> = remaining.iter().map(TrackPoint::position).collect();

        debug!(
            "Route reconciled: {} flown, {} planned, {} merged, current index {:?}",
            flown.len(),
            planned.len(),
            merged.len(),
            current_index
        );

        Ok(RouteGeometry {
            traveled_nm: path_length_nm(&traveled),
            remaining_nm: path_length_nm(&remaining),
            waypoints: select_waypoints(&merged, current_index, self.config.max_waypoints),
            segments: colored_segments(&merged, &self.config.palette, self.config.color_subdivisions),
            traveled,
            remaining,
            current_index,
        })
    }

    /// Reconcile and display, clearing the route on any failure.
    pub fn apply<S: RenderSurface + ?Sized>(&self, input: &RouteInput, surface: &mut S) -> RouteOutcome {
        let result = self.reconcile(input).and_then(|geometry| {
            surface.set_route_geometry(&geometry)?;
            Ok(geometry)
        });

        match result {
            Ok(geometry) => RouteOutcome::Displayed(geometry),
            Err(e) => {
                warn!("Route reconciliation failed, clearing route: {}", e);
                self.clear(surface);
                RouteOutcome::Cleared(RouteNotice {
                    message: format!("Unable to display flight route: {e}"),
                })
            }
        }
    }

    /// Remove any displayed route.
    pub fn clear<S: RenderSurface + ?Sized>(&self, surface: &mut S) {
        if let Err(e) = surface.set_route_geometry(&RouteGeometry::default()) {
            warn!("Failed to clear route geometry: {}", e);
        }
    }
}
