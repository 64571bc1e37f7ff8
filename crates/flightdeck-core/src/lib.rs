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

//! Reconciliation engine for live flight-tracking maps.
//!
//! This library turns polled flight data into imperative map commands. It has
//! two cooperating layers that can be used independently:
//!
//! - **Route layer**: cleans flown history and flight-plan points, merges them,
//!   locates the live aircraft on the route and splits it into traveled and
//!   remaining geometry with waypoint markers
//! - **Marker layer**: diffs each snapshot of live aircraft or airports against
//!   the markers already on the map, with miss counting and selection
//!   protection against transient gaps in the feed
//!
//! Both layers talk to the map only through the [`RenderSurface`] trait, so a
//! single engine serves any mapping library.
//!
//! # Marker Layer
//!
//! ```
//! use chrono::Utc;
//! use flightdeck_core::{Flight, MarkerConfig, MarkerReconciler, RecordingSurface};
//!
//! let mut reconciler = MarkerReconciler::new(MarkerConfig::default());
//! let mut surface = RecordingSurface::new();
//!
//! let report = reconciler.reconcile(
//!     vec![Flight::new("f-1", 37.62, -122.38), Flight::new("f-2", 40.64, -73.78)],
//!     Utc::now(),
//!     &mut surface,
//! );
//! assert_eq!(report.created.len(), 2);
//! assert_eq!(surface.live_count(), 2);
//! ```
//!
//! # Route Layer
//!
//! ```
//! use flightdeck_core::{GeoPoint, RouteInput, RouteReconciler, TrackPoint};
//!
//! let flown: Vec<TrackPoint> = (0..10)
//!     .map(|i| TrackPoint::new(45.0, -120.0 + f64::from(i) * 0.1, 35000.0).with_timestamp(i64::from(i)))
//!     .collect();
//!
//! let geometry = RouteReconciler::default()
//!     .reconcile(&RouteInput {
//!         live_position: Some(GeoPoint::new(45.0, -119.6)),
//!         flown,
//!         planned: Vec::new(),
//!     })
//!     .unwrap();
//!
//! assert_eq!(geometry.current_index, Some(4));
//! assert_eq!(geometry.traveled.len(), 5);
//! assert_eq!(geometry.remaining.len(), 6);
//! ```

pub mod entity;
pub mod error;
pub mod geo;
pub mod marker;
pub mod palette;
pub mod route;
pub mod sequence;
pub mod surface;

pub use entity::{AtcFacility, Airport, EntityKind, Flight, LiveEntity, VisualInputs};
pub use error::{RouteError, SurfaceError};
pub use geo::GeoPoint;
pub use marker::{
    MarkerAppearance, MarkerConfig, MarkerReconciler, MarkerRegistry, ReconcilePass, ReconcileReport,
    SelectionEvent,
};
pub use palette::{AltitudePalette, Rgb};
pub use route::{RouteConfig, RouteGeometry, RouteInput, RouteNotice, RouteOutcome, RouteReconciler, TrackPoint};
pub use sequence::{SequenceToken, SnapshotSequencer};
pub use surface::{MarkerHandle, RecordingSurface, RenderSurface, SurfaceCommand};
