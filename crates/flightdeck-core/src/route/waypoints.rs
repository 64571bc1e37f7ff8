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

use serde::{Deserialize, Serialize};

use super::TrackPoint;
use crate::geo::GeoPoint;
use crate::palette::{AltitudePalette, Rgb};

/// What a waypoint marker stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaypointRole {
    Departure,
    Intermediate,
    Destination,
}

/// Which half of the split route a waypoint lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteSegment {
    Traveled,
    Remaining,
}

/// Tooltip marker placed on the route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Index into the merged route.
    pub index: usize,
    pub position: GeoPoint,
    pub altitude_ft: f64,
    pub role: WaypointRole,
    pub segment: RouteSegment,
}

/// One interpolated piece of a route line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColoredSegment {
    pub from: GeoPoint,
    pub to: GeoPoint,
    pub color: Rgb,
}

/// Pick departure, destination and evenly spaced intermediates.
///
/// At most `max_waypoints` markers are returned (never fewer than the two
/// endpoints when the route has them) and no index appears twice.
#[must_use]
pub fn select_waypoints(points: &[TrackPoint], current_index: Option<usize>, max_waypoints: usize) -> Vec<Waypoint> {
    let n = points.len();
    if n == 0 {
        return Vec::new();
    }

    let segment_of = |index: usize| match current_index {
        Some(current) if index > current => RouteSegment::Remaining,
        _ => RouteSegment::Traveled,
    };
    let waypoint = |index: usize, role: WaypointRole| Waypoint {
        index,
        position: points[index].position(),
        altitude_ft: points[index].altitude,
        role,
        segment: segment_of(index),
    };

    if n == 1 {
        return vec![waypoint(0, WaypointRole::Departure)];
    }

    let intermediates = max_waypoints.max(2).saturating_sub(2).min(n - 2);
    let mut waypoints = Vec::with_capacity(intermediates + 2);
    waypoints.push(waypoint(0, WaypointRole::Departure));

    // Spacing is at least one index, so rounded positions never collide
    let spacing = (n - 1) as f64 / (intermediates + 1) as f64;
    let mut previous = 0;
    for j in 1..=intermediates {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "bounded by n - 2")]
        let index = (j as f64 * spacing).round() as usize;
        if index > previous && index < n - 1 {
            waypoints.push(waypoint(index, WaypointRole::Intermediate));
            previous = index;
        }
    }

    waypoints.push(waypoint(n - 1, WaypointRole::Destination));
    waypoints
}

/// Subdivide each leg into `subdivisions` pieces coloured by interpolated altitude.
///
/// Zero subdivisions disables colouring and returns nothing.
#[must_use]
pub fn colored_segments(points: &[TrackPoint], palette: &AltitudePalette, subdivisions: usize) -> Vec<ColoredSegment> {
    if subdivisions == 0 {
        return Vec::new();
    }

    let steps = subdivisions as f64;
    let mut segments = Vec::with_capacity(points.len().saturating_sub(1) * subdivisions);
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let alt_a = finite_or_zero(a.altitude);
        let alt_b = finite_or_zero(b.altitude);
        for s in 0..subdivisions {
            let t0 = s as f64 / steps;
            let t1 = (s + 1) as f64 / steps;
            let mid = (t0 + t1) / 2.0;
            segments.push(ColoredSegment {
                from: interpolate(a, b, t0),
                to: interpolate(a, b, t1),
                color: palette.color_at(alt_a + (alt_b - alt_a) * mid),
            });
        }
    }
    segments
}

fn interpolate(a: TrackPoint, b: TrackPoint, t: f64) -> GeoPoint {
    GeoPoint::new(
        a.latitude + (b.latitude - a.latitude) * t,
        a.longitude + (b.longitude - a.longitude) * t,
    )
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(n: usize) -> Vec<TrackPoint> {
        (0..n).map(|i| TrackPoint::new(0.0, i as f64, i as f64 * 1000.0)).collect()
    }

    #[test]
    fn test_waypoints_are_capped_and_distinct() {
        let points = route(250);
        let waypoints = select_waypoints(&points, None, 10);
        assert_eq!(waypoints.len(), 10);
        assert_eq!(waypoints[0].role, WaypointRole::Departure);
        assert_eq!(waypoints[0].index, 0);
        assert_eq!(waypoints[9].role, WaypointRole::Destination);
        assert_eq!(waypoints[9].index, 249);
        assert!(waypoints.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn test_short_routes_use_every_point() {
        let points = route(4);
        let indices: Vec<usize> = select_waypoints(&points, None, 10).iter().map(|w| w.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);

        let single = select_waypoints(&route(1), None, 10);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].role, WaypointRole::Departure);
        assert!(select_waypoints(&[], None, 10).is_empty());
    }

    #[test]
    fn test_waypoint_segments_follow_current_index() {
        let points = route(5);
        let waypoints = select_waypoints(&points, Some(2), 10);
        let segments: Vec<RouteSegment> = waypoints.iter().map(|w| w.segment).collect();
        assert_eq!(
            segments,
            vec![
                RouteSegment::Traveled,
                RouteSegment::Traveled,
                RouteSegment::Traveled,
                RouteSegment::Remaining,
                RouteSegment::Remaining,
            ]
        );
    }

    #[test]
    fn test_segments_are_subdivided_and_continuous() {
        let points = route(3);
        let segments = colored_segments(&points, &AltitudePalette::default(), 4);
        assert_eq!(segments.len(), 8);
        assert!(segments.windows(2).all(|w| w[0].to == w[1].from));
        assert_eq!(segments[0].from, points[0].position());
        assert_eq!(segments[7].to, points[2].position());
    }

    #[test]
    fn test_segments_are_deterministic() {
        let points = route(6);
        let palette = AltitudePalette::default();
        assert_eq!(colored_segments(&points, &palette, 3), colored_segments(&points, &palette, 3));
        assert!(colored_segments(&points, &palette, 0).is_empty());
    }
}
