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

//! Current-position localization, flown/planned merging and route splitting.

use log::debug;

use super::TrackPoint;
use crate::geo::{degree_distance, GeoPoint};

/// Index of the point closest to `live` in degree space.
///
/// Ties resolve to the first minimal index of a left-to-right scan. Returns
/// `None` for an empty route.
#[must_use]
pub fn nearest_index(points: &[TrackPoint], live: GeoPoint) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, point) in points.iter().enumerate() {
        let distance = degree_distance(point.position(), live);
        match best {
            Some((_, best_distance)) if distance >= best_distance => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}

/// Combine the flown history with the filed plan.
///
/// Flown data wins. The plan is trimmed to start at its point nearest the last
/// flown position and only points farther than `threshold_deg` from that
/// position are appended. A plan that is no longer than the history and ends
/// where the history ends adds nothing and is dropped.
#[must_use]
pub fn merge_routes(flown: &[TrackPoint], planned: &[TrackPoint], threshold_deg: f64) -> Vec<TrackPoint> {
    let (Some(last_flown), Some(last_planned)) = (flown.last(), planned.last()) else {
        return if flown.is_empty() { planned.to_vec() } else { flown.to_vec() };
    };
    let anchor = last_flown.position();

    if flown.len() >= planned.len() && degree_distance(last_planned.position(), anchor) <= threshold_deg {
        debug!("Flight plan redundant with {} flown points, ignoring", flown.len());
        return flown.to_vec();
    }

    let start = nearest_index(planned, anchor).unwrap_or(0);
    let mut merged = flown.to_vec();
    merged.extend(
        planned[start..]
            .iter()
            .filter(|p| degree_distance(p.position(), anchor) > threshold_deg)
            .copied(),
    );
    merged
}

/// Split `points` at `index` into (traveled, remaining).
///
/// Both halves share the point at `index`. When `index` is the final point
/// there is nothing left to fly and `remaining` is empty.
#[must_use]
pub fn split_at(points: &[TrackPoint], index: usize) -> (Vec<TrackPoint>, Vec<TrackPoint>) {
    if points.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let index = index.min(points.len() - 1);
    let traveled = points[..=index].to_vec();
    let remaining = if index + 1 < points.len() {
        points[index..].to_vec()
    } else {
        Vec::new()
    };
    (traveled, remaining)
}
