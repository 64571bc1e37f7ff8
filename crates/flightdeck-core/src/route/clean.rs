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

//! Validation, ordering and downsampling of raw track points.

use log::debug;

use super::TrackPoint;

// Below this the first/last guarantee leaves no interior to sample
const MIN_SAMPLE_POINTS: usize = 3;

/// Drop every point whose coordinates are non-finite or out of range.
#[must_use]
pub fn validate_points(points: &[TrackPoint]) -> Vec<TrackPoint> {
    let valid: Vec<TrackPoint> = points.iter().copied().filter(TrackPoint::is_valid).collect();
    if valid.len() != points.len() {
        debug!("Discarded {} invalid track points", points.len() - valid.len());
    }
    valid
}

/// Sort ascending by timestamp when every point carries one.
///
/// Mixed or untimestamped input (flight-plan waypoints) keeps its given order.
/// The sort is stable, so equal timestamps keep their relative order.
pub fn order_points(points: &mut [TrackPoint]) {
    if points.iter().all(|p| p.timestamp_ms.is_some()) {
        points.sort_by_key(|p| p.timestamp_ms);
    }
}

/// Reduce to roughly `max_points` by uniform-stride sampling of the interior.
///
/// The first and last points are always kept. Arrays that already fit are
/// returned unchanged.
#[must_use]
pub fn downsample(points: Vec<TrackPoint>, max_points: usize) -> Vec<TrackPoint> {
    let max_points = max_points.max(MIN_SAMPLE_POINTS);
    let n = points.len();
    if n <= max_points {
        return points;
    }

    let stride = (n - 2).div_ceil(max_points - 2);
    let mut sampled = Vec::with_capacity(max_points);
    sampled.push(points[0]);
    sampled.extend(points[1..n - 1].iter().step_by(stride).copied());
    sampled.push(points[n - 1]);

    debug!("Downsampled route from {} to {} points (stride {})", n, sampled.len(), stride);
    sampled
}

/// Full cleaning pipeline: validate, order, then downsample.
#[must_use]
pub fn clean_points(points: &[TrackPoint], max_points: usize) -> Vec<TrackPoint> {
    let mut valid = validate_points(points);
    order_points(&mut valid);
    downsample(valid, max_points)
}
