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

//! Marker appearance derivation.
//!
//! Appearance is always rebuilt from the entity attributes and the selected
//! flag, never patched, so a marker that disappears and comes back cannot keep
//! a stale look.

use serde::{Deserialize, Serialize};

use super::MarkerConfig;
use crate::entity::{EntityKind, VisualInputs};
use crate::palette::Rgb;

const SELECTED_COLOR: Rgb = Rgb(255, 215, 0);
const GROUND_COLOR: Rgb = Rgb(140, 140, 140);
const AIRPORT_ACTIVE_COLOR: Rgb = Rgb(0, 170, 255);
const AIRPORT_IDLE_COLOR: Rgb = Rgb(120, 120, 120);

const AIRCRAFT_SIZE: f32 = 16.0;
const AIRCRAFT_SELECTED_SIZE: f32 = 22.0;
const AIRPORT_BASE_SIZE: f32 = 8.0;
const AIRPORT_MAX_ACTIVITY: u16 = 20;

/// Icon description handed to the rendering surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerAppearance {
    pub kind: EntityKind,
    /// Icon rotation in degrees clockwise from north, in `[0, 360)`.
    pub rotation_deg: f64,
    pub on_ground: bool,
    pub selected: bool,
    pub color: Rgb,
    /// Icon size in pixels.
    pub size: f32,
}

impl MarkerAppearance {
    /// Derive the full appearance from entity attributes.
    #[must_use]
    pub fn derive(inputs: &VisualInputs, selected: bool, config: &MarkerConfig) -> Self {
        match inputs.kind {
            EntityKind::Aircraft => {
                let on_ground = is_on_ground(inputs, config);
                let color = if selected {
                    SELECTED_COLOR
                } else if on_ground {
                    GROUND_COLOR
                } else {
                    config.palette.color_at(inputs.altitude_ft.unwrap_or(0.0))
                };
                Self {
                    kind: EntityKind::Aircraft,
                    rotation_deg: normalize_heading(inputs.heading_deg),
                    on_ground,
                    selected,
                    color,
                    size: if selected { AIRCRAFT_SELECTED_SIZE } else { AIRCRAFT_SIZE },
                }
            }
            EntityKind::Airport => {
                let activity = u16::try_from(inputs.activity)
                    .unwrap_or(u16::MAX)
                    .min(AIRPORT_MAX_ACTIVITY);
                let color = if selected {
                    SELECTED_COLOR
                } else if inputs.activity > 0 {
                    AIRPORT_ACTIVE_COLOR
                } else {
                    AIRPORT_IDLE_COLOR
                };
                Self {
                    kind: EntityKind::Airport,
                    rotation_deg: 0.0,
                    on_ground: true,
                    selected,
                    color,
                    size: AIRPORT_BASE_SIZE + f32::from(activity) / 2.0,
                }
            }
        }
    }
}

/// Low altitude AND low speed. Missing data never counts as grounded.
#[must_use]
pub fn is_on_ground(inputs: &VisualInputs, config: &MarkerConfig) -> bool {
    match (inputs.altitude_ft, inputs.speed_kts) {
        (Some(altitude), Some(speed)) => {
            altitude < config.ground_altitude_ft && speed < config.ground_speed_kts
        }
        _ => false,
    }
}

fn normalize_heading(heading: Option<f64>) -> f64 {
    match heading {
        Some(h) if h.is_finite() => h.rem_euclid(360.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aircraft(heading: f64, altitude: f64, speed: f64) -> VisualInputs {
        VisualInputs {
            kind: EntityKind::Aircraft,
            heading_deg: Some(heading),
            altitude_ft: Some(altitude),
            speed_kts: Some(speed),
            activity: 0,
        }
    }

    #[test]
    fn test_on_ground_needs_low_altitude_and_speed() {
        let config = MarkerConfig::default();
        assert!(is_on_ground(&aircraft(0.0, 20.0, 10.0), &config));
        assert!(!is_on_ground(&aircraft(0.0, 20.0, 140.0), &config));
        assert!(!is_on_ground(&aircraft(0.0, 3000.0, 10.0), &config));

        let mut unknown = aircraft(0.0, 0.0, 0.0);
        unknown.speed_kts = None;
        assert!(!is_on_ground(&unknown, &config));
    }

    #[test]
    fn test_rotation_is_normalized() {
        let config = MarkerConfig::default();
        let appearance = MarkerAppearance::derive(&aircraft(-90.0, 35000.0, 450.0), false, &config);
        assert!((appearance.rotation_deg - 270.0).abs() < f64::EPSILON);
        let appearance = MarkerAppearance::derive(&aircraft(f64::NAN, 35000.0, 450.0), false, &config);
        assert!(appearance.rotation_deg.abs() < f64::EPSILON);
    }

    #[test]
    fn test_selection_highlights() {
        let config = MarkerConfig::default();
        let inputs = aircraft(90.0, 35000.0, 450.0);
        let plain = MarkerAppearance::derive(&inputs, false, &config);
        let selected = MarkerAppearance::derive(&inputs, true, &config);
        assert_eq!(selected.color, SELECTED_COLOR);
        assert!(selected.size > plain.size);
        assert_ne!(plain.color, SELECTED_COLOR);
    }

    #[test]
    fn test_derivation_is_pure() {
        let config = MarkerConfig::default();
        let inputs = aircraft(10.0, 5.0, 3.0);
        let a = MarkerAppearance::derive(&inputs, false, &config);
        let b = MarkerAppearance::derive(&inputs, false, &config);
        assert_eq!(a, b);
        assert_eq!(a.color, GROUND_COLOR);
    }

    #[test]
    fn test_airport_size_tracks_activity() {
        let config = MarkerConfig::default();
        let mut inputs = VisualInputs {
            kind: EntityKind::Airport,
            heading_deg: None,
            altitude_ft: None,
            speed_kts: None,
            activity: 0,
        };
        let idle = MarkerAppearance::derive(&inputs, false, &config);
        inputs.activity = 500;
        let busy = MarkerAppearance::derive(&inputs, false, &config);
        assert_eq!(idle.color, AIRPORT_IDLE_COLOR);
        assert_eq!(busy.color, AIRPORT_ACTIVE_COLOR);
        assert!((busy.size - (AIRPORT_BASE_SIZE + 10.0)).abs() < f32::EPSILON);
    }
}
