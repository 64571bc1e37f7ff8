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

//! Altitude colour gradient.
//!
//! Low altitude (cyan) through high altitude (purple), blended linearly in RGB
//! between fixed stops. Used for route micro-segments and aircraft markers.

use serde::{Deserialize, Serialize};

use crate::error::RouteError;

/// An 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Hex form, e.g. `#00c8c8`.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// One gradient stop: altitude in feet and the colour at that altitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub altitude_ft: f64,
    pub color: Rgb,
}

/// Ordered set of altitude colour stops.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AltitudePalette {
    pub(crate) stops: Vec<ColorStop>,
}

impl Default for AltitudePalette {
    fn default() -> Self {
        Self {
            stops: vec![
                ColorStop { altitude_ft: 0.0, color: Rgb(0, 200, 200) },       // Cyan
                ColorStop { altitude_ft: 10000.0, color: Rgb(50, 150, 200) },  // Teal
                ColorStop { altitude_ft: 20000.0, color: Rgb(150, 200, 0) },   // Yellow
                ColorStop { altitude_ft: 30000.0, color: Rgb(255, 150, 0) },   // Orange
                ColorStop { altitude_ft: 40000.0, color: Rgb(255, 50, 150) },  // Red/Magenta
                ColorStop { altitude_ft: 45000.0, color: Rgb(150, 50, 255) },  // Purple
            ],
        }
    }
}

impl AltitudePalette {
    /// Build a palette, rejecting empty or non-ascending stop lists.
    pub fn new(stops: Vec<ColorStop>) -> Result<Self, RouteError> {
        let palette = Self { stops };
        palette.validate()?;
        Ok(palette)
    }

    #[must_use]
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Check the stop list. Deserialized palettes bypass [`AltitudePalette::new`],
    /// so callers re-validate before use.
    pub fn validate(&self) -> Result<(), RouteError> {
        if self.stops.is_empty() {
            return Err(RouteError::EmptyPalette);
        }
        for (index, pair) in self.stops.windows(2).enumerate() {
            if !(pair[1].altitude_ft > pair[0].altitude_ft) {
                return Err(RouteError::UnorderedPalette {
                    index: index + 1,
                    altitude: pair[1].altitude_ft,
                });
            }
        }
        Ok(())
    }

    /// Colour for an altitude, clamped to the palette range.
    ///
    /// Non-finite altitudes are treated as ground level.
    #[must_use]
    pub fn color_at(&self, altitude_ft: f64) -> Rgb {
        let Some(first) = self.stops.first() else {
            return Rgb(255, 255, 255);
        };
        let last = self.stops[self.stops.len() - 1];

        let alt = if altitude_ft.is_finite() { altitude_ft } else { 0.0 };
        if alt <= first.altitude_ft {
            return first.color;
        }
        if alt >= last.altitude_ft {
            return last.color;
        }

        // Find which two stops we're between
        for pair in self.stops.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            if alt >= lower.altitude_ft && alt <= upper.altitude_ft {
                let t = (alt - lower.altitude_ft) / (upper.altitude_ft - lower.altitude_ft);
                return lerp(lower.color, upper.color, t);
            }
        }

        last.color
    }
}

fn lerp(from: Rgb, to: Rgb, t: f64) -> Rgb {
    let channel = |a: u8, b: u8| {
        let value = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "value is clamped to 0..=255")]
        let byte = value.round().clamp(0.0, 255.0) as u8;
        byte
    };
    Rgb(channel(from.0, to.0), channel(from.1, to.1), channel(from.2, to.2))
}
