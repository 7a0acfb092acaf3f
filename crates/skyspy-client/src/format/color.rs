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

//! Altitude-based marker coloring.
//!
//! Drones fly far lower than aircraft, so the hue ramp covers roughly
//! 0-400 m: green at ground level through yellow and orange to red.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::protocol::AltitudeValue;

/// A color in HSL space. Hue in degrees, saturation and lightness in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

impl Hsl {
    #[must_use]
    pub const fn new(h: f64, s: f64, l: f64) -> Self {
        Self { h, s, l }
    }
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hsl({:.0},{:.0}%,{:.0}%)",
            self.h.round(),
            self.s.round(),
            self.l.round()
        )
    }
}

/// Additive adjustment applied on top of a base color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HslOffset {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

/// One altitude-to-hue control point (altitude in feet).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HueStop {
    pub alt: f64,
    pub val: f64,
}

/// Piecewise-linear hue for an altitude in feet.
///
/// Below the first stop clamps to its hue, above the last clamps to its hue,
/// and a control-point altitude returns exactly that stop's hue.
#[must_use]
pub fn hue_for_altitude(stops: &[HueStop], altitude: f64) -> f64 {
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return 0.0;
    };

    if altitude <= first.alt {
        return first.val;
    }
    if altitude >= last.alt {
        return last.val;
    }

    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if altitude >= lo.alt && altitude <= hi.alt {
            let span = hi.alt - lo.alt;
            if span <= 0.0 {
                return lo.val;
            }
            let frac = (altitude - lo.alt) / span;
            return lo.val + frac * (hi.val - lo.val);
        }
    }

    last.val
}

/// The marker palette: base colors, the air hue ramp and state offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    /// Altitude not reported.
    pub unknown: Hsl,
    /// On the ground or at/below zero feet.
    pub ground: Hsl,
    /// Altitude-to-hue control points, ascending by altitude.
    pub air_hues: Vec<HueStop>,
    pub air_saturation: f64,
    pub air_lightness: f64,
    pub selected: HslOffset,
    /// Applied when the last position fix is older than the stale threshold.
    pub stale: HslOffset,
    /// Operators always render in this color.
    pub pilot: Hsl,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            unknown: Hsl::new(0.0, 0.0, 40.0),
            ground: Hsl::new(120.0, 80.0, 35.0),
            air_hues: vec![
                HueStop { alt: 0.0, val: 120.0 },
                HueStop { alt: 164.0, val: 60.0 },
                HueStop { alt: 492.0, val: 30.0 },
                HueStop { alt: 1312.0, val: 0.0 },
            ],
            air_saturation: 85.0,
            air_lightness: 50.0,
            selected: HslOffset { h: 0.0, s: -10.0, l: 20.0 },
            stale: HslOffset { h: 0.0, s: -10.0, l: 30.0 },
            pilot: Hsl::new(180.0, 70.0, 45.0),
        }
    }
}

impl ColorScheme {
    /// Color for a non-pilot device.
    ///
    /// Unknown altitude short-circuits to the neutral color with no
    /// selection or staleness adjustment.
    #[must_use]
    pub fn device_color(&self, altitude: Option<AltitudeValue>, selected: bool, stale: bool) -> Hsl {
        let Some(altitude) = altitude else {
            return self.unknown;
        };

        let (hue, mut sat, mut lit) = if altitude.is_grounded() {
            (self.ground.h, self.ground.s, self.ground.l)
        } else {
            (
                hue_for_altitude(&self.air_hues, altitude.feet_or_zero()),
                self.air_saturation,
                self.air_lightness,
            )
        };

        if selected {
            sat += self.selected.s;
            lit += self.selected.l;
        }
        if stale {
            sat += self.stale.s;
            lit += self.stale.l;
        }

        Hsl::new(hue, sat.clamp(0.0, 100.0), lit.clamp(0.0, 100.0))
    }
}
