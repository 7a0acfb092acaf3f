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

//! Unit conversion and display formatting.
//!
//! Raw feed values arrive in aviation units (feet, knots, ft/min) and metres
//! for distances. Everything here is a pure function of the value and the
//! selected [`DisplayUnits`].

pub mod color;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::protocol::AltitudeValue;

pub use color::{hue_for_altitude, ColorScheme, Hsl, HslOffset, HueStop};

pub const NBSP: char = '\u{00a0}';
pub const DEGREES: char = '\u{00b0}';

const FEET_PER_METRE: f64 = 3.2808;
const KMH_PER_KNOT: f64 = 1.852;
const MPH_PER_KNOT: f64 = 1.151;
const METRES_PER_STATUTE_MILE: f64 = 1609.0;
const METRES_PER_NAUTICAL_MILE: f64 = 1852.0;
const METRES_PER_FOOT: f64 = 0.3048;
const FPM_PER_METRE_PER_SECOND: f64 = 196.85;

/// Unit system used for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayUnits {
    #[default]
    Metric,
    Imperial,
    Nautical,
}

impl fmt::Display for DisplayUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Metric => "metric",
            Self::Imperial => "imperial",
            Self::Nautical => "nautical",
        })
    }
}

impl FromStr for DisplayUnits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" => Ok(Self::Metric),
            "imperial" => Ok(Self::Imperial),
            "nautical" => Ok(Self::Nautical),
            other => Err(format!("unknown unit system '{other}'")),
        }
    }
}

/// Physical quantity, used to pick a unit label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Altitude,
    Speed,
    Distance,
    VerticalRate,
    DistanceShort,
}

#[must_use]
pub fn unit_label(quantity: Quantity, units: DisplayUnits) -> &'static str {
    use DisplayUnits::{Imperial, Metric, Nautical};
    match (quantity, units) {
        (Quantity::Altitude, Metric) | (Quantity::DistanceShort, Metric | Nautical) => "m",
        (Quantity::Altitude, Imperial | Nautical) | (Quantity::DistanceShort, Imperial) => "ft",
        (Quantity::Speed, Metric) => "km/h",
        (Quantity::Speed, Imperial) => "mph",
        (Quantity::Speed, Nautical) => "kt",
        (Quantity::Distance, Metric) => "km",
        (Quantity::Distance, Imperial) => "mi",
        (Quantity::Distance, Nautical) => "NM",
        (Quantity::VerticalRate, Metric) => "m/s",
        (Quantity::VerticalRate, Imperial | Nautical) => "ft/min",
    }
}

/// Feet to the display altitude unit.
#[must_use]
pub fn convert_altitude(feet: f64, units: DisplayUnits) -> f64 {
    match units {
        DisplayUnits::Metric => feet / FEET_PER_METRE,
        DisplayUnits::Imperial | DisplayUnits::Nautical => feet,
    }
}

/// Knots to the display speed unit.
#[must_use]
pub fn convert_speed(knots: f64, units: DisplayUnits) -> f64 {
    match units {
        DisplayUnits::Metric => knots * KMH_PER_KNOT,
        DisplayUnits::Imperial => knots * MPH_PER_KNOT,
        DisplayUnits::Nautical => knots,
    }
}

/// Metres to the display long-distance unit.
#[must_use]
pub fn convert_distance(metres: f64, units: DisplayUnits) -> f64 {
    match units {
        DisplayUnits::Metric => metres / 1000.0,
        DisplayUnits::Imperial => metres / METRES_PER_STATUTE_MILE,
        DisplayUnits::Nautical => metres / METRES_PER_NAUTICAL_MILE,
    }
}

/// Metres to the display short-distance unit.
#[must_use]
pub fn convert_distance_short(metres: f64, units: DisplayUnits) -> f64 {
    match units {
        DisplayUnits::Imperial => metres / METRES_PER_FOOT,
        DisplayUnits::Metric | DisplayUnits::Nautical => metres,
    }
}

/// ft/min to the display vertical-rate unit.
#[must_use]
pub fn convert_vert_rate(fpm: f64, units: DisplayUnits) -> f64 {
    match units {
        DisplayUnits::Metric => fpm / FPM_PER_METRE_PER_SECOND,
        DisplayUnits::Imperial | DisplayUnits::Nautical => fpm,
    }
}

/// Round to an integer and group thousands with commas.
fn grouped(value: f64) -> String {
    #[allow(clippy::cast_possible_truncation, reason = "display values are far below i64 range")]
    let rounded = value.round() as i64;
    let digits = rounded.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[must_use]
pub fn format_altitude_brief(altitude: Option<AltitudeValue>, units: DisplayUnits) -> String {
    match altitude {
        None => String::new(),
        Some(AltitudeValue::Ground) => "ground".to_string(),
        Some(AltitudeValue::Feet(ft)) => format!("{}{NBSP}", grouped(convert_altitude(ft, units))),
    }
}

#[must_use]
pub fn format_altitude_long(altitude: Option<AltitudeValue>, units: DisplayUnits) -> String {
    match altitude {
        None => "n/a".to_string(),
        Some(AltitudeValue::Ground) => "on ground".to_string(),
        Some(AltitudeValue::Feet(ft)) => format!(
            "{}{NBSP}{}",
            grouped(convert_altitude(ft, units)),
            unit_label(Quantity::Altitude, units)
        ),
    }
}

#[must_use]
pub fn format_onground(altitude: Option<AltitudeValue>) -> &'static str {
    match altitude {
        None => "n/a",
        Some(AltitudeValue::Ground) => "on ground",
        Some(AltitudeValue::Feet(_)) => "airborne",
    }
}

#[must_use]
pub fn format_speed_brief(knots: Option<f64>, units: DisplayUnits) -> String {
    knots.map_or_else(String::new, |kt| {
        format!("{:.0}", convert_speed(kt, units).round())
    })
}

#[must_use]
pub fn format_speed_long(knots: Option<f64>, units: DisplayUnits) -> String {
    knots.map_or_else(
        || "n/a".to_string(),
        |kt| {
            format!(
                "{:.0}{NBSP}{}",
                convert_speed(kt, units).round(),
                unit_label(Quantity::Speed, units)
            )
        },
    )
}

#[must_use]
pub fn format_distance_brief(metres: Option<f64>, units: DisplayUnits) -> String {
    metres.map_or_else(String::new, |m| format!("{:.1}", convert_distance(m, units)))
}

#[must_use]
pub fn format_distance_long(metres: Option<f64>, units: DisplayUnits, decimals: usize) -> String {
    metres.map_or_else(
        || "n/a".to_string(),
        |m| {
            format!(
                "{:.*}{NBSP}{}",
                decimals,
                convert_distance(m, units),
                unit_label(Quantity::Distance, units)
            )
        },
    )
}

#[must_use]
pub fn format_distance_short(metres: Option<f64>, units: DisplayUnits) -> String {
    metres.map_or_else(
        || "n/a".to_string(),
        |m| {
            format!(
                "{:.0}{NBSP}{}",
                convert_distance_short(m, units).round(),
                unit_label(Quantity::DistanceShort, units)
            )
        },
    )
}

fn vert_rate_decimals(units: DisplayUnits) -> usize {
    usize::from(units == DisplayUnits::Metric)
}

#[must_use]
pub fn format_vert_rate_brief(fpm: Option<f64>, units: DisplayUnits) -> String {
    fpm.map_or_else(String::new, |rate| {
        format!("{:.*}", vert_rate_decimals(units), convert_vert_rate(rate, units))
    })
}

#[must_use]
pub fn format_vert_rate_long(fpm: Option<f64>, units: DisplayUnits) -> String {
    fpm.map_or_else(
        || "n/a".to_string(),
        |rate| {
            format!(
                "{:.*}{NBSP}{}",
                vert_rate_decimals(units),
                convert_vert_rate(rate, units),
                unit_label(Quantity::VerticalRate, units)
            )
        },
    )
}

/// Format a (longitude, latitude) pair as `lat°, lon°`.
#[must_use]
pub fn format_latlng((lon, lat): (f64, f64)) -> String {
    format!("{lat:.6}{DEGREES},{NBSP}{lon:.6}{DEGREES}")
}

#[must_use]
pub fn format_track_brief(track: Option<f64>) -> String {
    track.map_or_else(String::new, |t| format!("{:.0}{DEGREES}", t.round()))
}

/// Track with its compass point, e.g. `"90° (E)"`.
#[must_use]
pub fn format_track_long(track: Option<f64>) -> String {
    const DIRS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    track.map_or_else(
        || "n/a".to_string(),
        |t| {
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                reason = "rem_euclid keeps the sector index in 0..8"
            )]
            let sector = (((t.rem_euclid(360.0) + 22.5) / 45.0).floor() as usize) % DIRS.len();
            format!("{:.0}{DEGREES}{NBSP}({})", t.round(), DIRS[sector])
        },
    )
}
