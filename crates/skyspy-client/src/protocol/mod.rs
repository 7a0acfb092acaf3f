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

//! Protocol layer for the detection feed documents.
//!
//! The sensor bridge publishes SkyAware-compatible JSON documents:
//! `aircraft.json` (device snapshots), `receiver.json` (site descriptor) and
//! `activity.json` (raw sensor log lines). This module declares every field
//! those documents may carry and a trait-based parser abstraction.

mod skyaware;

pub use skyaware::{decode_document, SkyAwareParser};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Errors that can occur while decoding a feed document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid document format: {0}")]
    InvalidFormat(String),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A presence-tracked feed field.
///
/// `None` means the key was absent from the record and must leave the
/// current value untouched. `Some(None)` is an explicit JSON `null`.
pub type Field<T> = Option<Option<T>>;

/// Deserialize a key that is present in the document, keeping `null` apart
/// from absence. Pair with `#[serde(default)]`.
fn present<'de, D, T>(deserializer: D) -> Result<Field<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Altitude as reported by the feed: feet, or the literal `"ground"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AltitudeValue {
    /// Altitude in feet.
    Feet(f64),
    /// The device reports being on the ground.
    Ground,
}

impl AltitudeValue {
    /// Numeric altitude in feet with "ground" mapped to zero.
    #[must_use]
    pub fn feet_or_zero(self) -> f64 {
        match self {
            Self::Feet(ft) => ft,
            Self::Ground => 0.0,
        }
    }

    /// Whether this altitude counts as on or below ground level.
    #[must_use]
    pub fn is_grounded(self) -> bool {
        match self {
            Self::Feet(ft) => ft <= 0.0,
            Self::Ground => true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAltitude {
    Number(f64),
    Text(String),
}

/// Like [`present`] for altitudes. Text other than `"ground"` reads as
/// `null` so one odd record cannot fail the whole snapshot.
fn present_altitude<'de, D>(deserializer: D) -> Result<Field<AltitudeValue>, D::Error>
where
    D: Deserializer<'de>,
{
    let altitude = match Option::<RawAltitude>::deserialize(deserializer)? {
        None => None,
        Some(RawAltitude::Number(ft)) => Some(AltitudeValue::Feet(ft)),
        Some(RawAltitude::Text(text)) if text == "ground" => Some(AltitudeValue::Ground),
        Some(RawAltitude::Text(text)) => {
            debug!("Ignoring unrecognized altitude '{text}'");
            None
        }
    };
    Ok(Some(altitude))
}

/// One device record inside an `aircraft.json` snapshot.
///
/// Every field besides `hex` is presence-based; see [`Field`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceRecord {
    /// Stable hardware identifier.
    pub hex: String,
    /// Device kind: `"drone"`, `"pilot"`, or anything else for unknown.
    #[serde(default, rename = "type", deserialize_with = "present")]
    pub kind: Field<String>,
    #[serde(default, deserialize_with = "present")]
    pub mac: Field<String>,
    #[serde(default, deserialize_with = "present")]
    pub manufacturer: Field<String>,
    /// Altitude in metres as decoded by the sensor.
    #[serde(default, deserialize_with = "present")]
    pub altitude_m: Field<f64>,
    #[serde(default, deserialize_with = "present")]
    pub pilot_lat: Field<f64>,
    #[serde(default, deserialize_with = "present")]
    pub pilot_long: Field<f64>,
    /// For pilot records: the id of the drone they operate.
    #[serde(default, deserialize_with = "present")]
    pub drone_hex: Field<String>,
    #[serde(default, deserialize_with = "present")]
    pub flight: Field<String>,
    #[serde(default, deserialize_with = "present")]
    pub squawk: Field<String>,
    #[serde(default, deserialize_with = "present")]
    pub category: Field<String>,
    #[serde(default, deserialize_with = "present_altitude")]
    pub alt_baro: Field<AltitudeValue>,
    #[serde(default, deserialize_with = "present_altitude")]
    pub alt_geom: Field<AltitudeValue>,
    /// Ground speed in knots.
    #[serde(default, deserialize_with = "present")]
    pub gs: Field<f64>,
    /// Track over ground in degrees.
    #[serde(default, deserialize_with = "present")]
    pub track: Field<f64>,
    /// Barometric vertical rate in ft/min.
    #[serde(default, deserialize_with = "present")]
    pub baro_rate: Field<f64>,
    /// Geometric vertical rate in ft/min.
    #[serde(default, deserialize_with = "present")]
    pub geom_rate: Field<f64>,
    #[serde(default, deserialize_with = "present")]
    pub lat: Field<f64>,
    #[serde(default, deserialize_with = "present")]
    pub lon: Field<f64>,
    #[serde(default, deserialize_with = "present")]
    pub messages: Field<u64>,
    #[serde(default, deserialize_with = "present")]
    pub rssi: Field<f64>,
    /// Seconds since any message, as measured by the feed.
    #[serde(default, deserialize_with = "present")]
    pub seen: Field<f64>,
    /// Seconds since the last position fix, as measured by the feed.
    #[serde(default, deserialize_with = "present")]
    pub seen_pos: Field<f64>,
}

impl DeviceRecord {
    /// Create an otherwise empty record for the given id.
    #[must_use]
    pub fn new(hex: impl Into<String>) -> Self {
        Self {
            hex: hex.into(),
            ..Default::default()
        }
    }

    /// The (longitude, latitude) pair, only when both are present and non-null.
    #[must_use]
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.lon, self.lat) {
            (Some(Some(lon)), Some(Some(lat))) => Some((lon, lat)),
            _ => None,
        }
    }
}

/// One polled `aircraft.json` document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AircraftSnapshot {
    /// Feed epoch seconds; the authoritative "now" for this snapshot.
    pub now: f64,
    /// Total messages seen by the sensor bridge.
    #[serde(default)]
    pub messages: Option<u64>,
    #[serde(default)]
    pub aircraft: Vec<DeviceRecord>,
}

impl AircraftSnapshot {
    /// The feed timestamp as a UTC date-time, if representable.
    #[must_use]
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        if !self.now.is_finite() {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, reason = "feed epoch seconds fit in i64")]
        let secs = self.now.floor() as i64;
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "fractional part scaled to nanoseconds is below 1e9"
        )]
        let nanos = ((self.now - self.now.floor()) * 1e9) as u32;
        DateTime::from_timestamp(secs, nanos)
    }
}

/// The `receiver.json` site descriptor, consumed once at startup.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReceiverInfo {
    #[serde(default)]
    pub version: Option<String>,
    /// Suggested refresh interval in milliseconds.
    #[serde(default)]
    pub refresh: Option<u64>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lon: Option<f64>,
}

impl ReceiverInfo {
    /// Site position as (longitude, latitude).
    ///
    /// A latitude of exactly zero is how a mobile scanner says "no site".
    #[must_use]
    pub fn site_position(&self) -> Option<(f64, f64)> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) if lat != 0.0 => Some((lon, lat)),
            _ => None,
        }
    }
}

/// One line of the sensor activity feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ActivityEntry {
    Sequenced { seq: u64, text: String },
    Plain(String),
}

impl ActivityEntry {
    /// Sequence number, when the server provided one.
    #[must_use]
    pub fn seq(&self) -> Option<u64> {
        match self {
            Self::Sequenced { seq, .. } => Some(*seq),
            Self::Plain(_) => None,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Sequenced { text, .. } | Self::Plain(text) => text,
        }
    }
}

/// The `activity.json` document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ActivityResponse {
    #[serde(default)]
    pub lines: Vec<ActivityEntry>,
}

/// Response to a sensor restart request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RestartResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl RestartResponse {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Trait for feed document parsers.
///
/// Implement this trait to add support for new feed formats.
pub trait Protocol {
    /// The message type produced by this parser.
    type Message;
    /// The error type for parsing failures.
    type Error;

    /// Parse input bytes into a message.
    ///
    /// Returns `Ok(Some(message))` if parsing succeeded,
    /// `Ok(None)` if the input is valid but doesn't produce a message,
    /// or `Err(error)` if parsing failed.
    fn parse(&mut self, input: &[u8]) -> Result<Option<Self::Message>, Self::Error>;
}
