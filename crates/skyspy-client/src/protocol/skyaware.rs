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

//! SkyAware JSON document parser.
//!
//! Decodes the `aircraft.json` format served by dump1090-style bridges,
//! extended with the drone fields (`type`, `mac`, `pilot_lat`, ...).
//!
//! Document shape:
//! ```text
//! { "now": <epoch secs>, "messages": <n>, "aircraft": [ { "hex": "...", ... } ] }
//! ```

use serde::de::DeserializeOwned;

use super::{AircraftSnapshot, ParseError, Protocol};

/// Parser for `aircraft.json` snapshots.
#[derive(Debug, Default)]
pub struct SkyAwareParser;

impl SkyAwareParser {
    /// Create a new SkyAware parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Protocol for SkyAwareParser {
    type Message = AircraftSnapshot;
    type Error = ParseError;

    fn parse(&mut self, input: &[u8]) -> Result<Option<AircraftSnapshot>, ParseError> {
        decode_document(input)
    }
}

/// Decode any feed document from raw bytes.
///
/// Blank input yields `Ok(None)`; a body that is not UTF-8 or not valid JSON
/// for `T` is an error.
pub fn decode_document<T: DeserializeOwned>(input: &[u8]) -> Result<Option<T>, ParseError> {
    let text = std::str::from_utf8(input)
        .map_err(|e| ParseError::InvalidFormat(format!("invalid UTF-8: {e}")))?;

    if text.trim().is_empty() {
        return Ok(None);
    }

    Ok(Some(serde_json::from_str(text)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ActivityResponse, AltitudeValue, ReceiverInfo, RestartResponse};

    #[test]
    fn test_parse_snapshot() {
        let mut parser = SkyAwareParser::new();
        let doc = br#"{"now":100,"aircraft":[{"hex":"abc123","lat":25.78,"lon":-80.155,"alt_baro":164,"messages":5,"rssi":-20,"seen":0,"seen_pos":0}]}"#;
        let snapshot = parser.parse(doc).unwrap().unwrap();
        assert!((snapshot.now - 100.0).abs() < f64::EPSILON);
        assert_eq!(snapshot.aircraft.len(), 1);

        let record = &snapshot.aircraft[0];
        assert_eq!(record.hex, "abc123");
        assert_eq!(record.position(), Some((-80.155, 25.78)));
        assert_eq!(record.alt_baro, Some(Some(AltitudeValue::Feet(164.0))));
        assert_eq!(record.messages, Some(Some(5)));
        assert!(record.alt_geom.is_none());
    }

    #[test]
    fn test_parse_drone_fields() {
        let mut parser = SkyAwareParser::new();
        let doc = br#"{"now":1.5,"aircraft":[
            {"hex":"A1B2C3","type":"drone","mac":"60:60:1f:a1:b2:c3","manufacturer":"DJI",
             "altitude_m":50,"pilot_lat":25.7,"pilot_long":-80.1,"flight":"1581F"},
            {"hex":"A1B2C3_P","type":"pilot","drone_hex":"A1B2C3","alt_baro":0}
        ]}"#;
        let snapshot = parser.parse(doc).unwrap().unwrap();
        let drone = &snapshot.aircraft[0];
        assert_eq!(drone.kind, Some(Some("drone".to_string())));
        assert_eq!(drone.manufacturer, Some(Some("DJI".to_string())));
        assert_eq!(drone.pilot_long, Some(Some(-80.1)));

        let pilot = &snapshot.aircraft[1];
        assert_eq!(pilot.drone_hex, Some(Some("A1B2C3".to_string())));
        assert!(pilot.position().is_none());
    }

    #[test]
    fn test_null_is_distinct_from_absent() {
        let mut parser = SkyAwareParser::new();
        let doc = br#"{"now":1,"aircraft":[{"hex":"x","alt_baro":null}]}"#;
        let snapshot = parser.parse(doc).unwrap().unwrap();
        assert_eq!(snapshot.aircraft[0].alt_baro, Some(None));
        assert_eq!(snapshot.aircraft[0].alt_geom, None);
    }

    #[test]
    fn test_ground_altitude() {
        let mut parser = SkyAwareParser::new();
        let doc = br#"{"now":1,"aircraft":[{"hex":"x","alt_baro":"ground"}]}"#;
        let snapshot = parser.parse(doc).unwrap().unwrap();
        assert_eq!(snapshot.aircraft[0].alt_baro, Some(Some(AltitudeValue::Ground)));
    }

    #[test]
    fn test_unknown_altitude_text_reads_as_null() {
        let mut parser = SkyAwareParser::new();
        let doc = br#"{"now":1,"aircraft":[
            {"hex":"x","alt_baro":"high","alt_geom":120},
            {"hex":"y","alt_baro":50}
        ]}"#;
        let snapshot = parser.parse(doc).unwrap().unwrap();
        assert_eq!(snapshot.aircraft.len(), 2);
        assert_eq!(snapshot.aircraft[0].alt_baro, Some(None));
        assert_eq!(snapshot.aircraft[0].alt_geom, Some(Some(AltitudeValue::Feet(120.0))));
        assert_eq!(snapshot.aircraft[1].alt_baro, Some(Some(AltitudeValue::Feet(50.0))));
    }

    #[test]
    fn test_lone_latitude_has_no_position() {
        let mut parser = SkyAwareParser::new();
        let doc = br#"{"now":1,"aircraft":[{"hex":"x","lat":25.0}]}"#;
        let snapshot = parser.parse(doc).unwrap().unwrap();
        assert!(snapshot.aircraft[0].position().is_none());
    }

    #[test]
    fn test_parse_empty_input() {
        let mut parser = SkyAwareParser::new();
        assert!(parser.parse(b"").unwrap().is_none());
        assert!(parser.parse(b"  \n").unwrap().is_none());
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let mut parser = SkyAwareParser::new();
        assert!(matches!(
            parser.parse(&[0xff, 0xfe]),
            Err(ParseError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_snapshot_timestamp() {
        let snapshot = AircraftSnapshot {
            now: 1_700_000_000.5,
            ..Default::default()
        };
        let ts = snapshot.timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn test_decode_receiver() {
        let info: ReceiverInfo =
            decode_document(br#"{"version":"SKY-SPY-Aware v1.0","refresh":1000,"lat":0,"lon":0}"#)
                .unwrap()
                .unwrap();
        assert_eq!(info.refresh, Some(1000));
        assert!(info.site_position().is_none());

        let info: ReceiverInfo = decode_document(br#"{"lat":25.78,"lon":-80.155}"#)
            .unwrap()
            .unwrap();
        assert_eq!(info.site_position(), Some((-80.155, 25.78)));
    }

    #[test]
    fn test_decode_activity_lines() {
        let activity: ActivityResponse = decode_document(
            br#"{"lines":[{"seq":7,"text":"boot"},"plain line"]}"#,
        )
        .unwrap()
        .unwrap();
        assert_eq!(activity.lines.len(), 2);
        assert_eq!(activity.lines[0].seq(), Some(7));
        assert_eq!(activity.lines[0].text(), "boot");
        assert_eq!(activity.lines[1].seq(), None);
        assert_eq!(activity.lines[1].text(), "plain line");
    }

    #[test]
    fn test_decode_restart_response() {
        let resp: RestartResponse =
            decode_document(br#"{"status":"error","message":"Serial port not available"}"#)
                .unwrap()
                .unwrap();
        assert!(!resp.is_ok());
        assert_eq!(resp.message.as_deref(), Some("Serial port not available"));
    }
}
