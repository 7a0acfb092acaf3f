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

//! Per-device entity record.
//!
//! An [`Entity`] is created on first sighting and merged in place with every
//! later [`DeviceRecord`] carrying its id. It also holds handles to the map
//! features allocated for it so they can be released with the entity.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::scene::{
    Feature, FeatureId, FeatureLayer, FeatureStyle, Geometry, Scene, ELASTIC_COLOR, OUTLINE_COLOR,
};
use crate::format::{ColorScheme, Hsl};
use crate::protocol::{AltitudeValue, DeviceRecord, Field};

/// A position fix older than this many seconds dims the marker.
pub const STALE_POSITION_SECS: f64 = 30.0;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const METRES_PER_DEGREE: f64 = 111_195.0;

/// Calculate great-circle distance between two lat/lon points using Haversine formula (in metres).
#[must_use]
pub fn haversine_distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Device kind; anything the feed sends besides drone/pilot is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Drone,
    Pilot,
    #[default]
    Unknown,
}

impl EntityKind {
    #[must_use]
    pub fn from_feed(value: &str) -> Self {
        match value {
            "drone" => Self::Drone,
            "pilot" => Self::Pilot,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Drone => "drone",
            Self::Pilot => "pilot",
            Self::Unknown => "unknown",
        }
    }

    /// Short data-source label, e.g. for the hover panel.
    #[must_use]
    pub fn source_label(self) -> &'static str {
        match self {
            Self::Drone => "Open Drone ID",
            Self::Pilot => "Pilot Position",
            Self::Unknown => "",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Minimum/maximum altitude filter in feet. Only active when both are set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AltitudeFilter {
    pub min_altitude: Option<f64>,
    pub max_altitude: Option<f64>,
}

impl AltitudeFilter {
    #[must_use]
    pub fn new(min_altitude: f64, max_altitude: f64) -> Self {
        Self {
            min_altitude: Some(min_altitude),
            max_altitude: Some(max_altitude),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.min_altitude.is_some() && self.max_altitude.is_some()
    }
}

/// A contiguous run of track points drawn as one single-colored polyline.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSegment {
    points: Vec<(f64, f64)>,
    altitude: f64,
    feature: Option<FeatureId>,
}

impl TrackSegment {
    fn start(position: (f64, f64), altitude: f64) -> Self {
        Self {
            points: vec![position],
            altitude,
            feature: None,
        }
    }

    /// Points as (longitude, latitude).
    #[must_use]
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Altitude in feet in effect when the segment was last extended.
    #[must_use]
    pub fn altitude(&self) -> f64 {
        self.altitude
    }

    /// Whether a trail feature is currently allocated for this segment.
    #[must_use]
    pub fn is_drawn(&self) -> bool {
        self.feature.is_some()
    }
}

fn merge<T: Clone>(slot: &mut Option<T>, field: &Field<T>) {
    if let Some(value) = field {
        slot.clone_from(value);
    }
}

/// One tracked device.
#[derive(Debug, Clone)]
pub struct Entity {
    id: String,
    pub kind: EntityKind,
    pub flight: Option<String>,
    pub squawk: Option<String>,
    pub category: Option<String>,
    pub mac: Option<String>,
    pub manufacturer: Option<String>,
    /// Altitude in metres as decoded by the sensor.
    pub altitude_m: Option<f64>,
    pub pilot_lat: Option<f64>,
    pub pilot_lon: Option<f64>,
    /// For pilots: id of the drone they operate.
    pub parent_drone_id: Option<String>,

    pub alt_baro: Option<AltitudeValue>,
    pub alt_geom: Option<AltitudeValue>,
    /// Effective altitude: barometric, else geometric.
    pub altitude: Option<AltitudeValue>,
    pub ground_speed: Option<f64>,
    pub track: Option<f64>,
    pub baro_rate: Option<f64>,
    pub geom_rate: Option<f64>,
    /// Effective vertical rate: barometric, else geometric.
    pub vertical_rate: Option<f64>,

    /// Current position as (longitude, latitude).
    pub position: Option<(f64, f64)>,
    /// Approximate distance to the receiver site in metres.
    pub site_distance: Option<f64>,

    pub messages: Option<u64>,
    pub rssi: Option<f64>,
    /// Feed-reported seconds since the last message of any kind.
    pub seen: Option<f64>,
    /// Feed-reported seconds since the last position fix.
    pub seen_pos: Option<f64>,
    /// Feed timestamp of the last update applied.
    pub last_message_time: Option<f64>,
    /// Feed timestamp of the last update that carried a position.
    pub last_position_time: Option<f64>,

    selected: bool,

    segments: Vec<TrackSegment>,
    segment_open: bool,
    prev_position: Option<(f64, f64)>,
    history_size: usize,

    marker: Option<FeatureId>,
    marker_style_key: Option<String>,
    elastic: Option<FeatureId>,
}

impl Entity {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: EntityKind::Unknown,
            flight: None,
            squawk: None,
            category: None,
            mac: None,
            manufacturer: None,
            altitude_m: None,
            pilot_lat: None,
            pilot_lon: None,
            parent_drone_id: None,
            alt_baro: None,
            alt_geom: None,
            altitude: None,
            ground_speed: None,
            track: None,
            baro_rate: None,
            geom_rate: None,
            vertical_rate: None,
            position: None,
            site_distance: None,
            messages: None,
            rssi: None,
            seen: None,
            seen_pos: None,
            last_message_time: None,
            last_position_time: None,
            selected: false,
            segments: Vec::new(),
            segment_open: false,
            prev_position: None,
            history_size: 0,
            marker: None,
            marker_style_key: None,
            elastic: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn is_selected(&self) -> bool {
        self.selected
    }

    /// Recorded track segments, oldest first.
    #[must_use]
    pub fn position_history(&self) -> &[TrackSegment] {
        &self.segments
    }

    /// Number of points appended to the track since creation.
    #[must_use]
    pub fn history_size(&self) -> usize {
        self.history_size
    }

    /// Merge a device record into this entity.
    ///
    /// Only keys present in the record are written. Returns true when the
    /// record carried a full position pair.
    pub fn apply_update(&mut self, record: &DeviceRecord, now: f64) -> bool {
        merge(&mut self.seen, &record.seen);
        merge(&mut self.seen_pos, &record.seen_pos);
        merge(&mut self.messages, &record.messages);
        merge(&mut self.rssi, &record.rssi);
        self.last_message_time = Some(now);

        if let Some(kind) = &record.kind {
            self.kind = kind.as_deref().map_or(EntityKind::Unknown, EntityKind::from_feed);
        }
        merge(&mut self.mac, &record.mac);
        merge(&mut self.manufacturer, &record.manufacturer);
        merge(&mut self.altitude_m, &record.altitude_m);
        merge(&mut self.pilot_lat, &record.pilot_lat);
        merge(&mut self.pilot_lon, &record.pilot_long);
        merge(&mut self.parent_drone_id, &record.drone_hex);
        merge(&mut self.flight, &record.flight);
        merge(&mut self.squawk, &record.squawk);
        merge(&mut self.category, &record.category);

        merge(&mut self.alt_baro, &record.alt_baro);
        merge(&mut self.alt_geom, &record.alt_geom);
        self.altitude = self.alt_baro.or(self.alt_geom);

        merge(&mut self.ground_speed, &record.gs);
        merge(&mut self.track, &record.track);
        merge(&mut self.baro_rate, &record.baro_rate);
        merge(&mut self.geom_rate, &record.geom_rate);
        self.vertical_rate = self.baro_rate.or(self.geom_rate);

        match record.position() {
            Some(position) => {
                self.position = Some(position);
                self.last_position_time = Some(now);
                true
            }
            None => false,
        }
    }

    /// Recompute the flat-earth distance to the receiver site.
    pub fn update_site_distance(&mut self, site: Option<(f64, f64)>) {
        if let (Some((lon, lat)), Some((site_lon, site_lat))) = (self.position, site) {
            let dlat = lat - site_lat;
            let dlon = lon - site_lon;
            self.site_distance = Some((dlat * dlat + dlon * dlon).sqrt() * METRES_PER_DEGREE);
        }
    }

    /// Append the current position to the track.
    ///
    /// No-op without a position or when the position equals the last
    /// recorded one. Returns true when a point was appended.
    pub fn append_track_point(&mut self) -> bool {
        let Some(position) = self.position else {
            return false;
        };
        if self.prev_position == Some(position) {
            return false;
        }

        let altitude = self.altitude.map_or(0.0, AltitudeValue::feet_or_zero);

        match self.segments.last_mut() {
            Some(segment) if self.segment_open => {
                segment.points.push(position);
                segment.altitude = altitude;
            }
            _ => {
                self.segments.push(TrackSegment::start(position, altitude));
                self.segment_open = true;
            }
        }

        self.prev_position = Some(position);
        self.history_size += 1;
        true
    }

    /// True when the entity should be hidden by the altitude filter.
    #[must_use]
    pub fn is_filtered(&self, filter: &AltitudeFilter) -> bool {
        let (Some(min), Some(max)) = (filter.min_altitude, filter.max_altitude) else {
            return false;
        };
        match self.altitude {
            None => true,
            Some(altitude) => {
                let feet = altitude.feet_or_zero();
                feet < min || feet > max
            }
        }
    }

    /// Whether the last position fix is old enough to dim the marker.
    #[must_use]
    pub fn is_position_stale(&self) -> bool {
        self.seen_pos.is_some_and(|age| age > STALE_POSITION_SECS)
    }

    /// Age of the last report on the feed clock.
    ///
    /// The `seen` value from the last merged record plus the feed time that
    /// has passed since that record. An entity that drops out of the feed
    /// keeps ageing. `None` until the first merge.
    #[must_use]
    pub fn reported_age(&self, now: f64) -> Option<f64> {
        let merged_at = self.last_message_time?;
        Some(self.seen.unwrap_or(0.0) + (now - merged_at).max(0.0))
    }

    #[must_use]
    pub fn marker_color(&self, scheme: &ColorScheme) -> Hsl {
        if self.kind == EntityKind::Pilot {
            return scheme.pilot;
        }
        scheme.device_color(self.altitude, self.selected, self.is_position_stale())
    }

    /// Operator position as (longitude, latitude); (0, 0) means unknown.
    #[must_use]
    pub fn operator_position(&self) -> Option<(f64, f64)> {
        match (self.pilot_lon, self.pilot_lat) {
            (Some(lon), Some(lat)) if lat != 0.0 || lon != 0.0 => Some((lon, lat)),
            _ => None,
        }
    }

    /// Great-circle distance from the drone to its operator in metres.
    #[must_use]
    pub fn pilot_distance(&self) -> Option<f64> {
        let (lon, lat) = self.position?;
        let (pilot_lon, pilot_lat) = self.operator_position()?;
        Some(haversine_distance_m(lat, lon, pilot_lat, pilot_lon))
    }

    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    /// Place or move the marker and restyle it if its look changed.
    pub(crate) fn update_marker(&mut self, markers: &mut FeatureLayer, scheme: &ColorScheme, moved: bool) {
        let Some(position) = self.position else {
            return;
        };

        match self.marker {
            Some(id) => {
                if moved {
                    markers.set_geometry(id, Geometry::Point(position));
                }
            }
            None => {
                let id = markers.add(Feature {
                    owner: self.id.clone(),
                    geometry: Geometry::Point(position),
                    style: self.icon_style(scheme),
                });
                self.marker = Some(id);
            }
        }
        self.update_icon(markers, scheme);
    }

    fn icon_style(&self, scheme: &ColorScheme) -> FeatureStyle {
        FeatureStyle::Icon {
            icon: self.kind,
            fill: self.marker_color(scheme),
            outline: OUTLINE_COLOR,
        }
    }

    /// Returns true when the marker style was replaced.
    pub(crate) fn update_icon(&mut self, markers: &mut FeatureLayer, scheme: &ColorScheme) -> bool {
        let Some(id) = self.marker else {
            return false;
        };
        let key = format!("{}!{}!{}", self.marker_color(scheme), OUTLINE_COLOR, self.kind);
        if self.marker_style_key.as_deref() == Some(key.as_str()) {
            return false;
        }
        markers.set_style(id, self.icon_style(scheme));
        self.marker_style_key = Some(key);
        true
    }

    pub(crate) fn clear_marker(&mut self, markers: &mut FeatureLayer) -> usize {
        self.marker_style_key = None;
        self.marker
            .take()
            .and_then(|id| markers.remove(id))
            .map_or(0, |_| 1)
    }

    /// Draw the trail while selected. Existing segment features follow
    /// their segment's points.
    pub(crate) fn update_lines(&mut self, trails: &mut FeatureLayer, scheme: &ColorScheme) {
        if !self.selected {
            return;
        }

        let color = self.marker_color(scheme).to_string();
        for segment in &mut self.segments {
            let geometry = Geometry::LineString(segment.points.clone());
            match segment.feature {
                Some(id) => trails.set_geometry(id, geometry),
                None => {
                    segment.feature = Some(trails.add(Feature {
                        owner: self.id.clone(),
                        geometry,
                        style: FeatureStyle::Stroke {
                            color: color.clone(),
                            width: 2.0,
                            dash: None,
                        },
                    }));
                }
            }
        }

        if let Some(position) = self.position {
            let geometry = Geometry::LineString(vec![position, position]);
            match self.elastic {
                Some(id) => trails.set_geometry(id, geometry),
                None => {
                    self.elastic = Some(trails.add(Feature {
                        owner: self.id.clone(),
                        geometry,
                        style: FeatureStyle::Stroke {
                            color: ELASTIC_COLOR.to_string(),
                            width: 1.0,
                            dash: Some([3, 3]),
                        },
                    }));
                }
            }
        }
    }

    /// Release every trail feature and close the open segment, so the next
    /// recorded point starts a new one.
    pub(crate) fn clear_lines(&mut self, trails: &mut FeatureLayer) -> usize {
        let mut released = 0;
        for segment in &mut self.segments {
            if let Some(id) = segment.feature.take() {
                released += usize::from(trails.remove(id).is_some());
            }
        }
        if let Some(id) = self.elastic.take() {
            released += usize::from(trails.remove(id).is_some());
        }
        self.segment_open = false;
        released
    }

    /// Release every feature this entity owns. Returns how many were freed.
    pub(crate) fn destroy(&mut self, scene: &mut Scene) -> usize {
        self.clear_marker(&mut scene.markers) + self.clear_lines(&mut scene.trails)
    }
}
