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

//! Read-only projections of the table for the presentation layer.
//!
//! Everything here is already formatted; a renderer only lays it out.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::entity::{Entity, EntityKind};
use super::EntityTable;
use crate::format::{
    format_altitude_long, format_distance_long, format_speed_long, format_track_long,
    format_vert_rate_long, DisplayUnits,
};

/// One row of the device listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub id: String,
    pub callsign: String,
    pub manufacturer: String,
    pub altitude: String,
    pub speed: String,
    pub distance: String,
    pub rssi: String,
    pub seen: String,
    pub latitude: String,
    pub longitude: String,
    pub kind: String,
    pub selected: bool,
    /// Marker color, so the row can carry a matching swatch.
    pub color: String,
}

/// Summary counters for the status bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    /// Non-pilot entities in the table.
    pub tracked: usize,
    /// Non-pilot entities with a position.
    pub with_position: usize,
    /// Sum of per-entity message counters.
    pub total_messages: u64,
}

impl Stats {
    /// Window title, e.g. `"2 drones - SKY-SPY-Aware"`.
    #[must_use]
    pub fn title(&self, page_name: &str) -> String {
        let plural = if self.tracked == 1 { "" } else { "s" };
        format!("{} drone{plural} - {page_name}", self.tracked)
    }
}

/// Columns the listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    Id,
    Callsign,
    Manufacturer,
    Altitude,
    Rssi,
    Seen,
    Latitude,
    Longitude,
    Kind,
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" | "icao" | "hex" => Ok(Self::Id),
            "callsign" | "flight" => Ok(Self::Callsign),
            "manufacturer" => Ok(Self::Manufacturer),
            "altitude" | "alt" => Ok(Self::Altitude),
            "rssi" | "signal" => Ok(Self::Rssi),
            "seen" | "age" => Ok(Self::Seen),
            "lat" | "latitude" => Ok(Self::Latitude),
            "lon" | "longitude" => Ok(Self::Longitude),
            "kind" | "type" => Ok(Self::Kind),
            other => Err(format!("unknown column '{other}'")),
        }
    }
}

enum SortKey<'a> {
    Text(&'a str),
    Number(f64),
}

impl SortColumn {
    fn key(self, entity: &Entity) -> Option<SortKey<'_>> {
        match self {
            Self::Id => Some(SortKey::Text(entity.id())),
            Self::Callsign => entity.flight.as_deref().map(SortKey::Text),
            Self::Manufacturer => entity.manufacturer.as_deref().map(SortKey::Text),
            Self::Altitude => entity
                .altitude
                .map(|a| SortKey::Number(a.feet_or_zero()))
                .or_else(|| entity.altitude_m.map(|m| SortKey::Number(m * 3.2808))),
            Self::Rssi => entity.rssi.map(SortKey::Number),
            Self::Seen => entity.seen.map(SortKey::Number),
            Self::Latitude => entity.position.map(|(_, lat)| SortKey::Number(lat)),
            Self::Longitude => entity.position.map(|(lon, _)| SortKey::Number(lon)),
            Self::Kind => Some(SortKey::Text(entity.kind.as_str())),
        }
    }

    /// Compare two entities by this column. Missing values sort last in
    /// either direction.
    fn compare(self, a: &Entity, b: &Entity, ascending: bool) -> Ordering {
        let ordering = match (self.key(a), self.key(b)) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Greater,
            (Some(_), None) => return Ordering::Less,
            (Some(SortKey::Text(x)), Some(SortKey::Text(y))) => x.cmp(y),
            (Some(SortKey::Number(x)), Some(SortKey::Number(y))) => x.total_cmp(&y),
            _ => Ordering::Equal,
        };
        if ascending {
            ordering
        } else {
            ordering.reverse()
        }
    }
}

/// Current listing order. Picking the active column again flips direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub column: SortColumn,
    pub ascending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            column: SortColumn::Id,
            ascending: true,
        }
    }
}

impl SortOrder {
    pub fn toggle(&mut self, column: SortColumn) {
        if self.column == column {
            self.ascending = !self.ascending;
        } else {
            self.column = column;
            self.ascending = true;
        }
    }
}

/// Detail panel for the selected entity.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedDetail {
    pub callsign: String,
    pub id: String,
    pub mac: String,
    pub manufacturer: String,
    pub source: String,
    pub rssi: String,
    pub messages: u64,
    pub seen: String,
    pub position: String,
    pub altitude: String,
    pub speed: String,
    pub vertical_rate: String,
    pub track: String,
    pub site_distance: String,
    pub pilot_position: String,
    pub pilot_distance: String,
}

/// Hover summary for the highlighted entity.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightDetail {
    pub callsign: String,
    pub id: String,
    pub manufacturer: String,
    pub kind: String,
    pub altitude: String,
    pub rssi: String,
    pub source: String,
}

fn metres_label(metres: Option<f64>) -> Option<String> {
    metres.map(|m| format!("{m} m"))
}

fn rssi_label(rssi: Option<f64>) -> Option<String> {
    rssi.map(|r| format!("{r} dBm"))
}

/// Sensor-decoded metres when present, else the feed altitude in `units`.
fn altitude_label(entity: &Entity, units: DisplayUnits) -> String {
    metres_label(entity.altitude_m).unwrap_or_else(|| {
        if entity.altitude.is_some() {
            format_altitude_long(entity.altitude, units)
        } else {
            String::new()
        }
    })
}

fn detail_source(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Drone => "Drone (Open Drone ID)",
        EntityKind::Pilot => "Pilot",
        EntityKind::Unknown => "Unknown",
    }
}

impl EntityTable {
    fn row(&self, entity: &Entity, units: DisplayUnits) -> TableRow {
        let (latitude, longitude) = entity.position.map_or_else(
            || (String::new(), String::new()),
            |(lon, lat)| (format!("{lat:.6}"), format!("{lon:.6}")),
        );
        let speed = if entity.ground_speed.is_some() {
            format_speed_long(entity.ground_speed, units)
        } else {
            String::new()
        };
        let distance = if entity.site_distance.is_some() {
            format_distance_long(entity.site_distance, units, 1)
        } else {
            String::new()
        };

        TableRow {
            id: entity.id().to_string(),
            callsign: entity.flight.clone().unwrap_or_default(),
            manufacturer: entity.manufacturer.clone().unwrap_or_default(),
            altitude: altitude_label(entity, units),
            speed,
            distance,
            rssi: rssi_label(entity.rssi).unwrap_or_default(),
            seen: entity.seen.map(|s| format!("{s:.0}s")).unwrap_or_default(),
            latitude,
            longitude,
            kind: entity.kind.as_str().to_string(),
            selected: entity.is_selected(),
            color: entity.marker_color(&self.colors).to_string(),
        }
    }

    /// Listing rows in canonical order.
    #[must_use]
    pub fn rows(&self, units: DisplayUnits) -> Vec<TableRow> {
        self.visible_entities(&self.filter)
            .into_iter()
            .map(|e| self.row(e, units))
            .collect()
    }

    /// Listing rows in the given order. Canonical order is left untouched
    /// and breaks ties.
    #[must_use]
    pub fn sorted_rows(&self, order: SortOrder, units: DisplayUnits) -> Vec<TableRow> {
        self.sort_by(order.column, order.ascending)
            .into_iter()
            .map(|e| self.row(e, units))
            .collect()
    }

    /// Visible entities sorted by one column, on a copy of the listing.
    #[must_use]
    pub fn sort_by(&self, column: SortColumn, ascending: bool) -> Vec<&Entity> {
        let mut entities = self.visible_entities(&self.filter);
        entities.sort_by(|a, b| column.compare(a, b, ascending));
        entities
    }

    /// Detail panel for the singly-selected entity.
    #[must_use]
    pub fn selected_detail(&self, units: DisplayUnits) -> Option<SelectedDetail> {
        let entity = self.get(self.selection.selected_id()?)?;

        let (pilot_position, pilot_distance) = match entity.operator_position() {
            Some((lon, lat)) => (
                format!("{lat:.6}, {lon:.6}"),
                entity
                    .pilot_distance()
                    .map_or_else(|| "n/a".to_string(), |d| format!("{:.0} m", d.round())),
            ),
            None => ("n/a".to_string(), "n/a".to_string()),
        };

        let altitude = altitude_label(entity, units);

        Some(SelectedDetail {
            callsign: entity.flight.clone().unwrap_or_else(|| "Unknown".to_string()),
            id: entity.id().to_string(),
            mac: entity.mac.clone().unwrap_or_else(|| entity.id().to_string()),
            manufacturer: entity
                .manufacturer
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            source: detail_source(entity.kind).to_string(),
            rssi: rssi_label(entity.rssi).unwrap_or_else(|| "n/a".to_string()),
            messages: entity.messages.unwrap_or(0),
            seen: entity
                .seen
                .map_or_else(|| "n/a".to_string(), |s| format!("{s:.1}s ago")),
            position: entity.position.map_or_else(
                || "n/a".to_string(),
                |(lon, lat)| format!("{lat:.6}, {lon:.6}"),
            ),
            altitude: if altitude.is_empty() { "n/a".to_string() } else { altitude },
            speed: format_speed_long(entity.ground_speed, units),
            vertical_rate: format_vert_rate_long(entity.vertical_rate, units),
            track: format_track_long(entity.track),
            site_distance: format_distance_long(entity.site_distance, units, 1),
            pilot_position,
            pilot_distance,
        })
    }

    /// Hover summary, suppressed when the hovered entity is the selected one.
    #[must_use]
    pub fn highlighted_detail(&self) -> Option<HighlightDetail> {
        let entity = self.get(self.highlighted()?)?;
        let source = match entity.kind {
            EntityKind::Unknown => "n/a",
            kind => kind.source_label(),
        };

        Some(HighlightDetail {
            callsign: entity.flight.clone().unwrap_or_else(|| "Unknown".to_string()),
            id: entity.id().to_string(),
            manufacturer: entity
                .manufacturer
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            kind: entity.kind.as_str().to_string(),
            altitude: metres_label(entity.altitude_m).unwrap_or_else(|| "n/a".to_string()),
            rssi: rssi_label(entity.rssi).unwrap_or_else(|| "n/a".to_string()),
            source: source.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{AircraftSnapshot, AltitudeValue, DeviceRecord};
    use crate::tracker::TrackerConfig;

    fn drone(hex: &str, rssi: Option<f64>, lat: f64) -> DeviceRecord {
        DeviceRecord {
            kind: Some(Some("drone".to_string())),
            manufacturer: Some(Some("DJI".to_string())),
            altitude_m: Some(Some(50.0)),
            rssi: Some(rssi),
            seen: Some(Some(0.4)),
            lat: Some(Some(lat)),
            lon: Some(Some(-80.155)),
            alt_baro: Some(Some(AltitudeValue::Feet(164.0))),
            ..DeviceRecord::new(hex)
        }
    }

    fn table(records: Vec<DeviceRecord>) -> EntityTable {
        let mut table = EntityTable::new(TrackerConfig::default());
        table.process_snapshot(&AircraftSnapshot {
            now: 10.0,
            messages: None,
            aircraft: records,
        });
        table
    }

    #[test]
    fn test_row_fields() {
        let table = table(vec![drone("abc", Some(-20.0), 25.78)]);
        let rows = table.rows(DisplayUnits::Metric);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.id, "abc");
        assert_eq!(row.manufacturer, "DJI");
        assert_eq!(row.altitude, "50 m");
        assert_eq!(row.rssi, "-20 dBm");
        assert_eq!(row.seen, "0s");
        assert_eq!(row.latitude, "25.780000");
        assert_eq!(row.longitude, "-80.155000");
        assert_eq!(row.kind, "drone");
        assert_eq!(row.color, "hsl(60,85%,50%)");
        assert!(!row.selected);
    }

    #[test]
    fn test_stats_and_title() {
        let mut pilot = DeviceRecord::new("abc_P");
        pilot.kind = Some(Some("pilot".to_string()));
        pilot.messages = Some(Some(3));
        let mut first = drone("abc", None, 25.0);
        first.messages = Some(Some(4));
        let table = table(vec![first, pilot]);

        let stats = table.stats();
        assert_eq!(stats.tracked, 1);
        assert_eq!(stats.with_position, 1);
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.title("SKY-SPY-Aware"), "1 drone - SKY-SPY-Aware");
        assert_eq!(Stats::default().title("X"), "0 drones - X");
    }

    #[test]
    fn test_sort_is_a_copy_with_missing_last() {
        let table = table(vec![
            drone("a", Some(-50.0), 25.0),
            drone("b", None, 25.1),
            drone("c", Some(-20.0), 25.2),
        ]);

        let ids = |v: Vec<&Entity>| v.iter().map(|e| e.id().to_string()).collect::<Vec<_>>();
        assert_eq!(ids(table.sort_by(SortColumn::Rssi, true)), ["a", "c", "b"]);
        assert_eq!(ids(table.sort_by(SortColumn::Rssi, false)), ["c", "a", "b"]);
        assert_eq!(ids(table.sort_by(SortColumn::Latitude, false)), ["c", "b", "a"]);

        // canonical order unchanged
        let canonical: Vec<_> = table.iter().map(|e| e.id().to_string()).collect();
        assert_eq!(canonical, ["a", "b", "c"]);
    }

    #[test]
    fn test_sort_ties_keep_insertion_order() {
        let table = table(vec![
            drone("z", None, 25.0),
            drone("y", None, 25.0),
            drone("x", None, 25.0),
        ]);
        let ids: Vec<_> = table
            .sort_by(SortColumn::Manufacturer, true)
            .iter()
            .map(|e| e.id().to_string())
            .collect();
        assert_eq!(ids, ["z", "y", "x"]);
    }

    #[test]
    fn test_sort_order_toggle() {
        let mut order = SortOrder::default();
        order.toggle(SortColumn::Id);
        assert!(!order.ascending);
        order.toggle(SortColumn::Rssi);
        assert_eq!(order.column, SortColumn::Rssi);
        assert!(order.ascending);
    }

    #[test]
    fn test_sort_column_names() {
        assert_eq!("RSSI".parse::<SortColumn>(), Ok(SortColumn::Rssi));
        assert_eq!("lat".parse::<SortColumn>(), Ok(SortColumn::Latitude));
        assert!("speed".parse::<SortColumn>().is_err());
    }

    #[test]
    fn test_selected_detail() {
        let mut record = drone("abc", Some(-20.0), 25.78);
        record.pilot_lat = Some(Some(25.781));
        record.pilot_long = Some(Some(-80.155));
        let mut table = table(vec![record]);
        assert!(table.selected_detail(DisplayUnits::Metric).is_none());

        table.select_by_key("abc", false);
        let detail = table.selected_detail(DisplayUnits::Metric).unwrap();
        assert_eq!(detail.callsign, "Unknown");
        assert_eq!(detail.mac, "abc");
        assert_eq!(detail.source, "Drone (Open Drone ID)");
        assert_eq!(detail.altitude, "50 m");
        assert_eq!(detail.seen, "0.4s ago");
        assert_eq!(detail.position, "25.780000, -80.155000");
        assert_eq!(detail.pilot_position, "25.781000, -80.155000");
        assert_eq!(detail.pilot_distance, "111 m");
    }

    #[test]
    fn test_highlighted_detail() {
        let mut table = table(vec![drone("abc", None, 25.0)]);
        table.highlight(Some("abc".to_string()));
        let detail = table.highlighted_detail().unwrap();
        assert_eq!(detail.source, "Open Drone ID");
        assert_eq!(detail.rssi, "n/a");

        table.select_by_key("abc", false);
        assert!(table.highlighted_detail().is_none());
    }
}
