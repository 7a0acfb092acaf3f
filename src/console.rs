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

//! Terminal front end.
//!
//! Renders the table after every cycle and turns stdin lines into poller
//! commands. The map is not drawn; its center is tracked and reported so
//! recenter and reset effects stay visible.

use std::io::{self, Write};

use log::warn;
use serde::Serialize;
use skyspy_client::poll::{ActivityLog, DisplayCommand, FeedHealth, FeedStatus, PollerCommand, View};
use skyspy_client::tracker::{EntityTable, SortColumn, SortOrder, TableRow, UiEvent, ViewEffect};
use skyspy_client::DisplayUnits;

use crate::config::AppConfig;

pub const HELP: &str = "\
commands:
  select <id>     select a row
  follow <id>     select a row and keep the map on it
  click [id]      map click on a marker, or on empty map
  hover [id]      highlight a marker, or clear the highlight
  deselect        clear the selection
  all             toggle select-all
  reset           reset the map view
  sort <column>   order by id, callsign, manufacturer, altitude, rssi, seen, lat, lon or kind
  units <units>   metric, imperial or nautical
  restart         restart the sensor
  quit";

/// A parsed line of console input.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Command(PollerCommand),
    Help,
    Quit,
}

/// Parse one line of input. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<ConsoleInput>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };
    let arg = words.next().map(str::to_string);
    if words.next().is_some() {
        return Err(format!("too many arguments for '{verb}'"));
    }

    let required = |arg: Option<String>| arg.ok_or_else(|| format!("'{verb}' needs an argument"));
    let ui = |event: UiEvent| -> Result<Option<ConsoleInput>, String> {
        Ok(Some(ConsoleInput::Command(PollerCommand::Ui(event))))
    };

    match verb.to_ascii_lowercase().as_str() {
        "select" => ui(UiEvent::SelectRow(required(arg)?)),
        "follow" => ui(UiEvent::FollowRow(required(arg)?)),
        "click" => ui(UiEvent::MapClick(arg)),
        "hover" => ui(UiEvent::PointerMove(arg)),
        "deselect" => ui(UiEvent::DeselectAll),
        "all" => ui(UiEvent::ToggleSelectAll),
        "reset" => ui(UiEvent::ResetMap),
        "sort" => {
            let column = required(arg)?.parse::<SortColumn>()?;
            Ok(Some(ConsoleInput::Command(PollerCommand::Display(
                DisplayCommand::Sort(column),
            ))))
        }
        "units" => {
            let units = required(arg)?.parse::<DisplayUnits>()?;
            Ok(Some(ConsoleInput::Command(PollerCommand::Display(
                DisplayCommand::Units(units),
            ))))
        }
        "restart" => Ok(Some(ConsoleInput::Command(PollerCommand::RestartSensor))),
        "help" | "?" => Ok(Some(ConsoleInput::Help)),
        "quit" | "exit" | "q" => Ok(Some(ConsoleInput::Quit)),
        other => Err(format!("unknown command '{other}' (try 'help')")),
    }
}

fn health_label(status: &FeedStatus) -> String {
    let health = match &status.health {
        FeedHealth::Live => "live".to_string(),
        FeedHealth::FetchFailed(error) => format!("error: {error}"),
        FeedHealth::Stale { cycles } => format!("stale ({cycles} cycles)"),
    };
    match status.last_success {
        Some(at) => format!("{health}, last update {}", at.format("%H:%M:%S")),
        None => health,
    }
}

#[derive(Serialize)]
struct Frame<'a> {
    title: String,
    feed: String,
    center: (f64, f64),
    selected: Option<&'a str>,
    rows: Vec<TableRow>,
}

/// Text renderer over any writer.
#[derive(Debug)]
pub struct ConsoleView<W: Write> {
    out: W,
    units: DisplayUnits,
    /// `None` lists entities in arrival order until a sort is picked.
    order: Option<SortOrder>,
    json: bool,
    page_name: String,
    count_in_title: bool,
    default_center: (f64, f64),
    center: (f64, f64),
    activity_seen: u64,
}

impl<W: Write> ConsoleView<W> {
    pub fn new(out: W, config: &AppConfig, json: bool) -> Self {
        Self {
            out,
            units: config.display_units,
            order: None,
            json,
            page_name: config.page_name.clone(),
            count_in_title: config.count_in_title,
            default_center: config.default_center(),
            center: config.default_center(),
            activity_seen: 0,
        }
    }

    fn title(&self, table: &EntityTable) -> String {
        if self.count_in_title {
            table.stats().title(&self.page_name)
        } else {
            self.page_name.clone()
        }
    }

    fn draw(&mut self, table: &EntityTable, status: &FeedStatus) -> io::Result<()> {
        let rows = match self.order {
            Some(order) => table.sorted_rows(order, self.units),
            None => table.rows(self.units),
        };

        if self.json {
            let frame = Frame {
                title: self.title(table),
                feed: health_label(status),
                center: self.center,
                selected: table.selection().selected_id(),
                rows,
            };
            let line = serde_json::to_string(&frame).map_err(io::Error::other)?;
            return writeln!(self.out, "{line}");
        }

        let stats = table.stats();
        writeln!(
            self.out,
            "== {} == feed {} | {} with position | {} messages",
            self.title(table),
            health_label(status),
            stats.with_position,
            stats.total_messages
        )?;
        writeln!(
            self.out,
            "  {:<14} {:<10} {:<14} {:>10} {:>12} {:>10} {:>9} {:>6} {:>11} {:>11} {:<7}",
            "ID", "CALLSIGN", "MANUFACTURER", "ALT", "SPEED", "DIST", "RSSI", "SEEN", "LAT", "LON", "KIND"
        )?;
        for row in &rows {
            let mark = if row.selected { '*' } else { ' ' };
            writeln!(
                self.out,
                "{mark} {:<14} {:<10} {:<14} {:>10} {:>12} {:>10} {:>9} {:>6} {:>11} {:>11} {:<7}",
                row.id,
                row.callsign,
                row.manufacturer,
                row.altitude,
                row.speed,
                row.distance,
                row.rssi,
                row.seen,
                row.latitude,
                row.longitude,
                row.kind
            )?;
        }

        if let Some(detail) = table.selected_detail(self.units) {
            writeln!(
                self.out,
                "selected {} ({}) {} via {} | pos {} alt {} spd {} vr {} trk {} | site {} | pilot {} {}",
                detail.callsign,
                detail.id,
                detail.manufacturer,
                detail.source,
                detail.position,
                detail.altitude,
                detail.speed,
                detail.vertical_rate,
                detail.track,
                detail.site_distance,
                detail.pilot_position,
                detail.pilot_distance
            )?;
        }
        if let Some(hover) = table.highlighted_detail() {
            writeln!(
                self.out,
                "hover {} ({}) {} {} alt {} rssi {} via {}",
                hover.callsign,
                hover.id,
                hover.manufacturer,
                hover.kind,
                hover.altitude,
                hover.rssi,
                hover.source
            )?;
        }
        self.out.flush()
    }

    fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            warn!("Console write failed: {e}");
        }
    }

    /// Current map center as (longitude, latitude).
    pub fn center(&self) -> (f64, f64) {
        self.center
    }
}

impl<W: Write> View for ConsoleView<W> {
    fn render(&mut self, table: &EntityTable, status: &FeedStatus) {
        if let Err(e) = self.draw(table, status) {
            warn!("Console write failed: {e}");
        }
    }

    fn apply_effect(&mut self, effect: ViewEffect) {
        match effect {
            ViewEffect::None => {}
            ViewEffect::Recenter((lon, lat)) => {
                self.center = (lon, lat);
                self.write_line(&format!("map centered on {lat:.6}, {lon:.6}"));
            }
            ViewEffect::ResetView => {
                self.center = self.default_center;
                self.write_line("map view reset");
            }
        }
    }

    fn activity(&mut self, log: &ActivityLog) {
        // the log restarts its count after a reset
        if log.appended() < self.activity_seen {
            self.activity_seen = 0;
        }
        let fresh = usize::try_from(log.appended() - self.activity_seen).unwrap_or(usize::MAX);
        self.activity_seen = log.appended();
        let skip = log.len().saturating_sub(fresh);
        let lines: Vec<String> = log.lines().skip(skip).map(|l| format!("| {l}")).collect();
        for line in lines {
            self.write_line(&line);
        }
    }

    fn display(&mut self, command: DisplayCommand) {
        match command {
            DisplayCommand::Units(units) => self.units = units,
            DisplayCommand::Sort(column) => {
                self.order = Some(match self.order {
                    Some(mut order) => {
                        order.toggle(column);
                        order
                    }
                    None => SortOrder {
                        column,
                        ascending: true,
                    },
                });
            }
        }
    }

    fn notice(&mut self, message: &str) {
        self.write_line(&format!(">> {message}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use skyspy_client::protocol::{decode_document, ActivityEntry, ActivityResponse, AircraftSnapshot};
    use skyspy_client::tracker::TrackerConfig;

    fn table() -> EntityTable {
        let doc = br#"{"now":100,"messages":7,"aircraft":[
            {"hex":"abc123","flight":"DJI1","lat":25.78,"lon":-80.155,"alt_baro":164,"seen":0,"rssi":-60.5},
            {"hex":"def456","seen":1}
        ]}"#;
        let snapshot: AircraftSnapshot = decode_document(doc).unwrap().unwrap();
        let mut table = EntityTable::new(TrackerConfig::default());
        table.process_snapshot(&snapshot);
        table
    }

    fn live() -> FeedStatus {
        FeedStatus {
            health: FeedHealth::Live,
            stale_cycles: 0,
            last_success: Some(Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 5).unwrap()),
            skipped_ticks: 0,
        }
    }

    fn view(json: bool) -> ConsoleView<Vec<u8>> {
        ConsoleView::new(Vec::new(), &AppConfig::default(), json)
    }

    fn output(view: &ConsoleView<Vec<u8>>) -> String {
        String::from_utf8(view.out.clone()).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("   "), Ok(None));
        assert_eq!(
            parse_command("select abc123"),
            Ok(Some(ConsoleInput::Command(PollerCommand::Ui(UiEvent::SelectRow(
                "abc123".to_string()
            )))))
        );
        assert_eq!(
            parse_command("click"),
            Ok(Some(ConsoleInput::Command(PollerCommand::Ui(UiEvent::MapClick(None)))))
        );
        assert_eq!(
            parse_command("UNITS imperial"),
            Ok(Some(ConsoleInput::Command(PollerCommand::Display(
                DisplayCommand::Units(DisplayUnits::Imperial)
            ))))
        );
        assert_eq!(
            parse_command("sort rssi"),
            Ok(Some(ConsoleInput::Command(PollerCommand::Display(
                DisplayCommand::Sort(SortColumn::Rssi)
            ))))
        );
        assert_eq!(
            parse_command("restart"),
            Ok(Some(ConsoleInput::Command(PollerCommand::RestartSensor)))
        );
        assert_eq!(parse_command("q"), Ok(Some(ConsoleInput::Quit)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("select").is_err());
        assert!(parse_command("select a b").is_err());
        assert!(parse_command("units furlongs").is_err());
        assert!(parse_command("fly").is_err());
    }

    #[test]
    fn test_text_render() {
        let table = table();
        let mut view = view(false);
        view.render(&table, &live());
        let text = output(&view);

        assert!(text.starts_with("== 2 drones - SKY-SPY-Aware == feed live, last update 12:30:05"));
        assert!(text.contains("abc123"));
        assert!(text.contains("DJI1"));
        assert!(text.contains("def456"));
    }

    #[test]
    fn test_json_render() {
        let table = table();
        let mut view = view(true);
        view.render(&table, &live());
        let frame: serde_json::Value = serde_json::from_str(output(&view).trim()).unwrap();

        assert_eq!(frame["title"], "2 drones - SKY-SPY-Aware");
        assert_eq!(frame["rows"].as_array().unwrap().len(), 2);
        assert_eq!(frame["rows"][0]["id"], "abc123");
    }

    #[test]
    fn test_effects_move_center() {
        let mut view = view(false);
        view.apply_effect(ViewEffect::Recenter((-80.0, 25.0)));
        assert_eq!(view.center(), (-80.0, 25.0));
        view.apply_effect(ViewEffect::ResetView);
        assert_eq!(view.center(), AppConfig::default().default_center());
    }

    #[test]
    fn test_activity_prints_only_new_lines() {
        let mut view = view(false);
        let mut log = ActivityLog::default();
        let entry = |seq, text: &str| ActivityEntry::Sequenced {
            seq,
            text: text.to_string(),
        };

        log.ingest(&ActivityResponse {
            lines: vec![entry(1, "boot")],
        });
        view.activity(&log);
        log.ingest(&ActivityResponse {
            lines: vec![entry(2, "scan")],
        });
        view.activity(&log);
        assert_eq!(output(&view), "| boot\n| scan\n");

        log.reset();
        log.ingest(&ActivityResponse {
            lines: vec![entry(1, "again")],
        });
        view.activity(&log);
        assert!(output(&view).ends_with("| again\n"));
    }

    #[test]
    fn test_sort_toggle() {
        let mut view = view(false);
        assert_eq!(view.order, None);
        view.display(DisplayCommand::Sort(SortColumn::Rssi));
        assert_eq!(
            view.order,
            Some(SortOrder {
                column: SortColumn::Rssi,
                ascending: true
            })
        );
        view.display(DisplayCommand::Sort(SortColumn::Rssi));
        assert_eq!(
            view.order,
            Some(SortOrder {
                column: SortColumn::Rssi,
                ascending: false
            })
        );
    }

    #[test]
    fn test_rows_keep_arrival_order_until_sorted() {
        let doc = br#"{"now":1,"aircraft":[{"hex":"zzz","seen":0},{"hex":"aaa","seen":0}]}"#;
        let snapshot: AircraftSnapshot = decode_document(doc).unwrap().unwrap();
        let mut table = EntityTable::new(TrackerConfig::default());
        table.process_snapshot(&snapshot);

        let mut view = view(true);
        view.render(&table, &live());
        let frame: serde_json::Value = serde_json::from_str(output(&view).trim()).unwrap();
        assert_eq!(frame["rows"][0]["id"], "zzz");
        assert_eq!(frame["rows"][1]["id"], "aaa");

        view.out.clear();
        view.display(DisplayCommand::Sort(SortColumn::Id));
        view.render(&table, &live());
        let frame: serde_json::Value = serde_json::from_str(output(&view).trim()).unwrap();
        assert_eq!(frame["rows"][0]["id"], "aaa");
    }
}
