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

//! Client library for polled drone detection feeds.
//!
//! This library ingests SkyAware-style `aircraft.json` snapshots extended
//! with Remote ID drone fields and keeps the presentation state a dashboard
//! needs. It is split into layers that can be used on their own:
//!
//! - **Protocol layer**: feed document types and parsing
//! - **Format layer**: unit conversion, display strings and altitude colors
//! - **Tracker layer**: the entity table, tracks, map features, selection
//! - **Poll layer**: fixed-interval fetching with overlap and staleness rules
//!
//! # Quick Start
//!
//! ```no_run
//! use skyspy_client::{
//!     EntityTable, FeedStatus, HttpFeed, Poller, PollerConfig, TrackerConfig, View,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! struct Print;
//!
//! impl View for Print {
//!     fn render(&mut self, table: &EntityTable, status: &FeedStatus) {
//!         println!("{} entities, feed {:?}", table.len(), status.health);
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let table = EntityTable::new(TrackerConfig::default());
//!     let poller = Poller::new(HttpFeed::new("http://localhost:8080/"), table, PollerConfig::default());
//!     let (_commands, rx) = tokio::sync::mpsc::channel(16);
//!     poller.run(&mut Print, rx, CancellationToken::new()).await;
//! }
//! ```
//!
//! # Tracker Layer Only
//!
//! ```
//! use skyspy_client::protocol::{decode_document, AircraftSnapshot};
//! use skyspy_client::tracker::{EntityTable, TrackerConfig};
//!
//! let doc = br#"{"now":100,"aircraft":[{"hex":"abc123","lat":25.78,"lon":-80.155,"alt_baro":164,"seen":0}]}"#;
//! let snapshot: AircraftSnapshot = decode_document(doc).unwrap().unwrap();
//!
//! let mut table = EntityTable::new(TrackerConfig::default());
//! table.process_snapshot(&snapshot);
//!
//! let entity = table.get("abc123").unwrap();
//! println!("{} is drawn in {}", entity.id(), entity.marker_color(table.colors()));
//! ```

pub mod format;
pub mod poll;
pub mod protocol;
pub mod tracker;

pub use format::{ColorScheme, DisplayUnits, Hsl};
pub use poll::{
    ActivityLog, Clock, DisplayCommand, FeedHealth, FeedSource, FeedStatus, FetchError, HttpFeed,
    ManualClock, Poller, PollerCommand, PollerConfig, SystemClock, View,
};
pub use protocol::{AircraftSnapshot, DeviceRecord, ParseError, Protocol, SkyAwareParser};
pub use tracker::{
    AltitudeFilter, Entity, EntityKind, EntityTable, SelectionState, TrackerConfig, TrackerEvent,
    UiEvent, ViewEffect,
};
