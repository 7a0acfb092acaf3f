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

//! Drone tracking and state management.
//!
//! This module maintains the entity table from feed snapshots and emits change
//! events. Each cycle merges the snapshot into the table, derives tracks,
//! markers and lines, then evicts entities the feed stopped reporting.

mod entity;
mod scene;
mod selection;
mod view;

use std::collections::HashMap;

use log::{debug, info};
use tokio::sync::broadcast;

pub use entity::{haversine_distance_m, AltitudeFilter, Entity, EntityKind, TrackSegment};
pub use scene::{
    Feature, FeatureId, FeatureLayer, FeatureStyle, Geometry, Scene, ELASTIC_COLOR, OUTLINE_COLOR,
    PILOT_LINE_COLOR,
};
pub use selection::{SelectionState, UiEvent, ViewEffect};
pub use view::{HighlightDetail, SelectedDetail, SortColumn, SortOrder, Stats, TableRow};

use crate::format::ColorScheme;
use crate::protocol::AircraftSnapshot;

/// Feed-reported seconds of silence after which an entity is dropped.
pub const EVICTION_AGE_SECS: f64 = 120.0;

/// Events emitted by the table when entity state changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// A new entity was added to the table.
    EntityAdded(String),
    /// An entity received a position fix.
    PositionUpdated(String),
    /// An entity was evicted after going silent.
    EntityRemoved(String),
}

/// Configuration for the entity table.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Altitude filter for the listing.
    pub filter: AltitudeFilter,
    /// Marker palette.
    pub colors: ColorScheme,
    /// Receiver site as (longitude, latitude), for site distances.
    pub site: Option<(f64, f64)>,
    /// Eviction threshold on the feed-reported `seen` age.
    pub eviction_age_secs: f64,
    /// Draw drone-to-operator lines.
    pub pilot_lines: bool,
    /// Broadcast channel capacity for events.
    pub event_channel_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            filter: AltitudeFilter::default(),
            colors: ColorScheme::default(),
            site: None,
            eviction_age_secs: EVICTION_AGE_SECS,
            pilot_lines: true,
            event_channel_capacity: 256,
        }
    }
}

/// The authoritative collection of tracked entities.
///
/// Owns the entities and every map feature allocated for them. Readers get
/// shared references only; all mutation goes through the operations below.
pub struct EntityTable {
    entities: HashMap<String, Entity>,
    /// Ids in first-sighting order.
    order: Vec<String>,
    scene: Scene,
    selection: SelectionState,
    highlighted: Option<String>,
    follow_selected: bool,
    filter: AltitudeFilter,
    colors: ColorScheme,
    site: Option<(f64, f64)>,
    eviction_age_secs: f64,
    pilot_lines: bool,
    map_positioned: bool,
    last_update: Option<f64>,
    stats: Stats,
    event_tx: broadcast::Sender<TrackerEvent>,
}

impl std::fmt::Debug for EntityTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityTable")
            .field("entity_count", &self.entities.len())
            .field("selection", &self.selection)
            .field("last_update", &self.last_update)
            .finish_non_exhaustive()
    }
}

impl EntityTable {
    /// Create an empty table with the given configuration.
    #[must_use]
    pub fn new(config: TrackerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity);

        Self {
            entities: HashMap::new(),
            order: Vec::new(),
            scene: Scene::default(),
            selection: SelectionState::Unselected,
            highlighted: None,
            follow_selected: false,
            filter: config.filter,
            colors: config.colors,
            site: config.site,
            eviction_age_secs: config.eviction_age_secs,
            pilot_lines: config.pilot_lines,
            map_positioned: false,
            last_update: None,
            stats: Stats::default(),
            event_tx,
        }
    }

    /// Run one full cycle: merge, derive, evict.
    ///
    /// Returns the view effect of the cycle: a re-center on the followed
    /// entity when it moved, else the one-time re-center on the first drone
    /// with a position.
    pub fn process_snapshot(&mut self, snapshot: &AircraftSnapshot) -> ViewEffect {
        let moved = self.reconcile(snapshot);
        let effect = self.refresh_derived(&moved);
        self.evict_stale(snapshot.now);
        self.last_update = Some(snapshot.now);
        effect
    }

    /// Merge every record of a snapshot into the table.
    ///
    /// Unknown ids are created and appended to the canonical order. Nothing
    /// is removed here. Returns the ids that received a position fix.
    pub fn reconcile(&mut self, snapshot: &AircraftSnapshot) -> Vec<String> {
        let mut moved = Vec::new();

        for record in &snapshot.aircraft {
            let id = &record.hex;
            if !self.entities.contains_key(id) {
                let mut entity = Entity::new(id.clone());
                if self.selection == SelectionState::AllSelected {
                    entity.set_selected(true);
                }
                self.entities.insert(id.clone(), entity);
                self.order.push(id.clone());
                debug!("New entity {id}");
                let _ = self.event_tx.send(TrackerEvent::EntityAdded(id.clone()));
            }

            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            if entity.apply_update(record, snapshot.now) {
                entity.update_site_distance(self.site);
                moved.push(id.clone());
                let _ = self.event_tx.send(TrackerEvent::PositionUpdated(id.clone()));
            }
        }

        moved
    }

    /// Recompute tracks, features and stats after a merge.
    pub fn refresh_derived(&mut self, moved: &[String]) -> ViewEffect {
        let mut stats = Stats::default();

        for id in &self.order {
            let Some(entity) = self.entities.get_mut(id) else {
                continue;
            };
            let did_move = moved.contains(id);
            entity.append_track_point();
            entity.update_marker(&mut self.scene.markers, &self.colors, did_move);
            entity.update_lines(&mut self.scene.trails, &self.colors);

            if entity.kind != EntityKind::Pilot {
                stats.tracked += 1;
                stats.with_position += usize::from(entity.position.is_some());
                stats.total_messages += entity.messages.unwrap_or(0);
            }
        }
        self.stats = stats;

        self.rebuild_pilot_lines();

        if self.follow_selected {
            let followed = self
                .selection
                .selected_id()
                .filter(|id| moved.iter().any(|m| m == id))
                .and_then(|id| self.entities.get(id))
                .and_then(|e| e.position);
            if let Some(position) = followed {
                return ViewEffect::Recenter(position);
            }
        }

        if self.map_positioned {
            return ViewEffect::None;
        }
        let first_drone = self
            .iter()
            .find(|e| e.kind == EntityKind::Drone && e.position.is_some())
            .and_then(|e| e.position);
        match first_drone {
            Some(position) => {
                self.map_positioned = true;
                ViewEffect::Recenter(position)
            }
            None => ViewEffect::None,
        }
    }

    fn rebuild_pilot_lines(&mut self) {
        self.scene.pilot_lines.clear();
        if !self.pilot_lines {
            return;
        }

        for id in &self.order {
            let Some(entity) = self.entities.get(id) else {
                continue;
            };
            if entity.kind != EntityKind::Drone {
                continue;
            }
            if let (Some(drone), Some(pilot)) = (entity.position, entity.operator_position()) {
                self.scene.pilot_lines.add(Feature {
                    owner: id.clone(),
                    geometry: Geometry::LineString(vec![drone, pilot]),
                    style: FeatureStyle::Stroke {
                        color: PILOT_LINE_COLOR.to_string(),
                        width: 1.5,
                        dash: Some([6, 4]),
                    },
                });
            }
        }
    }

    /// Remove every entity whose reported age at feed time `now` exceeds
    /// the threshold.
    ///
    /// Entities missing from recent snapshots age with the feed clock, so
    /// they leave even though no record refreshes their `seen`. Features
    /// owned by an evicted entity are released before it leaves the table.
    /// Returns the removed ids.
    pub fn evict_stale(&mut self, now: f64) -> Vec<String> {
        let threshold = self.eviction_age_secs;
        let stale: Vec<String> = self
            .order
            .iter()
            .filter(|id| {
                self.entities
                    .get(id.as_str())
                    .and_then(|e| e.reported_age(now))
                    .is_some_and(|age| age > threshold)
            })
            .cloned()
            .collect();

        for id in &stale {
            if let Some(mut entity) = self.entities.remove(id) {
                let released = entity.destroy(&mut self.scene)
                    + self.scene.pilot_lines.remove_owned(id);
                info!("Evicted {id}, released {released} map features");
            }
            if self.selection.selected_id() == Some(id.as_str()) {
                self.selection = SelectionState::Unselected;
                self.follow_selected = false;
            }
            if self.highlighted.as_deref() == Some(id.as_str()) {
                self.highlighted = None;
            }
            let _ = self.event_tx.send(TrackerEvent::EntityRemoved(id.clone()));
        }

        if !stale.is_empty() {
            self.order.retain(|id| self.entities.contains_key(id));
        }
        stale
    }

    /// Non-filtered, non-pilot entities in canonical order.
    #[must_use]
    pub fn visible_entities(&self, filter: &AltitudeFilter) -> Vec<&Entity> {
        self.iter()
            .filter(|e| e.kind != EntityKind::Pilot && !e.is_filtered(filter))
            .collect()
    }

    /// All entities in canonical order, pilots included.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.order.iter().filter_map(|id| self.entities.get(id))
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Map features owned by the table.
    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        self.stats
    }

    #[must_use]
    pub fn filter(&self) -> &AltitudeFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: AltitudeFilter) {
        self.filter = filter;
    }

    #[must_use]
    pub fn colors(&self) -> &ColorScheme {
        &self.colors
    }

    /// Set the receiver site; takes effect on the next position fix.
    pub fn set_site(&mut self, site: Option<(f64, f64)>) {
        self.site = site;
    }

    #[must_use]
    pub fn site(&self) -> Option<(f64, f64)> {
        self.site
    }

    /// Feed timestamp of the last processed snapshot.
    #[must_use]
    pub fn last_update(&self) -> Option<f64> {
        self.last_update
    }

    #[must_use]
    pub fn is_map_positioned(&self) -> bool {
        self.map_positioned
    }

    /// Subscribe to table events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TrackerEvent> {
        self.event_tx.subscribe()
    }
}
