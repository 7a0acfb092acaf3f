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

//! Selection and highlight state.
//!
//! Selection pins an entity (detail panel, trail drawn); highlight is the
//! transient hover target. Both are driven by [`UiEvent`] values carrying
//! the entity id, so the state machine has no tie to a rendering widget.

use log::debug;

use super::EntityTable;

/// Which entities are selected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Unselected,
    Selected(String),
    /// Every entity selected; bypasses single-selection exclusivity.
    AllSelected,
}

impl SelectionState {
    /// The singly-selected id, if any.
    #[must_use]
    pub fn selected_id(&self) -> Option<&str> {
        match self {
            Self::Selected(id) => Some(id),
            _ => None,
        }
    }
}

/// User input routed to the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Single click on a table row or marker.
    SelectRow(String),
    /// Double click on a table row: select and keep the map on it.
    FollowRow(String),
    /// Click on the map, with the id of the marker under the pointer.
    MapClick(Option<String>),
    /// Pointer moved over the map.
    PointerMove(Option<String>),
    DeselectAll,
    ToggleSelectAll,
    ResetMap,
}

/// Side effect the presentation layer should apply to the map view.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ViewEffect {
    #[default]
    None,
    /// Center the map on (longitude, latitude).
    Recenter((f64, f64)),
    /// Return to the configured default center and zoom.
    ResetView,
}

impl EntityTable {
    /// Route a user event through the state machine.
    pub fn dispatch(&mut self, event: UiEvent) -> ViewEffect {
        debug!("UI event: {event:?}");
        match event {
            UiEvent::SelectRow(id) => self.select_by_key(&id, false),
            UiEvent::FollowRow(id) => self.select_by_key(&id, true),
            UiEvent::MapClick(Some(id)) => self.select_by_key(&id, false),
            UiEvent::MapClick(None) | UiEvent::DeselectAll => {
                self.deselect_all();
                ViewEffect::None
            }
            UiEvent::PointerMove(id) => {
                self.highlight(id);
                ViewEffect::None
            }
            UiEvent::ToggleSelectAll => {
                self.toggle_select_all();
                ViewEffect::None
            }
            UiEvent::ResetMap => self.reset_map(),
        }
    }

    /// Select one entity, deselecting whatever was selected before.
    ///
    /// An id not in the table leaves nothing selected. With `follow` and a
    /// known position the map is asked to re-center.
    pub fn select_by_key(&mut self, id: &str, follow: bool) -> ViewEffect {
        self.release_selection();

        let Some(entity) = self.entities.get_mut(id) else {
            debug!("Select ignored, {id} is not tracked");
            self.follow_selected = false;
            return ViewEffect::None;
        };

        entity.set_selected(true);
        entity.update_icon(&mut self.scene.markers, &self.colors);
        entity.update_lines(&mut self.scene.trails, &self.colors);
        self.selection = SelectionState::Selected(id.to_string());
        self.follow_selected = follow;

        match entity.position {
            Some(position) if follow => ViewEffect::Recenter(position),
            _ => ViewEffect::None,
        }
    }

    /// Return to `Unselected` from any state.
    pub fn deselect_all(&mut self) {
        self.release_selection();
    }

    /// Flip between selecting every entity and selecting none.
    pub fn toggle_select_all(&mut self) {
        if self.selection == SelectionState::AllSelected {
            self.release_selection();
            return;
        }

        self.release_selection();
        for entity in self.entities.values_mut() {
            entity.set_selected(true);
            entity.update_icon(&mut self.scene.markers, &self.colors);
            entity.update_lines(&mut self.scene.trails, &self.colors);
        }
        self.selection = SelectionState::AllSelected;
    }

    /// Set the hover target. Owns no resources, so nothing is released.
    pub fn highlight(&mut self, id: Option<String>) {
        self.highlighted = id;
    }

    /// The hover target, unless it is also the selected entity.
    #[must_use]
    pub fn highlighted(&self) -> Option<&str> {
        let id = self.highlighted.as_deref()?;
        if self.selection.selected_id() == Some(id) || !self.entities.contains_key(id) {
            return None;
        }
        Some(id)
    }

    /// Drop the selection and let the next snapshot re-center the map.
    pub fn reset_map(&mut self) -> ViewEffect {
        self.map_positioned = false;
        self.deselect_all();
        ViewEffect::ResetView
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    #[must_use]
    pub fn follow_selected(&self) -> bool {
        self.follow_selected
    }

    fn release_selection(&mut self) {
        for entity in self.entities.values_mut().filter(|e| e.is_selected()) {
            entity.set_selected(false);
            entity.clear_lines(&mut self.scene.trails);
            entity.update_icon(&mut self.scene.markers, &self.colors);
        }
        self.selection = SelectionState::Unselected;
        self.follow_selected = false;
    }
}
