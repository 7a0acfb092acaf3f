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

//! Map feature layers owned by the entity table.
//!
//! Markers, trail polylines and pilot lines are allocated here on behalf of
//! entities and must be released before their owner leaves the table. A
//! renderer reads the layers; it never allocates or frees features itself.

use std::collections::BTreeMap;

use super::entity::EntityKind;
use crate::format::Hsl;

/// Handle to a feature inside one [`FeatureLayer`].
pub type FeatureId = u64;

/// Outline color for device icons.
pub const OUTLINE_COLOR: &str = "#000000";

/// Stroke color of the dashed line joining a drone to its operator.
pub const PILOT_LINE_COLOR: &str = "rgba(0, 206, 209, 0.6)";

/// Stroke color of the elastic segment drawn on selected trails.
pub const ELASTIC_COLOR: &str = "#808080";

/// Feature geometry in (longitude, latitude) degrees.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point((f64, f64)),
    LineString(Vec<(f64, f64)>),
}

/// How a feature is drawn.
#[derive(Debug, Clone, PartialEq)]
pub enum FeatureStyle {
    Icon {
        icon: EntityKind,
        fill: Hsl,
        outline: &'static str,
    },
    Stroke {
        color: String,
        width: f32,
        dash: Option<[u8; 2]>,
    },
}

/// One drawable feature with the id of the entity that owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub owner: String,
    pub geometry: Geometry,
    pub style: FeatureStyle,
}

/// A collection of features with stable ids.
#[derive(Debug, Default)]
pub struct FeatureLayer {
    features: BTreeMap<FeatureId, Feature>,
    next_id: FeatureId,
}

impl FeatureLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, feature: Feature) -> FeatureId {
        let id = self.next_id;
        self.next_id += 1;
        self.features.insert(id, feature);
        id
    }

    /// Remove a feature; a second removal of the same id yields `None`.
    pub(crate) fn remove(&mut self, id: FeatureId) -> Option<Feature> {
        self.features.remove(&id)
    }

    pub(crate) fn set_geometry(&mut self, id: FeatureId, geometry: Geometry) {
        if let Some(feature) = self.features.get_mut(&id) {
            feature.geometry = geometry;
        }
    }

    pub(crate) fn set_style(&mut self, id: FeatureId, style: FeatureStyle) {
        if let Some(feature) = self.features.get_mut(&id) {
            feature.style = style;
        }
    }

    /// Remove every feature owned by `owner`. Returns how many were removed.
    pub(crate) fn remove_owned(&mut self, owner: &str) -> usize {
        let before = self.features.len();
        self.features.retain(|_, f| f.owner != owner);
        before - self.features.len()
    }

    pub(crate) fn clear(&mut self) {
        self.features.clear();
    }

    #[must_use]
    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Features in allocation order.
    pub fn iter(&self) -> impl Iterator<Item = (FeatureId, &Feature)> {
        self.features.iter().map(|(id, f)| (*id, f))
    }

    /// Number of features owned by the given entity.
    #[must_use]
    pub fn owned_by(&self, owner: &str) -> usize {
        self.features.values().filter(|f| f.owner == owner).count()
    }
}

/// All feature layers of the map, bottom to top: pilot lines, trails, icons.
#[derive(Debug, Default)]
pub struct Scene {
    pub pilot_lines: FeatureLayer,
    pub trails: FeatureLayer,
    pub markers: FeatureLayer,
}

impl Scene {
    /// Total features owned by an entity across every layer.
    #[must_use]
    pub fn owned_by(&self, owner: &str) -> usize {
        self.pilot_lines.owned_by(owner) + self.trails.owned_by(owner) + self.markers.owned_by(owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(owner: &str) -> Feature {
        Feature {
            owner: owner.to_string(),
            geometry: Geometry::Point((1.0, 2.0)),
            style: FeatureStyle::Stroke {
                color: ELASTIC_COLOR.to_string(),
                width: 1.0,
                dash: None,
            },
        }
    }

    #[test]
    fn test_remove_is_exactly_once() {
        let mut layer = FeatureLayer::new();
        let id = layer.add(point("abc"));
        assert_eq!(layer.len(), 1);
        assert!(layer.remove(id).is_some());
        assert!(layer.remove(id).is_none());
        assert!(layer.is_empty());
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut layer = FeatureLayer::new();
        let first = layer.add(point("a"));
        layer.remove(first);
        let second = layer.add(point("b"));
        assert_ne!(first, second);
    }

    #[test]
    fn test_owned_by_counts_per_owner() {
        let mut scene = Scene::default();
        scene.markers.add(point("a"));
        scene.trails.add(point("a"));
        scene.trails.add(point("b"));
        assert_eq!(scene.owned_by("a"), 2);
        assert_eq!(scene.owned_by("b"), 1);
        assert_eq!(scene.owned_by("c"), 0);
    }
}
