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

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::MarkerAppearance;
use crate::geo::GeoPoint;
use crate::surface::MarkerHandle;

/// Per-key state for a displayed marker.
#[derive(Debug, Clone)]
pub struct RegistryEntry<E> {
    pub handle: MarkerHandle,
    /// Last-known entity data, kept while the key is absent.
    pub entity: E,
    pub position: GeoPoint,
    pub appearance: MarkerAppearance,
    /// Consecutive unprotected polls in which the key was absent.
    pub miss_count: u32,
    /// Removal is suppressed until this instant.
    pub protected_until: Option<DateTime<Utc>>,
}

/// Displayed markers keyed by entity key, plus the current selection.
///
/// Only the reconciler mutates the registry; everyone else gets read access.
#[derive(Debug, Clone)]
pub struct MarkerRegistry<E> {
    entries: HashMap<String, RegistryEntry<E>>,
    selected: Option<String>,
}

impl<E> Default for MarkerRegistry<E> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            selected: None,
        }
    }
}

impl<E> MarkerRegistry<E> {
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RegistryEntry<E>> {
        self.entries.get(key)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, sorted for deterministic iteration.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegistryEntry<E>)> {
        self.entries.iter()
    }

    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    #[must_use]
    pub fn is_selected(&self, key: &str) -> bool {
        self.selected.as_deref() == Some(key)
    }

    /// Selected, or inside its protection window at `now`.
    #[must_use]
    pub fn is_protected(&self, key: &str, now: DateTime<Utc>) -> bool {
        if self.is_selected(key) {
            return true;
        }
        self.entries
            .get(key)
            .and_then(|entry| entry.protected_until)
            .is_some_and(|until| now < until)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut RegistryEntry<E>> {
        self.entries.get_mut(key)
    }

    pub(crate) fn insert(&mut self, key: String, entry: RegistryEntry<E>) {
        self.entries.insert(key, entry);
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<RegistryEntry<E>> {
        if self.is_selected(key) {
            self.selected = None;
        }
        self.entries.remove(key)
    }

    pub(crate) fn set_selected(&mut self, key: Option<String>) -> Option<String> {
        std::mem::replace(&mut self.selected, key)
    }

    pub(crate) fn drain(&mut self) -> Vec<(String, RegistryEntry<E>)> {
        self.selected = None;
        self.entries.drain().collect()
    }
}
