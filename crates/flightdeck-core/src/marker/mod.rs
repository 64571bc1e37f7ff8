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

//! Marker reconciliation.
//!
//! Keeps the markers on a [`RenderSurface`] in step with the latest snapshot of
//! live entities while riding out transient gaps in the polling source:
//!
//! - keys present in the snapshot are created or updated in place
//! - absent keys accumulate a miss count and are removed once it reaches
//!   [`MarkerConfig::max_miss_count`]
//! - the selected key, and any key inside its post-selection protection
//!   window, is kept with its last-known data and does not accumulate misses
//!
//! Large snapshots can be applied in chunks via [`MarkerReconciler::begin_pass`]
//! and [`MarkerReconciler::advance`]; the final registry state does not depend
//! on the chunk size.

mod pass;
mod registry;
mod visual;

pub use pass::{ReconcilePass, ReconcileReport};
pub use registry::{MarkerRegistry, RegistryEntry};
pub use visual::{is_on_ground, MarkerAppearance};

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::entity::LiveEntity;
use crate::geo::GeoPoint;
use crate::palette::AltitudePalette;
use crate::surface::RenderSurface;

/// Tunables for marker reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerConfig {
    /// Consecutive unprotected absences before a marker is removed.
    pub max_miss_count: u32,
    /// Seconds a marker is shielded from removal after each selection.
    pub protection_window_secs: i64,
    /// Aircraft below this altitude (feet) may be on the ground.
    pub ground_altitude_ft: f64,
    /// Aircraft below this ground speed (knots) may be on the ground.
    pub ground_speed_kts: f64,
    /// Entities applied per chunk when a pass is batched.
    pub batch_size: usize,
    /// Broadcast channel capacity for selection events.
    pub event_channel_capacity: usize,
    pub palette: AltitudePalette,
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            max_miss_count: 3,
            protection_window_secs: 60,
            ground_altitude_ft: 100.0,
            ground_speed_kts: 50.0,
            batch_size: 200,
            event_channel_capacity: 64,
            palette: AltitudePalette::default(),
        }
    }
}

impl MarkerConfig {
    fn protection_window(&self) -> Duration {
        Duration::try_seconds(self.protection_window_secs.max(0)).unwrap_or_else(Duration::zero)
    }
}

/// Emitted when the selection changes.
#[derive(Debug, Clone)]
pub enum SelectionEvent<E> {
    /// A marker was selected; carries the entity's full last-known data.
    Selected(E),
    /// The selection on this key was cleared.
    Cleared(String),
}

/// Owns the marker registry for one kind of entity.
pub struct MarkerReconciler<E: LiveEntity> {
    config: MarkerConfig,
    registry: MarkerRegistry<E>,
    active_pass: Option<u64>,
    next_pass_id: u64,
    event_tx: broadcast::Sender<SelectionEvent<E>>,
}

impl<E: LiveEntity> std::fmt::Debug for MarkerReconciler<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerReconciler")
            .field("markers", &self.registry.len())
            .field("selected", &self.registry.selected())
            .field("active_pass", &self.active_pass)
            .finish_non_exhaustive()
    }
}

impl<E: LiveEntity> MarkerReconciler<E> {
    #[must_use]
    pub fn new(config: MarkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            config,
            registry: MarkerRegistry::default(),
            active_pass: None,
            next_pass_id: 1,
            event_tx,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MarkerConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &MarkerRegistry<E> {
        &self.registry
    }

    /// Subscribe to selection events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SelectionEvent<E>> {
        self.event_tx.subscribe()
    }

    /// Apply a whole snapshot in one go.
    pub fn reconcile<S: RenderSurface + ?Sized>(
        &mut self,
        snapshot: Vec<E>,
        now: DateTime<Utc>,
        surface: &mut S,
    ) -> ReconcileReport {
        let mut pass = self.begin_pass(snapshot, now);
        self.advance(&mut pass, surface, usize::MAX);
        pass.into_report()
    }

    /// Start a batched pass. Any pass still in progress is abandoned.
    pub fn begin_pass(&mut self, snapshot: Vec<E>, now: DateTime<Utc>) -> ReconcilePass<E> {
        if let Some(previous) = self.active_pass {
            debug!("Abandoning unfinished marker pass {}", previous);
        }
        let id = self.next_pass_id;
        self.next_pass_id += 1;
        self.active_pass = Some(id);
        ReconcilePass::new(id, snapshot, now)
    }

    /// Apply up to `budget` entities from `pass`. Returns true once the pass is
    /// finished (or was superseded and can make no further progress).
    ///
    /// Absent-key bookkeeping runs with the final chunk, so an abandoned pass
    /// never removes anything.
    pub fn advance<S: RenderSurface + ?Sized>(
        &mut self,
        pass: &mut ReconcilePass<E>,
        surface: &mut S,
        budget: usize,
    ) -> bool {
        if pass.finished {
            return true;
        }
        if self.active_pass != Some(pass.id) {
            debug!("Marker pass {} was superseded, dropping it", pass.id);
            pass.finished = true;
            return true;
        }

        let end = pass.cursor.saturating_add(budget.max(1)).min(pass.entities.len());
        while pass.cursor < end {
            let (entity, position) = pass.entities[pass.cursor].clone();
            self.upsert(entity, position, surface, &mut pass.report);
            pass.cursor += 1;
        }

        if pass.cursor < pass.entities.len() {
            return false;
        }

        self.sweep_absent(&pass.present, pass.now, surface, &mut pass.report);
        self.active_pass = None;
        pass.finished = true;
        true
    }

    /// Stop a pass without finishing it. Entities already applied stay applied.
    pub fn abandon(&mut self, pass: &mut ReconcilePass<E>) {
        if self.active_pass == Some(pass.id) {
            debug!(
                "Abandoned marker pass {} with {} entities pending",
                pass.id,
                pass.pending()
            );
            self.active_pass = None;
        }
        pass.finished = true;
    }

    /// Select `key`, refresh its protection window and notify subscribers.
    ///
    /// Returns the selected entity, or `None` if no marker exists for the key.
    pub fn select<S: RenderSurface + ?Sized>(
        &mut self,
        key: &str,
        now: DateTime<Utc>,
        surface: &mut S,
    ) -> Option<E> {
        let window = self.config.protection_window();
        let entity = {
            let entry = self.registry.get_mut(key)?;
            entry.protected_until = Some(now.checked_add_signed(window).unwrap_or(DateTime::<Utc>::MAX_UTC));
            entry.entity.clone()
        };

        let previous = self.registry.set_selected(Some(key.to_string()));
        if let Some(previous) = previous.filter(|p| p != key) {
            self.refresh_appearance(&previous, surface);
        }
        self.refresh_appearance(key, surface);

        info!("Selected marker {}", key);
        let _ = self.event_tx.send(SelectionEvent::Selected(entity.clone()));
        Some(entity)
    }

    /// Clear the selection. The protection window keeps running until expiry.
    pub fn deselect<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) {
        if let Some(previous) = self.registry.set_selected(None) {
            self.refresh_appearance(&previous, surface);
            let _ = self.event_tx.send(SelectionEvent::Cleared(previous));
        }
    }

    /// Remove every marker, e.g. on teardown.
    pub fn clear<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) {
        self.active_pass = None;
        for (key, entry) in self.registry.drain() {
            if let Err(e) = surface.remove_marker(&key, entry.handle) {
                warn!("Failed to remove marker {} during teardown: {}", key, e);
            }
        }
    }

    fn upsert<S: RenderSurface + ?Sized>(
        &mut self,
        entity: E,
        position: GeoPoint,
        surface: &mut S,
        report: &mut ReconcileReport,
    ) {
        let key = entity.key().to_string();
        let appearance =
            MarkerAppearance::derive(&entity.visual_inputs(), self.registry.is_selected(&key), &self.config);

        if let Some(entry) = self.registry.get_mut(&key) {
            entry.miss_count = 0;
            match surface.update_marker(&key, entry.handle, position, &appearance) {
                Ok(()) => {
                    entry.entity = entity;
                    entry.position = position;
                    entry.appearance = appearance;
                    report.updated.push(key);
                }
                Err(e) => {
                    warn!("Failed to update marker {}: {}", key, e);
                    report.failed.push((key, e));
                }
            }
            return;
        }

        match surface.create_marker(&key, position, &appearance) {
            Ok(handle) => {
                self.registry.insert(
                    key.clone(),
                    RegistryEntry {
                        handle,
                        entity,
                        position,
                        appearance,
                        miss_count: 0,
                        protected_until: None,
                    },
                );
                report.created.push(key);
            }
            Err(e) => {
                warn!("Failed to create marker {}: {}", key, e);
                report.failed.push((key, e));
            }
        }
    }

    fn sweep_absent<S: RenderSurface + ?Sized>(
        &mut self,
        present: &HashSet<String>,
        now: DateTime<Utc>,
        surface: &mut S,
        report: &mut ReconcileReport,
    ) {
        let absent: Vec<String> = self
            .registry
            .keys()
            .into_iter()
            .filter(|key| !present.contains(key))
            .collect();

        for key in absent {
            if self.registry.is_protected(&key, now) {
                report.retained.push(key);
                continue;
            }

            let max_miss_count = self.config.max_miss_count;
            let Some(entry) = self.registry.get_mut(&key) else {
                continue;
            };
            entry.miss_count += 1;
            if entry.miss_count < max_miss_count {
                report.missed.push(key);
                continue;
            }

            match surface.remove_marker(&key, entry.handle) {
                Ok(()) => {
                    debug!("Removed marker {} after {} missed polls", key, entry.miss_count);
                    self.registry.remove(&key);
                    report.removed.push(key);
                }
                Err(e) => {
                    // Entry stays so removal is retried on the next pass
                    warn!("Failed to remove marker {}: {}", key, e);
                    report.failed.push((key, e));
                }
            }
        }
    }

    fn refresh_appearance<S: RenderSurface + ?Sized>(&mut self, key: &str, surface: &mut S) {
        let selected = self.registry.is_selected(key);
        let Some(entry) = self.registry.get_mut(key) else {
            return;
        };
        let appearance = MarkerAppearance::derive(&entry.entity.visual_inputs(), selected, &self.config);
        match surface.update_marker(key, entry.handle, entry.position, &appearance) {
            Ok(()) => entry.appearance = appearance,
            Err(e) => warn!("Failed to restyle marker {}: {}", key, e),
        }
    }
}
