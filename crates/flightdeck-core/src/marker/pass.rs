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

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::entity::LiveEntity;
use crate::error::SurfaceError;
use crate::geo::GeoPoint;

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<String>,
    /// Absent but kept because selected or protected.
    pub retained: Vec<String>,
    /// Absent, miss count bumped, not yet removed.
    pub missed: Vec<String>,
    /// Per-entity surface failures, skipped.
    pub failed: Vec<(String, SurfaceError)>,
    /// Snapshot entries without a usable position.
    pub skipped_invalid: usize,
}

impl ReconcileReport {
    /// True when the pass changed marker identities (anything created or removed).
    #[must_use]
    pub fn has_churn(&self) -> bool {
        !self.created.is_empty() || !self.removed.is_empty()
    }
}

/// An in-progress, resumable reconciliation of one snapshot.
///
/// Created by [`MarkerReconciler::begin_pass`](super::MarkerReconciler::begin_pass)
/// and driven by `advance`. Only the most recently begun pass can make
/// progress.
#[derive(Debug)]
pub struct ReconcilePass<E> {
    pub(crate) id: u64,
    pub(crate) entities: Vec<(E, GeoPoint)>,
    pub(crate) present: HashSet<String>,
    pub(crate) cursor: usize,
    pub(crate) now: DateTime<Utc>,
    pub(crate) report: ReconcileReport,
    pub(crate) finished: bool,
}

impl<E: LiveEntity> ReconcilePass<E> {
    /// Deduplicate by key (last occurrence wins) and drop unplaceable entries.
    pub(crate) fn new(id: u64, snapshot: Vec<E>, now: DateTime<Utc>) -> Self {
        let mut report = ReconcileReport::default();
        let mut index_by_key: HashMap<String, usize> = HashMap::new();
        let mut entities: Vec<(E, GeoPoint)> = Vec::with_capacity(snapshot.len());

        for entity in snapshot {
            let Some(position) = entity.position().filter(GeoPoint::is_valid) else {
                report.skipped_invalid += 1;
                continue;
            };
            match index_by_key.get(entity.key()) {
                Some(&index) => entities[index] = (entity, position),
                None => {
                    index_by_key.insert(entity.key().to_string(), entities.len());
                    entities.push((entity, position));
                }
            }
        }

        Self {
            id,
            present: index_by_key.into_keys().collect(),
            entities,
            cursor: 0,
            now,
            report,
            finished: false,
        }
    }

    /// Entities still waiting to be applied.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.entities.len() - self.cursor
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    #[must_use]
    pub fn report(&self) -> &ReconcileReport {
        &self.report
    }

    #[must_use]
    pub fn into_report(self) -> ReconcileReport {
        self.report
    }
}
