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

//! Rendering-surface interface.
//!
//! The reconcilers never talk to a map library directly. They emit the four
//! imperative commands of [`RenderSurface`]; each concrete map binding (or a
//! headless logger) implements the trait once.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SurfaceError;
use crate::geo::GeoPoint;
use crate::marker::MarkerAppearance;
use crate::route::RouteGeometry;

/// Opaque identity of a marker on a surface.
///
/// Handles are issued by the surface on creation and stay stable across
/// in-place updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarkerHandle(pub Uuid);

impl MarkerHandle {
    /// Generate a fresh random handle.
    #[must_use]
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MarkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Capability set a map binding must provide.
pub trait RenderSurface {
    /// Place a new marker and return its handle.
    fn create_marker(
        &mut self,
        key: &str,
        position: GeoPoint,
        appearance: &MarkerAppearance,
    ) -> Result<MarkerHandle, SurfaceError>;

    /// Move and restyle an existing marker without changing its identity.
    fn update_marker(
        &mut self,
        key: &str,
        handle: MarkerHandle,
        position: GeoPoint,
        appearance: &MarkerAppearance,
    ) -> Result<(), SurfaceError>;

    fn remove_marker(&mut self, key: &str, handle: MarkerHandle) -> Result<(), SurfaceError>;

    /// Replace the displayed route. An empty geometry clears it.
    fn set_route_geometry(&mut self, geometry: &RouteGeometry) -> Result<(), SurfaceError>;
}

/// A command as received by a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCommand {
    Create {
        key: String,
        handle: MarkerHandle,
        position: GeoPoint,
        appearance: MarkerAppearance,
    },
    Update {
        key: String,
        handle: MarkerHandle,
        position: GeoPoint,
        appearance: MarkerAppearance,
    },
    Remove {
        key: String,
        handle: MarkerHandle,
    },
    SetRoute(RouteGeometry),
}

/// In-memory surface that records every command it receives.
///
/// Useful for dry runs and tests. Individual keys can be configured to fail so
/// that per-entity error isolation can be exercised.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    commands: Vec<SurfaceCommand>,
    live: HashMap<MarkerHandle, String>,
    route: Option<RouteGeometry>,
    failing_keys: HashSet<String>,
    fail_route: bool,
}

impl RecordingSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every create/update/remove for `key` fail.
    pub fn fail_key(&mut self, key: impl Into<String>) {
        self.failing_keys.insert(key.into());
    }

    /// Stop failing commands for `key`.
    pub fn heal_key(&mut self, key: &str) {
        self.failing_keys.remove(key);
    }

    /// Make every non-empty `set_route_geometry` fail.
    pub fn fail_route(&mut self, fail: bool) {
        self.fail_route = fail;
    }

    #[must_use]
    pub fn commands(&self) -> &[SurfaceCommand] {
        &self.commands
    }

    /// Drain the recorded command log.
    pub fn take_commands(&mut self) -> Vec<SurfaceCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of markers currently on the surface.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Keys of markers currently on the surface, sorted.
    #[must_use]
    pub fn live_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.live.values().cloned().collect();
        keys.sort();
        keys
    }

    /// Number of recorded creates for `key`.
    #[must_use]
    pub fn creates_for(&self, key: &str) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, SurfaceCommand::Create { key: k, .. } if k == key))
            .count()
    }

    /// The route geometry most recently set, if any.
    #[must_use]
    pub fn route(&self) -> Option<&RouteGeometry> {
        self.route.as_ref()
    }

    fn check_key(&self, key: &str) -> Result<(), SurfaceError> {
        if self.failing_keys.contains(key) {
            return Err(SurfaceError::Rejected {
                key: key.to_string(),
                reason: "configured to fail".to_string(),
            });
        }
        Ok(())
    }
}

impl RenderSurface for RecordingSurface {
    fn create_marker(
        &mut self,
        key: &str,
        position: GeoPoint,
        appearance: &MarkerAppearance,
    ) -> Result<MarkerHandle, SurfaceError> {
        self.check_key(key)?;
        let handle = MarkerHandle::new_v4();
        self.live.insert(handle, key.to_string());
        self.commands.push(SurfaceCommand::Create {
            key: key.to_string(),
            handle,
            position,
            appearance: appearance.clone(),
        });
        Ok(handle)
    }

    fn update_marker(
        &mut self,
        key: &str,
        handle: MarkerHandle,
        position: GeoPoint,
        appearance: &MarkerAppearance,
    ) -> Result<(), SurfaceError> {
        self.check_key(key)?;
        if !self.live.contains_key(&handle) {
            return Err(SurfaceError::UnknownHandle(handle));
        }
        self.commands.push(SurfaceCommand::Update {
            key: key.to_string(),
            handle,
            position,
            appearance: appearance.clone(),
        });
        Ok(())
    }

    fn remove_marker(&mut self, key: &str, handle: MarkerHandle) -> Result<(), SurfaceError> {
        self.check_key(key)?;
        if self.live.remove(&handle).is_none() {
            return Err(SurfaceError::UnknownHandle(handle));
        }
        self.commands.push(SurfaceCommand::Remove {
            key: key.to_string(),
            handle,
        });
        Ok(())
    }

    fn set_route_geometry(&mut self, geometry: &RouteGeometry) -> Result<(), SurfaceError> {
        if self.fail_route && !geometry.is_empty() {
            return Err(SurfaceError::Rejected {
                key: "route".to_string(),
                reason: "configured to fail".to_string(),
            });
        }
        self.route = Some(geometry.clone());
        self.commands.push(SurfaceCommand::SetRoute(geometry.clone()));
        Ok(())
    }
}
