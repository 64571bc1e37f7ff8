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

//! Headless rendering surfaces.
//!
//! [`LogSurface`] narrates map commands through the logger, [`JsonSurface`]
//! streams them as JSON lines for an external map front-end.

use std::collections::HashMap;
use std::io::Write;

use flightdeck_core::{GeoPoint, MarkerAppearance, MarkerHandle, RenderSurface, RouteGeometry, SurfaceError};
use log::{debug, info};
use serde::Serialize;

/// Live marker handles issued by a surface, used to reject stale handles.
#[derive(Debug, Default)]
struct HandleBook {
    live: HashMap<MarkerHandle, String>,
}

impl HandleBook {
    fn issue(&mut self, key: &str) -> MarkerHandle {
        let handle = MarkerHandle::new_v4();
        self.live.insert(handle, key.to_string());
        handle
    }

    fn check(&self, handle: MarkerHandle) -> Result<(), SurfaceError> {
        if self.live.contains_key(&handle) {
            Ok(())
        } else {
            Err(SurfaceError::UnknownHandle(handle))
        }
    }

    fn release(&mut self, handle: MarkerHandle) -> Result<(), SurfaceError> {
        self.live.remove(&handle).map(|_| ()).ok_or(SurfaceError::UnknownHandle(handle))
    }
}

/// Surface that logs every command.
#[derive(Debug, Default)]
pub struct LogSurface {
    handles: HandleBook,
}

impl LogSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderSurface for LogSurface {
    fn create_marker(
        &mut self,
        key: &str,
        position: GeoPoint,
        appearance: &MarkerAppearance,
    ) -> Result<MarkerHandle, SurfaceError> {
        let handle = self.handles.issue(key);
        info!(
            "+ {:?} {} at ({:.4}, {:.4}) heading {:.0} {}",
            appearance.kind,
            key,
            position.lat,
            position.lon,
            appearance.rotation_deg,
            appearance.color.to_hex()
        );
        Ok(handle)
    }

    fn update_marker(
        &mut self,
        key: &str,
        handle: MarkerHandle,
        position: GeoPoint,
        appearance: &MarkerAppearance,
    ) -> Result<(), SurfaceError> {
        self.handles.check(handle)?;
        debug!(
            "~ {} at ({:.4}, {:.4}) heading {:.0}{}{}",
            key,
            position.lat,
            position.lon,
            appearance.rotation_deg,
            if appearance.on_ground { " ground" } else { "" },
            if appearance.selected { " selected" } else { "" }
        );
        Ok(())
    }

    fn remove_marker(&mut self, key: &str, handle: MarkerHandle) -> Result<(), SurfaceError> {
        self.handles.release(handle)?;
        info!("- {}", key);
        Ok(())
    }

    fn set_route_geometry(&mut self, geometry: &RouteGeometry) -> Result<(), SurfaceError> {
        if geometry.is_empty() {
            info!("Route cleared");
        } else {
            info!(
                "Route: {} traveled points ({:.0} nm), {} remaining points ({:.0} nm), {} waypoints",
                geometry.traveled.len(),
                geometry.traveled_nm,
                geometry.remaining.len(),
                geometry.remaining_nm,
                geometry.waypoints.len()
            );
        }
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum JsonCommand<'a> {
    Create {
        key: &'a str,
        handle: MarkerHandle,
        position: GeoPoint,
        appearance: &'a MarkerAppearance,
    },
    Update {
        key: &'a str,
        handle: MarkerHandle,
        position: GeoPoint,
        appearance: &'a MarkerAppearance,
    },
    Remove {
        key: &'a str,
        handle: MarkerHandle,
    },
    Route {
        geometry: &'a RouteGeometry,
    },
}

/// Surface that writes each command as one JSON object per line.
#[derive(Debug)]
pub struct JsonSurface<W: Write> {
    out: W,
    handles: HandleBook,
}

impl<W: Write> JsonSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            handles: HandleBook::default(),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, command: &JsonCommand<'_>) -> Result<(), SurfaceError> {
        serde_json::to_writer(&mut self.out, command).map_err(|e| SurfaceError::Io(e.to_string()))?;
        self.out
            .write_all(b"\n")
            .and_then(|()| self.out.flush())
            .map_err(|e| SurfaceError::Io(e.to_string()))
    }
}

impl<W: Write> RenderSurface for JsonSurface<W> {
    fn create_marker(
        &mut self,
        key: &str,
        position: GeoPoint,
        appearance: &MarkerAppearance,
    ) -> Result<MarkerHandle, SurfaceError> {
        let handle = MarkerHandle::new_v4();
        self.emit(&JsonCommand::Create {
            key,
            handle,
            position,
            appearance,
        })?;
        self.handles.live.insert(handle, key.to_string());
        Ok(handle)
    }

    fn update_marker(
        &mut self,
        key: &str,
        handle: MarkerHandle,
        position: GeoPoint,
        appearance: &MarkerAppearance,
    ) -> Result<(), SurfaceError> {
        self.handles.check(handle)?;
        self.emit(&JsonCommand::Update {
            key,
            handle,
            position,
            appearance,
        })
    }

    fn remove_marker(&mut self, key: &str, handle: MarkerHandle) -> Result<(), SurfaceError> {
        self.handles.check(handle)?;
        self.emit(&JsonCommand::Remove { key, handle })?;
        self.handles.release(handle)
    }

    fn set_route_geometry(&mut self, geometry: &RouteGeometry) -> Result<(), SurfaceError> {
        self.emit(&JsonCommand::Route { geometry })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flightdeck_core::{Flight, MarkerConfig, MarkerReconciler};
    use serde_json::Value;

    fn t0() -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn lines(bytes: &[u8]) -> Vec<Value> {
        std::str::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_json_surface_emits_one_line_per_command() {
        let mut surface = JsonSurface::new(Vec::new());
        let mut reconciler = MarkerReconciler::new(MarkerConfig {
            max_miss_count: 1,
            ..Default::default()
        });

        reconciler.reconcile(vec![Flight::new("f-1", 10.0, 20.0)], t0(), &mut surface);
        reconciler.reconcile(vec![Flight::new("f-1", 10.5, 20.5)], t0(), &mut surface);
        reconciler.reconcile(Vec::new(), t0(), &mut surface);

        let ops: Vec<String> = lines(&surface.into_inner())
            .iter()
            .map(|v| v["op"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ops, vec!["create", "update", "remove"]);
    }

    #[test]
    fn test_json_surface_route_payload() {
        let mut surface = JsonSurface::new(Vec::new());
        let geometry = RouteGeometry {
            traveled: vec![GeoPoint::new(1.0, 2.0), GeoPoint::new(1.5, 2.5)],
            current_index: Some(1),
            ..Default::default()
        };
        surface.set_route_geometry(&geometry).unwrap();

        let out = lines(&surface.into_inner());
        assert_eq!(out[0]["op"], "route");
        assert_eq!(out[0]["geometry"]["current_index"], 1);
        assert_eq!(out[0]["geometry"]["traveled"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_handle_is_rejected() {
        let mut surface = LogSurface::new();
        let appearance = MarkerAppearance::derive(
            &flightdeck_core::LiveEntity::visual_inputs(&Flight::new("f", 0.0, 0.0)),
            false,
            &MarkerConfig::default(),
        );
        let stranger = MarkerHandle::new_v4();
        assert_eq!(
            surface.update_marker("f", stranger, GeoPoint::new(0.0, 0.0), &appearance),
            Err(SurfaceError::UnknownHandle(stranger))
        );

        let handle = surface.create_marker("f", GeoPoint::new(0.0, 0.0), &appearance).unwrap();
        assert!(surface.remove_marker("f", handle).is_ok());
        assert!(surface.remove_marker("f", handle).is_err());
    }
}
