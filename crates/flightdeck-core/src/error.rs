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

//! Error types for the reconciliation engine.

use thiserror::Error;

use crate::surface::MarkerHandle;

/// Errors reported by a rendering surface.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("surface rejected marker for '{key}': {reason}")]
    Rejected { key: String, reason: String },

    #[error("unknown marker handle {0}")]
    UnknownHandle(MarkerHandle),

    #[error("surface is no longer available")]
    Disposed,

    #[error("surface i/o failed: {0}")]
    Io(String),
}

/// Errors raised while computing or displaying route geometry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouteError {
    #[error("altitude palette has no colour stops")]
    EmptyPalette,

    #[error("altitude palette stops must be strictly ascending (stop {index} at {altitude} ft)")]
    UnorderedPalette { index: usize, altitude: f64 },

    #[error("route split lost continuity at index {index}")]
    BrokenSplit { index: usize },

    #[error("failed to display route: {0}")]
    Surface(#[from] SurfaceError),
}
