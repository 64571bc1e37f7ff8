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

//! Polling data source for the flight-simulation API.
//!
//! The client only moves bytes and JSON; [`normalize`] turns whatever envelope
//! the API used into core types.

pub mod client;
pub mod normalize;

pub use client::ApiClient;

use thiserror::Error;

/// Errors from the polled API. Shape problems are never errors, only
/// transport, HTTP status and JSON syntax failures are.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid API base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("no session configured")]
    MissingSession,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}
