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

//! Application configuration management.
//!
//! Configuration is persisted as TOML via `confy`. Every field has a serde
//! default so that older files keep loading as new settings are added, and the
//! reconciliation thresholds live here rather than as constants in the engine.

use std::time::Duration;

use flightdeck_core::{MarkerConfig, RouteConfig};
use serde::{Deserialize, Serialize};

/// Name used for the configuration directory and file.
pub const APP_NAME: &str = "flightdeck";

/// Environment variable holding the API key. Takes precedence over the config file.
pub const API_KEY_ENV: &str = "FLIGHTDECK_API_KEY";

/// Default flight-simulation API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.infiniteflight.com/public/v2";

/// Connection settings for the polled flight-simulation API
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ApiConfig {
    /// Base URL, without trailing slash
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Server/session to track
    #[serde(default)]
    pub session_id: String,

    /// API key (optional, env var takes precedence)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_id: String::new(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ApiConfig {
    /// Resolve API key from environment variable or config
    #[must_use]
    pub fn resolve_api_key(&self) -> Option<String> {
        resolve_api_key(std::env::var(API_KEY_ENV).ok(), self.api_key.as_deref())
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

fn resolve_api_key(env_key: Option<String>, config_key: Option<&str>) -> Option<String> {
    env_key
        .filter(|k| !k.is_empty())
        .or_else(|| config_key.map(str::to_string).filter(|k| !k.is_empty()))
}

/// Poll cadence for each data stream
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    #[serde(default = "default_flights_interval_secs")]
    pub flights_interval_secs: u64,

    #[serde(default = "default_airports_interval_secs")]
    pub airports_interval_secs: u64,

    /// Route refresh for the selected flight
    #[serde(default = "default_route_interval_secs")]
    pub route_interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            flights_interval_secs: default_flights_interval_secs(),
            airports_interval_secs: default_airports_interval_secs(),
            route_interval_secs: default_route_interval_secs(),
        }
    }
}

impl PollConfig {
    #[must_use]
    pub fn flights_interval(&self) -> Duration {
        Duration::from_secs(self.flights_interval_secs.max(1))
    }

    #[must_use]
    pub fn airports_interval(&self) -> Duration {
        Duration::from_secs(self.airports_interval_secs.max(1))
    }

    #[must_use]
    pub fn route_interval(&self) -> Duration {
        Duration::from_secs(self.route_interval_secs.max(1))
    }
}

/// Where rendering commands go
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceKind {
    /// Human-readable log lines
    #[default]
    Log,
    /// One JSON object per line on stdout
    Json,
}

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// Configuration schema version for migrations
    #[serde(default = "default_config_version")]
    pub config_version: u32,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub poll: PollConfig,

    /// Show airport activity markers
    #[serde(default = "default_true")]
    pub show_airports: bool,

    #[serde(default)]
    pub surface: SurfaceKind,

    #[serde(default)]
    pub markers: MarkerConfig,

    #[serde(default)]
    pub route: RouteConfig,

    /// Status notices kept for display
    #[serde(default = "default_max_notices")]
    pub max_notices: usize,
}

// Default value functions for serde
fn default_config_version() -> u32 {
    1
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_flights_interval_secs() -> u64 {
    15
}

fn default_airports_interval_secs() -> u64 {
    30
}

fn default_route_interval_secs() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

fn default_max_notices() -> usize {
    50
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            api: ApiConfig::default(),
            poll: PollConfig::default(),
            show_airports: true,
            surface: SurfaceKind::default(),
            markers: MarkerConfig::default(),
            route: RouteConfig::default(),
            max_notices: default_max_notices(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk; confy writes defaults on first run
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load(APP_NAME, "config")
    }

    /// Load from an explicit file instead of the per-user location
    pub fn load_from(path: &std::path::Path) -> Result<Self, confy::ConfyError> {
        confy::load_path(path)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path(APP_NAME, "config")
    }
}
