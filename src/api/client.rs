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

use flightdeck_core::{Airport, Flight, TrackPoint};
use log::debug;
use reqwest::Url;
use serde_json::Value;

use super::{normalize, ApiError};
use crate::config::ApiConfig;

/// Async HTTP client for one API session.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    session_id: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("session_id", &self.session_id)
            .field("has_api_key", &self.api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        if config.session_id.trim().is_empty() {
            return Err(ApiError::MissingSession);
        }
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidBaseUrl(config.base_url.clone()));
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("flightdeck/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            session_id: config.session_id.trim().to_string(),
            api_key: config.resolve_api_key(),
        })
    }

    /// Live flights in the session.
    pub async fn fetch_flights(&self) -> Result<Vec<Flight>, ApiError> {
        let value = self.get_json(&["flights"]).await?;
        Ok(normalize::flights(&value))
    }

    /// Airport activity (traffic counts and active ATC) in the session.
    pub async fn fetch_airports(&self) -> Result<Vec<Airport>, ApiError> {
        let value = self.get_json(&["world"]).await?;
        Ok(normalize::airports(&value))
    }

    /// Flown history for one flight.
    pub async fn fetch_flight_route(&self, flight_id: &str) -> Result<Vec<TrackPoint>, ApiError> {
        let value = self.get_json(&["flights", flight_id, "route"]).await?;
        Ok(normalize::route_points(&value))
    }

    /// Filed flight plan for one flight, flattened.
    pub async fn fetch_flight_plan(&self, flight_id: &str) -> Result<Vec<TrackPoint>, ApiError> {
        let value = self.get_json(&["flights", flight_id, "flightplan"]).await?;
        Ok(normalize::flight_plan_points(&value))
    }

    /// `{base_url}/sessions/{session_id}/{segments...}` with each segment escaped.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("sessions")
            .push(&self.session_id)
            .extend(segments);
        Ok(url)
    }

    async fn get_json(&self, segments: &[&str]) -> Result<Value, ApiError> {
        let url = self.endpoint(segments)?;
        debug!("GET {}", url);

        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let value = request.send().await?.error_for_status()?.json::<Value>().await?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str, session_id: &str) -> ApiConfig {
        ApiConfig {
            base_url: base_url.to_string(),
            session_id: session_id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_layout() {
        let client = ApiClient::new(&config("https://example.test/public/v2/", "sess-1")).unwrap();
        let url = client.endpoint(&["flights", "abc", "route"]).unwrap();
        assert_eq!(url.as_str(), "https://example.test/public/v2/sessions/sess-1/flights/abc/route");
    }

    #[test]
    fn test_flight_id_is_escaped() {
        let client = ApiClient::new(&config("https://example.test/api", "s")).unwrap();
        let url = client.endpoint(&["flights", "a/b c", "flightplan"]).unwrap();
        assert_eq!(url.as_str(), "https://example.test/api/sessions/s/flights/a%2Fb%20c/flightplan");
    }

    #[test]
    fn test_missing_session_is_rejected() {
        assert!(matches!(
            ApiClient::new(&config("https://example.test", "  ")),
            Err(ApiError::MissingSession)
        ));
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(matches!(
            ApiClient::new(&config("not a url", "s")),
            Err(ApiError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            ApiClient::new(&config("mailto:ops@example.test", "s")),
            Err(ApiError::InvalidBaseUrl(_))
        ));
    }
}
