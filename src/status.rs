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

use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use flightdeck_core::ReconcileReport;

/// Which polled data stream a statistic belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stream {
    Flights,
    Airports,
    Route,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stream::Flights => "flights",
            Stream::Airports => "airports",
            Stream::Route => "route",
        };
        f.write_str(name)
    }
}

/// Health of a polled stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Healthy,
    Error,
}

/// Notice with timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub timestamp: DateTime<Utc>,
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Per-stream poll statistics
#[derive(Debug, Clone)]
pub struct StreamStatus {
    pub state: PollState,
    pub last_error: Option<String>,
    pub polls_ok: u64,
    pub polls_failed: u64,
    /// Responses dropped because a newer one was already applied
    pub stale_dropped: u64,
    /// Entities (or points) in the last applied response
    pub last_count: usize,
    pub last_success_at: Option<DateTime<Utc>>,
}

impl StreamStatus {
    fn new() -> Self {
        Self {
            state: PollState::Idle,
            last_error: None,
            polls_ok: 0,
            polls_failed: 0,
            stale_dropped: 0,
            last_count: 0,
            last_success_at: None,
        }
    }
}

/// Dashboard status: stream health, marker counts and recent notices
#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub flights: StreamStatus,
    pub airports: StreamStatus,
    pub route: StreamStatus,

    pub flight_markers: usize,
    pub airport_markers: usize,
    pub surface_failures: u64,

    notices: VecDeque<Notice>,
    max_notices: usize,
}

impl SystemStatus {
    pub fn new(max_notices: usize) -> Self {
        let max_notices = max_notices.max(1);
        Self {
            flights: StreamStatus::new(),
            airports: StreamStatus::new(),
            route: StreamStatus::new(),
            flight_markers: 0,
            airport_markers: 0,
            surface_failures: 0,
            notices: VecDeque::with_capacity(max_notices),
            max_notices,
        }
    }

    pub fn streams(&self) -> [(Stream, &StreamStatus); 3] {
        [
            (Stream::Flights, &self.flights),
            (Stream::Airports, &self.airports),
            (Stream::Route, &self.route),
        ]
    }

    fn stream_mut(&mut self, stream: Stream) -> &mut StreamStatus {
        match stream {
            Stream::Flights => &mut self.flights,
            Stream::Airports => &mut self.airports,
            Stream::Route => &mut self.route,
        }
    }

    /// Record a response that was applied
    pub fn record_success(&mut self, stream: Stream, count: usize, now: DateTime<Utc>) {
        let recovered = {
            let status = self.stream_mut(stream);
            let recovered = status.state == PollState::Error;
            status.state = PollState::Healthy;
            status.last_error = None;
            status.polls_ok += 1;
            status.last_count = count;
            status.last_success_at = Some(now);
            recovered
        };

        if recovered {
            self.add_notice(NoticeLevel::Info, format!("{stream} feed recovered"), now);
        }
    }

    /// Record a failed fetch. Only the first failure in a run raises a notice.
    pub fn record_failure(&mut self, stream: Stream, error: String, now: DateTime<Utc>) {
        let first_failure = {
            let status = self.stream_mut(stream);
            let first = status.state != PollState::Error;
            status.state = PollState::Error;
            status.last_error = Some(error.clone());
            status.polls_failed += 1;
            first
        };

        if first_failure {
            self.add_notice(NoticeLevel::Warning, format!("Unable to fetch {stream}: {error}"), now);
        }
    }

    pub fn record_stale(&mut self, stream: Stream) {
        self.stream_mut(stream).stale_dropped += 1;
    }

    /// Fold a marker reconciliation report into the counters
    pub fn record_reconcile(&mut self, stream: Stream, report: &ReconcileReport, markers: usize, now: DateTime<Utc>) {
        match stream {
            Stream::Flights => self.flight_markers = markers,
            Stream::Airports => self.airport_markers = markers,
            Stream::Route => {}
        }

        if !report.failed.is_empty() {
            self.surface_failures += report.failed.len() as u64;
            self.add_notice(
                NoticeLevel::Error,
                format!("Map surface rejected {} {} marker commands", report.failed.len(), stream),
                now,
            );
        }
    }

    /// Add a notice, dropping the oldest beyond capacity
    pub fn add_notice(&mut self, level: NoticeLevel, message: String, now: DateTime<Utc>) {
        self.notices.push_back(Notice {
            timestamp: now,
            level,
            message,
        });

        while self.notices.len() > self.max_notices {
            self.notices.pop_front();
        }
    }

    pub fn notices(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    /// One-line summary for periodic logging
    pub fn summary(&self) -> String {
        format!(
            "flights: {} markers ({} ok / {} failed / {} stale), airports: {} markers ({} ok / {} failed), route: {} points, surface failures: {}",
            self.flight_markers,
            self.flights.polls_ok,
            self.flights.polls_failed,
            self.flights.stale_dropped,
            self.airport_markers,
            self.airports.polls_ok,
            self.airports.polls_failed,
            self.route.last_count,
            self.surface_failures,
        )
    }
}
