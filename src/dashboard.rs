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

//! The single task that owns the reconcilers and the rendering surface.
//!
//! Poll results and operator commands arrive over channels and are applied one
//! at a time, so a marker pass always finishes (or is abandoned on shutdown)
//! before the next update is looked at.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use flightdeck_core::{
    Airport, Flight, LiveEntity, MarkerReconciler, ReconcileReport, RenderSurface, RouteInput, RouteOutcome,
    RouteReconciler, SelectionEvent,
};
use log::{debug, info, warn};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::commands::Command;
use crate::config::AppConfig;
use crate::poller::{RouteFetch, Sequencers, Stamped, Update};
use crate::status::{NoticeLevel, Stream, SystemStatus};

const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(60);

pub struct Dashboard<S: RenderSurface> {
    surface: S,
    flights: MarkerReconciler<Flight>,
    airports: MarkerReconciler<Airport>,
    route: RouteReconciler,
    status: SystemStatus,
    sequencers: Arc<Sequencers>,
    /// Flight whose route is being polled
    selection_tx: watch::Sender<Option<String>>,
    batch_size: usize,
    show_airports: bool,
}

impl<S: RenderSurface> std::fmt::Debug for Dashboard<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("flights", &self.flights)
            .field("airports", &self.airports)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl<S: RenderSurface> Dashboard<S> {
    pub fn new(
        config: &AppConfig,
        surface: S,
        sequencers: Arc<Sequencers>,
        selection_tx: watch::Sender<Option<String>>,
    ) -> Self {
        Self {
            surface,
            flights: MarkerReconciler::new(config.markers.clone()),
            airports: MarkerReconciler::new(config.markers.clone()),
            route: RouteReconciler::new(config.route.clone()),
            status: SystemStatus::new(config.max_notices),
            sequencers,
            selection_tx,
            batch_size: config.markers.batch_size.max(1),
            show_airports: config.show_airports,
        }
    }

    #[cfg(test)]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn status(&self) -> &SystemStatus {
        &self.status
    }

    #[cfg(test)]
    pub fn flights(&self) -> &MarkerReconciler<Flight> {
        &self.flights
    }

    #[cfg(test)]
    pub fn airports(&self) -> &MarkerReconciler<Airport> {
        &self.airports
    }

    pub fn subscribe_flights(&self) -> broadcast::Receiver<SelectionEvent<Flight>> {
        self.flights.subscribe()
    }

    pub fn subscribe_airports(&self) -> broadcast::Receiver<SelectionEvent<Airport>> {
        self.airports.subscribe()
    }

    /// Apply updates and commands until cancelled or told to quit, then clear
    /// everything from the surface.
    pub async fn run(
        mut self,
        mut update_rx: mpsc::Receiver<Update>,
        mut command_rx: mpsc::Receiver<Command>,
        cancel_token: CancellationToken,
    ) -> Self {
        let mut status_interval = tokio::time::interval(STATUS_LOG_INTERVAL);
        status_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        status_interval.tick().await;

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => break,
                Some(update) = update_rx.recv() => {
                    self.apply_update(update, Utc::now(), &cancel_token).await;
                }
                Some(command) = command_rx.recv() => {
                    if !self.handle_command(command, Utc::now()) {
                        info!("Quit requested");
                        cancel_token.cancel();
                        break;
                    }
                }
                _ = status_interval.tick() => info!("{}", self.status.summary()),
            }
        }

        self.shutdown();
        self
    }

    pub async fn apply_update(&mut self, update: Update, now: DateTime<Utc>, cancel_token: &CancellationToken) {
        match update {
            Update::Flights(stamped) => {
                let Some(snapshot) = self.accept(Stream::Flights, stamped, now) else {
                    return;
                };
                let count = snapshot.len();
                let Some(report) =
                    reconcile_batched(&mut self.flights, &mut self.surface, snapshot, now, self.batch_size, cancel_token)
                        .await
                else {
                    return;
                };
                self.status.record_success(Stream::Flights, count, now);
                self.status
                    .record_reconcile(Stream::Flights, &report, self.flights.registry().len(), now);
                log_report(Stream::Flights, &report);
            }
            Update::Airports(stamped) => {
                if !self.show_airports {
                    return;
                }
                let Some(snapshot) = self.accept(Stream::Airports, stamped, now) else {
                    return;
                };
                let count = snapshot.len();
                let Some(report) =
                    reconcile_batched(&mut self.airports, &mut self.surface, snapshot, now, self.batch_size, cancel_token)
                        .await
                else {
                    return;
                };
                self.status.record_success(Stream::Airports, count, now);
                self.status
                    .record_reconcile(Stream::Airports, &report, self.airports.registry().len(), now);
                log_report(Stream::Airports, &report);
            }
            Update::Route(stamped) => {
                if let Some(fetch) = self.accept(Stream::Route, stamped, now) {
                    self.apply_route(fetch, now);
                }
            }
        }
    }

    /// Returns false when the operator asked to quit.
    pub fn handle_command(&mut self, command: Command, now: DateTime<Utc>) -> bool {
        match command {
            Command::SelectFlight(id) => self.select_flight(&id, now),
            Command::SelectAirport(icao) => self.select_airport(&icao, now),
            Command::Deselect => self.deselect(),
            Command::Status => self.log_status(),
            Command::Quit => return false,
        }
        true
    }

    /// Remove every marker and the route.
    pub fn shutdown(&mut self) {
        self.flights.clear(&mut self.surface);
        self.airports.clear(&mut self.surface);
        self.route.clear(&mut self.surface);
        self.selection_tx.send_replace(None);
        info!("Dashboard torn down: {}", self.status.summary());
    }

    /// Drop stale responses and turn fetch failures into "no update this cycle".
    fn accept<T>(&mut self, stream: Stream, stamped: Stamped<T>, now: DateTime<Utc>) -> Option<T> {
        if !self.sequencers.for_stream(stream).try_accept(stamped.token) {
            debug!("Dropping stale {} response {}", stream, stamped.token);
            self.status.record_stale(stream);
            return None;
        }
        match stamped.result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to fetch {}, keeping current state: {}", stream, e);
                self.status.record_failure(stream, e.to_string(), now);
                None
            }
        }
    }

    fn apply_route(&mut self, fetch: RouteFetch, now: DateTime<Utc>) {
        if self.selection_tx.borrow().as_deref() != Some(fetch.flight_id.as_str()) {
            debug!("Ignoring route for {}, no longer selected", fetch.flight_id);
            return;
        }

        let point_count = fetch.flown.len() + fetch.planned.len();
        let input = RouteInput {
            live_position: self.flights.registry().get(&fetch.flight_id).map(|entry| entry.position),
            flown: fetch.flown,
            planned: fetch.planned,
        };

        match self.route.apply(&input, &mut self.surface) {
            RouteOutcome::Displayed(geometry) => {
                debug!(
                    "Route for {}: {:.0} nm flown, {:.0} nm to go",
                    fetch.flight_id, geometry.traveled_nm, geometry.remaining_nm
                );
                self.status.record_success(Stream::Route, point_count, now);
            }
            RouteOutcome::Cleared(notice) => {
                self.status.add_notice(NoticeLevel::Warning, notice.message, now);
            }
        }
    }

    fn select_flight(&mut self, id: &str, now: DateTime<Utc>) {
        if self.flights.select(id, now, &mut self.surface).is_none() {
            self.status
                .add_notice(NoticeLevel::Warning, format!("Flight {id} is not on the map"), now);
            return;
        }
        self.airports.deselect(&mut self.surface);

        if self.selection_tx.borrow().as_deref() != Some(id) {
            self.route.clear(&mut self.surface);
            self.selection_tx.send_replace(Some(id.to_string()));
        }
    }

    fn select_airport(&mut self, icao: &str, now: DateTime<Utc>) {
        if self.airports.select(icao, now, &mut self.surface).is_none() {
            self.status
                .add_notice(NoticeLevel::Warning, format!("Airport {icao} is not on the map"), now);
            return;
        }
        self.flights.deselect(&mut self.surface);
        self.clear_route_selection();
    }

    fn deselect(&mut self) {
        self.flights.deselect(&mut self.surface);
        self.airports.deselect(&mut self.surface);
        self.clear_route_selection();
    }

    fn clear_route_selection(&mut self) {
        if self.selection_tx.borrow().is_some() {
            self.route.clear(&mut self.surface);
            self.selection_tx.send_replace(None);
        }
    }

    fn log_status(&self) {
        info!("{}", self.status.summary());
        for (stream, status) in self.status.streams() {
            let last_success = status
                .last_success_at
                .map_or_else(|| "never".to_string(), |t| t.format("%H:%M:%S").to_string());
            match &status.last_error {
                Some(error) => info!("{}: {:?}, last success {}, last error: {}", stream, status.state, last_success, error),
                None => info!("{}: {:?}, last success {}", stream, status.state, last_success),
            }
        }
        for notice in self.status.notices() {
            info!("[{}] {:?}: {}", notice.timestamp.format("%H:%M:%S"), notice.level, notice.message);
        }
    }
}

/// Run one marker pass in chunks, yielding to the runtime between them.
/// Returns `None` if cancelled mid-pass, in which case the pass is abandoned.
async fn reconcile_batched<E, S>(
    reconciler: &mut MarkerReconciler<E>,
    surface: &mut S,
    snapshot: Vec<E>,
    now: DateTime<Utc>,
    batch_size: usize,
    cancel_token: &CancellationToken,
) -> Option<ReconcileReport>
where
    E: LiveEntity,
    S: RenderSurface,
{
    let mut pass = reconciler.begin_pass(snapshot, now);
    loop {
        if reconciler.advance(&mut pass, surface, batch_size) {
            return Some(pass.into_report());
        }
        tokio::task::yield_now().await;
        if cancel_token.is_cancelled() {
            reconciler.abandon(&mut pass);
            return None;
        }
    }
}

fn log_report(stream: Stream, report: &ReconcileReport) {
    if report.has_churn() || !report.failed.is_empty() {
        info!(
            "{}: {} created, {} updated, {} removed, {} retained, {} failed",
            stream,
            report.created.len(),
            report.updated.len(),
            report.removed.len(),
            report.retained.len(),
            report.failed.len()
        );
    } else {
        debug!("{}: {} updated, {} missed", stream, report.updated.len(), report.missed.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use flightdeck_core::{RecordingSurface, TrackPoint};

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    struct Harness {
        dashboard: Dashboard<RecordingSurface>,
        sequencers: Arc<Sequencers>,
        selection_rx: watch::Receiver<Option<String>>,
        cancel_token: CancellationToken,
    }

    fn harness_with(config: &AppConfig, surface: RecordingSurface) -> Harness {
        let sequencers = Arc::new(Sequencers::default());
        let (selection_tx, selection_rx) = watch::channel(None);
        Harness {
            dashboard: Dashboard::new(config, surface, Arc::clone(&sequencers), selection_tx),
            sequencers,
            selection_rx,
            cancel_token: CancellationToken::new(),
        }
    }

    fn harness() -> Harness {
        harness_with(&AppConfig::default(), RecordingSurface::new())
    }

    impl Harness {
        fn flights(&self, flights: Vec<Flight>) -> Update {
            Update::Flights(Stamped {
                token: self.sequencers.flights.issue(),
                result: Ok(flights),
            })
        }

        fn route(&self, flight_id: &str, flown: Vec<TrackPoint>) -> Update {
            Update::Route(Stamped {
                token: self.sequencers.route.issue(),
                result: Ok(RouteFetch {
                    flight_id: flight_id.to_string(),
                    flown,
                    planned: Vec::new(),
                }),
            })
        }

        async fn apply(&mut self, update: Update) {
            self.dashboard.apply_update(update, t0(), &self.cancel_token).await;
        }
    }

    fn flight(id: &str, lon: f64) -> Flight {
        let mut flight = Flight::new(id, 40.0, lon);
        flight.altitude_ft = 30000.0;
        flight.speed_kts = 450.0;
        flight
    }

    fn track(n: u32) -> Vec<TrackPoint> {
        (0..n)
            .map(|i| TrackPoint::new(40.0, -80.0 + f64::from(i) * 0.1, 30000.0).with_timestamp(i64::from(i)))
            .collect()
    }

    #[tokio::test]
    async fn test_stale_flights_snapshot_is_dropped() {
        let mut h = harness();
        let older = h.flights(vec![flight("C", 3.0)]);
        let newer = h.flights(vec![flight("A", 1.0), flight("B", 2.0)]);

        h.apply(newer).await;
        h.apply(older).await;

        assert_eq!(h.dashboard.flights().registry().keys(), vec!["A", "B"]);
        assert_eq!(h.dashboard.status().flights.stale_dropped, 1);
        assert_eq!(h.dashboard.status().flight_markers, 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_no_update() {
        let mut h = harness();
        let update = h.flights(vec![flight("A", 1.0)]);
        h.apply(update).await;

        let failed = Update::Flights(Stamped {
            token: h.sequencers.flights.issue(),
            result: Err(ApiError::MissingSession),
        });
        h.apply(failed).await;

        let entry = h.dashboard.flights().registry().get("A").unwrap();
        assert_eq!(entry.miss_count, 0);
        assert_eq!(h.dashboard.status().flights.polls_failed, 1);
        assert_eq!(h.dashboard.status().notices().count(), 1);
    }

    #[tokio::test]
    async fn test_route_follows_selected_flight() {
        let mut h = harness();
        let update = h.flights(vec![flight("f-1", -79.5), flight("f-2", 10.0)]);
        h.apply(update).await;

        assert!(h.dashboard.handle_command(Command::SelectFlight("f-1".to_string()), t0()));
        assert_eq!(h.selection_rx.borrow().as_deref(), Some("f-1"));

        let other = h.route("f-2", track(10));
        h.apply(other).await;
        assert!(h.dashboard.surface().route().is_some_and(|g| g.is_empty()));

        let route = h.route("f-1", track(10));
        h.apply(route).await;
        let geometry = h.dashboard.surface().route().unwrap();
        assert_eq!(geometry.current_index, Some(5));
        assert_eq!(geometry.traveled.len(), 6);
        assert_eq!(geometry.remaining.len(), 5);
    }

    #[tokio::test]
    async fn test_route_failure_clears_and_notifies() {
        let mut surface = RecordingSurface::new();
        surface.fail_route(true);
        let mut h = harness_with(&AppConfig::default(), surface);

        let update = h.flights(vec![flight("f-1", -79.5)]);
        h.apply(update).await;
        h.dashboard.handle_command(Command::SelectFlight("f-1".to_string()), t0());
        let route = h.route("f-1", track(10));
        h.apply(route).await;

        assert!(h.dashboard.surface().route().is_some_and(|g| g.is_empty()));
        let last = h.dashboard.status().notices().last().unwrap();
        assert!(last.message.starts_with("Unable to display flight route"));
    }

    #[tokio::test]
    async fn test_selection_moves_between_kinds() {
        let mut h = harness();
        let mut katl = Airport::new("KATL");
        katl.latitude = Some(33.64);
        katl.longitude = Some(-84.43);
        let airports = Update::Airports(Stamped {
            token: h.sequencers.airports.issue(),
            result: Ok(vec![katl]),
        });
        let flights = h.flights(vec![flight("f-1", 1.0)]);
        h.apply(airports).await;
        h.apply(flights).await;

        h.dashboard.handle_command(Command::SelectFlight("f-1".to_string()), t0());
        h.dashboard.handle_command(Command::SelectAirport("KATL".to_string()), t0());

        assert_eq!(h.dashboard.flights().registry().selected(), None);
        assert_eq!(h.dashboard.airports().registry().selected(), Some("KATL"));
        assert_eq!(*h.selection_rx.borrow(), None);
    }

    #[tokio::test]
    async fn test_unknown_selection_raises_notice() {
        let mut h = harness();
        h.dashboard.handle_command(Command::SelectFlight("ghost".to_string()), t0());
        assert_eq!(*h.selection_rx.borrow(), None);
        assert!(h
            .dashboard
            .status()
            .notices()
            .any(|n| n.message == "Flight ghost is not on the map"));
    }

    #[tokio::test]
    async fn test_cancelled_batch_is_abandoned() {
        let mut config = AppConfig::default();
        config.markers.batch_size = 2;
        let mut h = harness_with(&config, RecordingSurface::new());
        h.cancel_token.cancel();

        let update = h.flights((0..5).map(|i| flight(&format!("f-{i}"), f64::from(i))).collect());
        h.apply(update).await;

        assert_eq!(h.dashboard.flights().registry().len(), 2);
        assert_eq!(h.dashboard.status().flights.polls_ok, 0);
    }

    #[tokio::test]
    async fn test_run_tears_down_on_quit() {
        let h = harness();
        let (update_tx, update_rx) = mpsc::channel(8);
        let (command_tx, command_rx) = mpsc::channel(8);

        update_tx.send(h.flights(vec![flight("A", 1.0)])).await.unwrap();
        command_tx.send(Command::Quit).await.unwrap();

        let cancel_token = h.cancel_token.clone();
        let dashboard = h.dashboard.run(update_rx, command_rx, cancel_token.clone()).await;

        assert!(cancel_token.is_cancelled());
        assert_eq!(dashboard.surface().live_count(), 0);
        assert!(dashboard.flights().registry().is_empty());
    }
}
