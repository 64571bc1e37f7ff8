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

//! Periodic fetch tasks.
//!
//! Each stream ticks on its own interval. Every tick takes a sequence token and
//! spawns the fetch, so a slow response never delays the cadence; responses may
//! therefore arrive out of order and the dashboard drops stale ones by token.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use flightdeck_core::{Airport, Flight, SequenceToken, SnapshotSequencer, TrackPoint};
use log::{debug, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ApiError};
use crate::status::Stream;

/// A fetch result tagged with the token taken before the request was sent.
#[derive(Debug)]
pub struct Stamped<T> {
    pub token: SequenceToken,
    pub result: Result<T, ApiError>,
}

/// Flown history and filed plan for one flight.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteFetch {
    pub flight_id: String,
    pub flown: Vec<TrackPoint>,
    pub planned: Vec<TrackPoint>,
}

#[derive(Debug)]
pub enum Update {
    Flights(Stamped<Vec<Flight>>),
    Airports(Stamped<Vec<Airport>>),
    Route(Stamped<RouteFetch>),
}

/// One sequencer per stream, shared between pollers and the dashboard.
#[derive(Debug, Default)]
pub struct Sequencers {
    pub flights: SnapshotSequencer,
    pub airports: SnapshotSequencer,
    pub route: SnapshotSequencer,
}

impl Sequencers {
    pub fn for_stream(&self, stream: Stream) -> &SnapshotSequencer {
        match stream {
            Stream::Flights => &self.flights,
            Stream::Airports => &self.airports,
            Stream::Route => &self.route,
        }
    }
}

/// Shared wiring for every poll task.
#[derive(Debug, Clone)]
pub struct PollContext {
    pub client: ApiClient,
    pub sequencers: Arc<Sequencers>,
    pub update_tx: mpsc::Sender<Update>,
    pub cancel_token: CancellationToken,
}

pub async fn poll_flights(ctx: PollContext, period: Duration) {
    let client = ctx.client.clone();
    run_poller(Stream::Flights, period, ctx, None, move |token| {
        let client = client.clone();
        Some(async move {
            Update::Flights(Stamped {
                token,
                result: client.fetch_flights().await,
            })
        })
    })
    .await;
}

pub async fn poll_airports(ctx: PollContext, period: Duration) {
    let client = ctx.client.clone();
    run_poller(Stream::Airports, period, ctx, None, move |token| {
        let client = client.clone();
        Some(async move {
            Update::Airports(Stamped {
                token,
                result: client.fetch_airports().await,
            })
        })
    })
    .await;
}

/// Poll the route of whichever flight is selected. A selection change
/// triggers an immediate fetch; nothing is fetched while nothing is selected.
pub async fn poll_route(ctx: PollContext, period: Duration, selection_rx: watch::Receiver<Option<String>>) {
    let client = ctx.client.clone();
    let current = selection_rx.clone();
    run_poller(Stream::Route, period, ctx, Some(selection_rx), move |token| {
        let flight_id = current.borrow().clone()?;
        let client = client.clone();
        Some(async move {
            Update::Route(Stamped {
                token,
                result: fetch_route(&client, flight_id).await,
            })
        })
    })
    .await;
}

/// Flown history is required; a missing plan only degrades the route.
async fn fetch_route(client: &ApiClient, flight_id: String) -> Result<RouteFetch, ApiError> {
    let (flown, planned) = tokio::join!(
        client.fetch_flight_route(&flight_id),
        client.fetch_flight_plan(&flight_id)
    );
    let planned = planned.unwrap_or_else(|e| {
        warn!("Flight plan for {} unavailable: {}", flight_id, e);
        Vec::new()
    });
    Ok(RouteFetch {
        flown: flown?,
        planned,
        flight_id,
    })
}

async fn run_poller<F, Fut>(
    stream: Stream,
    period: Duration,
    ctx: PollContext,
    mut refresh_rx: Option<watch::Receiver<Option<String>>>,
    mut fetch: F,
) where
    F: FnMut(SequenceToken) -> Option<Fut>,
    Fut: Future<Output = Update> + Send + 'static,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight: JoinSet<()> = JoinSet::new();

    info!("Polling {} every {}s", stream, period.as_secs());

    loop {
        let wake = tokio::select! {
            _ = interval.tick() => Wake::Tick,
            changed = wait_for_change(refresh_rx.as_mut()) => match changed {
                Ok(()) => Wake::SelectionChanged,
                Err(_) => Wake::SelectionClosed,
            },
            Some(_) = in_flight.join_next() => Wake::Reaped,
            () = ctx.cancel_token.cancelled() => Wake::Cancelled,
        };

        match wake {
            Wake::Tick => {}
            Wake::SelectionChanged => debug!("{} poll triggered by selection change", stream),
            Wake::SelectionClosed => {
                // Selection owner is gone; keep plain ticking
                refresh_rx = None;
                continue;
            }
            Wake::Reaped => continue,
            Wake::Cancelled => {
                info!("{} poller cancelled with {} requests in flight", stream, in_flight.len());
                in_flight.abort_all();
                return;
            }
        }

        let token = ctx.sequencers.for_stream(stream).issue();
        let Some(request) = fetch(token) else {
            continue;
        };
        debug!("{} request {} sent", stream, token);

        let update_tx = ctx.update_tx.clone();
        in_flight.spawn(async move {
            let update = request.await;
            let _ = update_tx.send(update).await;
        });
    }
}

enum Wake {
    Tick,
    SelectionChanged,
    SelectionClosed,
    Reaped,
    Cancelled,
}

async fn wait_for_change(rx: Option<&mut watch::Receiver<Option<String>>>) -> Result<(), watch::error::RecvError> {
    match rx {
        Some(rx) => rx.changed().await,
        None => std::future::pending().await,
    }
}
