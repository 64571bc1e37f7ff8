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

mod api;
mod commands;
mod config;
mod dashboard;
mod poller;
mod status;
mod surface;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use flightdeck_core::{LiveEntity, RenderSurface, SelectionEvent};
use log::{error, info, warn};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use api::ApiClient;
use config::{AppConfig, SurfaceKind};
use dashboard::Dashboard;
use poller::{PollContext, Sequencers, Update};
use surface::{JsonSurface, LogSurface};

#[derive(Parser, Debug)]
#[command(name = "flightdeck")]
#[command(version, about = "Live flight-tracking dashboard for a flight-simulation API", long_about = None)]
struct Args {
    /// Configuration file (defaults to the per-user confy location)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session to track, overrides the config file
    #[arg(short, long)]
    session: Option<String>,

    /// API base URL, overrides the config file
    #[arg(long)]
    base_url: Option<String>,

    /// Where map commands are written
    #[arg(long, value_enum)]
    surface: Option<SurfaceKind>,

    /// Log filter, e.g. "debug" or "flightdeck=trace" (RUST_LOG is used when omitted)
    #[arg(long)]
    log_level: Option<String>,

    /// Do not poll airport activity
    #[arg(long)]
    no_airports: bool,
}

fn init_logging(level: Option<&str>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.parse_filters(level);
    }
    builder.init();
}

fn load_config(args: &Args) -> Result<AppConfig, confy::ConfyError> {
    let mut config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => {
            if let Ok(path) = AppConfig::get_config_path() {
                info!("Using configuration at {}", path.display());
            }
            AppConfig::load()?
        }
    };

    if let Some(session) = &args.session {
        config.api.session_id.clone_from(session);
    }
    if let Some(base_url) = &args.base_url {
        config.api.base_url.clone_from(base_url);
    }
    if let Some(surface) = args.surface {
        config.surface = surface;
    }
    if args.no_airports {
        config.show_airports = false;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref());

    let config = load_config(&args)?;
    let client = ApiClient::new(&config.api)?;
    info!("Starting flightdeck for {:?}", client);

    let cancel_token = CancellationToken::new();
    let sequencers = Arc::new(Sequencers::default());
    let (update_tx, update_rx) = mpsc::channel(32);
    let (command_tx, command_rx) = mpsc::channel(8);
    let (selection_tx, selection_rx) = watch::channel(None);

    let ctx = PollContext {
        client,
        sequencers: Arc::clone(&sequencers),
        update_tx,
        cancel_token: cancel_token.clone(),
    };

    let mut tasks = tokio::task::JoinSet::new();
    tasks.spawn(poller::poll_flights(ctx.clone(), config.poll.flights_interval()));
    if config.show_airports {
        tasks.spawn(poller::poll_airports(ctx.clone(), config.poll.airports_interval()));
    }
    tasks.spawn(poller::poll_route(ctx, config.poll.route_interval(), selection_rx));
    commands::spawn_stdin_reader(command_tx)?;

    let dashboard = match config.surface {
        SurfaceKind::Log => spawn_dashboard(
            Dashboard::new(&config, LogSurface::new(), sequencers, selection_tx),
            update_rx,
            command_rx,
            &cancel_token,
        ),
        SurfaceKind::Json => spawn_dashboard(
            Dashboard::new(&config, JsonSurface::new(std::io::stdout()), sequencers, selection_tx),
            update_rx,
            command_rx,
            &cancel_token,
        ),
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for ctrl-c: {}", e);
            }
            info!("Interrupted, shutting down");
            cancel_token.cancel();
        }
        () = cancel_token.cancelled() => {}
    }

    if let Err(e) = dashboard.await {
        error!("Dashboard task failed: {}", e);
    }
    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            warn!("Poll task ended abnormally: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

fn spawn_dashboard<S>(
    dashboard: Dashboard<S>,
    update_rx: mpsc::Receiver<Update>,
    command_rx: mpsc::Receiver<commands::Command>,
    cancel_token: &CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    S: RenderSurface + Send + 'static,
{
    tokio::spawn(log_selections(dashboard.subscribe_flights(), cancel_token.clone()));
    tokio::spawn(log_selections(dashboard.subscribe_airports(), cancel_token.clone()));

    let cancel_token = cancel_token.clone();
    tokio::spawn(async move {
        let dashboard = dashboard.run(update_rx, command_rx, cancel_token).await;
        info!("Final status: {}", dashboard.status().summary());
    })
}

/// External listener for selection events.
async fn log_selections<E>(mut events: broadcast::Receiver<SelectionEvent<E>>, cancel_token: CancellationToken)
where
    E: LiveEntity + Send + 'static,
{
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SelectionEvent::Selected(entity)) => {
                    let position = entity
                        .position()
                        .map_or_else(|| "unknown".to_string(), |p| format!("({:.4}, {:.4})", p.lat, p.lon));
                    info!("Selected {} at {}: {:?}", entity.key(), position, entity);
                }
                Ok(SelectionEvent::Cleared(key)) => info!("Selection cleared on {}", key),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Missed {} selection events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return,
            },
            () = cancel_token.cancelled() => return,
        }
    }
}
