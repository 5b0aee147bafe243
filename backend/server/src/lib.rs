//! Documentation of the Accountability Bet waitlist gateway.
//!
//! The landing page collects leads into a waitlist. This server is the thin layer between the page and the
//! hosted database: three endpoints that join an email, confirm it through an emailed token, and report how
//! many people are waiting.
//!
//!
//!
//! # General Infrastructure
//! - Landing page posts to `/api/waitlist/join` and links to `/api/waitlist/confirm` from the email
//! - All waitlist rules (uniqueness, position, referrals, token expiry) live in stored procedures
//! - This server calls them by name through the PostgREST RPC surface, see [`database`]
//! - Transactional email goes through Resend, see [`notify`]
//!
//!
//!
//! # Preventing Abuse
//!
//! **Goal**: Stop a single client from flooding the join endpoint and the email provider behind it.
//!
//! - In-memory fixed window per client address, 5 joins per hour by default, see [`limiter`]
//! - Client address is the socket peer, falling back to `X-Forwarded-For`, then a shared `unknown` bucket
//! - Ledger resets on restart, which is fine for a landing page
//! - Expired records are swept on an interval so memory stays bounded
//!
//!
//!
//! # Notes
//!
//! ## Email Is Best Effort
//! The store write is the source of truth. Once it succeeds the request succeeds, whatever happens to the
//! email. A failed send is logged and lost, the user can join again to get a new token.
//!
//! ## Count
//! `/api/waitlist/count` is hit on every page view. It is cached for 5 minutes in process and again by
//! browsers through `Cache-Control`. Counts under 100 show as 0, a tiny number looks worse than none.
//!
//!
//!
//! # Setup
//!
//! Environment, see [`config`] for the full list.
//! ```sh
//! export SUPABASE_URL=https://<project>.supabase.co
//! export SUPABASE_SERVICE_ROLE_KEY=...
//! export RESEND_API_KEY=...
//! export RUST_LOG=info
//! ```
//!
//! Run.
//! ```sh
//! cargo run -p waitlist
//! ```
//!
//! Poke a running server.
//! ```sh
//! cargo run -p tester -- you@example.com
//! ```
use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use tokio::{net::TcpListener, signal::ctrl_c, time::interval};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

pub mod cache;
pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod limiter;
pub mod notify;
pub mod routes;
pub mod state;
pub mod templates;
pub mod utils;

use config::Config;
use routes::{confirm_handler, count_handler, join_handler};
use state::State;

pub const JOIN_PATH: &str = "/api/waitlist/join";
pub const CONFIRM_PATH: &str = "/api/waitlist/confirm";
pub const COUNT_PATH: &str = "/api/waitlist/count";

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Loading config...");
    let config = Config::load();

    info!("Initializing state...");
    let state = State::new(config)?;

    tokio::spawn(sweep_rate_limits(
        state.clone(),
        state.config.rate_sweep_interval,
    ));

    info!("Starting server...");
    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route(JOIN_PATH, post(join_handler))
        .route(CONFIRM_PATH, get(confirm_handler))
        .route(COUNT_PATH, get(count_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn sweep_rate_limits(state: Arc<State>, period: Duration) {
    let mut ticker = interval(period.max(Duration::from_secs(1)));

    loop {
        ticker.tick().await;
        state.limiter.evict_expired();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }

        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }

        info!("Received terminate signal, shutting down");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
