//! Cricket scoring backend entrypoint wiring REST, SSE and ball-store layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cricket_scoring_back::{
    config::AppConfig,
    dao::{
        ball_store::{BallEventStore, memory::MemoryBallStore},
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    spawn_storage(app_state.clone());

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Pick the ball store backend and hand it to the storage supervisor.
fn spawn_storage(state: SharedState) {
    if spawn_rest_storage(&state) {
        return;
    }

    warn!("no remote store configured; match data lives in memory only");
    let store: Arc<dyn BallEventStore> =
        Arc::new(MemoryBallStore::new(state.config().sse_capacity));
    tokio::spawn(storage_supervisor::run(state, move || {
        let store = store.clone();
        async move { Ok::<Arc<dyn BallEventStore>, StorageError>(store) }
    }));
}

/// Supervise the REST store when `STORE_REST_URL` is set.
#[cfg(feature = "rest-store")]
fn spawn_rest_storage(state: &SharedState) -> bool {
    use cricket_scoring_back::dao::ball_store::rest::{RestBallStore, RestConfig};

    if env::var("STORE_REST_URL").is_err() {
        return false;
    }

    info!("using REST ball store");
    let capacity = state.config().sse_capacity;
    let poll_interval = state.config().poll_interval;
    tokio::spawn(storage_supervisor::run(state.clone(), move || async move {
        let rest_config = RestConfig::from_env(poll_interval)?;
        let store = RestBallStore::connect(rest_config, capacity).await?;
        Ok::<Arc<dyn BallEventStore>, StorageError>(Arc::new(store))
    }));
    true
}

#[cfg(not(feature = "rest-store"))]
fn spawn_rest_storage(_state: &SharedState) -> bool {
    false
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
