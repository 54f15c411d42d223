//! HTTP server for netriaged

use crate::dispatcher::CaptureDispatcher;
use crate::routes;
use crate::session::TriageSessionManager;
use anyhow::{Context, Result};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Request bodies are small JSON documents
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Application state shared across handlers
pub struct AppState {
    pub manager: Arc<TriageSessionManager>,
    pub dispatcher: CaptureDispatcher,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(manager: Arc<TriageSessionManager>, dispatcher: CaptureDispatcher) -> Self {
        Self {
            manager,
            dispatcher,
            start_time: Instant::now(),
        }
    }
}

/// Build the full router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::triage_routes())
        .merge(routes::capture_routes())
        .merge(routes::health_routes())
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until ctrl-c
pub async fn run(state: Arc<AppState>, listen: &str) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    info!("  Listening on http://{}", listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("  Shutting down gracefully");
    }
}
