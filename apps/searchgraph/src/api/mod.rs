//! # searchgraph HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Node and edge counts
//! - `POST /next` - Record one keyword transition
//! - `GET /next/{keyword}` - Outgoing `NEXT` edges, most frequent first
//! - `GET /fail-next/{keyword}` - Outgoing `FAIL_NEXT` edges, most frequent first

mod handlers;
mod types;

pub use handlers::{
    fail_next_list_handler, health_handler, next_handler, next_list_handler, status_handler,
};
pub use types::{
    ErrorResponse, HealthResponse, NextEntry, NextListResponse, NextRequest, NextResponse,
    StatusResponse,
};

use axum::{
    Router,
    routing::{get, post},
};
use searchgraph_core::{SearchGraphError, Session};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the graph session.
#[derive(Clone)]
pub struct AppState {
    /// The session containing the graph.
    pub session: Arc<RwLock<Session>>,
}

impl AppState {
    /// Create new app state with a session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/next", post(handlers::next_handler))
        .route("/next/{keyword}", get(handlers::next_list_handler))
        .route("/fail-next/{keyword}", get(handlers::fail_next_list_handler))
        .layer(axum::extract::DefaultBodyLimit::max(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server. The session is released when the server stops.
pub async fn run_server(addr: &str, session: Session) -> Result<(), SearchGraphError> {
    let state = AppState::new(session);
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SearchGraphError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("searchgraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| SearchGraphError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("cannot listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
