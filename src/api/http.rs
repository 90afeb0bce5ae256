//! HTTP server setup with Axum

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::rest::{records, stats};
use super::sse::events_handler;
use super::state::AppState;

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS configuration - allow all origins for development
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Statistics
        .route("/api/granularities", get(stats::list_granularities))
        .route("/api/stats/:granularity", get(stats::get_stats))
        .route("/api/settings/reset", post(stats::reset_settings))
        // Log management
        .route(
            "/api/records",
            get(records::list_records).delete(records::clear_records),
        )
        .route(
            "/api/records/:row_id",
            patch(records::update_record).delete(records::delete_record),
        )
        // Notification stream
        .route("/api/events", get(events_handler))
        .layer(cors)
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` resolves
pub async fn serve<F>(addr: SocketAddr, state: Arc<AppState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
