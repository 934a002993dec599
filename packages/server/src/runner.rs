//! Relay execution logic.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handler::{
    debug_session_state, get_session_detail, get_sessions, health_check, websocket_handler,
};
use super::signal::shutdown_signal;
use super::state::AppState;
use super::sweep::run_liveness_sweep;

/// Run the session relay
///
/// # Arguments
///
/// * `host` - The host address to bind to (e.g., "127.0.0.1")
/// * `port` - The port number to bind to (e.g., 8080)
pub async fn run_server(host: String, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = Arc::new(AppState::new());

    // Ghost reclamation runs for the lifetime of the process.
    let sweep_state = app_state.clone();
    let sweep_task = tokio::spawn(async move {
        run_liveness_sweep(sweep_state).await;
    });

    let app = Router::new()
        .route("/ws", get(websocket_handler))
        .route("/api/health", get(health_check))
        .route("/api/sessions", get(get_sessions))
        .route("/api/sessions/{session_id}", get(get_session_detail))
        .route("/debug/sessions/{session_id}", get(debug_session_state))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state);

    let bind_addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Yoriai relay listening on {}", listener.local_addr()?);
    tracing::info!("Connect to: ws://{}/ws", bind_addr);
    tracing::info!("Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweep_task.abort();
    tracing::info!("Relay shutdown complete");

    Ok(())
}
