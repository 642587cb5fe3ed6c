use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::engine::Monitor;
use crate::models::DashboardSnapshot;
use crate::shutdown::ShutdownSignal;

pub async fn get_stats(State(monitor): State<Arc<Monitor>>) -> Json<DashboardSnapshot> {
    Json(monitor.snapshot())
}

pub fn create_router(monitor: Arc<Monitor>) -> Router {
    Router::new()
        .route("/api/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(monitor)
}

pub async fn start_server(
    port: u16,
    monitor: Arc<Monitor>,
    mut signal: ShutdownSignal,
) -> std::io::Result<()> {
    let app = create_router(monitor);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Snapshot API: http://localhost:{}/api/stats", addr.port());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { signal.triggered().await })
        .await
}
