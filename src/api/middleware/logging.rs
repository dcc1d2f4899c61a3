use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    middleware::Next,
    response::Response,
};
use tracing::{info, warn};

/// Logs one line per request; server errors are logged at warn level.
pub async fn request_logger(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    let client = client.as_deref().unwrap_or("unknown");

    if response.status().is_server_error() {
        warn!(%method, %path, status, duration_ms, client, "request failed");
    } else {
        info!(%method, %path, status, duration_ms, client, "request completed");
    }

    response
}
