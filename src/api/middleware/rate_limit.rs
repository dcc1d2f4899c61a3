use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::{error::ApiError, state::AppState};

/// Rejects the request with 429 when the client's token bucket is empty.
/// Clients are keyed by peer IP; requests without connection info share the
/// `"unknown"` bucket.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(limiter) = &state.rate_limiter {
        let client = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        if !limiter.allow(&client) {
            tracing::warn!(client = %client, "rate limit exceeded");
            return ApiError::TooManyRequests.into_response();
        }
    }

    next.run(request).await
}
