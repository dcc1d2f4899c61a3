pub mod chat;
pub mod documents;
pub mod health;
pub mod menu;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, Method};
use axum::{middleware, routing::get, routing::post, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::middleware::{rate_limit, request_logger};
use crate::api::state::AppState;

/// Room for multipart framing on top of the per-file upload limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = build_cors(&state.config.config.cors.allowed_origins);
    let body_limit = state
        .config
        .config
        .storage
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    let limited = Router::new()
        .route("/ingest", post(documents::ingest_upload))
        .route("/chat", post(chat::chat_form))
        .nest("/api/v1", api_v1_routes())
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/", get(menu::menu))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .merge(limited)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_logger))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(origins)
    }
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat::chat_handler))
        .route("/documents", post(documents::create_document))
        .route("/documents/search", post(documents::search_documents))
}
