//! HTTP surface: health, resolve and embedded endpoints.

pub mod handlers;

use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/chords/resolve", get(handlers::resolve))
        .route("/api/chords/embedded", get(handlers::embedded))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
