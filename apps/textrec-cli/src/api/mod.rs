//! REST API layer built on Axum.
//!
//! `POST /recommend` answers similarity queries against the loaded artifact
//! set; `GET /health` reports whether that set is available.

/// API error types mapped to HTTP status codes.
pub mod errors;
/// HTTP request handlers and application state.
pub mod handlers;
/// Request and response bodies.
pub mod models;

use axum::routing::{get, post};
use axum::Router;

pub use handlers::AppState;

/// Build the router with every route bound to `state`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/recommend", post(handlers::recommend))
        .route("/health", get(handlers::health))
        .with_state(state)
}
