//! HTTP API handlers and routing.

mod certificates;
pub mod error;
mod health;
mod pages;
mod request_id;

use axum::Router;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create the main router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .merge(health::routes())
        // Issue, download, verify
        .merge(certificates::routes())
        // Middleware
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(request_id::MakeRequestUlid))
        // Application state
        .with_state(state)
}
