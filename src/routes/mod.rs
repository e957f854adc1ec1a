//! Route definitions for the application API

mod applications;
mod reference;

use axum::{routing::get, Router};

use crate::handlers::health_check;
use crate::middleware;
use crate::state::AppState;

pub use applications::application_routes;
pub use reference::reference_routes;

/// Full router with tracing and security headers. CORS is layered on by the
/// binary since it depends on deployment settings.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(application_routes())
        .merge(reference_routes())
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}
