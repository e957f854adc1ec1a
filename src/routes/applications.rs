//! Loan application route definitions

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn application_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/applications", post(create_application))
        .route("/api/v1/applications", get(list_applications))
        .route("/api/v1/applications/search", get(search_applications))
        .route("/api/v1/applications/status", put(update_application_status))
        .route(
            "/api/v1/applications/owner/:owner_ref",
            get(list_applications_by_owner),
        )
        .route("/api/v1/applications/:id", get(get_application))
}
