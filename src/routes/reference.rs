//! Reference data route definitions

use axum::{routing::get, Router};

use crate::handlers::{list_loan_statuses, list_loan_types};
use crate::state::AppState;

pub fn reference_routes() -> Router<AppState> {
    Router::new()
        .route("/api/v1/loan-types", get(list_loan_types))
        .route("/api/v1/loan-statuses", get(list_loan_statuses))
}
