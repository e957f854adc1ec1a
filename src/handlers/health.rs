use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::db::Database;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_latency_ms: Option<u128>,
    pub version: &'static str,
}

/// Reports database readiness; answers 503 while the database is down
pub async fn health_check(State(database): State<Database>) -> (StatusCode, Json<HealthResponse>) {
    let (status_code, status, database, database_latency_ms) = match database.health().await {
        Ok(latency) => (
            StatusCode::OK,
            "healthy",
            "connected".to_string(),
            Some(latency.as_millis()),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "unhealthy",
                e.to_string(),
                None,
            )
        }
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            database,
            database_latency_ms,
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}
