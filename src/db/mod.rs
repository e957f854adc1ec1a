//! PostgreSQL pool, schema migrations and readiness probe

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),
}

/// Open the pool sized from `DB_MAX_CONNECTIONS`. Connects eagerly so a bad
/// URL fails startup instead of the first request.
pub async fn create_pool(config: &Config) -> Result<PgPool, DbError> {
    tracing::info!(
        url = %config.database_url_masked(),
        max_connections = config.db_max_connections,
        "Opening database pool"
    );

    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))
}

/// Apply `migrations/`, which also seeds loan types and statuses
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    let migrator = sqlx::migrate!("./migrations");
    tracing::info!(known = migrator.iter().count(), "Applying schema migrations");

    migrator
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))
}

/// Pool handle kept in the application state for readiness reporting
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Round trip against the status table, so a reachable but unmigrated
    /// database reports unhealthy. Returns the probe latency.
    pub async fn health(&self) -> Result<Duration, DbError> {
        let started = Instant::now();
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM loan_statuses")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DbError::HealthCheckError(e.to_string()))?;
        Ok(started.elapsed())
    }
}
