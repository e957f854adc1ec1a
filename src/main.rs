//! Crediya loan application server
//!
//! Serves the loan application API and runs the notification outbox
//! dispatcher in the background.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use crediya_server::application::gateways::{
    ApplicationStore, NotificationGateway, OutboxStore, ReferenceDataGateway, UserProfileGateway,
};
use crediya_server::application::{
    ApplicationPolicy, ApplicationService, CriteriaCompiler, EnrichmentAggregator,
    OutboxDispatcher,
};
use crediya_server::config::Config;
use crediya_server::db::{self, Database};
use crediya_server::identity::HttpUserProfileGateway;
use crediya_server::notification::HttpQueueSender;
use crediya_server::persistence::{PgApplicationStore, PgOutboxStore, PgReferenceData};
use crediya_server::routes;
use crediya_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = config.environment.as_str(),
        owner_key = config.owner_key.as_str(),
        "Starting Crediya application service"
    );

    let db_pool = db::create_pool(&config).await?;
    db::run_migrations(&db_pool).await?;

    let store: Arc<dyn ApplicationStore> = Arc::new(PgApplicationStore::new(db_pool.clone()));
    let reference_data: Arc<dyn ReferenceDataGateway> =
        Arc::new(PgReferenceData::new(db_pool.clone()));
    let outbox: Arc<dyn OutboxStore> = Arc::new(PgOutboxStore::new(
        db_pool.clone(),
        config.outbox_max_attempts,
    ));
    let users: Arc<dyn UserProfileGateway> = Arc::new(
        HttpUserProfileGateway::new(
            &config.user_service_url,
            config.user_service_timeout,
            config.owner_key,
        )
        .context("Failed to configure user service client")?,
    );
    let notifier: Arc<dyn NotificationGateway> = Arc::new(
        HttpQueueSender::new(
            config.notification_queue_url.clone(),
            config.notification_timeout,
        )
        .context("Failed to configure notification queue client")?,
    );

    let enrichment = EnrichmentAggregator::new(
        reference_data.clone(),
        users.clone(),
        config.owner_key,
        config.miss_policy,
    );
    let application_service = Arc::new(ApplicationService::new(
        store,
        reference_data.clone(),
        users,
        enrichment,
        CriteriaCompiler::for_applications(config.max_page_size),
        ApplicationPolicy {
            pending_status_id: config.pending_status_id,
            owner_key: config.owner_key,
        },
    ));

    let pending = application_service
        .verify_pending_status()
        .await
        .context("Pending status check failed")?;
    tracing::info!(
        loan_status_id = pending.loan_status_id,
        name = %pending.name,
        "Pending status resolved"
    );

    OutboxDispatcher::new(
        outbox,
        notifier,
        config.outbox_poll_interval,
        config.outbox_batch_size,
    )
    .start();

    let app_state = AppState::new(application_service, reference_data, Database::new(db_pool));
    let app = routes::app(app_state).layer(configure_cors(config.cors_allowed_origins.as_deref()));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check at http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn configure_cors(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
