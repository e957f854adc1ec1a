use std::sync::Arc;

use axum::extract::FromRef;

use crate::application::gateways::ReferenceDataGateway;
use crate::application::ApplicationService;
use crate::db::Database;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub application_service: Arc<ApplicationService>,
    pub reference_data: Arc<dyn ReferenceDataGateway>,
    pub database: Database,
}

impl AppState {
    pub fn new(
        application_service: Arc<ApplicationService>,
        reference_data: Arc<dyn ReferenceDataGateway>,
        database: Database,
    ) -> Self {
        Self {
            application_service,
            reference_data,
            database,
        }
    }
}

impl FromRef<AppState> for Arc<ApplicationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.application_service.clone()
    }
}

impl FromRef<AppState> for Arc<dyn ReferenceDataGateway> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.reference_data.clone()
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.database.clone()
    }
}
