use std::sync::Arc;

use axum::{extract::State, Json};

use super::ApiResponse;
use crate::application::gateways::ReferenceDataGateway;
use crate::application::{ApplicationError, LoanStatus, LoanType};
use crate::error::ApiResult;

pub async fn list_loan_types(
    State(reference_data): State<Arc<dyn ReferenceDataGateway>>,
) -> ApiResult<Json<ApiResponse<Vec<LoanType>>>> {
    let loan_types = reference_data
        .all_loan_types()
        .await
        .map_err(ApplicationError::from)?;
    Ok(Json(ApiResponse::ok(loan_types)))
}

pub async fn list_loan_statuses(
    State(reference_data): State<Arc<dyn ReferenceDataGateway>>,
) -> ApiResult<Json<ApiResponse<Vec<LoanStatus>>>> {
    let loan_statuses = reference_data
        .all_loan_statuses()
        .await
        .map_err(ApplicationError::from)?;
    Ok(Json(ApiResponse::ok(loan_statuses)))
}
