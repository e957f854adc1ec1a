use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::ApiResponse;
use crate::application::{
    ApplicationRecord, ApplicationService, CreateApplication, EnrichedApplicationRecord, OwnerRef,
    PageResult, SearchCriteria, UpdateApplicationStatus,
};
use crate::error::{ApiError, ApiResult};
use crate::middleware::BearerToken;

const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateApplicationRequest {
    #[validate(length(min = 1, max = 255))]
    pub owner_ref: String,
    pub loan_amount: Decimal,
    pub loan_term: Decimal,
    #[validate(range(min = 1))]
    pub loan_type_id: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub application_id: Uuid,
    #[validate(range(min = 1))]
    pub loan_status_id: i32,
}

/// File a new application for the caller
pub async fn create_application(
    State(service): State<Arc<ApplicationService>>,
    BearerToken(token): BearerToken,
    Json(request): Json<CreateApplicationRequest>,
) -> ApiResult<impl IntoResponse> {
    request.validate()?;

    let record: ApplicationRecord = service
        .create_application(
            &token,
            CreateApplication {
                owner_ref: OwnerRef::new(request.owner_ref.trim()),
                loan_amount: request.loan_amount,
                loan_term: request.loan_term,
                loan_type_id: request.loan_type_id,
            },
        )
        .await?;

    let location = format!("/api/v1/applications/{}", record.application_id);
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(ApiResponse::ok(record)),
    ))
}

pub async fn list_applications(
    State(service): State<Arc<ApplicationService>>,
    BearerToken(token): BearerToken,
) -> ApiResult<Json<ApiResponse<Vec<EnrichedApplicationRecord>>>> {
    let records = service.get_all_applications(&token).await?;
    Ok(Json(ApiResponse::ok(records)))
}

pub async fn get_application(
    State(service): State<Arc<ApplicationService>>,
    BearerToken(token): BearerToken,
    Path(application_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<EnrichedApplicationRecord>>> {
    let record = service.get_application(&token, application_id).await?;
    Ok(Json(ApiResponse::ok(record)))
}

pub async fn list_applications_by_owner(
    State(service): State<Arc<ApplicationService>>,
    BearerToken(token): BearerToken,
    Path(owner_ref): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<EnrichedApplicationRecord>>>> {
    let owner_ref = OwnerRef::new(owner_ref);
    if owner_ref.is_blank() {
        return Err(ApiError::BadRequest("owner reference must not be empty".to_string()));
    }

    let records = service.get_applications_by_owner(&token, &owner_ref).await?;
    Ok(Json(ApiResponse::ok(records)))
}

/// Paginated search. `sort_by`, `sort_direction`, `page` and `size` drive the
/// page; every other query parameter is a column filter.
pub async fn search_applications(
    State(service): State<Arc<ApplicationService>>,
    BearerToken(token): BearerToken,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ApiResponse<PageResult<EnrichedApplicationRecord>>>> {
    let criteria = search_criteria(params)?;
    let page = service.search_applications(&token, &criteria).await?;
    Ok(Json(ApiResponse::ok(page)))
}

pub async fn update_application_status(
    State(service): State<Arc<ApplicationService>>,
    BearerToken(token): BearerToken,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<ApiResponse<EnrichedApplicationRecord>>> {
    request.validate()?;

    let record = service
        .update_application_status(
            &token,
            UpdateApplicationStatus {
                application_id: request.application_id,
                loan_status_id: request.loan_status_id,
            },
        )
        .await?;
    Ok(Json(ApiResponse::ok(record)))
}

fn search_criteria(mut params: HashMap<String, String>) -> ApiResult<SearchCriteria> {
    let page = parse_page_param(params.remove("page"), "page", 0)?;
    let size = parse_page_param(params.remove("size"), "size", DEFAULT_PAGE_SIZE)?;
    let sort_by = params.remove("sort_by");
    let sort_direction = params.remove("sort_direction");

    Ok(SearchCriteria {
        filters: params.into_iter().collect::<BTreeMap<_, _>>(),
        sort_by,
        sort_direction,
        page,
        size,
    })
}

fn parse_page_param(raw: Option<String>, name: &str, default: u32) -> ApiResult<u32> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("{name} must be a non-negative integer"))),
    }
}
