//! API error handling
//!
//! Maps the application error taxonomy onto HTTP status codes and a uniform
//! JSON error body. Server-side failures are logged in full but answered
//! with a generic message.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::application::ApplicationError;

/// Seconds a client should wait before retrying a 503
const RETRY_AFTER_SECS: &str = "5";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or malformed credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Valid credentials without the required role or ownership
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    /// Request body failed field validation; `fields` names the offenders
    #[error("Validation error: {message}")]
    ValidationError { message: String, fields: Vec<String> },
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ApiError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::InternalError(_) | ApiError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Text sent to the client. 5xx causes stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::InternalError(_) | ApiError::DatabaseError(_) => {
                "The request could not be completed".to_string()
            }
            ApiError::ServiceUnavailable(_) => {
                "A dependency is unavailable, try again later".to_string()
            }
            other => other.to_string(),
        }
    }

    fn into_body(self) -> ErrorResponse {
        let code = self.error_code();
        let message = self.public_message();
        let details = match self {
            ApiError::ValidationError { fields, .. } if !fields.is_empty() => Some(fields),
            _ => None,
        };
        ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "Client error occurred");
        }

        let body = Json(self.into_body());
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return (status, [(header::RETRY_AFTER, RETRY_AFTER_SECS)], body).into_response();
        }
        (status, body).into_response()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(err: ApplicationError) -> Self {
        let message = err.to_string();
        match err {
            ApplicationError::InvalidData(_)
            | ApplicationError::InvalidFilterColumn(_)
            | ApplicationError::InvalidSortColumn(_)
            | ApplicationError::InvalidArgument(_) => ApiError::BadRequest(message),
            ApplicationError::Unauthorized(_) => ApiError::Forbidden(message),
            ApplicationError::NotFound(_) => ApiError::NotFound(message),
            ApplicationError::DependencyUnavailable(_) => ApiError::ServiceUnavailable(message),
            ApplicationError::Retrieval(_) | ApplicationError::Persistence(_) => {
                ApiError::DatabaseError(message)
            }
            ApplicationError::ReferenceNotFound { .. } => ApiError::InternalError(message),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = err
            .field_errors()
            .keys()
            .map(|field| field.to_string())
            .collect();
        fields.sort();
        ApiError::ValidationError {
            message: err.to_string(),
            fields,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use uuid::Uuid;

    use super::*;
    use crate::application::error::ReferenceKind;

    fn status_of(err: ApplicationError) -> StatusCode {
        ApiError::from(err).status_code()
    }

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ApiError::NotFound("test".to_string()).error_code(),
            "NOT_FOUND"
        );
        assert_eq!(
            ApiError::Forbidden("test".to_string()).error_code(),
            "FORBIDDEN"
        );
        assert_eq!(
            ApiError::Unauthorized("test".to_string()).error_code(),
            "UNAUTHORIZED"
        );
    }

    #[test]
    fn test_application_errors_map_to_status_codes() {
        assert_eq!(
            status_of(ApplicationError::InvalidData("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApplicationError::InvalidSortColumn("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApplicationError::InvalidFilterColumn("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApplicationError::Unauthorized("x".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ApplicationError::NotFound(Uuid::nil())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApplicationError::DependencyUnavailable("x".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ApplicationError::Persistence("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApplicationError::ReferenceNotFound {
                application_id: Uuid::nil(),
                reference: ReferenceKind::LoanType,
                key: "7".into(),
            }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_server_errors_hide_their_cause() {
        let response =
            ApiError::DatabaseError("relation \"applications\" does not exist".into())
                .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_of(response).await;
        assert_eq!(body["error"]["code"], "DATABASE_ERROR");
        assert!(!body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("applications"));
    }

    #[tokio::test]
    async fn test_unavailable_sets_retry_after() {
        let response = ApiError::ServiceUnavailable("user service timed out".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "5");
    }

    #[tokio::test]
    async fn test_validation_error_lists_fields() {
        let response = ApiError::ValidationError {
            message: "loan_type_id: range".into(),
            fields: vec!["loan_type_id".into()],
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_of(response).await;
        assert_eq!(body["error"]["details"][0], "loan_type_id");
    }
}
