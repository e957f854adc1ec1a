//! Error taxonomy of the application core

use thiserror::Error;
use uuid::Uuid;

use super::amortization::AmortizationError;
use super::gateways::{NotificationError, StoreError, UserServiceError};

/// Which reference a row failed to resolve during enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    LoanType,
    LoanStatus,
    UserProfile,
}

impl ReferenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::LoanType => "loan type",
            ReferenceKind::LoanStatus => "loan status",
            ReferenceKind::UserProfile => "user profile",
        }
    }
}

/// Errors surfaced by the application use cases. All of them end the
/// invocation; none is retried by the core.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Application not found: {0}")]
    NotFound(Uuid),

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Application {application_id} references missing {} '{key}'", .reference.as_str())]
    ReferenceNotFound {
        application_id: Uuid,
        reference: ReferenceKind,
        key: String,
    },

    #[error("Invalid filter column: {0}")]
    InvalidFilterColumn(String),

    #[error("Invalid sort column: {0}")]
    InvalidSortColumn(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<StoreError> for ApplicationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Retrieval(message) => ApplicationError::Retrieval(message),
            StoreError::Persistence(message) => ApplicationError::Persistence(message),
        }
    }
}

impl From<UserServiceError> for ApplicationError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::Rejected(message) => ApplicationError::Unauthorized(message),
            UserServiceError::Unavailable(message) => {
                ApplicationError::DependencyUnavailable(message)
            }
        }
    }
}

impl From<NotificationError> for ApplicationError {
    fn from(err: NotificationError) -> Self {
        ApplicationError::DependencyUnavailable(err.to_string())
    }
}

impl From<AmortizationError> for ApplicationError {
    fn from(err: AmortizationError) -> Self {
        match err {
            AmortizationError::InvalidArgument(message) => ApplicationError::InvalidArgument(message),
        }
    }
}

pub type ApplicationResult<T> = Result<T, ApplicationError>;
