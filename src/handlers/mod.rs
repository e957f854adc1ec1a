//! API handlers for the application service

pub mod applications;
pub mod health;
pub mod reference;


use serde::Serialize;

pub use applications::*;
pub use health::health_check;
pub use reference::{list_loan_statuses, list_loan_types};

/// Envelope for every successful response
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}
