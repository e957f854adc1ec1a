//! Middleware for the application API
//!
//! Request tracing, security headers and bearer token extraction.

pub mod auth;
mod security;
mod tracing;

pub use auth::BearerToken;
pub use security::security_headers;
pub use tracing::{request_tracing, REQUEST_ID_HEADER};
