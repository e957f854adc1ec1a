//! Bearer token extraction
//!
//! The service does not verify tokens itself. The raw token is handed to the
//! identity service, which resolves it to a profile or rejects it.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::application::AuthToken;
use crate::error::ApiError;

/// Extractor for the caller's bearer token
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(BearerToken(token): BearerToken) -> impl IntoResponse {
///     service.get_all_applications(&token).await
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BearerToken(pub AuthToken);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    ApiError::Unauthorized(
                        "Authorization header with Bearer token required".to_string(),
                    )
                })?;

        let token = bearer.token().trim();
        if token.is_empty() {
            return Err(ApiError::Unauthorized("Bearer token is empty".to_string()));
        }

        Ok(BearerToken(AuthToken::new(token)))
    }
}
