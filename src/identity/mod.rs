//! HTTP client for the identity service
//!
//! The caller's bearer token is forwarded on every request, so the identity
//! service applies its own authorization to each lookup.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::application::gateways::{UserProfileGateway, UserServiceError};
use crate::application::model::{AuthToken, OwnerKey, OwnerRef, Role, UserProfile};

/// Profile as served by the identity service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserProfileDto {
    id_number: i64,
    email: String,
    name: String,
    #[serde(alias = "lastname")]
    last_name: String,
    base_salary: Decimal,
    #[serde(alias = "roleName")]
    role: Role,
    #[serde(default)]
    document_type: String,
}

impl From<UserProfileDto> for UserProfile {
    fn from(dto: UserProfileDto) -> Self {
        UserProfile {
            id_number: dto.id_number,
            email: dto.email,
            name: dto.name,
            last_name: dto.last_name,
            base_salary: dto.base_salary,
            role: dto.role,
            document_type: dto.document_type,
        }
    }
}

#[derive(Debug, Serialize)]
struct BatchLookupRequest<'a> {
    key: &'static str,
    values: Vec<&'a str>,
}

/// [`UserProfileGateway`] over the identity service's REST API
#[derive(Clone)]
pub struct HttpUserProfileGateway {
    client: Client,
    base_url: Url,
    owner_key: OwnerKey,
}

impl HttpUserProfileGateway {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        owner_key: OwnerKey,
    ) -> Result<Self, UserServiceError> {
        // A trailing slash keeps Url::join from dropping the last path segment
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| {
            UserServiceError::Unavailable(format!("invalid user service url '{base_url}': {e}"))
        })?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UserServiceError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            owner_key,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, UserServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| UserServiceError::Unavailable("user service url cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn key_segment(&self) -> &'static str {
        match self.owner_key {
            OwnerKey::Email => "email",
            OwnerKey::IdNumber => "id-number",
        }
    }

    async fn fetch_profile(
        &self,
        token: &AuthToken,
        url: Url,
    ) -> Result<Option<UserProfile>, UserServiceError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token.expose())
            .send()
            .await
            .map_err(unavailable)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let dto: UserProfileDto = check_status(response)?
            .json()
            .await
            .map_err(unavailable)?;
        Ok(Some(dto.into()))
    }
}

fn unavailable(err: reqwest::Error) -> UserServiceError {
    tracing::error!(error = %err, "Error calling user service");
    UserServiceError::Unavailable(err.to_string())
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UserServiceError> {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            tracing::warn!(status = status.as_u16(), "User service rejected the caller token");
            Err(UserServiceError::Rejected(format!(
                "user service answered {status}"
            )))
        }
        s if s.is_success() => Ok(response),
        _ => {
            tracing::error!(status = status.as_u16(), "User service answered with an error");
            Err(UserServiceError::Unavailable(format!(
                "user service answered {status}"
            )))
        }
    }
}

#[async_trait]
impl UserProfileGateway for HttpUserProfileGateway {
    async fn profile_by_owner_ref(
        &self,
        token: &AuthToken,
        owner_ref: &OwnerRef,
    ) -> Result<Option<UserProfile>, UserServiceError> {
        tracing::info!(owner_ref = %owner_ref, "Looking up user profile");

        let url = self.endpoint(&["users", self.key_segment(), owner_ref.as_str()])?;
        self.fetch_profile(token, url).await
    }

    async fn profiles_by_owner_refs(
        &self,
        token: &AuthToken,
        owner_refs: &[OwnerRef],
    ) -> Result<Vec<UserProfile>, UserServiceError> {
        if owner_refs.is_empty() {
            return Ok(Vec::new());
        }
        tracing::info!(count = owner_refs.len(), "Looking up user profiles in batch");

        let url = self.endpoint(&["users", "batch"])?;
        let body = BatchLookupRequest {
            key: self.owner_key.as_str(),
            values: owner_refs.iter().map(OwnerRef::as_str).collect(),
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(token.expose())
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        let profiles: Vec<UserProfileDto> = check_status(response)?
            .json()
            .await
            .map_err(unavailable)?;
        Ok(profiles.into_iter().map(UserProfile::from).collect())
    }

    async fn profile_of_caller(&self, token: &AuthToken) -> Result<UserProfile, UserServiceError> {
        tracing::info!("Resolving caller identity");

        let url = self.endpoint(&["users", "me"])?;
        self.fetch_profile(token, url).await?.ok_or_else(|| {
            UserServiceError::Rejected("token does not belong to a known user".to_string())
        })
    }

    async fn exists_by_owner_ref(
        &self,
        token: &AuthToken,
        owner_ref: &OwnerRef,
    ) -> Result<bool, UserServiceError> {
        Ok(self.profile_by_owner_ref(token, owner_ref).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn gateway(base: &str, owner_key: OwnerKey) -> HttpUserProfileGateway {
        HttpUserProfileGateway::new(base, Duration::from_secs(1), owner_key).unwrap()
    }

    #[test]
    fn test_profile_dto_accepts_service_field_names() {
        let json = r#"{
            "idNumber": 123456789,
            "name": "Ana",
            "lastname": "Gomez",
            "email": "ana@example.com",
            "baseSalary": 4500000.0,
            "documentType": "CC",
            "roleName": "CLIENTE"
        }"#;

        let profile: UserProfile = serde_json::from_str::<UserProfileDto>(json).unwrap().into();
        assert_eq!(profile.id_number, 123456789);
        assert_eq!(profile.last_name, "Gomez");
        assert_eq!(profile.base_salary, dec!(4500000));
        assert_eq!(profile.role, Role::Cliente);
    }

    #[test]
    fn test_profile_dto_without_document_type() {
        let json = r#"{
            "idNumber": 1,
            "name": "Luis",
            "lastName": "Perez",
            "email": "luis@example.com",
            "baseSalary": 1000,
            "role": "ASESOR"
        }"#;

        let dto: UserProfileDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.document_type, "");
        assert_eq!(dto.role, Role::Asesor);
    }

    #[test]
    fn test_endpoint_escapes_owner_reference() {
        let gateway = gateway("http://users.internal/api/v1", OwnerKey::Email);
        let url = gateway
            .endpoint(&["users", gateway.key_segment(), "a/b c@example.com"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://users.internal/api/v1/users/email/a%2Fb%20c@example.com"
        );
    }

    #[test]
    fn test_endpoint_keeps_base_path_with_trailing_slash() {
        let gateway = gateway("http://users.internal/api/", OwnerKey::IdNumber);
        let url = gateway
            .endpoint(&["users", gateway.key_segment(), "42"])
            .unwrap();
        assert_eq!(url.as_str(), "http://users.internal/api/users/id-number/42");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        assert!(HttpUserProfileGateway::new(
            "not a url",
            Duration::from_secs(1),
            OwnerKey::Email
        )
        .is_err());
    }
}
