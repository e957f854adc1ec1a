//! Ports the application core consumes
//!
//! Every collaborator outside the core (database, identity service, message
//! queue) is reached through one of these traits so the use cases can be
//! exercised against mocks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::criteria::QueryPlan;
use super::model::{
    Application, AuthToken, EnrichedApplicationRecord, LoanStatus, LoanType, OwnerRef,
    UserProfile,
};

/// Errors raised by database-backed adapters
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("persistence failed: {0}")]
    Persistence(String),
}

/// Errors raised by the identity service adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UserServiceError {
    /// The service could not be reached or answered with a server error
    #[error("user service unavailable: {0}")]
    Unavailable(String),

    /// The service refused the caller's credentials
    #[error("user service rejected the caller: {0}")]
    Rejected(String),
}

/// Errors raised by the notification adapter
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    #[error("notification payload could not be encoded: {0}")]
    Serialization(String),

    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Notification intent stored next to the status change it announces
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct OutboxMessage {
    pub outbox_id: Uuid,
    pub application_id: Uuid,
    pub payload: serde_json::Value,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

/// Persistence of application rows
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn find_all(&self) -> Result<Vec<Application>, StoreError>;

    async fn find_by_owner_ref(&self, owner_ref: &OwnerRef)
        -> Result<Vec<Application>, StoreError>;

    async fn find_by_id(&self, application_id: Uuid) -> Result<Option<Application>, StoreError>;

    async fn save(&self, application: &Application) -> Result<Application, StoreError>;

    /// Persist the status change together with its notification intent.
    /// Both writes commit or neither does.
    async fn update(
        &self,
        application: &Application,
        notification: &OutboxMessage,
    ) -> Result<Application, StoreError>;

    /// Run a compiled plan, returning the page rows and the total match count
    async fn query_by_plan(&self, plan: &QueryPlan) -> Result<(Vec<Application>, u64), StoreError>;
}

/// Read-only loan type and loan status tables
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferenceDataGateway: Send + Sync {
    async fn all_loan_types(&self) -> Result<Vec<LoanType>, StoreError>;

    async fn loan_type_by_id(&self, loan_type_id: i32) -> Result<Option<LoanType>, StoreError>;

    async fn all_loan_statuses(&self) -> Result<Vec<LoanStatus>, StoreError>;

    async fn loan_status_by_id(&self, loan_status_id: i32)
        -> Result<Option<LoanStatus>, StoreError>;
}

/// Identity service. Every call carries the caller's token.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserProfileGateway: Send + Sync {
    async fn profile_by_owner_ref(
        &self,
        token: &AuthToken,
        owner_ref: &OwnerRef,
    ) -> Result<Option<UserProfile>, UserServiceError>;

    async fn profiles_by_owner_refs(
        &self,
        token: &AuthToken,
        owner_refs: &[OwnerRef],
    ) -> Result<Vec<UserProfile>, UserServiceError>;

    /// Resolve the identity behind the token
    async fn profile_of_caller(&self, token: &AuthToken) -> Result<UserProfile, UserServiceError>;

    async fn exists_by_owner_ref(
        &self,
        token: &AuthToken,
        owner_ref: &OwnerRef,
    ) -> Result<bool, UserServiceError>;
}

/// Outbound application events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Deliver the record, returning the queue's message id. Re-sending with
    /// the same idempotency key must not produce a second message.
    async fn send(
        &self,
        idempotency_key: Uuid,
        record: &EnrichedApplicationRecord,
    ) -> Result<String, NotificationError>;
}

/// Pending notification intents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Lease up to `limit` undelivered messages, oldest first
    async fn claim_pending(&self, limit: u32) -> Result<Vec<OutboxMessage>, StoreError>;

    async fn mark_delivered(&self, outbox_id: Uuid, delivery_id: &str) -> Result<(), StoreError>;

    async fn mark_failed(&self, outbox_id: Uuid, reason: &str) -> Result<(), StoreError>;
}
