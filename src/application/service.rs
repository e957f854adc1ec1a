//! Application use cases
//!
//! Every mutation is checked against the caller's identity and the reference
//! data before the store is touched. Status changes write their notification
//! into the outbox in the same transaction; delivery happens later in
//! [`super::outbox::OutboxDispatcher`].

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::criteria::{CriteriaCompiler, PageResult, SearchCriteria};
use super::enrichment::EnrichmentAggregator;
use super::error::{ApplicationError, ApplicationResult};
use super::gateways::{ApplicationStore, OutboxMessage, ReferenceDataGateway, UserProfileGateway};
use super::model::{
    Application, ApplicationRecord, AuthToken, CreateApplication, EnrichedApplicationRecord,
    LoanStatus, OwnerKey, OwnerRef, Role, UpdateApplicationStatus,
};

/// Deployment-level rules resolved from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationPolicy {
    /// Status every new application starts in
    pub pending_status_id: i32,
    pub owner_key: OwnerKey,
}

/// Orchestrates create, read, update and search over loan applications
pub struct ApplicationService {
    store: Arc<dyn ApplicationStore>,
    reference_data: Arc<dyn ReferenceDataGateway>,
    users: Arc<dyn UserProfileGateway>,
    enrichment: EnrichmentAggregator,
    compiler: CriteriaCompiler,
    policy: ApplicationPolicy,
}

impl ApplicationService {
    pub fn new(
        store: Arc<dyn ApplicationStore>,
        reference_data: Arc<dyn ReferenceDataGateway>,
        users: Arc<dyn UserProfileGateway>,
        enrichment: EnrichmentAggregator,
        compiler: CriteriaCompiler,
        policy: ApplicationPolicy,
    ) -> Self {
        Self {
            store,
            reference_data,
            users,
            enrichment,
            compiler,
            policy,
        }
    }

    /// Resolve the configured PENDING status. Run once at startup so a
    /// deployment with an unseeded status table refuses to serve.
    pub async fn verify_pending_status(&self) -> ApplicationResult<LoanStatus> {
        self.reference_data
            .loan_status_by_id(self.policy.pending_status_id)
            .await?
            .ok_or_else(|| {
                ApplicationError::InvalidData(format!(
                    "configured pending status {} does not exist",
                    self.policy.pending_status_id
                ))
            })
    }

    /// File a new application on behalf of the caller
    pub async fn create_application(
        &self,
        token: &AuthToken,
        command: CreateApplication,
    ) -> ApplicationResult<ApplicationRecord> {
        command.validate()?;

        // The caller is resolved first so a rejected role or owner never
        // depends on the outcome of the other lookups.
        let caller = self.users.profile_of_caller(token).await?;
        if caller.role != Role::Cliente {
            tracing::warn!(role = ?caller.role, "Rejected application filed by non-client");
            return Err(ApplicationError::Unauthorized(
                "only clients can file loan applications".to_string(),
            ));
        }

        let caller_ref = self.policy.owner_key.owner_ref_of(&caller);
        if caller_ref != command.owner_ref {
            tracing::warn!(
                owner_ref = %command.owner_ref,
                "Rejected application filed for another owner"
            );
            return Err(ApplicationError::Unauthorized(
                "clients can only file applications for themselves".to_string(),
            ));
        }

        let (loan_type, pending_status, owner_exists) = tokio::try_join!(
            async {
                self.reference_data
                    .loan_type_by_id(command.loan_type_id)
                    .await
                    .map_err(ApplicationError::from)
            },
            async {
                self.reference_data
                    .loan_status_by_id(self.policy.pending_status_id)
                    .await
                    .map_err(ApplicationError::from)
            },
            async {
                self.users
                    .exists_by_owner_ref(token, &command.owner_ref)
                    .await
                    .map_err(ApplicationError::from)
            },
        )?;

        let loan_type = loan_type.ok_or_else(|| {
            ApplicationError::InvalidData(format!(
                "loan type {} does not exist",
                command.loan_type_id
            ))
        })?;
        let pending_status = pending_status.ok_or_else(|| {
            ApplicationError::InvalidData(format!(
                "pending status {} does not exist",
                self.policy.pending_status_id
            ))
        })?;
        if !owner_exists {
            return Err(ApplicationError::InvalidData(format!(
                "user {} does not exist",
                command.owner_ref
            )));
        }

        let application = Application {
            application_id: Uuid::new_v4(),
            owner_ref: caller_ref,
            loan_amount: command.loan_amount,
            loan_term: command.loan_term,
            loan_type_id: loan_type.loan_type_id,
            loan_status_id: pending_status.loan_status_id,
        };

        let saved = self.store.save(&application).await?;
        tracing::info!(
            application_id = %saved.application_id,
            owner_ref = %saved.owner_ref,
            "Loan application created"
        );

        Ok(ApplicationRecord::new(saved, loan_type, pending_status))
    }

    pub async fn get_all_applications(
        &self,
        token: &AuthToken,
    ) -> ApplicationResult<Vec<EnrichedApplicationRecord>> {
        let applications = self.store.find_all().await?;
        self.enrichment.enrich_many(token, applications).await
    }

    pub async fn get_applications_by_owner(
        &self,
        token: &AuthToken,
        owner_ref: &OwnerRef,
    ) -> ApplicationResult<Vec<EnrichedApplicationRecord>> {
        let applications = self.store.find_by_owner_ref(owner_ref).await?;
        self.enrichment.enrich_many(token, applications).await
    }

    pub async fn get_application(
        &self,
        token: &AuthToken,
        application_id: Uuid,
    ) -> ApplicationResult<EnrichedApplicationRecord> {
        let application = self
            .store
            .find_by_id(application_id)
            .await?
            .ok_or(ApplicationError::NotFound(application_id))?;
        self.enrichment.enrich_one(token, application).await
    }

    /// Move an application to another status and queue its notification
    pub async fn update_application_status(
        &self,
        token: &AuthToken,
        command: UpdateApplicationStatus,
    ) -> ApplicationResult<EnrichedApplicationRecord> {
        let caller = self.users.profile_of_caller(token).await?;
        if caller.role != Role::Asesor {
            tracing::warn!(
                role = ?caller.role,
                application_id = %command.application_id,
                "Rejected status change by non-advisor"
            );
            return Err(ApplicationError::Unauthorized(
                "only advisors can change an application status".to_string(),
            ));
        }

        let (application, new_status) = tokio::try_join!(
            async {
                self.store
                    .find_by_id(command.application_id)
                    .await
                    .map_err(ApplicationError::from)
            },
            async {
                self.reference_data
                    .loan_status_by_id(command.loan_status_id)
                    .await
                    .map_err(ApplicationError::from)
            },
        )?;

        let mut application = application.ok_or_else(|| {
            ApplicationError::InvalidData(format!(
                "application {} does not exist",
                command.application_id
            ))
        })?;
        let new_status = new_status.ok_or_else(|| {
            ApplicationError::InvalidData(format!(
                "loan status {} does not exist",
                command.loan_status_id
            ))
        })?;

        let (loan_type, owner) = tokio::try_join!(
            async {
                self.reference_data
                    .loan_type_by_id(application.loan_type_id)
                    .await
                    .map_err(ApplicationError::from)
            },
            async {
                self.users
                    .profile_by_owner_ref(token, &application.owner_ref)
                    .await
                    .map_err(ApplicationError::from)
            },
        )?;

        let loan_type = loan_type.ok_or_else(|| {
            ApplicationError::InvalidData(format!(
                "loan type {} of application {} no longer exists",
                application.loan_type_id, application.application_id
            ))
        })?;
        let owner = owner.ok_or_else(|| {
            ApplicationError::InvalidData(format!(
                "owner {} of application {} does not exist",
                application.owner_ref, application.application_id
            ))
        })?;

        application.loan_status_id = new_status.loan_status_id;
        let record =
            EnrichedApplicationRecord::assemble(application.clone(), loan_type, new_status, &owner)?;

        let payload = serde_json::to_value(&record).map_err(|e| {
            ApplicationError::Persistence(format!("notification payload could not be encoded: {e}"))
        })?;
        let notification = OutboxMessage {
            outbox_id: Uuid::new_v4(),
            application_id: application.application_id,
            payload,
            attempts: 0,
            created_at: Utc::now(),
        };

        self.store.update(&application, &notification).await?;
        tracing::info!(
            application_id = %application.application_id,
            loan_status_id = application.loan_status_id,
            outbox_id = %notification.outbox_id,
            "Application status updated"
        );

        Ok(record)
    }

    /// Paginated, filtered search. Invalid criteria fail before the store
    /// is queried.
    pub async fn search_applications(
        &self,
        token: &AuthToken,
        criteria: &SearchCriteria,
    ) -> ApplicationResult<PageResult<EnrichedApplicationRecord>> {
        let plan = self.compiler.compile(criteria)?;
        let (rows, total) = self.store.query_by_plan(&plan).await?;
        let content = self.enrichment.enrich_many(token, rows).await?;
        Ok(PageResult::new(content, total, plan.page(), plan.size()))
    }
}
