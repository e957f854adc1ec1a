//! Joins application rows with loan types, loan statuses and owner profiles
//!
//! Reference tables and profiles come from independent sources. They are
//! fetched concurrently and the join only runs once all of them are in; the
//! first failing fetch aborts the rest.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::error::{ApplicationError, ApplicationResult, ReferenceKind};
use super::gateways::{ReferenceDataGateway, UserProfileGateway};
use super::model::{
    Application, AuthToken, EnrichedApplicationRecord, LoanStatus, LoanType, OwnerKey, OwnerRef,
    UserProfile,
};

/// What to do with a row whose reference cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissPolicy {
    /// The whole batch fails with `ReferenceNotFound`
    #[default]
    FailBatch,
    /// The row is dropped from the result and logged
    SkipRow,
}

/// Lookup tables built fresh for one call
struct JoinTables {
    loan_types: HashMap<i32, LoanType>,
    loan_statuses: HashMap<i32, LoanStatus>,
    owners: HashMap<OwnerRef, UserProfile>,
}

impl JoinTables {
    fn new(
        loan_types: Vec<LoanType>,
        loan_statuses: Vec<LoanStatus>,
        profiles: Vec<UserProfile>,
        owner_key: OwnerKey,
    ) -> Self {
        Self {
            loan_types: loan_types
                .into_iter()
                .map(|t| (t.loan_type_id, t))
                .collect(),
            loan_statuses: loan_statuses
                .into_iter()
                .map(|s| (s.loan_status_id, s))
                .collect(),
            owners: profiles
                .into_iter()
                .map(|p| (owner_key.owner_ref_of(&p), p))
                .collect(),
        }
    }

    fn join(&self, application: Application) -> ApplicationResult<EnrichedApplicationRecord> {
        let missing = |reference: ReferenceKind, key: String| ApplicationError::ReferenceNotFound {
            application_id: application.application_id,
            reference,
            key,
        };

        let loan_type = self
            .loan_types
            .get(&application.loan_type_id)
            .cloned()
            .ok_or_else(|| {
                missing(ReferenceKind::LoanType, application.loan_type_id.to_string())
            })?;
        let loan_status = self
            .loan_statuses
            .get(&application.loan_status_id)
            .cloned()
            .ok_or_else(|| {
                missing(ReferenceKind::LoanStatus, application.loan_status_id.to_string())
            })?;
        let owner = self
            .owners
            .get(&application.owner_ref)
            .ok_or_else(|| missing(ReferenceKind::UserProfile, application.owner_ref.to_string()))?;

        Ok(EnrichedApplicationRecord::assemble(
            application,
            loan_type,
            loan_status,
            owner,
        )?)
    }
}

/// Builds denormalized application records
pub struct EnrichmentAggregator {
    reference_data: Arc<dyn ReferenceDataGateway>,
    users: Arc<dyn UserProfileGateway>,
    owner_key: OwnerKey,
    miss_policy: MissPolicy,
}

impl EnrichmentAggregator {
    pub fn new(
        reference_data: Arc<dyn ReferenceDataGateway>,
        users: Arc<dyn UserProfileGateway>,
        owner_key: OwnerKey,
        miss_policy: MissPolicy,
    ) -> Self {
        Self {
            reference_data,
            users,
            owner_key,
            miss_policy,
        }
    }

    /// Enrich a single row. A miss always fails, whatever the batch policy.
    pub async fn enrich_one(
        &self,
        token: &AuthToken,
        application: Application,
    ) -> ApplicationResult<EnrichedApplicationRecord> {
        let (loan_types, loan_statuses, owner) = tokio::try_join!(
            self.fetch_loan_types(),
            self.fetch_loan_statuses(),
            async {
                self.users
                    .profile_by_owner_ref(token, &application.owner_ref)
                    .await
                    .map_err(ApplicationError::from)
            },
        )?;

        let tables = JoinTables::new(
            loan_types,
            loan_statuses,
            owner.into_iter().collect(),
            self.owner_key,
        );
        tables.join(application)
    }

    /// Enrich a batch with one profile lookup for the distinct owners in it
    pub async fn enrich_many(
        &self,
        token: &AuthToken,
        applications: Vec<Application>,
    ) -> ApplicationResult<Vec<EnrichedApplicationRecord>> {
        if applications.is_empty() {
            return Ok(Vec::new());
        }

        let owner_refs: Vec<OwnerRef> = applications
            .iter()
            .map(|a| a.owner_ref.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let (loan_types, loan_statuses, profiles) = tokio::try_join!(
            self.fetch_loan_types(),
            self.fetch_loan_statuses(),
            async {
                self.users
                    .profiles_by_owner_refs(token, &owner_refs)
                    .await
                    .map_err(ApplicationError::from)
            },
        )?;

        tracing::debug!(
            rows = applications.len(),
            owners = owner_refs.len(),
            profiles = profiles.len(),
            "Joining applications with reference data"
        );

        let tables = JoinTables::new(loan_types, loan_statuses, profiles, self.owner_key);
        let mut records = Vec::with_capacity(applications.len());

        for application in applications {
            match tables.join(application) {
                Ok(record) => records.push(record),
                Err(err @ ApplicationError::ReferenceNotFound { .. })
                    if self.miss_policy == MissPolicy::SkipRow =>
                {
                    tracing::warn!(error = %err, "Skipping application with unresolved reference");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(records)
    }

    async fn fetch_loan_types(&self) -> ApplicationResult<Vec<LoanType>> {
        Ok(self.reference_data.all_loan_types().await?)
    }

    async fn fetch_loan_statuses(&self) -> ApplicationResult<Vec<LoanStatus>> {
        Ok(self.reference_data.all_loan_statuses().await?)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::application::gateways::{
        MockReferenceDataGateway, MockUserProfileGateway, StoreError, UserServiceError,
    };
    use crate::application::model::fixtures::*;
    use crate::application::model::Role;

    fn reference_data() -> MockReferenceDataGateway {
        let mut mock = MockReferenceDataGateway::new();
        mock.expect_all_loan_types()
            .returning(|| Ok(vec![loan_type(1, Decimal::ZERO), loan_type(2, dec!(12))]));
        mock.expect_all_loan_statuses().returning(|| {
            Ok(vec![
                loan_status(1, "PENDING"),
                loan_status(2, "APPROVED"),
            ])
        });
        mock
    }

    fn aggregator(
        reference: MockReferenceDataGateway,
        users: MockUserProfileGateway,
        policy: MissPolicy,
    ) -> EnrichmentAggregator {
        EnrichmentAggregator::new(Arc::new(reference), Arc::new(users), OwnerKey::Email, policy)
    }

    fn token() -> AuthToken {
        AuthToken::new("token")
    }

    #[tokio::test]
    async fn test_batch_uses_one_profile_lookup_for_distinct_owners() {
        let mut users = MockUserProfileGateway::new();
        users
            .expect_profiles_by_owner_refs()
            .withf(|_, refs| {
                refs == [
                    OwnerRef::new("ana@example.com"),
                    OwnerRef::new("luis@example.com"),
                ]
            })
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    profile("ana@example.com", Role::Cliente),
                    profile("luis@example.com", Role::Cliente),
                ])
            });
        users.expect_profile_by_owner_ref().never();

        let applications = vec![
            application("luis@example.com", 1, 1),
            application("ana@example.com", 2, 2),
            application("ana@example.com", 1, 2),
            application("luis@example.com", 2, 1),
        ];

        let records = aggregator(reference_data(), users, MissPolicy::FailBatch)
            .enrich_many(&token(), applications.clone())
            .await
            .unwrap();

        assert_eq!(records.len(), 4);
        for (record, application) in records.iter().zip(&applications) {
            assert_eq!(record.application_id, application.application_id);
            assert_eq!(record.email, application.owner_ref.as_str());
            assert_eq!(record.loan_type.loan_type_id, application.loan_type_id);
            assert_eq!(record.loan_status.loan_status_id, application.loan_status_id);
        }
        assert_eq!(records[0].monthly_payment, dec!(83333.33));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_calls() {
        let mut reference = MockReferenceDataGateway::new();
        reference.expect_all_loan_types().never();
        reference.expect_all_loan_statuses().never();
        let mut users = MockUserProfileGateway::new();
        users.expect_profiles_by_owner_refs().never();

        let records = aggregator(reference, users, MissPolicy::FailBatch)
            .enrich_many(&token(), Vec::new())
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_missing_reference_fails_batch() {
        let mut users = MockUserProfileGateway::new();
        users
            .expect_profiles_by_owner_refs()
            .returning(|_, _| Ok(vec![profile("ana@example.com", Role::Cliente)]));

        let err = aggregator(reference_data(), users, MissPolicy::FailBatch)
            .enrich_many(
                &token(),
                vec![
                    application("ana@example.com", 1, 1),
                    application("ana@example.com", 9, 1),
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::ReferenceNotFound {
                reference: ReferenceKind::LoanType,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_missing_profile_is_skipped_under_skip_policy() {
        let mut users = MockUserProfileGateway::new();
        users
            .expect_profiles_by_owner_refs()
            .returning(|_, _| Ok(vec![profile("ana@example.com", Role::Cliente)]));

        let kept = application("ana@example.com", 1, 1);
        let records = aggregator(reference_data(), users, MissPolicy::SkipRow)
            .enrich_many(
                &token(),
                vec![kept.clone(), application("ghost@example.com", 1, 1)],
            )
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].application_id, kept.application_id);
    }

    #[tokio::test]
    async fn test_single_miss_fails_even_under_skip_policy() {
        let mut users = MockUserProfileGateway::new();
        users.expect_profile_by_owner_ref().returning(|_, _| Ok(None));

        let err = aggregator(reference_data(), users, MissPolicy::SkipRow)
            .enrich_one(&token(), application("ghost@example.com", 1, 1))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ApplicationError::ReferenceNotFound {
                reference: ReferenceKind::UserProfile,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_upstream_failures_are_tagged_by_source() {
        let mut users = MockUserProfileGateway::new();
        users
            .expect_profile_by_owner_ref()
            .returning(|_, _| Err(UserServiceError::Unavailable("connection refused".into())));
        let err = aggregator(reference_data(), users, MissPolicy::FailBatch)
            .enrich_one(&token(), application("ana@example.com", 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::DependencyUnavailable(_)));

        let mut reference = MockReferenceDataGateway::new();
        reference
            .expect_all_loan_types()
            .returning(|| Err(StoreError::Retrieval("pool timed out".into())));
        reference.expect_all_loan_statuses().returning(|| Ok(vec![]));
        let mut users = MockUserProfileGateway::new();
        users
            .expect_profile_by_owner_ref()
            .returning(|_, _| Ok(Some(profile("ana@example.com", Role::Cliente))));
        let err = aggregator(reference, users, MissPolicy::FailBatch)
            .enrich_one(&token(), application("ana@example.com", 1, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ApplicationError::Retrieval(_)));
    }
}
