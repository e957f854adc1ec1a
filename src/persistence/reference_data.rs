use async_trait::async_trait;
use sqlx::postgres::PgPool;

use crate::application::gateways::{ReferenceDataGateway, StoreError};
use crate::application::model::{LoanStatus, LoanType};

/// Loan type and loan status tables
#[derive(Clone)]
pub struct PgReferenceData {
    db_pool: PgPool,
}

impl PgReferenceData {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

fn retrieval(e: sqlx::Error) -> StoreError {
    tracing::error!(error = %e, "Reference data query failed");
    StoreError::Retrieval(e.to_string())
}

#[async_trait]
impl ReferenceDataGateway for PgReferenceData {
    async fn all_loan_types(&self) -> Result<Vec<LoanType>, StoreError> {
        sqlx::query_as::<_, LoanType>(
            r#"
            SELECT loan_type_id, name, min_amount, max_amount, interest_rate, auto_validation
            FROM loan_types
            ORDER BY loan_type_id
            "#,
        )
        .fetch_all(&self.db_pool)
        .await
        .map_err(retrieval)
    }

    async fn loan_type_by_id(&self, loan_type_id: i32) -> Result<Option<LoanType>, StoreError> {
        sqlx::query_as::<_, LoanType>(
            r#"
            SELECT loan_type_id, name, min_amount, max_amount, interest_rate, auto_validation
            FROM loan_types
            WHERE loan_type_id = $1
            "#,
        )
        .bind(loan_type_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(retrieval)
    }

    async fn all_loan_statuses(&self) -> Result<Vec<LoanStatus>, StoreError> {
        sqlx::query_as::<_, LoanStatus>(
            "SELECT loan_status_id, name, description FROM loan_statuses ORDER BY loan_status_id",
        )
        .fetch_all(&self.db_pool)
        .await
        .map_err(retrieval)
    }

    async fn loan_status_by_id(
        &self,
        loan_status_id: i32,
    ) -> Result<Option<LoanStatus>, StoreError> {
        sqlx::query_as::<_, LoanStatus>(
            "SELECT loan_status_id, name, description FROM loan_statuses WHERE loan_status_id = $1",
        )
        .bind(loan_status_id)
        .fetch_optional(&self.db_pool)
        .await
        .map_err(retrieval)
    }
}
