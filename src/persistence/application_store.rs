use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool};
use sqlx::query::QueryAs;
use sqlx::Postgres;
use uuid::Uuid;

use crate::application::criteria::{BoundParam, QueryPlan};
use crate::application::gateways::{ApplicationStore, OutboxMessage, StoreError};
use crate::application::model::{Application, OwnerRef};

const SELECT_APPLICATION: &str = r#"
    SELECT application_id, owner_ref, loan_amount, loan_term, loan_type_id, loan_status_id
    FROM applications
"#;

type PgQueryAs<'q, O> = QueryAs<'q, Postgres, O, PgArguments>;

/// Bind plan parameters in the order their placeholders were numbered
fn bind_params<'q, O>(mut query: PgQueryAs<'q, O>, params: &[BoundParam]) -> PgQueryAs<'q, O> {
    for param in params {
        query = match param {
            BoundParam::Text(value) => query.bind(value.clone()),
            BoundParam::Integer(value) => query.bind(*value),
        };
    }
    query
}

fn retrieval(operation: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        tracing::error!(operation, error = %e, "Application query failed");
        StoreError::Retrieval(e.to_string())
    }
}

fn persistence(operation: &'static str) -> impl Fn(sqlx::Error) -> StoreError {
    move |e| {
        tracing::error!(operation, error = %e, "Application write failed");
        StoreError::Persistence(e.to_string())
    }
}

/// Applications table, plus the outbox rows written alongside status changes
#[derive(Clone)]
pub struct PgApplicationStore {
    db_pool: PgPool,
}

impl PgApplicationStore {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl ApplicationStore for PgApplicationStore {
    async fn find_all(&self) -> Result<Vec<Application>, StoreError> {
        tracing::info!("Listing all applications");

        sqlx::query_as::<_, Application>(SELECT_APPLICATION)
            .fetch_all(&self.db_pool)
            .await
            .map_err(retrieval("find_all"))
    }

    async fn find_by_owner_ref(
        &self,
        owner_ref: &OwnerRef,
    ) -> Result<Vec<Application>, StoreError> {
        tracing::info!(owner_ref = %owner_ref, "Listing applications of owner");

        let sql = format!("{SELECT_APPLICATION} WHERE owner_ref = $1");
        sqlx::query_as::<_, Application>(&sql)
            .bind(owner_ref)
            .fetch_all(&self.db_pool)
            .await
            .map_err(retrieval("find_by_owner_ref"))
    }

    async fn find_by_id(&self, application_id: Uuid) -> Result<Option<Application>, StoreError> {
        tracing::info!(application_id = %application_id, "Loading application");

        let sql = format!("{SELECT_APPLICATION} WHERE application_id = $1");
        sqlx::query_as::<_, Application>(&sql)
            .bind(application_id)
            .fetch_optional(&self.db_pool)
            .await
            .map_err(retrieval("find_by_id"))
    }

    async fn save(&self, application: &Application) -> Result<Application, StoreError> {
        tracing::info!(
            application_id = %application.application_id,
            owner_ref = %application.owner_ref,
            "Saving application"
        );

        sqlx::query_as::<_, Application>(
            r#"
            INSERT INTO applications (
                application_id, owner_ref, loan_amount, loan_term, loan_type_id, loan_status_id
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING application_id, owner_ref, loan_amount, loan_term, loan_type_id, loan_status_id
            "#,
        )
        .bind(application.application_id)
        .bind(&application.owner_ref)
        .bind(application.loan_amount)
        .bind(application.loan_term)
        .bind(application.loan_type_id)
        .bind(application.loan_status_id)
        .fetch_one(&self.db_pool)
        .await
        .map_err(persistence("save"))
    }

    async fn update(
        &self,
        application: &Application,
        notification: &OutboxMessage,
    ) -> Result<Application, StoreError> {
        tracing::info!(
            application_id = %application.application_id,
            loan_status_id = application.loan_status_id,
            outbox_id = %notification.outbox_id,
            "Updating application status"
        );

        let mut tx = self.db_pool.begin().await.map_err(persistence("update"))?;

        let updated = sqlx::query_as::<_, Application>(
            r#"
            UPDATE applications
            SET loan_status_id = $1
            WHERE application_id = $2
            RETURNING application_id, owner_ref, loan_amount, loan_term, loan_type_id, loan_status_id
            "#,
        )
        .bind(application.loan_status_id)
        .bind(application.application_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(persistence("update"))?
        .ok_or_else(|| {
            StoreError::Persistence(format!(
                "application {} no longer exists",
                application.application_id
            ))
        })?;

        sqlx::query(
            r#"
            INSERT INTO notification_outbox (outbox_id, application_id, payload, attempts, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(notification.outbox_id)
        .bind(notification.application_id)
        .bind(&notification.payload)
        .bind(notification.attempts)
        .bind(notification.created_at)
        .execute(&mut *tx)
        .await
        .map_err(persistence("update"))?;

        tx.commit().await.map_err(persistence("update"))?;

        Ok(updated)
    }

    async fn query_by_plan(&self, plan: &QueryPlan) -> Result<(Vec<Application>, u64), StoreError> {
        let data_sql = plan.data_sql();
        let count_plan = plan.count_plan();
        let count_sql = count_plan.count_sql();

        tracing::info!(
            filters = plan.filter_clauses().len(),
            limit = plan.limit(),
            offset = plan.offset(),
            "Running application search"
        );

        let rows = bind_params(sqlx::query_as::<_, Application>(&data_sql), plan.params())
            .bind(plan.limit())
            .bind(plan.offset())
            .fetch_all(&self.db_pool);
        let count = bind_params(sqlx::query_as::<_, (i64,)>(&count_sql), count_plan.params())
            .fetch_one(&self.db_pool);

        let (rows, (total,)) = tokio::try_join!(rows, count).map_err(retrieval("query_by_plan"))?;

        Ok((rows, total.max(0) as u64))
    }
}
