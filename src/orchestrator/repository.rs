use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{RentalError, RentalResult};
use crate::orchestrator::{SagaRecord, SagaStatus};

/// Persistence of saga records
#[async_trait]
pub trait SagaLog: Send + Sync {
    async fn insert(&self, saga: &SagaRecord) -> RentalResult<()>;

    /// Overwrite status and step outcomes of an existing saga
    async fn save(&self, saga: &SagaRecord) -> RentalResult<()>;

    async fn find_by_id(&self, id: Uuid) -> RentalResult<Option<SagaRecord>>;

    /// Sagas neither COMPLETED nor SUPERSEDED, oldest first
    async fn find_pending(&self) -> RentalResult<Vec<SagaRecord>>;

    /// Pending sagas of one rental, oldest first
    async fn find_unfinished_for_rental(&self, rental_id: i64) -> RentalResult<Vec<SagaRecord>>;
}

#[derive(Clone)]
pub struct PgSagaLog {
    pool: PgPool,
}

impl PgSagaLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SAGA_COLUMNS: &str = r#"
    id, kind, rental_id, vehicle_id, reservation_id, status, steps, created_at, updated_at
"#;

#[async_trait]
impl SagaLog for PgSagaLog {
    async fn insert(&self, saga: &SagaRecord) -> RentalResult<()> {
        sqlx::query(
            r#"
            INSERT INTO orchestration_sagas (
                id, kind, rental_id, vehicle_id, reservation_id, status, steps, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(saga.id)
        .bind(saga.kind)
        .bind(saga.rental_id)
        .bind(saga.vehicle_id)
        .bind(saga.reservation_id)
        .bind(saga.status)
        .bind(&saga.steps)
        .bind(saga.created_at)
        .bind(saga.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save(&self, saga: &SagaRecord) -> RentalResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE orchestration_sagas
            SET status = $1, steps = $2, updated_at = $3
            WHERE id = $4
            "#,
        )
        .bind(saga.status)
        .bind(&saga.steps)
        .bind(saga.updated_at)
        .bind(saga.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RentalError::not_found("Saga", saga.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> RentalResult<Option<SagaRecord>> {
        let saga = sqlx::query_as::<_, SagaRecord>(&format!(
            "SELECT {} FROM orchestration_sagas WHERE id = $1",
            SAGA_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(saga)
    }

    async fn find_pending(&self) -> RentalResult<Vec<SagaRecord>> {
        let sagas = sqlx::query_as::<_, SagaRecord>(&format!(
            "SELECT {} FROM orchestration_sagas WHERE status NOT IN ($1, $2) ORDER BY created_at",
            SAGA_COLUMNS
        ))
        .bind(SagaStatus::Completed)
        .bind(SagaStatus::Superseded)
        .fetch_all(&self.pool)
        .await?;

        Ok(sagas)
    }

    async fn find_unfinished_for_rental(&self, rental_id: i64) -> RentalResult<Vec<SagaRecord>> {
        let sagas = sqlx::query_as::<_, SagaRecord>(&format!(
            r#"
            SELECT {} FROM orchestration_sagas
            WHERE rental_id = $1 AND status NOT IN ($2, $3)
            ORDER BY created_at
            "#,
            SAGA_COLUMNS
        ))
        .bind(rental_id)
        .bind(SagaStatus::Completed)
        .bind(SagaStatus::Superseded)
        .fetch_all(&self.pool)
        .await?;

        Ok(sagas)
    }
}
