use async_trait::async_trait;
use chrono::{DateTime, Utc};
use civicvault_application::TenantRecordRepository;
use civicvault_core::{AppError, AppResult, TenantId};
use civicvault_domain::{QueryDescriptor, TenantRecord};
use serde_json::Value;
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed partitioned record store.
///
/// Every statement filters on `partition_index` and `tenant_id` taken from the
/// [`QueryDescriptor`]; optional narrowing columns are bound as nullable
/// parameters.
#[derive(Clone)]
pub struct PostgresTenantRecordRepository {
    pool: PgPool,
}

impl PostgresTenantRecordRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TenantRecordRow {
    tenant_id: String,
    resource_type: String,
    resource_id: String,
    subject_id: Option<String>,
    data: Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TenantRecordRow> for TenantRecord {
    type Error = AppError;

    fn try_from(row: TenantRecordRow) -> Result<Self, Self::Error> {
        TenantRecord::from_storage(
            TenantId::parse(row.tenant_id)?,
            row.resource_type,
            row.resource_id,
            row.subject_id,
            row.data,
            row.created_at,
            row.updated_at,
        )
    }
}

fn partition_column(query: &QueryDescriptor) -> AppResult<i32> {
    i32::try_from(query.partition_index())
        .map_err(|error| AppError::Internal(format!("partition index out of range: {error}")))
}

#[async_trait]
impl TenantRecordRepository for PostgresTenantRecordRepository {
    async fn find(&self, query: &QueryDescriptor) -> AppResult<Option<TenantRecord>> {
        let (Some(resource_type), Some(resource_id)) = (query.resource_type(), query.resource_id())
        else {
            return Err(AppError::Validation(
                "record lookup requires resource_type and resource_id".to_owned(),
            ));
        };

        let row = sqlx::query_as::<_, TenantRecordRow>(
            r#"
            SELECT tenant_id, resource_type, resource_id, subject_id, data, created_at, updated_at
            FROM tenant_records
            WHERE partition_index = $1
              AND tenant_id = $2
              AND resource_type = $3
              AND resource_id = $4
              AND ($5::TEXT IS NULL OR subject_id = $5)
            "#,
        )
        .bind(partition_column(query)?)
        .bind(query.tenant_id().as_str())
        .bind(resource_type)
        .bind(resource_id)
        .bind(query.subject_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load tenant record: {error}")))?;

        row.map(TenantRecord::try_from).transpose()
    }

    async fn list(&self, query: &QueryDescriptor) -> AppResult<Vec<TenantRecord>> {
        let rows = sqlx::query_as::<_, TenantRecordRow>(
            r#"
            SELECT tenant_id, resource_type, resource_id, subject_id, data, created_at, updated_at
            FROM tenant_records
            WHERE partition_index = $1
              AND tenant_id = $2
              AND ($3::TEXT IS NULL OR resource_type = $3)
              AND ($4::TEXT IS NULL OR resource_id = $4)
              AND ($5::TEXT IS NULL OR subject_id = $5)
            ORDER BY resource_type, resource_id
            "#,
        )
        .bind(partition_column(query)?)
        .bind(query.tenant_id().as_str())
        .bind(query.resource_type())
        .bind(query.resource_id())
        .bind(query.subject_id())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list tenant records: {error}")))?;

        rows.into_iter().map(TenantRecord::try_from).collect()
    }

    async fn count(&self, query: &QueryDescriptor) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM tenant_records
            WHERE partition_index = $1
              AND tenant_id = $2
              AND ($3::TEXT IS NULL OR resource_type = $3)
              AND ($4::TEXT IS NULL OR resource_id = $4)
              AND ($5::TEXT IS NULL OR subject_id = $5)
            "#,
        )
        .bind(partition_column(query)?)
        .bind(query.tenant_id().as_str())
        .bind(query.resource_type())
        .bind(query.resource_id())
        .bind(query.subject_id())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count tenant records: {error}")))?;

        u64::try_from(count)
            .map_err(|error| AppError::Internal(format!("invalid record count: {error}")))
    }

    async fn upsert(&self, query: &QueryDescriptor, record: TenantRecord) -> AppResult<()> {
        if record.tenant_id() != query.tenant_id() {
            return Err(AppError::TenantMismatch(
                "record tenant differs from query tenant".to_owned(),
            ));
        }

        sqlx::query(
            r#"
            INSERT INTO tenant_records (
                partition_index,
                tenant_id,
                resource_type,
                resource_id,
                subject_id,
                data,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (partition_index, tenant_id, resource_type, resource_id)
            DO UPDATE SET
                subject_id = EXCLUDED.subject_id,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(partition_column(query)?)
        .bind(query.tenant_id().as_str())
        .bind(record.resource_type())
        .bind(record.resource_id())
        .bind(record.subject_id())
        .bind(record.data())
        .bind(record.created_at())
        .bind(record.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save tenant record: {error}")))?;

        Ok(())
    }

    async fn delete(&self, query: &QueryDescriptor) -> AppResult<u64> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        let locked = sqlx::query_scalar::<_, i64>(
            r#"
            WITH matching AS (
                SELECT 1
                FROM tenant_records
                WHERE partition_index = $1
                  AND tenant_id = $2
                  AND ($3::TEXT IS NULL OR resource_type = $3)
                  AND ($4::TEXT IS NULL OR resource_id = $4)
                  AND ($5::TEXT IS NULL OR subject_id = $5)
                FOR UPDATE
            )
            SELECT COUNT(*) FROM matching
            "#,
        )
        .bind(partition_column(query)?)
        .bind(query.tenant_id().as_str())
        .bind(query.resource_type())
        .bind(query.resource_id())
        .bind(query.subject_id())
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to lock tenant records: {error}")))?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM tenant_records
            WHERE partition_index = $1
              AND tenant_id = $2
              AND ($3::TEXT IS NULL OR resource_type = $3)
              AND ($4::TEXT IS NULL OR resource_id = $4)
              AND ($5::TEXT IS NULL OR subject_id = $5)
            "#,
        )
        .bind(partition_column(query)?)
        .bind(query.tenant_id().as_str())
        .bind(query.resource_type())
        .bind(query.resource_id())
        .bind(query.subject_id())
        .execute(&mut *transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to delete tenant records: {error}")))?
        .rows_affected();

        if i64::try_from(deleted).ok() != Some(locked) {
            transaction.rollback().await.map_err(|error| {
                AppError::Internal(format!("failed to roll back transaction: {error}"))
            })?;
            return Err(AppError::Internal(format!(
                "record delete removed {deleted} of {locked} matching rows"
            )));
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(deleted)
    }
}
