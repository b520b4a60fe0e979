use async_trait::async_trait;
use chrono::{DateTime, Utc};
use civicvault_application::ComplianceActionRepository;
use civicvault_core::{AppError, AppResult, TenantId};
use civicvault_domain::{ComplianceActionRecord, ComplianceActionStatus, ComplianceActionType};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed compliance action lifecycle store.
#[derive(Clone)]
pub struct PostgresComplianceActionRepository {
    pool: PgPool,
}

impl PostgresComplianceActionRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ComplianceActionRow {
    action_id: Uuid,
    tenant_id: String,
    subject_id: Option<String>,
    action_type: String,
    status: String,
    affected_record_count: i64,
    affected_cache_key_count: i64,
    timestamp: DateTime<Utc>,
    requested_by: String,
    attempts: i32,
    failure_reason: Option<String>,
    escalated: bool,
}

impl TryFrom<ComplianceActionRow> for ComplianceActionRecord {
    type Error = AppError;

    fn try_from(row: ComplianceActionRow) -> Result<Self, Self::Error> {
        let stored_count = |value: i64| {
            u64::try_from(value)
                .map_err(|error| AppError::Internal(format!("invalid stored count: {error}")))
        };

        Ok(Self {
            action_id: row.action_id,
            tenant_id: TenantId::parse(row.tenant_id)?,
            subject_id: row.subject_id,
            action_type: row.action_type.parse::<ComplianceActionType>()?,
            status: row.status.parse::<ComplianceActionStatus>()?,
            affected_record_count: stored_count(row.affected_record_count)?,
            affected_cache_key_count: stored_count(row.affected_cache_key_count)?,
            timestamp: row.timestamp,
            requested_by: row.requested_by,
            attempts: u32::try_from(row.attempts).map_err(|error| {
                AppError::Internal(format!("invalid stored attempt count: {error}"))
            })?,
            failure_reason: row.failure_reason,
            escalated: row.escalated,
        })
    }
}

fn count_column(value: u64) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|error| AppError::Internal(format!("count is out of range: {error}")))
}

#[async_trait]
impl ComplianceActionRepository for PostgresComplianceActionRepository {
    async fn save(&self, action: &ComplianceActionRecord) -> AppResult<()> {
        let attempts = i32::try_from(action.attempts)
            .map_err(|error| AppError::Internal(format!("attempt count is out of range: {error}")))?;

        sqlx::query(
            r#"
            INSERT INTO compliance_actions (
                action_id,
                tenant_id,
                subject_id,
                action_type,
                status,
                affected_record_count,
                affected_cache_key_count,
                timestamp,
                requested_by,
                attempts,
                failure_reason,
                escalated
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (action_id) DO UPDATE SET
                status = EXCLUDED.status,
                affected_record_count = EXCLUDED.affected_record_count,
                affected_cache_key_count = EXCLUDED.affected_cache_key_count,
                attempts = EXCLUDED.attempts,
                failure_reason = EXCLUDED.failure_reason,
                escalated = EXCLUDED.escalated
            "#,
        )
        .bind(action.action_id)
        .bind(action.tenant_id.as_str())
        .bind(action.subject_id.as_deref())
        .bind(action.action_type.as_str())
        .bind(action.status.as_str())
        .bind(count_column(action.affected_record_count)?)
        .bind(count_column(action.affected_cache_key_count)?)
        .bind(action.timestamp)
        .bind(action.requested_by.as_str())
        .bind(attempts)
        .bind(action.failure_reason.as_deref())
        .bind(action.escalated)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save compliance action: {error}")))?;

        Ok(())
    }

    async fn find(&self, action_id: Uuid) -> AppResult<Option<ComplianceActionRecord>> {
        let row = sqlx::query_as::<_, ComplianceActionRow>(
            r#"
            SELECT
                action_id,
                tenant_id,
                subject_id,
                action_type,
                status,
                affected_record_count,
                affected_cache_key_count,
                timestamp,
                requested_by,
                attempts,
                failure_reason,
                escalated
            FROM compliance_actions
            WHERE action_id = $1
            "#,
        )
        .bind(action_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load compliance action: {error}")))?;

        row.map(ComplianceActionRecord::try_from).transpose()
    }

    async fn list_pending_failures(&self, limit: usize) -> AppResult<Vec<ComplianceActionRecord>> {
        let limit = i64::try_from(limit)
            .map_err(|error| AppError::Validation(format!("invalid page size: {error}")))?;

        let rows = sqlx::query_as::<_, ComplianceActionRow>(
            r#"
            SELECT
                action_id,
                tenant_id,
                subject_id,
                action_type,
                status,
                affected_record_count,
                affected_cache_key_count,
                timestamp,
                requested_by,
                attempts,
                failure_reason,
                escalated
            FROM compliance_actions
            WHERE status = 'failed'
              AND escalated = FALSE
            ORDER BY timestamp ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list failed compliance actions: {error}"))
        })?;

        rows.into_iter().map(ComplianceActionRecord::try_from).collect()
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> AppResult<Vec<ComplianceActionRecord>> {
        let rows = sqlx::query_as::<_, ComplianceActionRow>(
            r#"
            SELECT
                action_id,
                tenant_id,
                subject_id,
                action_type,
                status,
                affected_record_count,
                affected_cache_key_count,
                timestamp,
                requested_by,
                attempts,
                failure_reason,
                escalated
            FROM compliance_actions
            WHERE tenant_id = $1
            ORDER BY timestamp DESC
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list compliance actions: {error}")))?;

        rows.into_iter().map(ComplianceActionRecord::try_from).collect()
    }
}
