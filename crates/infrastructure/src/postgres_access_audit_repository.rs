use async_trait::async_trait;
use chrono::{DateTime, Utc};
use civicvault_application::{AccessAuditQuery, AccessAuditRepository};
use civicvault_core::{AppError, AppResult, TenantId};
use civicvault_domain::{AccessAction, AccessAuditEntry, ViolationType};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// PostgreSQL-backed append-only access audit log.
#[derive(Clone)]
pub struct PostgresAccessAuditRepository {
    pool: PgPool,
}

impl PostgresAccessAuditRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AccessAuditRow {
    audit_id: Uuid,
    requested_tenant_id: String,
    caller_tenant_id: String,
    user_id: String,
    action: String,
    resource_type: String,
    resource_id: String,
    granted: bool,
    violation_type: Option<String>,
    timestamp: DateTime<Utc>,
    source_ip: Option<String>,
    user_agent: Option<String>,
}

impl TryFrom<AccessAuditRow> for AccessAuditEntry {
    type Error = AppError;

    fn try_from(row: AccessAuditRow) -> Result<Self, Self::Error> {
        Ok(Self {
            audit_id: row.audit_id,
            requested_tenant_id: row.requested_tenant_id,
            caller_tenant_id: TenantId::parse(row.caller_tenant_id)?,
            user_id: row.user_id,
            action: row.action.parse::<AccessAction>()?,
            resource_type: row.resource_type,
            resource_id: row.resource_id,
            granted: row.granted,
            violation_type: row
                .violation_type
                .map(|value| value.parse::<ViolationType>())
                .transpose()?,
            timestamp: row.timestamp,
            source_ip: row.source_ip,
            user_agent: row.user_agent,
        })
    }
}

fn limit_column(query: &AccessAuditQuery) -> AppResult<i64> {
    i64::try_from(query.limit)
        .map_err(|error| AppError::Validation(format!("invalid audit page size: {error}")))
}

#[async_trait]
impl AccessAuditRepository for PostgresAccessAuditRepository {
    async fn append(&self, entry: AccessAuditEntry) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO access_audit_entries (
                audit_id,
                requested_tenant_id,
                caller_tenant_id,
                user_id,
                action,
                resource_type,
                resource_id,
                granted,
                violation_type,
                timestamp,
                source_ip,
                user_agent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(entry.audit_id)
        .bind(entry.requested_tenant_id.as_str())
        .bind(entry.caller_tenant_id.as_str())
        .bind(entry.user_id.as_str())
        .bind(entry.action.as_str())
        .bind(entry.resource_type.as_str())
        .bind(entry.resource_id.as_str())
        .bind(entry.granted)
        .bind(entry.violation_type.map(|violation| violation.as_str()))
        .bind(entry.timestamp)
        .bind(entry.source_ip.as_deref())
        .bind(entry.user_agent.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to append access audit entry: {error}")))?;

        Ok(())
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &TenantId,
        query: AccessAuditQuery,
    ) -> AppResult<Vec<AccessAuditEntry>> {
        let rows = sqlx::query_as::<_, AccessAuditRow>(
            r#"
            SELECT
                audit_id,
                requested_tenant_id,
                caller_tenant_id,
                user_id,
                action,
                resource_type,
                resource_id,
                granted,
                violation_type,
                timestamp,
                source_ip,
                user_agent
            FROM access_audit_entries
            WHERE requested_tenant_id = $1
              AND timestamp >= $2
            ORDER BY timestamp DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(query.since)
        .bind(limit_column(&query)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list access audit entries: {error}")))?;

        rows.into_iter().map(AccessAuditEntry::try_from).collect()
    }

    async fn list_violations(
        &self,
        violation_type: Option<ViolationType>,
        query: AccessAuditQuery,
    ) -> AppResult<Vec<AccessAuditEntry>> {
        let rows = sqlx::query_as::<_, AccessAuditRow>(
            r#"
            SELECT
                audit_id,
                requested_tenant_id,
                caller_tenant_id,
                user_id,
                action,
                resource_type,
                resource_id,
                granted,
                violation_type,
                timestamp,
                source_ip,
                user_agent
            FROM access_audit_entries
            WHERE violation_type IS NOT NULL
              AND ($1::TEXT IS NULL OR violation_type = $1)
              AND timestamp >= $2
            ORDER BY timestamp DESC
            LIMIT $3
            "#,
        )
        .bind(violation_type.map(|violation| violation.as_str()))
        .bind(query.since)
        .bind(limit_column(&query)?)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list isolation violations: {error}")))?;

        rows.into_iter().map(AccessAuditEntry::try_from).collect()
    }

    async fn purge_before(&self, tenant_id: &TenantId, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM access_audit_entries
            WHERE requested_tenant_id = $1
              AND timestamp < $2
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to purge access audit entries: {error}")))?;

        Ok(result.rows_affected())
    }

    async fn purge_unowned_before(
        &self,
        known_tenants: &[TenantId],
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let known: Vec<String> = known_tenants
            .iter()
            .map(|tenant_id| tenant_id.as_str().to_owned())
            .collect();

        let result = sqlx::query(
            r#"
            DELETE FROM access_audit_entries
            WHERE timestamp < $1
              AND NOT (requested_tenant_id = ANY($2))
            "#,
        )
        .bind(cutoff)
        .bind(known)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to purge unowned access audit entries: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}
