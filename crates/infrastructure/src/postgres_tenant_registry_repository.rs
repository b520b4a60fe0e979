use async_trait::async_trait;
use civicvault_application::TenantRegistryRepository;
use civicvault_core::{AppError, AppResult, TenantId};
use civicvault_domain::{
    ComplianceLevel, IsolationLevel, Tenant, TenantListFilter, TenantStatus,
};
use sqlx::{FromRow, PgPool};

/// PostgreSQL-backed tenant catalog.
#[derive(Clone)]
pub struct PostgresTenantRegistryRepository {
    pool: PgPool,
}

impl PostgresTenantRegistryRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TenantRow {
    tenant_id: String,
    display_name: String,
    region: String,
    compliance_level: String,
    isolation_level: String,
    status: String,
    retention_days: i32,
    data_protection_contact: String,
}

impl TryFrom<TenantRow> for Tenant {
    type Error = AppError;

    fn try_from(row: TenantRow) -> Result<Self, Self::Error> {
        let retention_days = u32::try_from(row.retention_days).map_err(|error| {
            AppError::Internal(format!("invalid stored retention_days: {error}"))
        })?;

        Tenant::from_storage(
            TenantId::parse(row.tenant_id)?,
            row.display_name,
            row.region,
            row.compliance_level.parse::<ComplianceLevel>()?,
            row.isolation_level.parse::<IsolationLevel>()?,
            row.status.parse::<TenantStatus>()?,
            retention_days,
            row.data_protection_contact,
        )
    }
}

fn retention_days_column(tenant: &Tenant) -> AppResult<i32> {
    i32::try_from(tenant.retention_days())
        .map_err(|error| AppError::Validation(format!("retention_days is out of range: {error}")))
}

#[async_trait]
impl TenantRegistryRepository for PostgresTenantRegistryRepository {
    async fn insert(&self, tenant: Tenant) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO tenants (
                tenant_id,
                display_name,
                region,
                compliance_level,
                isolation_level,
                status,
                retention_days,
                data_protection_contact
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (tenant_id) DO NOTHING
            "#,
        )
        .bind(tenant.tenant_id().as_str())
        .bind(tenant.display_name())
        .bind(tenant.region())
        .bind(tenant.compliance_level().as_str())
        .bind(tenant.isolation_level().as_str())
        .bind(tenant.status().as_str())
        .bind(retention_days_column(&tenant)?)
        .bind(tenant.data_protection_contact())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to register tenant: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::DuplicateTenant(format!(
                "tenant '{}' is already registered",
                tenant.tenant_id()
            )));
        }

        Ok(())
    }

    async fn find(&self, tenant_id: &TenantId) -> AppResult<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT
                tenant_id,
                display_name,
                region,
                compliance_level,
                isolation_level,
                status,
                retention_days,
                data_protection_contact
            FROM tenants
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load tenant: {error}")))?;

        row.map(Tenant::try_from).transpose()
    }

    async fn update(&self, tenant: Tenant) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET display_name = $2,
                region = $3,
                compliance_level = $4,
                isolation_level = $5,
                status = $6,
                retention_days = $7,
                data_protection_contact = $8,
                updated_at = now()
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant.tenant_id().as_str())
        .bind(tenant.display_name())
        .bind(tenant.region())
        .bind(tenant.compliance_level().as_str())
        .bind(tenant.isolation_level().as_str())
        .bind(tenant.status().as_str())
        .bind(retention_days_column(&tenant)?)
        .bind(tenant.data_protection_contact())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to update tenant: {error}")))?;

        if result.rows_affected() == 0 {
            return Err(AppError::TenantNotFound(
                "tenant is not registered".to_owned(),
            ));
        }

        Ok(())
    }

    async fn list(&self, filter: &TenantListFilter) -> AppResult<Vec<Tenant>> {
        let rows = sqlx::query_as::<_, TenantRow>(
            r#"
            SELECT
                tenant_id,
                display_name,
                region,
                compliance_level,
                isolation_level,
                status,
                retention_days,
                data_protection_contact
            FROM tenants
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::TEXT IS NULL OR region = $2)
              AND ($3::TEXT IS NULL OR compliance_level = $3)
            ORDER BY tenant_id
            "#,
        )
        .bind(filter.status.map(|status| status.as_str()))
        .bind(filter.region.as_deref())
        .bind(filter.compliance_level.map(|level| level.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list tenants: {error}")))?;

        rows.into_iter().map(Tenant::try_from).collect()
    }

    async fn remove(&self, tenant_id: &TenantId) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM tenants
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to remove tenant: {error}")))?;

        Ok(result.rows_affected() > 0)
    }
}
