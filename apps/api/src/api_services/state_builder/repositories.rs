use std::sync::Arc;

use civicvault_application::{
    AccessAuditRepository, ComplianceActionRepository, TenantRecordRepository,
    TenantRegistryRepository,
};
use civicvault_infrastructure::{
    InMemoryAccessAuditRepository, InMemoryComplianceActionRepository,
    InMemoryTenantRecordRepository, InMemoryTenantRegistryRepository,
    PostgresAccessAuditRepository, PostgresComplianceActionRepository,
    PostgresTenantRecordRepository, PostgresTenantRegistryRepository,
};
use sqlx::PgPool;
use tracing::warn;

pub(super) struct RepositoryPorts {
    pub(super) registry: Arc<dyn TenantRegistryRepository>,
    pub(super) records: Arc<dyn TenantRecordRepository>,
    pub(super) audit: Arc<dyn AccessAuditRepository>,
    pub(super) actions: Arc<dyn ComplianceActionRepository>,
}

pub(super) fn build_repository_ports(pool: Option<&PgPool>) -> RepositoryPorts {
    match pool {
        Some(pool) => RepositoryPorts {
            registry: Arc::new(PostgresTenantRegistryRepository::new(pool.clone())),
            records: Arc::new(PostgresTenantRecordRepository::new(pool.clone())),
            audit: Arc::new(PostgresAccessAuditRepository::new(pool.clone())),
            actions: Arc::new(PostgresComplianceActionRepository::new(pool.clone())),
        },
        None => {
            warn!("DATABASE_URL is not set; tenant data is held in process memory");
            RepositoryPorts {
                registry: Arc::new(InMemoryTenantRegistryRepository::new()),
                records: Arc::new(InMemoryTenantRecordRepository::new()),
                audit: Arc::new(InMemoryAccessAuditRepository::new()),
                actions: Arc::new(InMemoryComplianceActionRepository::new()),
            }
        }
    }
}
