use std::collections::BTreeMap;

use async_trait::async_trait;
use civicvault_application::TenantRegistryRepository;
use civicvault_core::{AppError, AppResult, TenantId};
use civicvault_domain::{Tenant, TenantListFilter};
use tokio::sync::RwLock;

/// In-memory tenant catalog.
#[derive(Debug, Default)]
pub struct InMemoryTenantRegistryRepository {
    tenants: RwLock<BTreeMap<TenantId, Tenant>>,
}

impl InMemoryTenantRegistryRepository {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantRegistryRepository for InMemoryTenantRegistryRepository {
    async fn insert(&self, tenant: Tenant) -> AppResult<()> {
        let mut tenants = self.tenants.write().await;
        if tenants.contains_key(tenant.tenant_id()) {
            return Err(AppError::DuplicateTenant(format!(
                "tenant '{}' is already registered",
                tenant.tenant_id()
            )));
        }

        tenants.insert(tenant.tenant_id().clone(), tenant);
        Ok(())
    }

    async fn find(&self, tenant_id: &TenantId) -> AppResult<Option<Tenant>> {
        Ok(self.tenants.read().await.get(tenant_id).cloned())
    }

    async fn update(&self, tenant: Tenant) -> AppResult<()> {
        let mut tenants = self.tenants.write().await;
        let Some(stored) = tenants.get_mut(tenant.tenant_id()) else {
            return Err(AppError::TenantNotFound("tenant is not registered".to_owned()));
        };

        *stored = tenant;
        Ok(())
    }

    async fn list(&self, filter: &TenantListFilter) -> AppResult<Vec<Tenant>> {
        Ok(self
            .tenants
            .read()
            .await
            .values()
            .filter(|tenant| filter.matches(tenant))
            .cloned()
            .collect())
    }

    async fn remove(&self, tenant_id: &TenantId) -> AppResult<bool> {
        Ok(self.tenants.write().await.remove(tenant_id).is_some())
    }
}
