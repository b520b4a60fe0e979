use async_trait::async_trait;
use civicvault_core::{AppResult, TenantId};
use civicvault_domain::{Tenant, TenantListFilter};

/// Port for the authoritative tenant catalog.
#[async_trait]
pub trait TenantRegistryRepository: Send + Sync {
    /// Inserts a new tenant. Fails with `DuplicateTenant` if the id exists.
    async fn insert(&self, tenant: Tenant) -> AppResult<()>;

    /// Finds one tenant.
    async fn find(&self, tenant_id: &TenantId) -> AppResult<Option<Tenant>>;

    /// Replaces mutable tenant attributes. Fails with `TenantNotFound` if absent.
    async fn update(&self, tenant: Tenant) -> AppResult<()>;

    /// Lists tenants matching `filter`, ordered by tenant id.
    async fn list(&self, filter: &TenantListFilter) -> AppResult<Vec<Tenant>>;

    /// Removes a tenant entry. Returns whether it existed.
    async fn remove(&self, tenant_id: &TenantId) -> AppResult<bool>;
}
