//! Tenant registry service with a bounded-staleness read-through cache.
//!
//! Reads consult a local cache whose entries live at most
//! [`RegistryCacheSettings::ttl`] (capped at five seconds). Writes on this
//! node invalidate the entry synchronously; other nodes converge when their
//! entry expires.

use std::sync::Arc;
use std::time::Duration;

use civicvault_core::{AppError, AppResult, TenantId};
use civicvault_domain::{
    ComplianceLevel, NewTenant, PartitionAssigner, PartitionRebalancePlan, Tenant,
    TenantListFilter, TenantStatus,
};
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::info;

use crate::isolation_ports::TenantRegistryRepository;
use crate::isolation_settings::{IsolationSettings, bounded};

/// Upper bound on registry staleness.
pub const MAX_REGISTRY_CACHE_TTL: Duration = Duration::from_secs(5);

/// Registry cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryCacheSettings {
    /// Entry lifetime, clamped to [`MAX_REGISTRY_CACHE_TTL`].
    pub ttl: Duration,
}

impl RegistryCacheSettings {
    /// Creates settings, clamping `ttl` to the staleness bound.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl: ttl.min(MAX_REGISTRY_CACHE_TTL),
        }
    }
}

impl Default for RegistryCacheSettings {
    fn default() -> Self {
        Self::new(MAX_REGISTRY_CACHE_TTL)
    }
}

#[derive(Debug, Clone)]
struct CachedTenant {
    tenant: Tenant,
    fetched_at: Instant,
}

/// Application service for the authoritative tenant catalog.
#[derive(Clone)]
pub struct TenantRegistryService {
    repository: Arc<dyn TenantRegistryRepository>,
    assigner: PartitionAssigner,
    cache: Arc<DashMap<TenantId, CachedTenant>>,
    cache_settings: RegistryCacheSettings,
    settings: IsolationSettings,
}

impl TenantRegistryService {
    /// Creates a registry service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn TenantRegistryRepository>,
        assigner: PartitionAssigner,
        cache_settings: RegistryCacheSettings,
        settings: IsolationSettings,
    ) -> Self {
        Self {
            repository,
            assigner,
            cache: Arc::new(DashMap::new()),
            cache_settings,
            settings,
        }
    }

    /// Provisions a new active tenant.
    pub async fn register(&self, input: NewTenant) -> AppResult<TenantId> {
        let tenant = Tenant::provision(input)?;
        let tenant_id = tenant.tenant_id().clone();

        if self.load_fresh(&tenant_id).await?.is_some() {
            return Err(AppError::DuplicateTenant(format!(
                "tenant '{tenant_id}' is already registered"
            )));
        }

        bounded(
            self.settings.read_timeout,
            "registry insert",
            self.repository.insert(tenant),
        )
        .await?;
        self.invalidate(&tenant_id);

        info!(tenant_id = %tenant_id, "tenant registered");
        Ok(tenant_id)
    }

    /// Returns a tenant, served from the local cache while fresh.
    pub async fn get(&self, tenant_id: &TenantId) -> AppResult<Tenant> {
        if let Some(tenant) = self.cached(tenant_id) {
            return Ok(tenant);
        }

        let tenant = self
            .load_fresh(tenant_id)
            .await?
            .ok_or_else(|| AppError::TenantNotFound("tenant is not registered".to_owned()))?;

        self.cache.insert(
            tenant_id.clone(),
            CachedTenant {
                tenant: tenant.clone(),
                fetched_at: Instant::now(),
            },
        );

        Ok(tenant)
    }

    /// Returns the tenant only if it may serve reads and writes.
    pub async fn require_serving(&self, tenant_id: &TenantId) -> AppResult<Tenant> {
        let tenant = self.get(tenant_id).await?;
        match tenant.status() {
            TenantStatus::Active => Ok(tenant),
            TenantStatus::Suspended => Err(AppError::TenantInactive(
                "tenant is suspended".to_owned(),
            )),
            TenantStatus::Migrating => Err(AppError::TenantMigrating(
                "tenant is migrating between partitions".to_owned(),
            )),
        }
    }

    /// Returns the tenant if data-subject rights operations may run against it.
    ///
    /// Suspended tenants stay reachable so their data can be exported or
    /// erased before deregistration. Migrating tenants never are.
    pub async fn require_compliance_reachable(&self, tenant_id: &TenantId) -> AppResult<Tenant> {
        let tenant = self.get(tenant_id).await?;
        match tenant.status() {
            TenantStatus::Active | TenantStatus::Suspended => Ok(tenant),
            TenantStatus::Migrating => Err(AppError::TenantMigrating(
                "tenant is migrating between partitions".to_owned(),
            )),
        }
    }

    /// Applies a status transition and invalidates the local cache entry.
    pub async fn update_status(
        &self,
        tenant_id: &TenantId,
        status: TenantStatus,
    ) -> AppResult<Tenant> {
        let mut tenant = self.require_fresh(tenant_id).await?;
        let previous = tenant.status();
        tenant.transition_to(status)?;

        self.persist(tenant.clone()).await?;
        info!(
            tenant_id = %tenant_id,
            from = previous.as_str(),
            to = status.as_str(),
            "tenant status changed"
        );

        Ok(tenant)
    }

    /// Raises a tenant's compliance tier.
    pub async fn upgrade_compliance(
        &self,
        tenant_id: &TenantId,
        level: ComplianceLevel,
    ) -> AppResult<Tenant> {
        let mut tenant = self.require_fresh(tenant_id).await?;
        tenant.upgrade_compliance(level)?;

        self.persist(tenant.clone()).await?;
        info!(tenant_id = %tenant_id, level = level.as_str(), "tenant compliance upgraded");

        Ok(tenant)
    }

    /// Lists tenants straight from the repository.
    pub async fn list(&self, filter: &TenantListFilter) -> AppResult<Vec<Tenant>> {
        bounded(
            self.settings.read_timeout,
            "registry list",
            self.repository.list(filter),
        )
        .await
    }

    /// Returns whether no tenant has been provisioned yet.
    pub async fn is_empty(&self) -> AppResult<bool> {
        Ok(self.list(&TenantListFilter::default()).await?.is_empty())
    }

    /// Removes a suspended tenant from the catalog.
    ///
    /// Callers must have completed erasure of every tenant-scoped record first.
    pub async fn remove(&self, tenant_id: &TenantId) -> AppResult<()> {
        let tenant = self.require_fresh(tenant_id).await?;
        if tenant.status() != TenantStatus::Suspended {
            return Err(AppError::InvalidTransition(
                "only suspended tenants can be deregistered".to_owned(),
            ));
        }

        bounded(
            self.settings.read_timeout,
            "registry remove",
            self.repository.remove(tenant_id),
        )
        .await?;
        self.invalidate(tenant_id);

        info!(tenant_id = %tenant_id, "tenant deregistered");
        Ok(())
    }

    /// Plans an offline change of the deployment partition count.
    pub async fn plan_partition_rebalance(
        &self,
        target_count: u32,
    ) -> AppResult<PartitionRebalancePlan> {
        let tenants = self.list(&TenantListFilter::default()).await?;
        self.assigner
            .plan_rebalance(target_count, tenants.iter().map(Tenant::tenant_id))
    }

    /// Drops the local cache entry for `tenant_id`.
    pub fn invalidate(&self, tenant_id: &TenantId) {
        self.cache.remove(tenant_id);
    }

    fn cached(&self, tenant_id: &TenantId) -> Option<Tenant> {
        let entry = self.cache.get(tenant_id)?;
        if entry.fetched_at.elapsed() < self.cache_settings.ttl {
            return Some(entry.tenant.clone());
        }
        drop(entry);

        self.cache
            .remove_if(tenant_id, |_, cached| {
                cached.fetched_at.elapsed() >= self.cache_settings.ttl
            });
        None
    }

    async fn load_fresh(&self, tenant_id: &TenantId) -> AppResult<Option<Tenant>> {
        bounded(
            self.settings.read_timeout,
            "registry lookup",
            self.repository.find(tenant_id),
        )
        .await
    }

    async fn require_fresh(&self, tenant_id: &TenantId) -> AppResult<Tenant> {
        self.load_fresh(tenant_id)
            .await?
            .ok_or_else(|| AppError::TenantNotFound("tenant is not registered".to_owned()))
    }

    async fn persist(&self, tenant: Tenant) -> AppResult<()> {
        let tenant_id = tenant.tenant_id().clone();
        let result = bounded(
            self.settings.read_timeout,
            "registry update",
            self.repository.update(tenant),
        )
        .await;
        self.invalidate(&tenant_id);
        result
    }
}

#[cfg(test)]
mod tests;
