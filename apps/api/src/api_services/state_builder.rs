use std::sync::Arc;

use civicvault_application::{
    AccessAuditRepository, AccessMiddleware, AuditService, ComplianceActionRepository,
    ComplianceService, IsolationValidator, RateLimitService, SecurityMetrics, TenantCacheService,
    TenantCacheStore, TenantCircuitBreaker, TenantDataAccess, TenantRateLimiter,
    TenantRecordRepository, TenantRegistryRepository, TenantRegistryService,
};
use civicvault_core::AppError;
use civicvault_infrastructure::TracingSecurityMetrics;
use sqlx::PgPool;

use crate::api_config::ApiConfig;
use crate::state::AppState;

use super::redis::build_redis_client;

mod caches;
mod repositories;

/// Port adapters selected for this process.
pub struct PortSet {
    pub registry: Arc<dyn TenantRegistryRepository>,
    pub records: Arc<dyn TenantRecordRepository>,
    pub audit: Arc<dyn AccessAuditRepository>,
    pub actions: Arc<dyn ComplianceActionRepository>,
    pub cache_store: Arc<dyn TenantCacheStore>,
    pub rate_limiter: Arc<dyn TenantRateLimiter>,
}

#[cfg(test)]
impl PortSet {
    pub fn in_memory() -> Self {
        let repositories = repositories::build_repository_ports(None);
        let caches = caches::build_cache_ports(None, "test");
        Self {
            registry: repositories.registry,
            records: repositories.records,
            audit: repositories.audit,
            actions: repositories.actions,
            cache_store: caches.cache_store,
            rate_limiter: caches.rate_limiter,
        }
    }
}

pub struct ServiceSet {
    pub middleware: AccessMiddleware,
}

pub fn build_services(
    ports: PortSet,
    config: &ApiConfig,
    metrics: Arc<dyn SecurityMetrics>,
) -> Result<ServiceSet, AppError> {
    let assigner = config.partition_assigner()?;

    let registry = TenantRegistryService::new(
        ports.registry,
        assigner.clone(),
        config.registry_cache,
        config.isolation,
    );
    let audit = AuditService::new(
        ports.audit,
        metrics.clone(),
        config.isolation,
        config.audit_retention_days,
    );
    let validator = IsolationValidator::new(assigner.clone(), audit.clone(), metrics.clone());
    let dal = TenantDataAccess::new(ports.records, assigner.clone(), config.isolation);
    let cache = TenantCacheService::new(
        ports.cache_store,
        assigner,
        validator.clone(),
        config.isolation,
    );
    let compliance_service = ComplianceService::new(
        dal.clone(),
        cache.clone(),
        validator.clone(),
        ports.actions,
        config.compliance_resource_types.clone(),
        config.isolation,
    );
    let rate_limit = RateLimitService::new(
        ports.rate_limiter,
        config.rate_limit.clone(),
        metrics.clone(),
        config.isolation,
    );
    let breaker = TenantCircuitBreaker::new(config.circuit_breaker, metrics);

    Ok(ServiceSet {
        middleware: AccessMiddleware::new(
            registry,
            dal,
            cache,
            validator,
            audit,
            compliance_service,
            rate_limit,
            breaker,
        ),
    })
}

pub fn build_app_state(pool: Option<PgPool>, config: &ApiConfig) -> Result<AppState, AppError> {
    let redis_client = config
        .redis_url
        .as_deref()
        .map(build_redis_client)
        .transpose()?;

    let repositories = repositories::build_repository_ports(pool.as_ref());
    let caches = caches::build_cache_ports(redis_client.clone(), &config.rate_limit_key_prefix);
    let metrics = Arc::new(TracingSecurityMetrics::new());

    let services = build_services(
        PortSet {
            registry: repositories.registry,
            records: repositories.records,
            audit: repositories.audit,
            actions: repositories.actions,
            cache_store: caches.cache_store,
            rate_limiter: caches.rate_limiter,
        },
        config,
        metrics,
    )?;

    Ok(AppState {
        middleware: services.middleware,
        gateway_shared_secret: Arc::from(config.gateway_shared_secret.as_str()),
        postgres_pool: pool,
        redis_client,
    })
}
