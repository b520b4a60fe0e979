//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod in_memory_audit_repository;
mod in_memory_tenant_cache_store;
mod in_memory_tenant_rate_limiter;
mod in_memory_tenant_record_repository;
mod in_memory_tenant_registry_repository;
mod postgres_access_audit_repository;
mod postgres_compliance_action_repository;
mod postgres_tenant_record_repository;
mod postgres_tenant_registry_repository;
mod redis_tenant_cache_store;
mod redis_tenant_rate_limiter;
mod tracing_security_metrics;

pub use in_memory_audit_repository::{
    InMemoryAccessAuditRepository, InMemoryComplianceActionRepository,
};
pub use in_memory_tenant_cache_store::InMemoryTenantCacheStore;
pub use in_memory_tenant_rate_limiter::InMemoryTenantRateLimiter;
pub use in_memory_tenant_record_repository::InMemoryTenantRecordRepository;
pub use in_memory_tenant_registry_repository::InMemoryTenantRegistryRepository;
pub use postgres_access_audit_repository::PostgresAccessAuditRepository;
pub use postgres_compliance_action_repository::PostgresComplianceActionRepository;
pub use postgres_tenant_record_repository::PostgresTenantRecordRepository;
pub use postgres_tenant_registry_repository::PostgresTenantRegistryRepository;
pub use redis_tenant_cache_store::RedisTenantCacheStore;
pub use redis_tenant_rate_limiter::RedisTenantRateLimiter;
pub use tracing_security_metrics::{SecurityMetricsSnapshot, TracingSecurityMetrics};
