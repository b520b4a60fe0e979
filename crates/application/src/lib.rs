//! Application services and ports.

#![forbid(unsafe_code)]

mod access_middleware;
mod audit_service;
mod cache_service;
mod circuit_breaker;
mod compliance_service;
mod data_access_service;
mod isolation_ports;
mod isolation_settings;
mod isolation_validator;
mod rate_limit_service;
mod security_metrics;
mod tenant_registry_service;

#[cfg(test)]
mod test_support;

pub use access_middleware::{
    AccessMiddleware, AccessOperation, AccessRequest, AccessResponse, AdminOperation, AdminRequest,
};
pub use audit_service::{AuditService, MAX_AUDIT_PAGE};
pub use cache_service::{CachedEnvelope, DEFAULT_CACHE_TTL_SECONDS, TenantCacheService};
pub use circuit_breaker::{CircuitBreakerSettings, TenantCircuitBreaker};
pub use compliance_service::{ComplianceRetryReport, ComplianceService, EraseResult, ExportBundle};
pub use data_access_service::TenantDataAccess;
pub use isolation_ports::{
    AccessAuditQuery, AccessAuditRepository, ComplianceActionRepository, TenantCacheStore,
    TenantRecordRepository, TenantRegistryRepository,
};
pub use isolation_settings::IsolationSettings;
pub use isolation_validator::{AuditScope, IsolationValidator};
pub use rate_limit_service::{
    RateLimitDecision, RateLimitRule, RateLimitService, TenantRateLimiter,
};
pub use security_metrics::SecurityMetrics;
pub use tenant_registry_service::{
    MAX_REGISTRY_CACHE_TTL, RegistryCacheSettings, TenantRegistryService,
};
