//! Entry point for every tenant data request.
//!
//! `handle` resolves the caller tenant only from the authenticated context,
//! checks the registry, runs the validator before and after the storage or
//! cache operation, and writes exactly one audit entry per request. When the
//! validator rejects a request it has already written that entry itself.

use civicvault_core::{AppError, AppResult, TenantContext, TenantId};
use civicvault_domain::ViolationType;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::audit_service::AuditService;
use crate::cache_service::TenantCacheService;
use crate::circuit_breaker::TenantCircuitBreaker;
use crate::compliance_service::ComplianceService;
use crate::data_access_service::TenantDataAccess;
use crate::isolation_validator::{AuditScope, IsolationValidator};
use crate::rate_limit_service::RateLimitService;
use crate::tenant_registry_service::TenantRegistryService;

mod admin;
mod dispatch;
mod request;

pub use request::{AccessOperation, AccessRequest, AccessResponse, AdminOperation, AdminRequest};

/// Tenant-aware request pipeline.
#[derive(Clone)]
pub struct AccessMiddleware {
    registry: TenantRegistryService,
    dal: TenantDataAccess,
    cache: TenantCacheService,
    validator: IsolationValidator,
    audit: AuditService,
    compliance: ComplianceService,
    rate_limit: RateLimitService,
    breaker: TenantCircuitBreaker,
}

impl AccessMiddleware {
    /// Creates the middleware over its collaborators.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: TenantRegistryService,
        dal: TenantDataAccess,
        cache: TenantCacheService,
        validator: IsolationValidator,
        audit: AuditService,
        compliance: ComplianceService,
        rate_limit: RateLimitService,
        breaker: TenantCircuitBreaker,
    ) -> Self {
        Self {
            registry,
            dal,
            cache,
            validator,
            audit,
            compliance,
            rate_limit,
            breaker,
        }
    }

    /// Handles one tenant data request.
    pub async fn handle(
        &self,
        request: AccessRequest,
        caller: &TenantContext,
    ) -> AppResult<AccessResponse> {
        let scope = request.audit_scope(caller);
        let outcome = self.process(&request, caller, &scope).await;
        self.record_outcome(caller, scope, &outcome).await;
        outcome
    }

    async fn process(
        &self,
        request: &AccessRequest,
        caller: &TenantContext,
        scope: &AuditScope,
    ) -> AppResult<AccessResponse> {
        let caller_tenant = caller.tenant_id();
        self.rate_limit.check_tenant(caller_tenant).await?;
        if request.operation.is_compliance() {
            self.registry
                .require_compliance_reachable(caller_tenant)
                .await?;
        } else {
            self.registry.require_serving(caller_tenant).await?;
        }
        self.breaker.check(caller_tenant)?;

        let target = match request.requested_tenant_id.as_deref() {
            Some(raw) => TenantId::parse(raw)?,
            None => caller_tenant.clone(),
        };

        let query = request.operation.narrow(self.dal.query_for(&target));
        self.validator.validate_query(&query, caller, scope).await?;

        let outcome = self.dispatch(&request.operation, &target, caller, scope).await;
        self.breaker.record(caller_tenant, &outcome);
        let payload = outcome?;

        self.validator
            .validate_response(&payload, caller, scope)
            .await?;

        Ok(AccessResponse { payload })
    }

    async fn record_outcome<T>(
        &self,
        caller: &TenantContext,
        scope: AuditScope,
        outcome: &AppResult<T>,
    ) {
        let entry = scope.entry(caller);
        let entry = match outcome {
            Ok(_) => {
                info!(
                    tenant_id = %caller.tenant_id(),
                    user_id = caller.user_id(),
                    action = scope.action.as_str(),
                    resource_type = %scope.resource_type,
                    "access granted"
                );
                entry
            }
            // The validator audits its own rejections.
            Err(AppError::IsolationViolation(_)) => return,
            Err(error) => {
                let violation_type = matches!(error, AppError::Forbidden(_))
                    .then_some(ViolationType::PrivilegeEscalation);
                warn!(
                    tenant_id = %caller.tenant_id(),
                    requested_tenant_id = %scope.requested_tenant_id,
                    user_id = caller.user_id(),
                    action = scope.action.as_str(),
                    error = %error,
                    "access denied"
                );
                entry.denied(violation_type)
            }
        };

        self.audit.log_access(entry).await;
    }
}

fn to_payload<T: Serialize>(value: &T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|error| {
        AppError::Internal(format!("failed to encode response payload: {error}"))
    })
}

#[cfg(test)]
mod tests;
