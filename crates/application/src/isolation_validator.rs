//! Independent cross-tenant checks on queries, paths, cache entries, and responses.
//!
//! Every detected mismatch is audited with its violation type and counted
//! before `IsolationViolation` is returned. The returned error never names
//! the foreign tenant.

use std::sync::Arc;

use civicvault_core::{AppError, AppResult, TenantContext};
use civicvault_domain::{
    AccessAction, AccessAuditEntry, PartitionAssigner, QueryDescriptor, TenantRecord,
    ViolationType,
};
use serde_json::Value;
use tracing::error;

use crate::audit_service::AuditService;
use crate::security_metrics::SecurityMetrics;

/// Request attributes copied into the audit entry of a violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditScope {
    /// Tenant the request addressed, verbatim.
    pub requested_tenant_id: String,
    /// Action under validation.
    pub action: AccessAction,
    /// Entity type label.
    pub resource_type: String,
    /// Entity identifier.
    pub resource_id: String,
    /// Caller network address.
    pub source_ip: Option<String>,
    /// Caller user agent.
    pub user_agent: Option<String>,
}

impl AuditScope {
    /// Creates a scope without origin metadata.
    #[must_use]
    pub fn new(
        requested_tenant_id: impl Into<String>,
        action: AccessAction,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            requested_tenant_id: requested_tenant_id.into(),
            action,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            source_ip: None,
            user_agent: None,
        }
    }

    /// Attaches caller network metadata.
    #[must_use]
    pub fn with_origin(mut self, source_ip: Option<String>, user_agent: Option<String>) -> Self {
        self.source_ip = source_ip;
        self.user_agent = user_agent;
        self
    }

    /// Builds the audit entry for this scope.
    #[must_use]
    pub fn entry(&self, caller: &TenantContext) -> AccessAuditEntry {
        AccessAuditEntry::granted(
            caller.tenant_id().clone(),
            self.requested_tenant_id.clone(),
            caller.user_id(),
            self.action,
            self.resource_type.clone(),
            self.resource_id.clone(),
        )
        .with_origin(self.source_ip.clone(), self.user_agent.clone())
    }
}

#[derive(Debug)]
struct Mismatch {
    violation_type: ViolationType,
    check: &'static str,
    detail: String,
}

/// Cross-tenant security validator.
#[derive(Clone)]
pub struct IsolationValidator {
    assigner: PartitionAssigner,
    audit: AuditService,
    metrics: Arc<dyn SecurityMetrics>,
}

impl IsolationValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(
        assigner: PartitionAssigner,
        audit: AuditService,
        metrics: Arc<dyn SecurityMetrics>,
    ) -> Self {
        Self {
            assigner,
            audit,
            metrics,
        }
    }

    /// Checks the tenant filter of a query before it reaches storage.
    pub async fn validate_query(
        &self,
        query: &QueryDescriptor,
        caller: &TenantContext,
        scope: &AuditScope,
    ) -> AppResult<()> {
        let expected_partition = self.assigner.partition_for(caller.tenant_id());
        let result = if query.tenant_id() != caller.tenant_id() {
            Err(Mismatch {
                violation_type: ViolationType::CrossTenantAccess,
                check: "query",
                detail: format!("query filter targets tenant '{}'", query.tenant_id()),
            })
        } else if query.partition_index() != expected_partition {
            Err(Mismatch {
                violation_type: ViolationType::CrossTenantAccess,
                check: "query",
                detail: format!(
                    "query partition {} differs from {expected_partition}",
                    query.partition_index()
                ),
            })
        } else {
            Ok(())
        };

        self.settle(result, caller, scope).await
    }

    /// Walks a response payload and checks every embedded `tenant_id`.
    pub async fn validate_response(
        &self,
        payload: &Value,
        caller: &TenantContext,
        scope: &AuditScope,
    ) -> AppResult<()> {
        let result = check_payload(payload, caller.tenant_id().as_str(), "$");
        self.settle(result, caller, scope).await
    }

    /// Checks that every record is owned by the caller.
    pub async fn validate_records(
        &self,
        records: &[TenantRecord],
        caller: &TenantContext,
        scope: &AuditScope,
    ) -> AppResult<()> {
        let result = records
            .iter()
            .find(|record| record.tenant_id() != caller.tenant_id())
            .map_or(Ok(()), |record| {
                Err(Mismatch {
                    violation_type: ViolationType::LeakAttempt,
                    check: "records",
                    detail: format!(
                        "record '{}/{}' belongs to tenant '{}'",
                        record.resource_type(),
                        record.resource_id(),
                        record.tenant_id()
                    ),
                })
            })
            .and_then(|()| {
                records.iter().try_for_each(|record| {
                    check_payload(record.data(), caller.tenant_id().as_str(), "$.data")
                })
            });

        self.settle(result, caller, scope).await
    }

    /// Checks that an object-storage path lives under the caller's tenant segment.
    pub async fn validate_resource_path(
        &self,
        path: &str,
        caller: &TenantContext,
        scope: &AuditScope,
    ) -> AppResult<()> {
        let expected = format!(
            "{}{}/",
            self.assigner.storage_root_for(caller.tenant_id()),
            caller.tenant_id()
        );

        let result = match path.strip_prefix(&expected) {
            Some(rest)
                if !rest.is_empty()
                    && rest
                        .split('/')
                        .all(|segment| !segment.is_empty() && segment != ".." && segment != ".") =>
            {
                Ok(())
            }
            _ => Err(Mismatch {
                violation_type: ViolationType::CrossTenantAccess,
                check: "resource_path",
                detail: format!("path '{path}' is outside '{expected}'"),
            }),
        };

        self.settle(result, caller, scope).await
    }

    /// Checks a decoded cache envelope, owner first, then its value.
    pub async fn validate_cache_entry(
        &self,
        owner: &str,
        value: &Value,
        caller: &TenantContext,
        scope: &AuditScope,
    ) -> AppResult<()> {
        let result = if owner == caller.tenant_id().as_str() {
            check_payload(value, owner, "$.value")
        } else {
            Err(Mismatch {
                violation_type: ViolationType::LeakAttempt,
                check: "cache_entry",
                detail: format!("cache entry is owned by '{owner}'"),
            })
        };

        self.settle(result, caller, scope).await
    }

    async fn settle(
        &self,
        result: Result<(), Mismatch>,
        caller: &TenantContext,
        scope: &AuditScope,
    ) -> AppResult<()> {
        let Err(mismatch) = result else {
            return Ok(());
        };

        error!(
            caller_tenant_id = %caller.tenant_id(),
            requested_tenant_id = %scope.requested_tenant_id,
            user_id = caller.user_id(),
            action = scope.action.as_str(),
            violation_type = mismatch.violation_type.as_str(),
            check = mismatch.check,
            detail = %mismatch.detail,
            "tenant isolation violation"
        );
        self.metrics
            .record_isolation_violation(mismatch.violation_type, mismatch.check);
        self.audit
            .log_access(scope.entry(caller).denied(Some(mismatch.violation_type)))
            .await;

        Err(AppError::IsolationViolation(
            "access denied / request could not be completed".to_owned(),
        ))
    }
}

fn check_payload(payload: &Value, expected: &str, pointer: &str) -> Result<(), Mismatch> {
    match payload {
        Value::Object(fields) => {
            for (field, value) in fields {
                let location = format!("{pointer}.{field}");
                if field == "tenant_id" && value.as_str() != Some(expected) {
                    return Err(Mismatch {
                        violation_type: ViolationType::LeakAttempt,
                        check: "response",
                        detail: format!("{location} carries {value}"),
                    });
                }
                check_payload(value, expected, &location)?;
            }
            Ok(())
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(index, item)| check_payload(item, expected, &format!("{pointer}[{index}]"))),
        _ => Ok(()),
    }
}
