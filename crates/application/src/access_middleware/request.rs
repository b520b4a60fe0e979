use chrono::{DateTime, Utc};
use civicvault_core::TenantContext;
use civicvault_domain::{
    AccessAction, ComplianceLevel, NewTenant, QueryDescriptor, TenantListFilter, TenantStatus,
    ViolationType,
};
use serde_json::{Map, Value};

use crate::isolation_validator::AuditScope;

/// Operation requested through [`super::AccessMiddleware::handle`].
#[derive(Debug, Clone, PartialEq)]
pub enum AccessOperation {
    /// Reads one record.
    ReadRecord {
        /// Entity type.
        resource_type: String,
        /// Natural id.
        resource_id: String,
    },
    /// Creates or replaces one record.
    WriteRecord {
        /// Entity type.
        resource_type: String,
        /// Natural id.
        resource_id: String,
        /// Data subject the record belongs to.
        subject_id: Option<String>,
        /// JSON object payload.
        data: Value,
    },
    /// Deletes one record.
    DeleteRecord {
        /// Entity type.
        resource_type: String,
        /// Natural id.
        resource_id: String,
    },
    /// Lists records, optionally narrowed.
    ListRecords {
        /// Entity type filter.
        resource_type: Option<String>,
        /// Data subject filter.
        subject_id: Option<String>,
    },
    /// Reads a cached value.
    CacheGet {
        /// Logical key.
        key: String,
    },
    /// Stores a cached value.
    CacheSet {
        /// Logical key.
        key: String,
        /// Scopes the key to a data subject so erasure can find it.
        subject_id: Option<String>,
        /// Cached value.
        value: Value,
        /// Entry lifetime.
        ttl_seconds: Option<u64>,
    },
    /// Removes a cached value.
    CacheInvalidate {
        /// Logical key.
        key: String,
    },
    /// Resolves an object-storage path for the tenant.
    ResolveStoragePath {
        /// Path relative to the tenant directory.
        resource_path: String,
    },
    /// Exports tenant or subject data.
    Export {
        /// Data subject filter.
        subject_id: Option<String>,
    },
    /// Erases tenant or subject data.
    Erase {
        /// Data subject filter.
        subject_id: Option<String>,
    },
    /// Rectifies one subject's data.
    Rectify {
        /// Data subject.
        subject_id: String,
        /// Top-level fields to overwrite.
        changes: Map<String, Value>,
    },
    /// Lists the tenant's compliance actions.
    ListComplianceActions,
}

impl AccessOperation {
    /// Returns whether this is a data-subject rights operation.
    #[must_use]
    pub fn is_compliance(&self) -> bool {
        matches!(
            self,
            Self::Export { .. }
                | Self::Erase { .. }
                | Self::Rectify { .. }
                | Self::ListComplianceActions
        )
    }

    /// Returns the audited action.
    #[must_use]
    pub fn action(&self) -> AccessAction {
        match self {
            Self::ReadRecord { .. } | Self::ResolveStoragePath { .. } => AccessAction::Read,
            Self::WriteRecord { .. } => AccessAction::Write,
            Self::DeleteRecord { .. } => AccessAction::Delete,
            Self::ListRecords { .. } | Self::ListComplianceActions => AccessAction::List,
            Self::CacheGet { .. } => AccessAction::CacheGet,
            Self::CacheSet { .. } => AccessAction::CacheSet,
            Self::CacheInvalidate { .. } => AccessAction::CacheInvalidate,
            Self::Export { .. } => AccessAction::Export,
            Self::Erase { .. } => AccessAction::Erase,
            Self::Rectify { .. } => AccessAction::Rectify,
        }
    }

    fn resource(&self) -> (String, String) {
        match self {
            Self::ReadRecord {
                resource_type,
                resource_id,
            }
            | Self::WriteRecord {
                resource_type,
                resource_id,
                ..
            }
            | Self::DeleteRecord {
                resource_type,
                resource_id,
            } => (resource_type.clone(), resource_id.clone()),
            Self::ListRecords {
                resource_type,
                subject_id,
            } => (
                resource_type.clone().unwrap_or_else(|| "*".to_owned()),
                subject_id.clone().unwrap_or_else(|| "*".to_owned()),
            ),
            Self::CacheGet { key } | Self::CacheSet { key, .. } | Self::CacheInvalidate { key } => {
                ("cache".to_owned(), key.clone())
            }
            Self::ResolveStoragePath { resource_path } => {
                ("storage_path".to_owned(), resource_path.clone())
            }
            Self::Export { subject_id } | Self::Erase { subject_id } => (
                "tenant".to_owned(),
                subject_id.clone().unwrap_or_else(|| "*".to_owned()),
            ),
            Self::Rectify { subject_id, .. } => ("tenant".to_owned(), subject_id.clone()),
            Self::ListComplianceActions => ("compliance_action".to_owned(), "*".to_owned()),
        }
    }

    /// Narrows the tenant's base descriptor to what this operation touches.
    pub(crate) fn narrow(&self, query: QueryDescriptor) -> QueryDescriptor {
        match self {
            Self::ReadRecord {
                resource_type,
                resource_id,
            }
            | Self::WriteRecord {
                resource_type,
                resource_id,
                ..
            }
            | Self::DeleteRecord {
                resource_type,
                resource_id,
            } => query
                .with_resource_type(resource_type.clone())
                .with_resource_id(resource_id.clone()),
            Self::ListRecords {
                resource_type,
                subject_id,
            } => {
                let query = match resource_type {
                    Some(resource_type) => query.with_resource_type(resource_type.clone()),
                    None => query,
                };
                match subject_id {
                    Some(subject_id) => query.with_subject(subject_id.clone()),
                    None => query,
                }
            }
            Self::Export {
                subject_id: Some(subject_id),
            }
            | Self::Erase {
                subject_id: Some(subject_id),
            }
            | Self::Rectify { subject_id, .. } => query.with_subject(subject_id.clone()),
            _ => query,
        }
    }
}

/// Tenant data request.
///
/// Carries no caller tenant: that always comes from the authenticated
/// [`TenantContext`].
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRequest {
    /// Tenant the request addresses; defaults to the caller's tenant.
    pub requested_tenant_id: Option<String>,
    /// Operation to run.
    pub operation: AccessOperation,
    /// Caller network address.
    pub source_ip: Option<String>,
    /// Caller user agent.
    pub user_agent: Option<String>,
}

impl AccessRequest {
    /// Creates a request addressing the caller's own tenant.
    #[must_use]
    pub fn own(operation: AccessOperation) -> Self {
        Self {
            requested_tenant_id: None,
            operation,
            source_ip: None,
            user_agent: None,
        }
    }

    pub(crate) fn audit_scope(&self, caller: &TenantContext) -> AuditScope {
        let (resource_type, resource_id) = self.operation.resource();
        let requested = self
            .requested_tenant_id
            .clone()
            .unwrap_or_else(|| caller.tenant_id().as_str().to_owned());

        AuditScope::new(requested, self.operation.action(), resource_type, resource_id)
            .with_origin(self.source_ip.clone(), self.user_agent.clone())
    }
}

/// Validated result payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessResponse {
    /// JSON payload that passed the response check.
    pub payload: Value,
}

/// Registry administration performed by a platform administrator.
#[derive(Debug, Clone, PartialEq)]
pub enum AdminOperation {
    /// Provisions a tenant.
    Register(NewTenant),
    /// Changes a tenant's status.
    UpdateStatus {
        /// Target tenant, verbatim.
        tenant_id: String,
        /// New status.
        status: TenantStatus,
    },
    /// Raises a tenant's compliance tier.
    UpgradeCompliance {
        /// Target tenant, verbatim.
        tenant_id: String,
        /// New tier.
        level: ComplianceLevel,
    },
    /// Removes a suspended tenant without remaining records.
    Deregister {
        /// Target tenant, verbatim.
        tenant_id: String,
    },
    /// Plans an offline change of the partition count.
    PlanRebalance {
        /// Requested partition count.
        target_partition_count: u32,
    },
    /// Lists tenants.
    ListTenants(TenantListFilter),
    /// Lists access audit entries that addressed one tenant.
    ListAccessEntries {
        /// Target tenant, verbatim.
        tenant_id: String,
        /// Lower time bound.
        since: DateTime<Utc>,
        /// Page size.
        limit: usize,
    },
    /// Lists recorded isolation violations.
    ListViolations {
        /// Violation type filter.
        violation_type: Option<ViolationType>,
        /// Lower time bound.
        since: DateTime<Utc>,
        /// Page size.
        limit: usize,
    },
}

impl AdminOperation {
    pub(crate) fn action(&self) -> AccessAction {
        match self {
            Self::Register(_) => AccessAction::TenantRegister,
            Self::UpdateStatus { .. } | Self::UpgradeCompliance { .. } => {
                AccessAction::TenantUpdate
            }
            Self::Deregister { .. } => AccessAction::TenantDeregister,
            Self::PlanRebalance { .. } => AccessAction::PartitionRebalancePlanned,
            Self::ListTenants(_) | Self::ListAccessEntries { .. } | Self::ListViolations { .. } => {
                AccessAction::List
            }
        }
    }

    pub(crate) fn audit_scope(&self, caller: &TenantContext) -> AuditScope {
        let own_tenant = caller.tenant_id().as_str().to_owned();
        let (requested, resource_type, resource_id) = match self {
            Self::Register(input) => (
                input.tenant_id.as_str().to_owned(),
                "tenant",
                input.tenant_id.as_str().to_owned(),
            ),
            Self::UpdateStatus { tenant_id, .. }
            | Self::UpgradeCompliance { tenant_id, .. }
            | Self::Deregister { tenant_id } => (tenant_id.clone(), "tenant", tenant_id.clone()),
            Self::PlanRebalance {
                target_partition_count,
            } => (
                own_tenant,
                "partition_layout",
                target_partition_count.to_string(),
            ),
            Self::ListTenants(_) => (own_tenant, "tenant", "*".to_owned()),
            Self::ListAccessEntries { tenant_id, .. } => {
                (tenant_id.clone(), "audit_entry", "*".to_owned())
            }
            Self::ListViolations { .. } => (own_tenant, "audit_violation", "*".to_owned()),
        };

        AuditScope::new(requested, self.action(), resource_type, resource_id)
    }
}

/// Administrative request.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminRequest {
    /// Operation to run.
    pub operation: AdminOperation,
    /// Caller network address.
    pub source_ip: Option<String>,
    /// Caller user agent.
    pub user_agent: Option<String>,
}

impl AdminRequest {
    /// Creates a request without origin metadata.
    #[must_use]
    pub fn new(operation: AdminOperation) -> Self {
        Self {
            operation,
            source_ip: None,
            user_agent: None,
        }
    }
}
