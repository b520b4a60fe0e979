use std::str::FromStr;

use chrono::{DateTime, Utc};
use civicvault_core::{AppError, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of access decision being audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessAction {
    /// Single record read.
    Read,
    /// Record create or replace.
    Write,
    /// Single record delete.
    Delete,
    /// Filtered record listing.
    List,
    /// Cache lookup.
    CacheGet,
    /// Cache store.
    CacheSet,
    /// Tenant-wide cache invalidation.
    CacheInvalidate,
    /// Data-subject export.
    Export,
    /// Data-subject or tenant erasure.
    Erase,
    /// Data-subject rectification.
    Rectify,
    /// Tenant provisioning.
    TenantRegister,
    /// Tenant status or compliance change.
    TenantUpdate,
    /// Tenant removal after erasure.
    TenantDeregister,
    /// Offline partition rebalance planned.
    PartitionRebalancePlanned,
}

impl AccessAction {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "record.read",
            Self::Write => "record.write",
            Self::Delete => "record.delete",
            Self::List => "record.list",
            Self::CacheGet => "cache.get",
            Self::CacheSet => "cache.set",
            Self::CacheInvalidate => "cache.invalidate",
            Self::Export => "compliance.export",
            Self::Erase => "compliance.erase",
            Self::Rectify => "compliance.rectify",
            Self::TenantRegister => "tenant.register",
            Self::TenantUpdate => "tenant.update",
            Self::TenantDeregister => "tenant.deregister",
            Self::PartitionRebalancePlanned => "partition.rebalance.planned",
        }
    }
}

impl FromStr for AccessAction {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "record.read" => Ok(Self::Read),
            "record.write" => Ok(Self::Write),
            "record.delete" => Ok(Self::Delete),
            "record.list" => Ok(Self::List),
            "cache.get" => Ok(Self::CacheGet),
            "cache.set" => Ok(Self::CacheSet),
            "cache.invalidate" => Ok(Self::CacheInvalidate),
            "compliance.export" => Ok(Self::Export),
            "compliance.erase" => Ok(Self::Erase),
            "compliance.rectify" => Ok(Self::Rectify),
            "tenant.register" => Ok(Self::TenantRegister),
            "tenant.update" => Ok(Self::TenantUpdate),
            "tenant.deregister" => Ok(Self::TenantDeregister),
            "partition.rebalance.planned" => Ok(Self::PartitionRebalancePlanned),
            _ => Err(AppError::Validation(format!(
                "unknown access action '{value}'"
            ))),
        }
    }
}

/// Classification of a detected isolation breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    /// Caller addressed another tenant's data.
    CrossTenantAccess,
    /// Caller attempted an operation above its role.
    PrivilegeEscalation,
    /// Foreign tenant data surfaced in a response, cache hit, or path.
    LeakAttempt,
}

impl ViolationType {
    /// Returns a stable storage value for this violation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CrossTenantAccess => "cross_tenant_access",
            Self::PrivilegeEscalation => "privilege_escalation",
            Self::LeakAttempt => "leak_attempt",
        }
    }
}

impl FromStr for ViolationType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "cross_tenant_access" => Ok(Self::CrossTenantAccess),
            "privilege_escalation" => Ok(Self::PrivilegeEscalation),
            "leak_attempt" => Ok(Self::LeakAttempt),
            _ => Err(AppError::Validation(format!(
                "unknown violation type '{value}'"
            ))),
        }
    }
}

/// Immutable record of one access decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessAuditEntry {
    /// Unique audit identifier.
    pub audit_id: Uuid,
    /// Tenant the request addressed, verbatim (may be malformed).
    pub requested_tenant_id: String,
    /// Tenant resolved from the authenticated context.
    pub caller_tenant_id: TenantId,
    /// Caller user.
    pub user_id: String,
    /// Audited action.
    pub action: AccessAction,
    /// Entity type label.
    pub resource_type: String,
    /// Entity identifier.
    pub resource_id: String,
    /// Whether access was granted.
    pub granted: bool,
    /// Violation classification when an isolation breach was detected.
    pub violation_type: Option<ViolationType>,
    /// Decision time.
    pub timestamp: DateTime<Utc>,
    /// Caller network address if known.
    pub source_ip: Option<String>,
    /// Caller user agent if known.
    pub user_agent: Option<String>,
}

impl AccessAuditEntry {
    /// Starts a granted entry stamped now.
    #[must_use]
    pub fn granted(
        caller_tenant_id: TenantId,
        requested_tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        action: AccessAction,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            requested_tenant_id: requested_tenant_id.into(),
            caller_tenant_id,
            user_id: user_id.into(),
            action,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            granted: true,
            violation_type: None,
            timestamp: Utc::now(),
            source_ip: None,
            user_agent: None,
        }
    }

    /// Marks the entry as denied.
    #[must_use]
    pub fn denied(mut self, violation_type: Option<ViolationType>) -> Self {
        self.granted = false;
        self.violation_type = violation_type;
        self
    }

    /// Attaches caller network metadata.
    #[must_use]
    pub fn with_origin(mut self, source_ip: Option<String>, user_agent: Option<String>) -> Self {
        self.source_ip = source_ip;
        self.user_agent = user_agent;
        self
    }
}
