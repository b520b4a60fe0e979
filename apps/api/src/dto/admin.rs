use chrono::{DateTime, Utc};
use civicvault_core::TenantId;
use civicvault_domain::{
    ComplianceLevel, IsolationLevel, NewTenant, TenantListFilter, TenantStatus, ViolationType,
};
use serde::Deserialize;

/// Tenant provisioning payload.
#[derive(Debug, Deserialize)]
pub struct RegisterTenantRequest {
    pub tenant_id: TenantId,
    pub display_name: String,
    pub region: String,
    pub compliance_level: ComplianceLevel,
    pub isolation_level: IsolationLevel,
    pub retention_days: Option<u32>,
    pub data_protection_contact: String,
}

impl From<RegisterTenantRequest> for NewTenant {
    fn from(value: RegisterTenantRequest) -> Self {
        Self {
            tenant_id: value.tenant_id,
            display_name: value.display_name,
            region: value.region,
            compliance_level: value.compliance_level,
            isolation_level: value.isolation_level,
            retention_days: value.retention_days,
            data_protection_contact: value.data_protection_contact,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTenantStatusRequest {
    pub status: TenantStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeComplianceRequest {
    pub compliance_level: ComplianceLevel,
}

/// Tenant listing filters.
#[derive(Debug, Default, Deserialize)]
pub struct TenantListQuery {
    pub status: Option<TenantStatus>,
    pub region: Option<String>,
    pub compliance_level: Option<ComplianceLevel>,
}

impl From<TenantListQuery> for TenantListFilter {
    fn from(value: TenantListQuery) -> Self {
        Self {
            status: value.status,
            region: value.region,
            compliance_level: value.compliance_level,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RebalancePlanRequest {
    pub target_partition_count: u32,
}

/// Violation listing filters. Defaults to the last 24 hours.
#[derive(Debug, Default, Deserialize)]
pub struct ViolationsQuery {
    pub violation_type: Option<ViolationType>,
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Access trail window for one tenant.
#[derive(Debug, Default, Deserialize)]
pub struct AccessEntriesQuery {
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}
