use civicvault_core::TenantId;
use serde::{Deserialize, Serialize};

use crate::PartitionAssigner;

/// Mandatory partition-key filter carried by every query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantFilter {
    tenant_id: TenantId,
    partition_index: u32,
}

impl TenantFilter {
    /// Returns the filtered tenant.
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the filtered partition.
    #[must_use]
    pub fn partition_index(&self) -> u32 {
        self.partition_index
    }
}

/// Typed storage query. A descriptor without a tenant filter cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryDescriptor {
    tenant_filter: TenantFilter,
    resource_type: Option<String>,
    resource_id: Option<String>,
    subject_id: Option<String>,
}

impl QueryDescriptor {
    /// Starts a query scoped to `tenant_id` and its assigned partition.
    #[must_use]
    pub fn for_tenant(assigner: &PartitionAssigner, tenant_id: &TenantId) -> Self {
        Self {
            tenant_filter: TenantFilter {
                tenant_id: tenant_id.clone(),
                partition_index: assigner.partition_for(tenant_id),
            },
            resource_type: None,
            resource_id: None,
            subject_id: None,
        }
    }

    /// Narrows to one entity type.
    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Narrows to one natural id.
    #[must_use]
    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Narrows to one data subject.
    #[must_use]
    pub fn with_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Returns the mandatory tenant filter.
    #[must_use]
    pub fn tenant_filter(&self) -> &TenantFilter {
        &self.tenant_filter
    }

    /// Shortcut for the filtered tenant.
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_filter.tenant_id
    }

    /// Shortcut for the filtered partition.
    #[must_use]
    pub fn partition_index(&self) -> u32 {
        self.tenant_filter.partition_index
    }

    /// Returns the entity type filter.
    #[must_use]
    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    /// Returns the natural id filter.
    #[must_use]
    pub fn resource_id(&self) -> Option<&str> {
        self.resource_id.as_deref()
    }

    /// Returns the subject filter.
    #[must_use]
    pub fn subject_id(&self) -> Option<&str> {
        self.subject_id.as_deref()
    }
}
