//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod audit;
mod compliance;
mod partition;
mod query;
mod record;
mod tenant;

pub use audit::{AccessAction, AccessAuditEntry, ViolationType};
pub use compliance::{ComplianceActionRecord, ComplianceActionStatus, ComplianceActionType};
pub use partition::{
    DEFAULT_CACHE_NAMESPACE_PREFIX, DEFAULT_PARTITION_COUNT, PartitionAssigner, PartitionMove,
    PartitionRebalancePlan,
};
pub use query::{QueryDescriptor, TenantFilter};
pub use record::{MAX_SUBJECT_ID_LENGTH, RecordKey, TenantRecord, validate_subject_id};
pub use tenant::{
    ComplianceLevel, DEFAULT_RETENTION_DAYS, IsolationLevel, NewTenant, Tenant, TenantListFilter,
    TenantStatus,
};
