mod admin;
mod common;
mod compliance;
mod records;

pub use admin::{
    AccessEntriesQuery, RebalancePlanRequest, RegisterTenantRequest, TenantListQuery,
    UpdateTenantStatusRequest, UpgradeComplianceRequest, ViolationsQuery,
};
pub use common::{HealthDependencyStatus, HealthResponse, TenantScopeQuery};
pub use compliance::{EraseRequest, ExportRequest, RectifyRequest};
pub use records::{ListRecordsQuery, PutCacheRequest, PutRecordRequest, StoragePathQuery};
