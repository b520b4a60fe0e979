//! Ports implemented by storage, cache, and audit adapters.

mod audit;
mod cache;
mod records;
mod tenant;

pub use audit::{AccessAuditQuery, AccessAuditRepository, ComplianceActionRepository};
pub use cache::TenantCacheStore;
pub use records::TenantRecordRepository;
pub use tenant::TenantRegistryRepository;
