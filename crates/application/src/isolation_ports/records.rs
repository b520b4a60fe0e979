use async_trait::async_trait;
use civicvault_core::AppResult;
use civicvault_domain::{QueryDescriptor, TenantRecord};

/// Port for tenant-partitioned durable storage.
///
/// Every method takes a [`QueryDescriptor`], so the partition key and tenant
/// filter are always part of the underlying query.
#[async_trait]
pub trait TenantRecordRepository: Send + Sync {
    /// Finds the single record addressed by the descriptor's type and id.
    async fn find(&self, query: &QueryDescriptor) -> AppResult<Option<TenantRecord>>;

    /// Lists records matching the descriptor.
    async fn list(&self, query: &QueryDescriptor) -> AppResult<Vec<TenantRecord>>;

    /// Counts records matching the descriptor.
    async fn count(&self, query: &QueryDescriptor) -> AppResult<u64>;

    /// Inserts or replaces a record inside the descriptor's partition.
    ///
    /// The stored `tenant_id` of an existing row is never rewritten.
    async fn upsert(&self, query: &QueryDescriptor, record: TenantRecord) -> AppResult<()>;

    /// Deletes every record matching the descriptor in one transaction.
    ///
    /// Either all matching rows are removed or none are.
    async fn delete(&self, query: &QueryDescriptor) -> AppResult<u64>;
}
