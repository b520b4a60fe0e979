use async_trait::async_trait;
use civicvault_core::AppResult;

/// Port for the shared key-value cache.
///
/// Keys arriving here are already namespaced by the tenant cache service.
#[async_trait]
pub trait TenantCacheStore: Send + Sync {
    /// Reads a raw value.
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Stores a raw value with an expiry.
    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> AppResult<()>;

    /// Deletes one key. Returns whether it existed.
    async fn delete(&self, key: &str) -> AppResult<bool>;

    /// Deletes every key starting with `prefix` and returns how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> AppResult<u64>;
}
