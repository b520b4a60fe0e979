use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use civicvault_application::TenantCacheStore;
use civicvault_core::AppResult;
use tokio::sync::RwLock;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory key-value cache with per-entry expiry.
#[derive(Debug, Default)]
pub struct InMemoryTenantCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryTenantCacheStore {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantCacheStore for InMemoryTenantCacheStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }

        Ok(None)
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> AppResult<()> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds);
        self.entries
            .write()
            .await
            .insert(key.to_owned(), CacheEntry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .write()
            .await
            .remove(key)
            .is_some_and(|entry| entry.is_live(now)))
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<u64> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let mut removed = 0_u64;
        entries.retain(|key, entry| {
            if !key.starts_with(prefix) {
                return true;
            }
            if entry.is_live(now) {
                removed += 1;
            }
            false
        });

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use civicvault_application::TenantCacheStore;

    use super::InMemoryTenantCacheStore;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_their_ttl() {
        let store = InMemoryTenantCacheStore::new();
        assert!(store.set("tenant:berlin_de:k", "v".to_owned(), 10).await.is_ok());
        assert_eq!(
            store.get("tenant:berlin_de:k").await.ok().flatten().as_deref(),
            Some("v")
        );

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("tenant:berlin_de:k").await.ok(), Some(None));
    }

    #[tokio::test]
    async fn prefix_delete_is_bounded_by_namespace() {
        let store = InMemoryTenantCacheStore::new();
        for key in [
            "tenant:berlin_de:a",
            "tenant:berlin_de:subject:u1:b",
            "tenant:berlin_de_2:a",
        ] {
            assert!(store.set(key, "v".to_owned(), 60).await.is_ok());
        }

        assert_eq!(store.delete_prefix("tenant:berlin_de:").await.ok(), Some(2));
        assert_eq!(
            store.get("tenant:berlin_de_2:a").await.ok().flatten().as_deref(),
            Some("v")
        );
    }
}
