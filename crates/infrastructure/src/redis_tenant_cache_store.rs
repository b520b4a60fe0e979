//! Redis-backed tenant cache store.

use async_trait::async_trait;
use civicvault_application::TenantCacheStore;
use civicvault_core::{AppError, AppResult};
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;

const SCAN_BATCH: usize = 500;

/// Redis implementation of the cache store port.
///
/// Keys arrive already namespaced as `{prefix}:{tenant_id}:{key}` and are
/// stored verbatim.
#[derive(Clone)]
pub struct RedisTenantCacheStore {
    client: redis::Client,
}

impl RedisTenantCacheStore {
    /// Creates a store with a configured Redis client.
    #[must_use]
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }

    /// Escapes glob metacharacters so `prefix` is matched literally by SCAN.
    fn match_pattern(prefix: &str) -> String {
        let mut pattern = String::with_capacity(prefix.len() + 1);
        for character in prefix.chars() {
            if matches!(character, '*' | '?' | '[' | ']' | '\\') {
                pattern.push('\\');
            }
            pattern.push(character);
        }
        pattern.push('*');
        pattern
    }
}

#[async_trait]
impl TenantCacheStore for RedisTenantCacheStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        let mut connection = self.connection().await?;
        connection
            .get(key)
            .await
            .map_err(|error| AppError::Internal(format!("failed to read cache entry: {error}")))
    }

    async fn set(&self, key: &str, value: String, ttl_seconds: u64) -> AppResult<()> {
        let mut connection = self.connection().await?;
        connection
            .set_ex(key, value, ttl_seconds)
            .await
            .map_err(|error| AppError::Internal(format!("failed to write cache entry: {error}")))
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        let mut connection = self.connection().await?;
        let removed: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete cache entry: {error}")))?;
        Ok(removed > 0)
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<u64> {
        if prefix.is_empty() {
            return Err(AppError::Validation(
                "cache prefix delete requires a non-empty prefix".to_owned(),
            ));
        }

        let mut connection = self.connection().await?;
        let pattern = Self::match_pattern(prefix);
        let mut cursor: u64 = 0;
        let mut removed: u64 = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern.as_str())
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut connection)
                .await
                .map_err(|error| AppError::Internal(format!("failed to scan cache keys: {error}")))?;

            if !keys.is_empty() {
                let batch: u64 = redis::cmd("DEL")
                    .arg(&keys)
                    .query_async(&mut connection)
                    .await
                    .map_err(|error| {
                        AppError::Internal(format!("failed to delete cache keys: {error}"))
                    })?;
                removed += batch;
            }

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        Ok(removed)
    }
}
