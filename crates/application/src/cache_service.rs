//! Tenant-namespaced cache layer.
//!
//! Callers pass logical keys. The namespaced key `{prefix}:{tenant_id}:{key}`
//! is built here and never leaves this module. Values are wrapped in a
//! [`CachedEnvelope`] so every hit can be validated against the caller.

use std::sync::Arc;

use civicvault_core::{AppError, AppResult, TenantContext, TenantId};
use civicvault_domain::{PartitionAssigner, validate_subject_id};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::isolation_ports::TenantCacheStore;
use crate::isolation_settings::{IsolationSettings, bounded};
use crate::isolation_validator::{AuditScope, IsolationValidator};

/// Default entry lifetime when callers do not specify one.
pub const DEFAULT_CACHE_TTL_SECONDS: u64 = 300;

const MAX_LOGICAL_KEY_LENGTH: usize = 256;

/// Stored form of every cache value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEnvelope {
    /// Tenant that wrote the entry.
    pub tenant_id: String,
    /// Cached payload.
    pub value: Value,
}

/// Application service for tenant-scoped caching.
#[derive(Clone)]
pub struct TenantCacheService {
    store: Arc<dyn TenantCacheStore>,
    assigner: PartitionAssigner,
    validator: IsolationValidator,
    settings: IsolationSettings,
}

impl TenantCacheService {
    /// Creates the cache layer.
    #[must_use]
    pub fn new(
        store: Arc<dyn TenantCacheStore>,
        assigner: PartitionAssigner,
        validator: IsolationValidator,
        settings: IsolationSettings,
    ) -> Self {
        Self {
            store,
            assigner,
            validator,
            settings,
        }
    }

    /// Builds the logical key for data belonging to one subject.
    ///
    /// Subject erasure removes every key built this way.
    pub fn subject_key(subject_id: &str, key: &str) -> AppResult<String> {
        validate_logical_key(key)?;
        Ok(format!("{}{key}", subject_prefix(subject_id)?))
    }

    /// Reads a cached value for the caller's tenant.
    ///
    /// Hits are validated exactly like storage reads.
    pub async fn get(
        &self,
        caller: &TenantContext,
        key: &str,
        scope: &AuditScope,
    ) -> AppResult<Option<Value>> {
        let namespaced = self.namespaced(caller.tenant_id(), key)?;
        let raw = bounded(
            self.settings.read_timeout,
            "cache get",
            self.store.get(&namespaced),
        )
        .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let envelope: CachedEnvelope = serde_json::from_str(&raw).map_err(|error| {
            AppError::Internal(format!("failed to decode cache entry: {error}"))
        })?;
        self.validator
            .validate_cache_entry(&envelope.tenant_id, &envelope.value, caller, scope)
            .await?;

        Ok(Some(envelope.value))
    }

    /// Stores a value under the tenant's namespace.
    pub async fn set(
        &self,
        tenant_id: &TenantId,
        key: &str,
        value: Value,
        ttl_seconds: u64,
    ) -> AppResult<()> {
        if ttl_seconds == 0 {
            return Err(AppError::Validation(
                "cache ttl must be greater than zero".to_owned(),
            ));
        }

        let namespaced = self.namespaced(tenant_id, key)?;
        let envelope = CachedEnvelope {
            tenant_id: tenant_id.as_str().to_owned(),
            value,
        };
        let raw = serde_json::to_string(&envelope).map_err(|error| {
            AppError::Internal(format!("failed to encode cache entry: {error}"))
        })?;

        bounded(
            self.settings.read_timeout,
            "cache set",
            self.store.set(&namespaced, raw, ttl_seconds),
        )
        .await
    }

    /// Removes one key. Returns whether it existed.
    pub async fn invalidate(&self, tenant_id: &TenantId, key: &str) -> AppResult<bool> {
        let namespaced = self.namespaced(tenant_id, key)?;
        bounded(
            self.settings.read_timeout,
            "cache delete",
            self.store.delete(&namespaced),
        )
        .await
    }

    /// Removes every key in the tenant's namespace and returns the count.
    pub async fn delete_all(&self, tenant_id: &TenantId) -> AppResult<u64> {
        let namespace = self.assigner.cache_namespace_for(tenant_id);
        self.delete_prefix(tenant_id, namespace).await
    }

    /// Removes every subject-scoped key of `subject_id` inside the tenant's namespace.
    pub async fn delete_subject(&self, tenant_id: &TenantId, subject_id: &str) -> AppResult<u64> {
        let prefix = format!(
            "{}{}",
            self.assigner.cache_namespace_for(tenant_id),
            subject_prefix(subject_id)?
        );
        self.delete_prefix(tenant_id, prefix).await
    }

    async fn delete_prefix(&self, tenant_id: &TenantId, prefix: String) -> AppResult<u64> {
        let removed = bounded(
            self.settings.bulk_timeout,
            "cache prefix delete",
            self.store.delete_prefix(&prefix),
        )
        .await?;

        info!(tenant_id = %tenant_id, removed, "deleted tenant cache keys");
        Ok(removed)
    }

    fn namespaced(&self, tenant_id: &TenantId, key: &str) -> AppResult<String> {
        validate_logical_key(key)?;
        let namespaced = format!("{}{key}", self.assigner.cache_namespace_for(tenant_id));
        debug!(tenant_id = %tenant_id, "resolved cache key");
        Ok(namespaced)
    }
}

/// Subject ids are hex-encoded so separators and glob characters in them
/// cannot widen the prefix.
fn subject_prefix(subject_id: &str) -> AppResult<String> {
    validate_subject_id(subject_id)?;
    Ok(format!("subject:{}:", hex::encode(subject_id)))
}

fn validate_logical_key(key: &str) -> AppResult<()> {
    if key.is_empty() {
        return Err(AppError::Validation("cache key must not be empty".to_owned()));
    }

    if key.len() > MAX_LOGICAL_KEY_LENGTH {
        return Err(AppError::Validation(format!(
            "cache key must be at most {MAX_LOGICAL_KEY_LENGTH} bytes"
        )));
    }

    if key
        .chars()
        .any(|character| {
            matches!(character, '*' | '?' | '[' | ']' | '\\')
                || character.is_whitespace()
                || character.is_control()
        })
    {
        return Err(AppError::Validation(
            "cache key contains a reserved character".to_owned(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests;
