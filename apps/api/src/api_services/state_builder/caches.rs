use std::sync::Arc;

use civicvault_application::{TenantCacheStore, TenantRateLimiter};
use civicvault_infrastructure::{
    InMemoryTenantCacheStore, InMemoryTenantRateLimiter, RedisTenantCacheStore,
    RedisTenantRateLimiter,
};
use tracing::info;

pub(super) struct CachePorts {
    pub(super) cache_store: Arc<dyn TenantCacheStore>,
    pub(super) rate_limiter: Arc<dyn TenantRateLimiter>,
}

pub(super) fn build_cache_ports(
    redis_client: Option<redis::Client>,
    rate_limit_key_prefix: &str,
) -> CachePorts {
    match redis_client {
        Some(client) => CachePorts {
            cache_store: Arc::new(RedisTenantCacheStore::new(client.clone())),
            rate_limiter: Arc::new(RedisTenantRateLimiter::new(client, rate_limit_key_prefix)),
        },
        None => {
            info!("REDIS_URL is not set; cache and rate limits are process-local");
            CachePorts {
                cache_store: Arc::new(InMemoryTenantCacheStore::new()),
                rate_limiter: Arc::new(InMemoryTenantRateLimiter::new()),
            }
        }
    }
}
