//! civicvault maintenance worker runtime.

#![forbid(unsafe_code)]

mod maintenance;
mod worker_config;

use std::sync::Arc;

use chrono::Utc;
use civicvault_application::TenantCacheStore;
use civicvault_core::{AppError, AppResult};
use civicvault_infrastructure::{
    InMemoryTenantCacheStore, PostgresAccessAuditRepository, PostgresComplianceActionRepository,
    PostgresTenantRecordRepository, PostgresTenantRegistryRepository, RedisTenantCacheStore,
    TracingSecurityMetrics,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::maintenance::{MaintenanceJobs, MaintenancePorts};
use crate::worker_config::WorkerConfig;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let cache_store = build_cache_store(config.redis_url.as_deref())?;

    let jobs = MaintenanceJobs::new(
        MaintenancePorts {
            registry: Arc::new(PostgresTenantRegistryRepository::new(pool.clone())),
            records: Arc::new(PostgresTenantRecordRepository::new(pool.clone())),
            audit: Arc::new(PostgresAccessAuditRepository::new(pool.clone())),
            actions: Arc::new(PostgresComplianceActionRepository::new(pool)),
            cache_store,
        },
        &config,
        Arc::new(TracingSecurityMetrics::new()),
    )?;

    info!(
        poll_interval_ms = config.poll_interval_ms,
        compliance_max_attempts = config.compliance_max_attempts,
        audit_retention_days = config.audit_retention_days,
        "civicvault-worker started"
    );

    let mut interval = tokio::time::interval(config.poll_interval());
    loop {
        interval.tick().await;
        jobs.run_cycle(Utc::now()).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_cache_store(redis_url: Option<&str>) -> AppResult<Arc<dyn TenantCacheStore>> {
    match redis_url {
        Some(redis_url) => {
            let client = redis::Client::open(redis_url)
                .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;
            Ok(Arc::new(RedisTenantCacheStore::new(client)))
        }
        None => {
            warn!("REDIS_URL is not set; erasure retries cannot reach the shared cache");
            Ok(Arc::new(InMemoryTenantCacheStore::new()))
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
