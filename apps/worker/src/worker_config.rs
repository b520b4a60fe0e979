use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use civicvault_application::IsolationSettings;
use civicvault_core::{AppError, AppResult};
use civicvault_domain::{DEFAULT_CACHE_NAMESPACE_PREFIX, DEFAULT_PARTITION_COUNT, PartitionAssigner};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub poll_interval_ms: u64,
    pub compliance_max_attempts: u32,
    pub partition_count: u32,
    pub cache_namespace_prefix: String,
    pub audit_retention_days: u32,
    pub isolation: IsolationSettings,
    pub compliance_resource_types: Vec<String>,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let database_url = optional("DATABASE_URL")
            .ok_or_else(|| AppError::Validation("DATABASE_URL is required".to_owned()))?;
        let poll_interval_ms = parsed(&optional, "WORKER_POLL_INTERVAL_MS", 60_000_u64)?;
        let compliance_max_attempts = parsed(&optional, "COMPLIANCE_MAX_ATTEMPTS", 3_u32)?;
        let audit_retention_days = parsed(&optional, "AUDIT_RETENTION_DAYS", 2_555_u32)?;
        let read_timeout_ms = parsed(&optional, "READ_TIMEOUT_MS", 2_000_u64)?;
        let bulk_timeout_ms = parsed(&optional, "BULK_TIMEOUT_MS", 5_000_u64)?;

        for (name, value) in [
            ("WORKER_POLL_INTERVAL_MS", poll_interval_ms),
            ("COMPLIANCE_MAX_ATTEMPTS", u64::from(compliance_max_attempts)),
            ("AUDIT_RETENTION_DAYS", u64::from(audit_retention_days)),
            ("READ_TIMEOUT_MS", read_timeout_ms),
            ("BULK_TIMEOUT_MS", bulk_timeout_ms),
        ] {
            if value == 0 {
                return Err(AppError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        let partition_count = parsed(&optional, "PARTITION_COUNT", DEFAULT_PARTITION_COUNT)?;
        let cache_namespace_prefix = optional("CACHE_NAMESPACE_PREFIX")
            .unwrap_or_else(|| DEFAULT_CACHE_NAMESPACE_PREFIX.to_owned());
        PartitionAssigner::new(partition_count, cache_namespace_prefix.as_str())?;

        Ok(Self {
            database_url,
            redis_url: optional("REDIS_URL"),
            poll_interval_ms,
            compliance_max_attempts,
            partition_count,
            cache_namespace_prefix,
            audit_retention_days,
            isolation: IsolationSettings {
                read_timeout: Duration::from_millis(read_timeout_ms),
                bulk_timeout: Duration::from_millis(bulk_timeout_ms),
            },
            compliance_resource_types: optional("COMPLIANCE_RESOURCE_TYPES")
                .unwrap_or_else(|| "content_item,session,user".to_owned())
                .split(',')
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
                .collect(),
        })
    }

    pub fn partition_assigner(&self) -> AppResult<PartitionAssigner> {
        PartitionAssigner::new(self.partition_count, self.cache_namespace_prefix.as_str())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parsed<T>(optional: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> AppResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    match optional(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|error| AppError::Validation(format!("invalid {name}: {error}"))),
        None => Ok(default),
    }
}
