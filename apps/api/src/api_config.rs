use std::env;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use civicvault_application::{
    CircuitBreakerSettings, IsolationSettings, MAX_REGISTRY_CACHE_TTL, RateLimitRule,
    RegistryCacheSettings,
};
use civicvault_core::AppError;
use civicvault_domain::{DEFAULT_CACHE_NAMESPACE_PREFIX, DEFAULT_PARTITION_COUNT, PartitionAssigner};
use tracing_subscriber::EnvFilter;

const MIN_GATEWAY_SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub api_host: String,
    pub api_port: u16,
    pub gateway_shared_secret: String,
    pub partition_count: u32,
    pub cache_namespace_prefix: String,
    pub audit_retention_days: u32,
    pub registry_cache: RegistryCacheSettings,
    pub rate_limit: RateLimitRule,
    pub rate_limit_key_prefix: String,
    pub isolation: IsolationSettings,
    pub circuit_breaker: CircuitBreakerSettings,
    pub compliance_resource_types: Vec<String>,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        migrate_only: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let optional = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        // The migrate subcommand never serves traffic.
        let gateway_shared_secret = match optional("GATEWAY_SHARED_SECRET") {
            Some(secret) => secret,
            None if migrate_only => String::new(),
            None => {
                return Err(AppError::Validation(
                    "GATEWAY_SHARED_SECRET is required".to_owned(),
                ));
            }
        };
        if !migrate_only && gateway_shared_secret.len() < MIN_GATEWAY_SECRET_LENGTH {
            return Err(AppError::Validation(format!(
                "GATEWAY_SHARED_SECRET must be at least {MIN_GATEWAY_SECRET_LENGTH} characters"
            )));
        }

        let partition_count = parsed(&optional, "PARTITION_COUNT", DEFAULT_PARTITION_COUNT)?;
        let cache_namespace_prefix = optional("CACHE_NAMESPACE_PREFIX")
            .unwrap_or_else(|| DEFAULT_CACHE_NAMESPACE_PREFIX.to_owned());
        // Fails fast on a zero partition count or malformed prefix.
        PartitionAssigner::new(partition_count, cache_namespace_prefix.as_str())?;

        let registry_cache_ttl_seconds = parsed(
            &optional,
            "REGISTRY_CACHE_TTL_SECONDS",
            MAX_REGISTRY_CACHE_TTL.as_secs(),
        )?;
        if Duration::from_secs(registry_cache_ttl_seconds) > MAX_REGISTRY_CACHE_TTL {
            return Err(AppError::Validation(format!(
                "REGISTRY_CACHE_TTL_SECONDS must be at most {}",
                MAX_REGISTRY_CACHE_TTL.as_secs()
            )));
        }

        let rate_limit_per_tenant_rps = parsed(&optional, "RATE_LIMIT_PER_TENANT_RPS", 50_u32)?;
        if rate_limit_per_tenant_rps == 0 {
            return Err(AppError::Validation(
                "RATE_LIMIT_PER_TENANT_RPS must be greater than zero".to_owned(),
            ));
        }

        let read_timeout_ms = parsed(&optional, "READ_TIMEOUT_MS", 2_000_u64)?;
        let bulk_timeout_ms = parsed(&optional, "BULK_TIMEOUT_MS", 5_000_u64)?;
        if read_timeout_ms == 0 || bulk_timeout_ms == 0 {
            return Err(AppError::Validation(
                "READ_TIMEOUT_MS and BULK_TIMEOUT_MS must be greater than zero".to_owned(),
            ));
        }

        let audit_retention_days = parsed(&optional, "AUDIT_RETENTION_DAYS", 2_555_u32)?;
        if audit_retention_days == 0 {
            return Err(AppError::Validation(
                "AUDIT_RETENTION_DAYS must be greater than zero".to_owned(),
            ));
        }

        let compliance_resource_types = optional("COMPLIANCE_RESOURCE_TYPES")
            .unwrap_or_else(|| "content_item,session,user".to_owned())
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_owned)
            .collect();

        Ok(Self {
            migrate_only,
            database_url: optional("DATABASE_URL"),
            redis_url: optional("REDIS_URL"),
            api_host: optional("API_HOST").unwrap_or_else(|| "127.0.0.1".to_owned()),
            api_port: parsed(&optional, "API_PORT", 3001_u16)?,
            gateway_shared_secret,
            partition_count,
            cache_namespace_prefix,
            audit_retention_days,
            registry_cache: RegistryCacheSettings::new(Duration::from_secs(
                registry_cache_ttl_seconds,
            )),
            rate_limit: RateLimitRule::per_tenant(rate_limit_per_tenant_rps),
            rate_limit_key_prefix: optional("RATE_LIMIT_KEY_PREFIX")
                .unwrap_or_else(|| "civicvault:rate_limit".to_owned()),
            isolation: IsolationSettings {
                read_timeout: Duration::from_millis(read_timeout_ms),
                bulk_timeout: Duration::from_millis(bulk_timeout_ms),
            },
            circuit_breaker: CircuitBreakerSettings {
                failure_threshold: parsed(&optional, "CIRCUIT_BREAKER_THRESHOLD", 5_u32)?,
                open_duration: Duration::from_secs(parsed(
                    &optional,
                    "CIRCUIT_BREAKER_OPEN_SECONDS",
                    30_u64,
                )?),
            },
            compliance_resource_types,
        })
    }

    pub fn partition_assigner(&self) -> Result<PartitionAssigner, AppError> {
        PartitionAssigner::new(self.partition_count, self.cache_namespace_prefix.as_str())
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn parsed<T>(
    optional: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T, AppError>
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
