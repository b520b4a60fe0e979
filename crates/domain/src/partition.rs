//! Deterministic tenant-to-partition and tenant-to-namespace mapping.
//!
//! The mapping is a pure function of the tenant identifier and the configured
//! partition count so any node computes the same answer independently. SHA-256
//! is used instead of `std` hashers because those are not stable across
//! processes or releases.

use civicvault_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Default number of storage partitions.
pub const DEFAULT_PARTITION_COUNT: u32 = 32;

/// Default cache namespace prefix.
pub const DEFAULT_CACHE_NAMESPACE_PREFIX: &str = "tenant";

/// Computes partitions, cache namespaces, and storage paths for tenants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionAssigner {
    partition_count: u32,
    namespace_prefix: String,
}

impl PartitionAssigner {
    /// Creates an assigner for a fixed deployment partition count.
    pub fn new(partition_count: u32, namespace_prefix: impl Into<String>) -> AppResult<Self> {
        if partition_count == 0 {
            return Err(AppError::Validation(
                "partition_count must be greater than zero".to_owned(),
            ));
        }

        let namespace_prefix = namespace_prefix.into();
        if namespace_prefix.is_empty()
            || !namespace_prefix
                .bytes()
                .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-')
        {
            return Err(AppError::Validation(format!(
                "invalid cache namespace prefix '{namespace_prefix}'"
            )));
        }

        Ok(Self {
            partition_count,
            namespace_prefix,
        })
    }

    /// Returns the configured partition count.
    #[must_use]
    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    /// Returns the storage partition index of `tenant_id`.
    #[must_use]
    pub fn partition_for(&self, tenant_id: &TenantId) -> u32 {
        partition_index(tenant_id, self.partition_count)
    }

    /// Parses a raw tenant identifier and returns its partition.
    ///
    /// Malformed identifiers fail with `InvalidTenantId`.
    pub fn partition_for_raw(&self, raw_tenant_id: &str) -> AppResult<u32> {
        let tenant_id = TenantId::parse(raw_tenant_id)?;
        Ok(self.partition_for(&tenant_id))
    }

    /// Returns the cache namespace of `tenant_id`, e.g. `tenant:malmo_stad:`.
    #[must_use]
    pub fn cache_namespace_for(&self, tenant_id: &TenantId) -> String {
        format!("{}:{}:", self.namespace_prefix, tenant_id)
    }

    /// Returns the fully qualified object-storage path for a tenant resource.
    ///
    /// Layout: `tenants/{partition:03}/{tenant_id}/{resource_path}`.
    pub fn storage_path_for(&self, tenant_id: &TenantId, resource_path: &str) -> AppResult<String> {
        let trimmed = resource_path.trim();
        if trimmed.is_empty() {
            return Err(AppError::Validation(
                "resource path must not be empty".to_owned(),
            ));
        }

        if trimmed.starts_with('/')
            || trimmed.contains('\\')
            || trimmed.split('/').any(|segment| segment == ".." || segment == ".")
        {
            return Err(AppError::Validation(format!(
                "resource path '{trimmed}' must be relative and must not traverse"
            )));
        }

        Ok(format!(
            "{}{}/{}",
            self.storage_root_for(tenant_id),
            tenant_id,
            trimmed
        ))
    }

    /// Returns the partition directory prefix, e.g. `tenants/007/`.
    #[must_use]
    pub fn storage_root_for(&self, tenant_id: &TenantId) -> String {
        format!("tenants/{:03}/", self.partition_for(tenant_id))
    }

    /// Plans an offline rebalance to `target_count` partitions.
    ///
    /// Only tenants whose partition changes are listed. Nothing is moved.
    pub fn plan_rebalance<'a>(
        &self,
        target_count: u32,
        tenants: impl IntoIterator<Item = &'a TenantId>,
    ) -> AppResult<PartitionRebalancePlan> {
        if target_count == 0 {
            return Err(AppError::Validation(
                "target partition count must be greater than zero".to_owned(),
            ));
        }

        let mut moves: Vec<PartitionMove> = tenants
            .into_iter()
            .filter_map(|tenant_id| {
                let from_partition = self.partition_for(tenant_id);
                let to_partition = partition_index(tenant_id, target_count);
                (from_partition != to_partition).then(|| PartitionMove {
                    tenant_id: tenant_id.clone(),
                    from_partition,
                    to_partition,
                })
            })
            .collect();
        moves.sort_by(|left, right| left.tenant_id.cmp(&right.tenant_id));

        Ok(PartitionRebalancePlan {
            current_count: self.partition_count,
            target_count,
            moves,
        })
    }
}

impl Default for PartitionAssigner {
    fn default() -> Self {
        Self {
            partition_count: DEFAULT_PARTITION_COUNT,
            namespace_prefix: DEFAULT_CACHE_NAMESPACE_PREFIX.to_owned(),
        }
    }
}

/// One tenant relocation inside a rebalance plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMove {
    /// Tenant being relocated.
    pub tenant_id: TenantId,
    /// Partition under the current count.
    pub from_partition: u32,
    /// Partition under the target count.
    pub to_partition: u32,
}

/// Auditable description of a partition count change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionRebalancePlan {
    /// Partition count currently deployed.
    pub current_count: u32,
    /// Requested partition count.
    pub target_count: u32,
    /// Tenants that change partition.
    pub moves: Vec<PartitionMove>,
}

fn partition_index(tenant_id: &TenantId, partition_count: u32) -> u32 {
    let digest = Sha256::digest(tenant_id.as_str().as_bytes());
    let leading = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    leading % partition_count
}
