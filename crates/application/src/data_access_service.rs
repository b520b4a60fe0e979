//! Tenant-scoped data access layer.
//!
//! Every storage call is built from a [`QueryDescriptor`] derived from the
//! explicit `tenant_id` argument, never from the record payload.

use std::sync::Arc;

use civicvault_core::{AppError, AppResult, TenantId};
use civicvault_domain::{PartitionAssigner, QueryDescriptor, TenantRecord};
use tracing::{error, info};

use crate::isolation_ports::TenantRecordRepository;
use crate::isolation_settings::{IsolationSettings, bounded};

/// Application service for tenant-partitioned storage.
#[derive(Clone)]
pub struct TenantDataAccess {
    repository: Arc<dyn TenantRecordRepository>,
    assigner: PartitionAssigner,
    settings: IsolationSettings,
}

impl TenantDataAccess {
    /// Creates the data access layer.
    #[must_use]
    pub fn new(
        repository: Arc<dyn TenantRecordRepository>,
        assigner: PartitionAssigner,
        settings: IsolationSettings,
    ) -> Self {
        Self {
            repository,
            assigner,
            settings,
        }
    }

    /// Returns the base descriptor for `tenant_id`.
    #[must_use]
    pub fn query_for(&self, tenant_id: &TenantId) -> QueryDescriptor {
        QueryDescriptor::for_tenant(&self.assigner, tenant_id)
    }

    /// Resolves an object-storage path inside the tenant's partition directory.
    pub fn storage_path_for(&self, tenant_id: &TenantId, resource_path: &str) -> AppResult<String> {
        self.assigner.storage_path_for(tenant_id, resource_path)
    }

    /// Reads one record of `tenant_id`.
    ///
    /// Records of other tenants are invisible: the result is `None`.
    pub async fn read(
        &self,
        tenant_id: &TenantId,
        resource_type: &str,
        resource_id: &str,
    ) -> AppResult<Option<TenantRecord>> {
        let query = self
            .query_for(tenant_id)
            .with_resource_type(resource_type)
            .with_resource_id(resource_id);
        let record = bounded(
            self.settings.read_timeout,
            "record read",
            self.repository.find(&query),
        )
        .await?;

        Ok(record.filter(|record| owned_by(record, tenant_id)))
    }

    /// Lists records of `tenant_id`, optionally narrowed by type and subject.
    pub async fn list(
        &self,
        tenant_id: &TenantId,
        resource_type: Option<&str>,
        subject_id: Option<&str>,
    ) -> AppResult<Vec<TenantRecord>> {
        let query = self.narrowed(tenant_id, resource_type, subject_id);
        let records = bounded(
            self.settings.bulk_timeout,
            "record listing",
            self.repository.list(&query),
        )
        .await?;

        Ok(records
            .into_iter()
            .filter(|record| owned_by(record, tenant_id))
            .collect())
    }

    /// Counts records of `tenant_id`, optionally narrowed by subject.
    pub async fn count(&self, tenant_id: &TenantId, subject_id: Option<&str>) -> AppResult<u64> {
        let query = self.narrowed(tenant_id, None, subject_id);
        bounded(
            self.settings.read_timeout,
            "record count",
            self.repository.count(&query),
        )
        .await
    }

    /// Writes a record owned by `tenant_id`.
    ///
    /// Fails with `TenantMismatch` when the record belongs to another tenant.
    pub async fn write(&self, tenant_id: &TenantId, record: TenantRecord) -> AppResult<()> {
        if record.tenant_id() != tenant_id {
            return Err(AppError::TenantMismatch(
                "record tenant differs from the calling tenant".to_owned(),
            ));
        }

        let query = self
            .query_for(tenant_id)
            .with_resource_type(record.resource_type())
            .with_resource_id(record.resource_id());
        bounded(
            self.settings.read_timeout,
            "record write",
            self.repository.upsert(&query, record),
        )
        .await
    }

    /// Deletes one record of `tenant_id`. Returns whether it existed.
    pub async fn delete(
        &self,
        tenant_id: &TenantId,
        resource_type: &str,
        resource_id: &str,
    ) -> AppResult<bool> {
        let query = self
            .query_for(tenant_id)
            .with_resource_type(resource_type)
            .with_resource_id(resource_id);
        let removed = bounded(
            self.settings.read_timeout,
            "record delete",
            self.repository.delete(&query),
        )
        .await?;

        Ok(removed > 0)
    }

    /// Deletes every record of `tenant_id` in one transaction.
    ///
    /// Reserved for the compliance workflow.
    pub async fn bulk_delete(&self, tenant_id: &TenantId) -> AppResult<u64> {
        self.delete_matching(tenant_id, None).await
    }

    /// Deletes every record of one data subject inside `tenant_id`.
    pub async fn delete_for_subject(&self, tenant_id: &TenantId, subject_id: &str) -> AppResult<u64> {
        self.delete_matching(tenant_id, Some(subject_id)).await
    }

    async fn delete_matching(&self, tenant_id: &TenantId, subject_id: Option<&str>) -> AppResult<u64> {
        let query = self.narrowed(tenant_id, None, subject_id);
        let removed = bounded(
            self.settings.bulk_timeout,
            "bulk delete",
            self.repository.delete(&query),
        )
        .await?;

        info!(
            tenant_id = %tenant_id,
            partition = query.partition_index(),
            subject_id = subject_id.unwrap_or("*"),
            removed,
            "bulk deleted tenant records"
        );
        Ok(removed)
    }

    fn narrowed(
        &self,
        tenant_id: &TenantId,
        resource_type: Option<&str>,
        subject_id: Option<&str>,
    ) -> QueryDescriptor {
        let mut query = self.query_for(tenant_id);
        if let Some(resource_type) = resource_type {
            query = query.with_resource_type(resource_type);
        }
        if let Some(subject_id) = subject_id {
            query = query.with_subject(subject_id);
        }
        query
    }
}

fn owned_by(record: &TenantRecord, tenant_id: &TenantId) -> bool {
    if record.tenant_id() == tenant_id {
        return true;
    }

    error!(
        expected_tenant_id = %tenant_id,
        resource_type = record.resource_type(),
        resource_id = record.resource_id(),
        "storage returned a record outside the tenant filter"
    );
    false
}

#[cfg(test)]
mod tests;
