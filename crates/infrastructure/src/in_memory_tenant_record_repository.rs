use std::collections::BTreeMap;

use async_trait::async_trait;
use civicvault_application::TenantRecordRepository;
use civicvault_core::AppResult;
use civicvault_domain::{QueryDescriptor, RecordKey, TenantRecord};
use tokio::sync::RwLock;

/// In-memory partitioned record store.
///
/// Rows are keyed by [`RecordKey`], so the partition index and tenant id are
/// part of every lookup exactly as in the PostgreSQL table.
#[derive(Debug, Default)]
pub struct InMemoryTenantRecordRepository {
    records: RwLock<BTreeMap<RecordKey, TenantRecord>>,
}

impl InMemoryTenantRecordRepository {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn matches(query: &QueryDescriptor, key: &RecordKey, record: &TenantRecord) -> bool {
        key.partition_index == query.partition_index()
            && &key.tenant_id == query.tenant_id()
            && query
                .resource_type()
                .is_none_or(|resource_type| key.resource_type == resource_type)
            && query
                .resource_id()
                .is_none_or(|resource_id| key.resource_id == resource_id)
            && query
                .subject_id()
                .is_none_or(|subject_id| record.subject_id() == Some(subject_id))
    }
}

#[async_trait]
impl TenantRecordRepository for InMemoryTenantRecordRepository {
    async fn find(&self, query: &QueryDescriptor) -> AppResult<Option<TenantRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .find(|(key, record)| Self::matches(query, key, record))
            .map(|(_, record)| record.clone()))
    }

    async fn list(&self, query: &QueryDescriptor) -> AppResult<Vec<TenantRecord>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|(key, record)| Self::matches(query, key, record))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn count(&self, query: &QueryDescriptor) -> AppResult<u64> {
        let count = self
            .records
            .read()
            .await
            .iter()
            .filter(|(key, record)| Self::matches(query, key, record))
            .count();
        Ok(count as u64)
    }

    async fn upsert(&self, query: &QueryDescriptor, record: TenantRecord) -> AppResult<()> {
        let key = RecordKey {
            partition_index: query.partition_index(),
            tenant_id: query.tenant_id().clone(),
            resource_type: record.resource_type().to_owned(),
            resource_id: record.resource_id().to_owned(),
        };

        let mut records = self.records.write().await;
        let record = match records.get(&key) {
            Some(existing) => TenantRecord::from_storage(
                existing.tenant_id().clone(),
                record.resource_type().to_owned(),
                record.resource_id().to_owned(),
                record.subject_id().map(str::to_owned),
                record.data().clone(),
                existing.created_at(),
                record.updated_at(),
            )?,
            None => record,
        };

        records.insert(key, record);
        Ok(())
    }

    async fn delete(&self, query: &QueryDescriptor) -> AppResult<u64> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|key, record| !Self::matches(query, key, record));
        Ok((before - records.len()) as u64)
    }
}
