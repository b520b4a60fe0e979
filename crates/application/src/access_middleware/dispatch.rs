use civicvault_core::{AppError, AppResult, TenantContext, TenantId};
use civicvault_domain::TenantRecord;
use serde_json::{Value, json};

use super::{AccessMiddleware, AccessOperation, to_payload};
use crate::cache_service::{DEFAULT_CACHE_TTL_SECONDS, TenantCacheService};
use crate::isolation_validator::AuditScope;

impl AccessMiddleware {
    pub(super) async fn dispatch(
        &self,
        operation: &AccessOperation,
        target: &TenantId,
        caller: &TenantContext,
        scope: &AuditScope,
    ) -> AppResult<Value> {
        match operation {
            AccessOperation::ReadRecord {
                resource_type,
                resource_id,
            } => {
                let record = self
                    .dal
                    .read(target, resource_type, resource_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("record not found".to_owned()))?;
                Ok(record.to_payload())
            }
            AccessOperation::WriteRecord {
                resource_type,
                resource_id,
                subject_id,
                data,
            } => {
                let record = TenantRecord::new(
                    target.clone(),
                    resource_type.as_str(),
                    resource_id.as_str(),
                    subject_id.clone(),
                    data.clone(),
                )?;
                let payload = record.to_payload();
                self.dal.write(target, record).await?;
                Ok(payload)
            }
            AccessOperation::DeleteRecord {
                resource_type,
                resource_id,
            } => {
                let deleted = self.dal.delete(target, resource_type, resource_id).await?;
                Ok(json!({ "tenant_id": target.as_str(), "deleted": deleted }))
            }
            AccessOperation::ListRecords {
                resource_type,
                subject_id,
            } => {
                let records = self
                    .dal
                    .list(target, resource_type.as_deref(), subject_id.as_deref())
                    .await?;
                Ok(json!({
                    "tenant_id": target.as_str(),
                    "records": records.iter().map(TenantRecord::to_payload).collect::<Vec<_>>(),
                }))
            }
            AccessOperation::CacheGet { key } => {
                let value = self.cache.get(caller, key, scope).await?;
                Ok(json!({ "tenant_id": target.as_str(), "key": key, "value": value }))
            }
            AccessOperation::CacheSet {
                key,
                subject_id,
                value,
                ttl_seconds,
            } => {
                let key = match subject_id {
                    Some(subject_id) => TenantCacheService::subject_key(subject_id, key)?,
                    None => key.clone(),
                };
                self.cache
                    .set(
                        target,
                        &key,
                        value.clone(),
                        ttl_seconds.unwrap_or(DEFAULT_CACHE_TTL_SECONDS),
                    )
                    .await?;
                Ok(json!({ "tenant_id": target.as_str(), "key": key, "stored": true }))
            }
            AccessOperation::CacheInvalidate { key } => {
                let deleted = self.cache.invalidate(target, key).await?;
                Ok(json!({ "tenant_id": target.as_str(), "key": key, "deleted": deleted }))
            }
            AccessOperation::ResolveStoragePath { resource_path } => {
                let path = self.dal.storage_path_for(target, resource_path)?;
                self.validator
                    .validate_resource_path(&path, caller, scope)
                    .await?;
                Ok(json!({ "tenant_id": target.as_str(), "path": path }))
            }
            AccessOperation::Export { subject_id } => {
                let bundle = self
                    .compliance
                    .export_tenant_data(caller, target, subject_id.as_deref())
                    .await?;
                to_payload(&bundle)
            }
            AccessOperation::Erase { subject_id } => {
                let result = self
                    .compliance
                    .erase_tenant_data(caller, target, subject_id.as_deref())
                    .await?;
                to_payload(&result)
            }
            AccessOperation::Rectify {
                subject_id,
                changes,
            } => {
                let action = self
                    .compliance
                    .rectify(caller, target, subject_id, changes)
                    .await?;
                to_payload(&action)
            }
            AccessOperation::ListComplianceActions => {
                let actions = self.compliance.actions_for_tenant(caller).await?;
                to_payload(&actions)
            }
        }
    }
}
