//! Data-subject rights: export, erasure, rectification.
//!
//! Every operation is persisted as a [`ComplianceActionRecord`] moving through
//! `requested -> in_progress -> completed | failed`. Failed actions stay
//! visible until [`ComplianceService::retry_failed_actions`] recovers or
//! escalates them.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use civicvault_core::{AppError, AppResult, TenantContext, TenantId, TenantRole};
use civicvault_domain::{
    AccessAction, ComplianceActionRecord, ComplianceActionType, TenantRecord, validate_subject_id,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cache_service::TenantCacheService;
use crate::data_access_service::TenantDataAccess;
use crate::isolation_ports::ComplianceActionRepository;
use crate::isolation_settings::{IsolationSettings, bounded};
use crate::isolation_validator::{AuditScope, IsolationValidator};

const RETRY_BATCH_SIZE: usize = 100;

/// Portable copy of a tenant's (or one subject's) records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportBundle {
    /// Compliance action that produced the bundle.
    pub action_id: Uuid,
    /// Exported tenant.
    pub tenant_id: TenantId,
    /// Subject filter, if any.
    pub subject_id: Option<String>,
    /// Assembly time.
    pub generated_at: DateTime<Utc>,
    /// Total records in the bundle.
    pub record_count: u64,
    /// Record payloads grouped by resource type.
    pub records: BTreeMap<String, Vec<Value>>,
}

/// Exact counts of a completed erasure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EraseResult {
    /// Compliance action id.
    pub action_id: Uuid,
    /// Erased tenant.
    pub tenant_id: TenantId,
    /// Subject filter, if any.
    pub subject_id: Option<String>,
    /// Storage records removed.
    pub deleted_record_count: u64,
    /// Cache keys removed.
    pub deleted_cache_key_count: u64,
}

/// Outcome of one retry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceRetryReport {
    /// Failed actions re-executed.
    pub retried: u64,
    /// Re-executed actions that completed.
    pub recovered: u64,
    /// Actions handed to manual intervention.
    pub escalated: u64,
}

/// Application service for data-subject rights operations.
#[derive(Clone)]
pub struct ComplianceService {
    dal: TenantDataAccess,
    cache: TenantCacheService,
    validator: IsolationValidator,
    actions: Arc<dyn ComplianceActionRepository>,
    resource_types: Vec<String>,
    settings: IsolationSettings,
}

impl ComplianceService {
    /// Creates the service. `resource_types` always appear in export bundles.
    #[must_use]
    pub fn new(
        dal: TenantDataAccess,
        cache: TenantCacheService,
        validator: IsolationValidator,
        actions: Arc<dyn ComplianceActionRepository>,
        resource_types: Vec<String>,
        settings: IsolationSettings,
    ) -> Self {
        Self {
            dal,
            cache,
            validator,
            actions,
            resource_types,
            settings,
        }
    }

    /// Assembles every record of `tenant_id`, optionally for one subject.
    pub async fn export_tenant_data(
        &self,
        caller: &TenantContext,
        tenant_id: &TenantId,
        subject_id: Option<&str>,
    ) -> AppResult<ExportBundle> {
        let scope = self
            .authorize(caller, tenant_id, subject_id, AccessAction::Export)
            .await?;
        let mut action = self
            .begin(caller, tenant_id, subject_id, ComplianceActionType::Export)
            .await?;

        let outcome = self.collect_export(caller, tenant_id, subject_id, &scope).await;
        match outcome {
            Ok(records) => {
                let record_count = records.values().map(Vec::len).sum::<usize>() as u64;
                action.complete(record_count, 0)?;
                self.save(&action).await?;
                info!(
                    action_id = %action.action_id,
                    tenant_id = %tenant_id,
                    record_count,
                    "tenant data exported"
                );

                Ok(ExportBundle {
                    action_id: action.action_id,
                    tenant_id: tenant_id.clone(),
                    subject_id: subject_id.map(str::to_owned),
                    generated_at: Utc::now(),
                    record_count,
                    records,
                })
            }
            Err(error) => self.abandon(action, error, 0, 0).await,
        }
    }

    /// Removes every record and cache key of `tenant_id` or of one subject.
    ///
    /// Storage and cache deletion run concurrently. The action completes only
    /// when both succeeded and no matching record remains; otherwise it is
    /// marked failed and `PartialErasureFailure` is returned.
    pub async fn erase_tenant_data(
        &self,
        caller: &TenantContext,
        tenant_id: &TenantId,
        subject_id: Option<&str>,
    ) -> AppResult<EraseResult> {
        self.authorize(caller, tenant_id, subject_id, AccessAction::Erase)
            .await?;
        let mut action = self
            .begin(caller, tenant_id, subject_id, ComplianceActionType::Erasure)
            .await?;

        self.execute_erasure(&mut action).await
    }

    /// Applies `changes` to every record of one subject.
    ///
    /// Cached copies of the subject's data are dropped afterwards.
    pub async fn rectify(
        &self,
        caller: &TenantContext,
        tenant_id: &TenantId,
        subject_id: &str,
        changes: &Map<String, Value>,
    ) -> AppResult<ComplianceActionRecord> {
        if changes.is_empty() {
            return Err(AppError::Validation(
                "rectification requires at least one change".to_owned(),
            ));
        }
        if changes.contains_key("tenant_id") {
            return Err(AppError::TenantMismatch(
                "tenant_id is immutable after creation".to_owned(),
            ));
        }

        self.authorize(caller, tenant_id, Some(subject_id), AccessAction::Rectify)
            .await?;
        let mut action = self
            .begin(
                caller,
                tenant_id,
                Some(subject_id),
                ComplianceActionType::Rectification,
            )
            .await?;

        let outcome = self.apply_rectification(tenant_id, subject_id, changes).await;
        match outcome {
            Ok((records, cache_keys)) => {
                action.complete(records, cache_keys)?;
                self.save(&action).await?;
                info!(
                    action_id = %action.action_id,
                    tenant_id = %tenant_id,
                    records,
                    "subject data rectified"
                );
                Ok(action)
            }
            Err(error) => self.abandon(action, error, 0, 0).await,
        }
    }

    /// Lists compliance actions of the caller's tenant.
    pub async fn actions_for_tenant(
        &self,
        caller: &TenantContext,
    ) -> AppResult<Vec<ComplianceActionRecord>> {
        caller.require_role(TenantRole::ComplianceOfficer)?;
        bounded(
            self.settings.read_timeout,
            "compliance action listing",
            self.actions.list_for_tenant(caller.tenant_id()),
        )
        .await
    }

    /// Re-runs failed erasures and escalates everything that cannot be retried.
    ///
    /// Exports and rectifications are escalated directly, as are actions that
    /// already used `max_attempts`.
    pub async fn retry_failed_actions(&self, max_attempts: u32) -> AppResult<ComplianceRetryReport> {
        let pending = bounded(
            self.settings.read_timeout,
            "compliance failure listing",
            self.actions.list_pending_failures(RETRY_BATCH_SIZE),
        )
        .await?;

        let mut report = ComplianceRetryReport::default();
        for mut action in pending {
            if action.action_type != ComplianceActionType::Erasure || action.attempts >= max_attempts
            {
                action.escalate()?;
                self.save(&action).await?;
                report.escalated += 1;
                warn!(
                    action_id = %action.action_id,
                    tenant_id = %action.tenant_id,
                    action_type = action.action_type.as_str(),
                    attempts = action.attempts,
                    reason = action.failure_reason.as_deref().unwrap_or("unknown"),
                    "compliance action escalated for manual intervention"
                );
                continue;
            }

            action.start()?;
            self.save(&action).await?;
            report.retried += 1;
            if self.execute_erasure(&mut action).await.is_ok() {
                report.recovered += 1;
            }
        }

        Ok(report)
    }

    async fn authorize(
        &self,
        caller: &TenantContext,
        tenant_id: &TenantId,
        subject_id: Option<&str>,
        action: AccessAction,
    ) -> AppResult<AuditScope> {
        caller.require_role(TenantRole::ComplianceOfficer)?;
        if let Some(subject_id) = subject_id {
            validate_subject_id(subject_id)?;
        }

        let scope = AuditScope::new(
            tenant_id.as_str(),
            action,
            "tenant",
            subject_id.unwrap_or("*"),
        );
        let mut query = self.dal.query_for(tenant_id);
        if let Some(subject_id) = subject_id {
            query = query.with_subject(subject_id);
        }
        self.validator.validate_query(&query, caller, &scope).await?;

        Ok(scope)
    }

    async fn begin(
        &self,
        caller: &TenantContext,
        tenant_id: &TenantId,
        subject_id: Option<&str>,
        action_type: ComplianceActionType,
    ) -> AppResult<ComplianceActionRecord> {
        let mut action = ComplianceActionRecord::requested(
            tenant_id.clone(),
            subject_id.map(str::to_owned),
            action_type,
            caller.user_id(),
        );
        self.save(&action).await?;
        action.start()?;
        self.save(&action).await?;
        Ok(action)
    }

    async fn collect_export(
        &self,
        caller: &TenantContext,
        tenant_id: &TenantId,
        subject_id: Option<&str>,
        scope: &AuditScope,
    ) -> AppResult<BTreeMap<String, Vec<Value>>> {
        let records = self.dal.list(tenant_id, None, subject_id).await?;
        self.validator
            .validate_records(&records, caller, scope)
            .await?;

        let mut grouped: BTreeMap<String, Vec<Value>> = self
            .resource_types
            .iter()
            .map(|resource_type| (resource_type.clone(), Vec::new()))
            .collect();
        for record in &records {
            if !self
                .resource_types
                .iter()
                .any(|registered| registered == record.resource_type())
            {
                warn!(
                    tenant_id = %tenant_id,
                    resource_type = record.resource_type(),
                    "exporting record of unregistered resource type"
                );
            }
            grouped
                .entry(record.resource_type().to_owned())
                .or_default()
                .push(record.to_payload());
        }

        let payload = Value::Array(grouped.values().flatten().cloned().collect());
        self.validator
            .validate_response(&payload, caller, scope)
            .await?;

        Ok(grouped)
    }

    async fn execute_erasure(&self, action: &mut ComplianceActionRecord) -> AppResult<EraseResult> {
        let tenant_id = action.tenant_id.clone();
        let subject_id = action.subject_id.clone();

        let storage = async {
            match subject_id.as_deref() {
                Some(subject_id) => self.dal.delete_for_subject(&tenant_id, subject_id).await,
                None => self.dal.bulk_delete(&tenant_id).await,
            }
        };
        let cache = async {
            match subject_id.as_deref() {
                Some(subject_id) => self.cache.delete_subject(&tenant_id, subject_id).await,
                None => self.cache.delete_all(&tenant_id).await,
            }
        };
        let (storage, cache) = tokio::join!(storage, cache);
        let remaining = self.dal.count(&tenant_id, subject_id.as_deref()).await;

        match (storage, cache, remaining) {
            (Ok(records), Ok(cache_keys), Ok(0)) => {
                action.complete(records, cache_keys)?;
                self.save(action).await?;
                info!(
                    action_id = %action.action_id,
                    tenant_id = %tenant_id,
                    subject_id = subject_id.as_deref().unwrap_or("*"),
                    records,
                    cache_keys,
                    "tenant data erased"
                );

                Ok(EraseResult {
                    action_id: action.action_id,
                    tenant_id,
                    subject_id,
                    deleted_record_count: records,
                    deleted_cache_key_count: cache_keys,
                })
            }
            (storage, cache, remaining) => {
                let reason = erasure_failure_reason(&storage, &cache, &remaining);
                action.fail(
                    reason.clone(),
                    storage.unwrap_or(0),
                    cache.unwrap_or(0),
                )?;
                self.save(action).await?;
                error!(
                    action_id = %action.action_id,
                    tenant_id = %tenant_id,
                    subject_id = subject_id.as_deref().unwrap_or("*"),
                    reason = %reason,
                    "tenant erasure incomplete"
                );

                Err(AppError::PartialErasureFailure(format!(
                    "erasure action '{}' did not complete",
                    action.action_id
                )))
            }
        }
    }

    async fn apply_rectification(
        &self,
        tenant_id: &TenantId,
        subject_id: &str,
        changes: &Map<String, Value>,
    ) -> AppResult<(u64, u64)> {
        let records = self.dal.list(tenant_id, None, Some(subject_id)).await?;
        let updated: Vec<TenantRecord> = records
            .into_iter()
            .map(|mut record| {
                record.apply_changes(changes)?;
                Ok(record)
            })
            .collect::<AppResult<_>>()?;

        let record_count = updated.len() as u64;
        for record in updated {
            self.dal.write(tenant_id, record).await?;
        }
        let cache_keys = self.cache.delete_subject(tenant_id, subject_id).await?;

        Ok((record_count, cache_keys))
    }

    async fn abandon<T>(
        &self,
        mut action: ComplianceActionRecord,
        error: AppError,
        records: u64,
        cache_keys: u64,
    ) -> AppResult<T> {
        action.fail(error.to_string(), records, cache_keys)?;
        self.save(&action).await?;
        warn!(
            action_id = %action.action_id,
            tenant_id = %action.tenant_id,
            action_type = action.action_type.as_str(),
            error = %error,
            "compliance action failed"
        );
        Err(error)
    }

    async fn save(&self, action: &ComplianceActionRecord) -> AppResult<()> {
        bounded(
            self.settings.read_timeout,
            "compliance action save",
            self.actions.save(action),
        )
        .await
    }
}

fn erasure_failure_reason(
    storage: &AppResult<u64>,
    cache: &AppResult<u64>,
    remaining: &AppResult<u64>,
) -> String {
    let mut reasons = Vec::new();
    if let Err(error) = storage {
        reasons.push(format!("storage: {error}"));
    }
    if let Err(error) = cache {
        reasons.push(format!("cache: {error}"));
    }
    match remaining {
        Ok(0) => {}
        Ok(count) => reasons.push(format!("{count} records remain")),
        Err(error) => reasons.push(format!("verification: {error}")),
    }
    reasons.join("; ")
}
