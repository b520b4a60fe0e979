//! In-process fakes shared by service tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Mutex;
use uuid::Uuid;

use civicvault_core::{AppError, AppResult, TenantContext, TenantId, TenantRole};
use civicvault_domain::{
    AccessAuditEntry, ComplianceActionRecord, ComplianceActionStatus, ComplianceLevel,
    IsolationLevel, NewTenant, PartitionAssigner, QueryDescriptor, RecordKey, Tenant,
    TenantListFilter, TenantRecord, ViolationType,
};

use crate::isolation_ports::{
    AccessAuditQuery, AccessAuditRepository, ComplianceActionRepository, TenantCacheStore,
    TenantRecordRepository, TenantRegistryRepository,
};
use crate::{
    AccessMiddleware, AuditService, CircuitBreakerSettings, ComplianceService, IsolationSettings,
    IsolationValidator, RateLimitDecision, RateLimitRule, RateLimitService, RegistryCacheSettings,
    SecurityMetrics, TenantCacheService, TenantCircuitBreaker, TenantDataAccess, TenantRateLimiter,
    TenantRegistryService,
};

pub(crate) fn tenant_id(value: &str) -> TenantId {
    TenantId::parse(value).unwrap_or_else(|_| unreachable!())
}

pub(crate) fn context(tenant: &str, user: &str, role: TenantRole) -> TenantContext {
    TenantContext::new(tenant_id(tenant), user, role)
}

pub(crate) fn new_tenant(value: &str) -> NewTenant {
    NewTenant {
        tenant_id: tenant_id(value),
        display_name: format!("{value} municipality"),
        region: "eu".to_owned(),
        compliance_level: ComplianceLevel::Enhanced,
        isolation_level: IsolationLevel::Logical,
        retention_days: None,
        data_protection_contact: format!("dpo@{value}.example"),
    }
}

#[derive(Default)]
pub(crate) struct FakeRegistryRepository {
    pub tenants: Mutex<BTreeMap<TenantId, Tenant>>,
    pub lookups: AtomicU64,
}

#[async_trait]
impl TenantRegistryRepository for FakeRegistryRepository {
    async fn insert(&self, tenant: Tenant) -> AppResult<()> {
        let mut tenants = self.tenants.lock().await;
        if tenants.contains_key(tenant.tenant_id()) {
            return Err(AppError::DuplicateTenant(tenant.tenant_id().to_string()));
        }
        tenants.insert(tenant.tenant_id().clone(), tenant);
        Ok(())
    }

    async fn find(&self, tenant_id: &TenantId) -> AppResult<Option<Tenant>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.tenants.lock().await.get(tenant_id).cloned())
    }

    async fn update(&self, tenant: Tenant) -> AppResult<()> {
        let mut tenants = self.tenants.lock().await;
        let Some(stored) = tenants.get_mut(tenant.tenant_id()) else {
            return Err(AppError::TenantNotFound(tenant.tenant_id().to_string()));
        };
        *stored = tenant;
        Ok(())
    }

    async fn list(&self, filter: &TenantListFilter) -> AppResult<Vec<Tenant>> {
        Ok(self
            .tenants
            .lock()
            .await
            .values()
            .filter(|tenant| filter.matches(tenant))
            .cloned()
            .collect())
    }

    async fn remove(&self, tenant_id: &TenantId) -> AppResult<bool> {
        Ok(self.tenants.lock().await.remove(tenant_id).is_some())
    }
}

/// Record store keyed like the persisted layout. `leak_from` simulates a
/// storage bug that ignores the tenant filter for reads.
#[derive(Default)]
pub(crate) struct FakeRecordRepository {
    pub records: Mutex<BTreeMap<RecordKey, TenantRecord>>,
    pub leak_from: Mutex<Option<TenantId>>,
    pub fail_deletes: AtomicBool,
    pub stall_reads: AtomicBool,
}

impl FakeRecordRepository {
    fn matches(query: &QueryDescriptor, key: &RecordKey, record: &TenantRecord) -> bool {
        key.partition_index == query.partition_index()
            && &key.tenant_id == query.tenant_id()
            && query
                .resource_type()
                .is_none_or(|value| value == key.resource_type)
            && query
                .resource_id()
                .is_none_or(|value| value == key.resource_id)
            && query
                .subject_id()
                .is_none_or(|value| record.subject_id() == Some(value))
    }
}

#[async_trait]
impl TenantRecordRepository for FakeRecordRepository {
    async fn find(&self, query: &QueryDescriptor) -> AppResult<Option<TenantRecord>> {
        if self.stall_reads.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }

        let records = self.records.lock().await;
        if let Some(leaky_tenant) = self.leak_from.lock().await.clone() {
            return Ok(records
                .iter()
                .find(|(key, _)| {
                    key.tenant_id == leaky_tenant
                        && Some(key.resource_id.as_str()) == query.resource_id()
                })
                .map(|(_, record)| record.clone()));
        }

        Ok(records
            .iter()
            .find(|(key, record)| Self::matches(query, key, record))
            .map(|(_, record)| record.clone()))
    }

    async fn list(&self, query: &QueryDescriptor) -> AppResult<Vec<TenantRecord>> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .filter(|(key, record)| Self::matches(query, key, record))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn count(&self, query: &QueryDescriptor) -> AppResult<u64> {
        Ok(self.list(query).await?.len() as u64)
    }

    async fn upsert(&self, query: &QueryDescriptor, record: TenantRecord) -> AppResult<()> {
        let key = RecordKey {
            partition_index: query.partition_index(),
            tenant_id: query.tenant_id().clone(),
            resource_type: record.resource_type().to_owned(),
            resource_id: record.resource_id().to_owned(),
        };
        self.records.lock().await.insert(key, record);
        Ok(())
    }

    async fn delete(&self, query: &QueryDescriptor) -> AppResult<u64> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("storage offline".to_owned()));
        }

        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|key, record| !Self::matches(query, key, record));
        Ok((before - records.len()) as u64)
    }
}

#[derive(Default)]
pub(crate) struct FakeCacheStore {
    pub entries: Mutex<HashMap<String, String>>,
    pub fail_deletes: AtomicBool,
}

#[async_trait]
impl TenantCacheStore for FakeCacheStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String, _ttl_seconds: u64) -> AppResult<()> {
        self.entries.lock().await.insert(key.to_owned(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<bool> {
        Ok(self.entries.lock().await.remove(key).is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> AppResult<u64> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::Internal("cache offline".to_owned()));
        }

        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
pub(crate) struct FakeAuditRepository {
    pub entries: Mutex<Vec<AccessAuditEntry>>,
    pub fail_appends: AtomicBool,
}

impl FakeAuditRepository {
    pub(crate) async fn snapshot(&self) -> Vec<AccessAuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AccessAuditRepository for FakeAuditRepository {
    async fn append(&self, entry: AccessAuditEntry) -> AppResult<()> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(AppError::Internal("audit store offline".to_owned()));
        }
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &TenantId,
        query: AccessAuditQuery,
    ) -> AppResult<Vec<AccessAuditEntry>> {
        let mut entries: Vec<AccessAuditEntry> = self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| {
                entry.requested_tenant_id == tenant_id.as_str() && entry.timestamp >= query.since
            })
            .cloned()
            .collect();
        entries.reverse();
        entries.truncate(query.limit);
        Ok(entries)
    }

    async fn list_violations(
        &self,
        violation_type: Option<ViolationType>,
        query: AccessAuditQuery,
    ) -> AppResult<Vec<AccessAuditEntry>> {
        let mut entries: Vec<AccessAuditEntry> = self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| {
                entry.violation_type.is_some()
                    && violation_type.is_none_or(|wanted| entry.violation_type == Some(wanted))
                    && entry.timestamp >= query.since
            })
            .cloned()
            .collect();
        entries.reverse();
        entries.truncate(query.limit);
        Ok(entries)
    }

    async fn purge_before(&self, tenant_id: &TenantId, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| {
            !(entry.requested_tenant_id == tenant_id.as_str() && entry.timestamp < cutoff)
        });
        Ok((before - entries.len()) as u64)
    }

    async fn purge_unowned_before(
        &self,
        known_tenants: &[TenantId],
        cutoff: DateTime<Utc>,
    ) -> AppResult<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| {
            entry.timestamp >= cutoff
                || known_tenants
                    .iter()
                    .any(|known| known.as_str() == entry.requested_tenant_id)
        });
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
pub(crate) struct FakeComplianceActionRepository {
    pub actions: Mutex<Vec<ComplianceActionRecord>>,
}

#[async_trait]
impl ComplianceActionRepository for FakeComplianceActionRepository {
    async fn save(&self, action: &ComplianceActionRecord) -> AppResult<()> {
        let mut actions = self.actions.lock().await;
        match actions
            .iter_mut()
            .find(|stored| stored.action_id == action.action_id)
        {
            Some(stored) => *stored = action.clone(),
            None => actions.push(action.clone()),
        }
        Ok(())
    }

    async fn find(&self, action_id: Uuid) -> AppResult<Option<ComplianceActionRecord>> {
        Ok(self
            .actions
            .lock()
            .await
            .iter()
            .find(|stored| stored.action_id == action_id)
            .cloned())
    }

    async fn list_pending_failures(&self, limit: usize) -> AppResult<Vec<ComplianceActionRecord>> {
        Ok(self
            .actions
            .lock()
            .await
            .iter()
            .filter(|stored| stored.status == ComplianceActionStatus::Failed && !stored.escalated)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn list_for_tenant(&self, tenant_id: &TenantId) -> AppResult<Vec<ComplianceActionRecord>> {
        Ok(self
            .actions
            .lock()
            .await
            .iter()
            .filter(|stored| &stored.tenant_id == tenant_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub(crate) struct CountingMetrics {
    pub violations: AtomicU64,
    pub audit_failures: AtomicU64,
    pub rate_limited: AtomicU64,
    pub circuits_opened: AtomicU64,
}

impl SecurityMetrics for CountingMetrics {
    fn record_isolation_violation(&self, _violation_type: ViolationType, _check: &str) {
        self.violations.fetch_add(1, Ordering::SeqCst);
    }

    fn record_audit_write_failure(&self) {
        self.audit_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn record_rate_limited(&self, _tenant_id: &TenantId) {
        self.rate_limited.fetch_add(1, Ordering::SeqCst);
    }

    fn record_circuit_opened(&self, _tenant_id: &TenantId) {
        self.circuits_opened.fetch_add(1, Ordering::SeqCst);
    }
}

/// Token bucket stand-in that admits a fixed number of requests per key.
#[derive(Default)]
pub(crate) struct FixedBudgetRateLimiter {
    pub used: Mutex<HashMap<String, u32>>,
}

#[async_trait]
impl TenantRateLimiter for FixedBudgetRateLimiter {
    async fn try_acquire(&self, key: &str, rule: &RateLimitRule) -> AppResult<RateLimitDecision> {
        let mut used = self.used.lock().await;
        let count = used.entry(key.to_owned()).or_insert(0);
        *count += 1;
        let allowed = *count <= rule.burst;
        Ok(RateLimitDecision {
            allowed,
            remaining: rule.burst.saturating_sub(*count),
        })
    }
}

/// Every service wired over the fakes, plus handles to inspect them.
pub(crate) struct Harness {
    pub records: Arc<FakeRecordRepository>,
    pub cache_store: Arc<FakeCacheStore>,
    pub audit_repository: Arc<FakeAuditRepository>,
    pub actions: Arc<FakeComplianceActionRepository>,
    pub metrics: Arc<CountingMetrics>,
    pub registry: TenantRegistryService,
    pub dal: TenantDataAccess,
    pub cache: TenantCacheService,
    pub validator: IsolationValidator,
    pub compliance: ComplianceService,
    pub middleware: AccessMiddleware,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_rate_limit(RateLimitRule::per_tenant(1_000))
    }

    pub(crate) fn with_rate_limit(rule: RateLimitRule) -> Self {
        let assigner = PartitionAssigner::default();
        let settings = IsolationSettings {
            read_timeout: Duration::from_millis(200),
            bulk_timeout: Duration::from_millis(500),
        };

        let registry_repository = Arc::new(FakeRegistryRepository::default());
        let records = Arc::new(FakeRecordRepository::default());
        let cache_store = Arc::new(FakeCacheStore::default());
        let audit_repository = Arc::new(FakeAuditRepository::default());
        let actions = Arc::new(FakeComplianceActionRepository::default());
        let metrics = Arc::new(CountingMetrics::default());

        let registry = TenantRegistryService::new(
            registry_repository,
            assigner.clone(),
            RegistryCacheSettings::default(),
            settings,
        );
        let audit = AuditService::new(audit_repository.clone(), metrics.clone(), settings, 2555);
        let validator = IsolationValidator::new(assigner.clone(), audit.clone(), metrics.clone());
        let dal = TenantDataAccess::new(records.clone(), assigner.clone(), settings);
        let cache = TenantCacheService::new(
            cache_store.clone(),
            assigner.clone(),
            validator.clone(),
            settings,
        );
        let compliance = ComplianceService::new(
            dal.clone(),
            cache.clone(),
            validator.clone(),
            actions.clone(),
            vec!["content_item".to_owned(), "session".to_owned(), "user".to_owned()],
            settings,
        );
        let rate_limit = RateLimitService::new(
            Arc::new(FixedBudgetRateLimiter::default()),
            rule,
            metrics.clone(),
            settings,
        );
        let breaker = TenantCircuitBreaker::new(
            CircuitBreakerSettings {
                failure_threshold: 2,
                open_duration: Duration::from_secs(30),
            },
            metrics.clone(),
        );
        let middleware = AccessMiddleware::new(
            registry.clone(),
            dal.clone(),
            cache.clone(),
            validator.clone(),
            audit,
            compliance.clone(),
            rate_limit,
            breaker,
        );

        Self {
            records,
            cache_store,
            audit_repository,
            actions,
            metrics,
            registry,
            dal,
            cache,
            validator,
            compliance,
            middleware,
        }
    }

    pub(crate) async fn register(&self, tenant: &str) {
        let result = self.registry.register(new_tenant(tenant)).await;
        assert!(result.is_ok());
    }

    pub(crate) async fn seed(
        &self,
        tenant: &str,
        resource_type: &str,
        resource_id: &str,
        subject: Option<&str>,
        data: Value,
    ) {
        let owner = tenant_id(tenant);
        let record = TenantRecord::new(
            owner.clone(),
            resource_type,
            resource_id,
            subject.map(str::to_owned),
            data,
        )
        .unwrap_or_else(|_| unreachable!());
        assert!(self.dal.write(&owner, record).await.is_ok());
    }
}
