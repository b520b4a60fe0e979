use std::sync::atomic::Ordering;

use chrono::{Duration, Utc};
use civicvault_core::{AppError, AppResult, TenantContext, TenantRole};
use civicvault_domain::{AccessAction, TenantStatus, ViolationType};
use serde_json::{Map, json};

use super::{AccessOperation, AccessRequest, AccessResponse, AdminOperation, AdminRequest};
use crate::RateLimitRule;
use crate::test_support::{Harness, context, new_tenant, tenant_id};

fn read(resource_id: &str) -> AccessOperation {
    AccessOperation::ReadRecord {
        resource_type: "content_item".to_owned(),
        resource_id: resource_id.to_owned(),
    }
}

async fn two_tenants() -> Harness {
    let harness = Harness::new();
    harness.register("malmo_stad").await;
    harness.register("berlin_de").await;
    harness
        .seed("malmo_stad", "content_item", "content-1", None, json!({"title": "Park"}))
        .await;
    harness
        .seed("berlin_de", "content_item", "content-42", None, json!({"title": "Tor"}))
        .await;
    harness
}

async fn operator(harness: &Harness) -> TenantContext {
    harness.register("platform").await;
    context("platform", "ops-1", TenantRole::Administrator)
}

async fn audit_count(harness: &Harness) -> usize {
    harness.audit_repository.snapshot().await.len()
}

#[tokio::test]
async fn p6_every_outcome_is_audited_exactly_once() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);
    let unknown = context("oslo_kommune", "user-9", TenantRole::Member);

    let requests: Vec<(AccessRequest, &civicvault_core::TenantContext)> = vec![
        (AccessRequest::own(read("content-1")), &member),
        (AccessRequest::own(read("missing")), &member),
        (
            AccessRequest {
                requested_tenant_id: Some("berlin_de".to_owned()),
                ..AccessRequest::own(read("content-42"))
            },
            &member,
        ),
        (
            AccessRequest {
                requested_tenant_id: Some("Berlin DE".to_owned()),
                ..AccessRequest::own(read("content-42"))
            },
            &member,
        ),
        (
            AccessRequest::own(AccessOperation::Erase { subject_id: None }),
            &member,
        ),
        (AccessRequest::own(read("content-1")), &unknown),
    ];

    for (index, (request, caller)) in requests.into_iter().enumerate() {
        let _ = harness.middleware.handle(request, caller).await;
        assert_eq!(audit_count(&harness).await, index + 1);
    }
}

#[tokio::test]
async fn own_read_is_granted_and_audited() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);

    let response = harness
        .middleware
        .handle(AccessRequest::own(read("content-1")), &member)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(response.payload["tenant_id"], "malmo_stad");
    let audit = harness.audit_repository.snapshot().await;
    assert!(audit[0].granted);
    assert_eq!(audit[0].action, AccessAction::Read);
    assert_eq!(audit[0].resource_id, "content-1");
}

#[tokio::test]
async fn requesting_another_tenant_is_an_isolation_violation() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);

    let result = harness
        .middleware
        .handle(
            AccessRequest {
                requested_tenant_id: Some("berlin_de".to_owned()),
                ..AccessRequest::own(read("content-42"))
            },
            &member,
        )
        .await;

    assert!(matches!(result, Err(AppError::IsolationViolation(_))));
    let audit = harness.audit_repository.snapshot().await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].requested_tenant_id, "berlin_de");
    assert_eq!(
        audit[0].violation_type,
        Some(ViolationType::CrossTenantAccess)
    );
}

#[tokio::test]
async fn leaking_storage_is_caught_post_flight() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);
    *harness.records.leak_from.lock().await = Some(tenant_id("berlin_de"));

    let result = harness
        .middleware
        .handle(AccessRequest::own(read("content-42")), &member)
        .await;

    // The DAL drops the foreign row, so the caller only sees a miss.
    assert!(matches!(result, Err(AppError::NotFound(_))));
    assert_eq!(audit_count(&harness).await, 1);
}

#[tokio::test]
async fn malformed_requested_tenant_is_rejected() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);

    let result = harness
        .middleware
        .handle(
            AccessRequest {
                requested_tenant_id: Some("../berlin".to_owned()),
                ..AccessRequest::own(read("content-42"))
            },
            &member,
        )
        .await;

    assert!(matches!(result, Err(AppError::InvalidTenantId(_))));
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let harness = two_tenants().await;
    let caller = context("oslo_kommune", "user-9", TenantRole::Member);

    let result = harness
        .middleware
        .handle(AccessRequest::own(read("content-1")), &caller)
        .await;

    assert!(matches!(result, Err(AppError::TenantNotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn scenario_b_suspended_tenant_is_inactive() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);
    assert!(
        harness
            .middleware
            .handle(AccessRequest::own(read("content-1")), &member)
            .await
            .is_ok()
    );

    assert!(
        harness
            .registry
            .update_status(&tenant_id("malmo_stad"), TenantStatus::Suspended)
            .await
            .is_ok()
    );

    let result = harness
        .middleware
        .handle(AccessRequest::own(read("content-1")), &member)
        .await;
    assert!(matches!(result, Err(AppError::TenantInactive(_))));
}

#[tokio::test]
async fn p3_write_with_embedded_foreign_tenant_fails() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);

    let result = harness
        .middleware
        .handle(
            AccessRequest::own(AccessOperation::WriteRecord {
                resource_type: "content_item".to_owned(),
                resource_id: "content-9".to_owned(),
                subject_id: None,
                data: json!({"tenant_id": "berlin_de", "title": "x"}),
            }),
            &member,
        )
        .await;

    assert!(matches!(result, Err(AppError::TenantMismatch(_))));
    assert_eq!(
        harness
            .dal
            .read(&tenant_id("malmo_stad"), "content_item", "content-9")
            .await,
        Ok(None)
    );
}

#[tokio::test]
async fn cache_round_trip_through_middleware() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);

    let stored = harness
        .middleware
        .handle(
            AccessRequest::own(AccessOperation::CacheSet {
                key: "profile".to_owned(),
                subject_id: Some("user-7".to_owned()),
                value: json!({"name": "Ana"}),
                ttl_seconds: None,
            }),
            &member,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(stored.payload["key"], "subject:757365722d37:profile");

    let fetched = harness
        .middleware
        .handle(
            AccessRequest::own(AccessOperation::CacheGet {
                key: "subject:757365722d37:profile".to_owned(),
            }),
            &member,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(fetched.payload["value"], json!({"name": "Ana"}));
}

#[tokio::test]
async fn storage_paths_stay_inside_the_tenant_directory() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);

    let resolved = harness
        .middleware
        .handle(
            AccessRequest::own(AccessOperation::ResolveStoragePath {
                resource_path: "branding/logo.png".to_owned(),
            }),
            &member,
        )
        .await
        .unwrap_or_else(|_| unreachable!());
    let path = resolved.payload["path"].as_str().unwrap_or_default().to_owned();
    assert!(path.starts_with("tenants/"));
    assert!(path.ends_with("/malmo_stad/branding/logo.png"));

    let traversal = harness
        .middleware
        .handle(
            AccessRequest::own(AccessOperation::ResolveStoragePath {
                resource_path: "../berlin_de/logo.png".to_owned(),
            }),
            &member,
        )
        .await;
    assert!(matches!(traversal, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn members_cannot_run_compliance_operations() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);

    let result = harness
        .middleware
        .handle(
            AccessRequest::own(AccessOperation::Export { subject_id: None }),
            &member,
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    let audit = harness.audit_repository.snapshot().await;
    assert_eq!(
        audit[0].violation_type,
        Some(ViolationType::PrivilegeEscalation)
    );
}

#[tokio::test]
async fn suspended_tenants_can_still_be_erased() {
    let harness = two_tenants().await;
    let officer = context("malmo_stad", "dpo-1", TenantRole::ComplianceOfficer);
    assert!(
        harness
            .registry
            .update_status(&tenant_id("malmo_stad"), TenantStatus::Suspended)
            .await
            .is_ok()
    );

    let result = harness
        .middleware
        .handle(
            AccessRequest::own(AccessOperation::Erase { subject_id: None }),
            &officer,
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(result.payload["deleted_record_count"], 1);
    assert_eq!(result.payload["tenant_id"], "malmo_stad");
}

#[tokio::test]
async fn rectify_through_middleware() {
    let harness = two_tenants().await;
    harness
        .seed("malmo_stad", "user", "user-7", Some("user-7"), json!({"name": "Ana"}))
        .await;
    let officer = context("malmo_stad", "dpo-1", TenantRole::ComplianceOfficer);
    let mut changes = Map::new();
    changes.insert("name".to_owned(), json!("Ana L."));

    let result = harness
        .middleware
        .handle(
            AccessRequest::own(AccessOperation::Rectify {
                subject_id: "user-7".to_owned(),
                changes,
            }),
            &officer,
        )
        .await;

    assert!(result.is_ok());
    assert_eq!(audit_count(&harness).await, 1);
}

#[tokio::test]
async fn rate_limit_applies_per_tenant() {
    let harness = Harness::with_rate_limit(RateLimitRule::new("tenant", 1, 1));
    harness.register("malmo_stad").await;
    harness.register("berlin_de").await;
    let malmo = context("malmo_stad", "user-1", TenantRole::Member);
    let berlin = context("berlin_de", "user-2", TenantRole::Member);
    let list = || {
        AccessRequest::own(AccessOperation::ListRecords {
            resource_type: None,
            subject_id: None,
        })
    };

    assert!(harness.middleware.handle(list(), &malmo).await.is_ok());
    let limited = harness.middleware.handle(list(), &malmo).await;
    assert!(matches!(limited, Err(AppError::RateLimited(_))));
    assert!(harness.middleware.handle(list(), &berlin).await.is_ok());
    assert_eq!(harness.metrics.rate_limited.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn repeated_timeouts_trip_only_that_tenants_breaker() {
    let harness = two_tenants().await;
    let malmo = context("malmo_stad", "user-1", TenantRole::Member);
    let berlin = context("berlin_de", "user-2", TenantRole::Member);
    harness.records.stall_reads.store(true, Ordering::SeqCst);

    for _ in 0..2 {
        let result = harness
            .middleware
            .handle(AccessRequest::own(read("content-1")), &malmo)
            .await;
        assert!(matches!(result, Err(AppError::Timeout(_))));
    }

    let fast_fail = harness
        .middleware
        .handle(AccessRequest::own(read("content-1")), &malmo)
        .await;
    assert!(matches!(fast_fail, Err(AppError::TenantUnavailable(_))));

    harness.records.stall_reads.store(false, Ordering::SeqCst);
    let other: AppResult<AccessResponse> = harness
        .middleware
        .handle(AccessRequest::own(read("content-42")), &berlin)
        .await;
    assert!(other.is_ok());
}

#[tokio::test]
async fn administration_requires_administrator() {
    let harness = Harness::new();
    harness.register("platform").await;
    let member = context("platform", "ops-1", TenantRole::Member);

    let result = harness
        .middleware
        .administer(
            AdminRequest::new(AdminOperation::Register(new_tenant("malmo_stad"))),
            &member,
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert_eq!(audit_count(&harness).await, 1);
}

#[tokio::test]
async fn deregistration_requires_erasure_first() {
    let harness = two_tenants().await;
    let admin = operator(&harness).await;
    let officer = context("malmo_stad", "dpo-1", TenantRole::ComplianceOfficer);
    let deregister = || {
        AdminRequest::new(AdminOperation::Deregister {
            tenant_id: "malmo_stad".to_owned(),
        })
    };

    assert!(
        harness
            .middleware
            .administer(
                AdminRequest::new(AdminOperation::UpdateStatus {
                    tenant_id: "malmo_stad".to_owned(),
                    status: TenantStatus::Suspended,
                }),
                &admin,
            )
            .await
            .is_ok()
    );

    let blocked = harness.middleware.administer(deregister(), &admin).await;
    assert!(matches!(blocked, Err(AppError::Conflict(_))));

    assert!(
        harness
            .middleware
            .handle(
                AccessRequest::own(AccessOperation::Erase { subject_id: None }),
                &officer,
            )
            .await
            .is_ok()
    );
    assert!(harness.middleware.administer(deregister(), &admin).await.is_ok());
    assert!(matches!(
        harness.registry.get(&tenant_id("malmo_stad")).await,
        Err(AppError::TenantNotFound(_))
    ));
}

#[tokio::test]
async fn rebalance_plans_are_audited() {
    let harness = two_tenants().await;
    let admin = operator(&harness).await;

    let response = harness
        .middleware
        .administer(
            AdminRequest::new(AdminOperation::PlanRebalance {
                target_partition_count: 64,
            }),
            &admin,
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(response.payload["target_count"], 64);
    let audit = harness.audit_repository.snapshot().await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].action, AccessAction::PartitionRebalancePlanned);
    assert_eq!(audit[0].resource_id, "64");
}

#[tokio::test]
async fn administrators_can_list_recorded_violations() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);
    let admin = operator(&harness).await;
    let _ = harness
        .middleware
        .handle(
            AccessRequest {
                requested_tenant_id: Some("berlin_de".to_owned()),
                ..AccessRequest::own(read("content-42"))
            },
            &member,
        )
        .await;

    let response = harness
        .middleware
        .administer(
            AdminRequest::new(AdminOperation::ListViolations {
                violation_type: Some(ViolationType::CrossTenantAccess),
                since: Utc::now() - Duration::hours(1),
                limit: 50,
            }),
            &admin,
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(response.payload.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn administrators_can_read_a_tenants_access_trail() {
    let harness = two_tenants().await;
    let member = context("malmo_stad", "user-1", TenantRole::Member);
    let admin = operator(&harness).await;
    assert!(
        harness
            .middleware
            .handle(AccessRequest::own(read("content-1")), &member)
            .await
            .is_ok()
    );

    let response = harness
        .middleware
        .administer(
            AdminRequest::new(AdminOperation::ListAccessEntries {
                tenant_id: "malmo_stad".to_owned(),
                since: Utc::now() - Duration::hours(1),
                limit: 50,
            }),
            &admin,
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    let entries = response.payload.as_array().cloned().unwrap_or_default();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["action"], "read");
    assert_eq!(entries[0]["caller_tenant_id"], "malmo_stad");
}

#[tokio::test]
async fn suspended_operator_tenant_cannot_administer() {
    let harness = two_tenants().await;
    let admin = operator(&harness).await;
    assert!(
        harness
            .registry
            .update_status(&tenant_id("platform"), TenantStatus::Suspended)
            .await
            .is_ok()
    );

    let result = harness
        .middleware
        .administer(
            AdminRequest::new(AdminOperation::UpdateStatus {
                tenant_id: "berlin_de".to_owned(),
                status: TenantStatus::Suspended,
            }),
            &admin,
        )
        .await;

    assert!(matches!(result, Err(AppError::TenantInactive(_))));
    let berlin = harness
        .registry
        .get(&tenant_id("berlin_de"))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(berlin.status(), TenantStatus::Active);
    assert_eq!(audit_count(&harness).await, 1);
}

#[tokio::test]
async fn unregistered_administrator_cannot_read_other_trails() {
    let harness = two_tenants().await;
    let ghost = context("ghost_tenant", "ops-9", TenantRole::Administrator);

    let result = harness
        .middleware
        .administer(
            AdminRequest::new(AdminOperation::ListAccessEntries {
                tenant_id: "berlin_de".to_owned(),
                since: Utc::now() - Duration::hours(1),
                limit: 50,
            }),
            &ghost,
        )
        .await;

    assert!(matches!(result, Err(AppError::TenantNotFound(_))));
}

#[tokio::test]
async fn empty_registry_accepts_only_the_operators_own_tenant() {
    let harness = Harness::new();
    let admin = context("platform", "ops-1", TenantRole::Administrator);

    let foreign = harness
        .middleware
        .administer(
            AdminRequest::new(AdminOperation::Register(new_tenant("malmo_stad"))),
            &admin,
        )
        .await;
    assert!(matches!(foreign, Err(AppError::TenantNotFound(_))));

    let own = harness
        .middleware
        .administer(
            AdminRequest::new(AdminOperation::Register(new_tenant("platform"))),
            &admin,
        )
        .await;
    assert!(own.is_ok());

    let ghost = context("ghost_tenant", "ops-9", TenantRole::Administrator);
    let late = harness
        .middleware
        .administer(
            AdminRequest::new(AdminOperation::Register(new_tenant("ghost_tenant"))),
            &ghost,
        )
        .await;
    assert!(matches!(late, Err(AppError::TenantNotFound(_))));

    let registered = harness
        .middleware
        .administer(
            AdminRequest::new(AdminOperation::Register(new_tenant("malmo_stad"))),
            &admin,
        )
        .await;
    assert!(registered.is_ok());
}

#[tokio::test]
async fn compliance_action_listing_is_checked_and_audited() {
    let harness = two_tenants().await;
    let officer = context("malmo_stad", "dpo-1", TenantRole::ComplianceOfficer);
    let member = context("malmo_stad", "user-1", TenantRole::Member);
    assert!(
        harness
            .middleware
            .handle(
                AccessRequest::own(AccessOperation::Export { subject_id: None }),
                &officer,
            )
            .await
            .is_ok()
    );

    let listed = harness
        .middleware
        .handle(AccessRequest::own(AccessOperation::ListComplianceActions), &officer)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(listed.payload.as_array().map(Vec::len), Some(1));

    let denied = harness
        .middleware
        .handle(AccessRequest::own(AccessOperation::ListComplianceActions), &member)
        .await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let audit = harness.audit_repository.snapshot().await;
    let listings: Vec<_> = audit
        .iter()
        .filter(|entry| entry.resource_type == "compliance_action")
        .collect();
    assert_eq!(listings.len(), 2);
    assert!(listings.iter().any(|entry| entry.granted));
    assert!(listings.iter().any(|entry| !entry.granted));

    let ghost = context("ghost_tenant", "dpo-9", TenantRole::ComplianceOfficer);
    let unknown = harness
        .middleware
        .handle(AccessRequest::own(AccessOperation::ListComplianceActions), &ghost)
        .await;
    assert!(matches!(unknown, Err(AppError::TenantNotFound(_))));
}
