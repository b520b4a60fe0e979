use std::sync::atomic::Ordering;

use civicvault_core::{AppError, TenantRole};
use civicvault_domain::{AccessAction, ViolationType};
use serde_json::json;

use crate::AuditScope;
use crate::TenantCacheService;
use crate::test_support::{Harness, context, tenant_id};

fn scope(key: &str) -> AuditScope {
    AuditScope::new("malmo_stad", AccessAction::CacheGet, "cache", key)
}

#[tokio::test]
async fn keys_are_namespaced_per_tenant() {
    let harness = Harness::new();
    let malmo = tenant_id("malmo_stad");
    assert!(
        harness
            .cache
            .set(&malmo, "branding", json!({"color": "teal"}), 60)
            .await
            .is_ok()
    );

    let keys: Vec<String> = harness
        .cache_store
        .entries
        .lock()
        .await
        .keys()
        .cloned()
        .collect();
    assert_eq!(keys, vec!["tenant:malmo_stad:branding".to_owned()]);

    let own = harness
        .cache
        .get(
            &context("malmo_stad", "user-1", TenantRole::Member),
            "branding",
            &scope("branding"),
        )
        .await;
    assert_eq!(own, Ok(Some(json!({"color": "teal"}))));

    let other = harness
        .cache
        .get(
            &context("berlin_de", "user-2", TenantRole::Member),
            "branding",
            &scope("branding"),
        )
        .await;
    assert_eq!(other, Ok(None));
}

#[tokio::test]
async fn corrupted_namespacing_is_caught_on_hit() {
    let harness = Harness::new();
    harness.cache_store.entries.lock().await.insert(
        "tenant:malmo_stad:branding".to_owned(),
        json!({"tenant_id": "berlin_de", "value": {"color": "red"}}).to_string(),
    );

    let result = harness
        .cache
        .get(
            &context("malmo_stad", "user-1", TenantRole::Member),
            "branding",
            &scope("branding"),
        )
        .await;

    assert!(matches!(result, Err(AppError::IsolationViolation(_))));
    assert_eq!(harness.metrics.violations.load(Ordering::SeqCst), 1);
    let audit = harness.audit_repository.snapshot().await;
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].violation_type, Some(ViolationType::LeakAttempt));
}

#[tokio::test]
async fn nested_foreign_tenant_ids_in_values_are_caught() {
    let harness = Harness::new();
    let malmo = tenant_id("malmo_stad");
    assert!(
        harness
            .cache
            .set(&malmo, "feed", json!([{"tenant_id": "berlin_de"}]), 60)
            .await
            .is_ok()
    );

    let result = harness
        .cache
        .get(
            &context("malmo_stad", "user-1", TenantRole::Member),
            "feed",
            &scope("feed"),
        )
        .await;

    assert!(matches!(result, Err(AppError::IsolationViolation(_))));
}

#[tokio::test]
async fn delete_all_reports_exact_count_for_one_namespace() {
    let harness = Harness::new();
    let malmo = tenant_id("malmo_stad");
    let berlin = tenant_id("berlin_de");
    for key in ["a", "b", "c"] {
        assert!(harness.cache.set(&malmo, key, json!(1), 60).await.is_ok());
    }
    assert!(harness.cache.set(&berlin, "a", json!(1), 60).await.is_ok());

    assert_eq!(harness.cache.delete_all(&malmo).await, Ok(3));
    assert_eq!(harness.cache_store.entries.lock().await.len(), 1);
}

#[tokio::test]
async fn tenant_prefixes_do_not_overlap() {
    let harness = Harness::new();
    let short = tenant_id("malmo");
    let long = tenant_id("malmo_stad");
    assert!(harness.cache.set(&short, "a", json!(1), 60).await.is_ok());
    assert!(harness.cache.set(&long, "a", json!(1), 60).await.is_ok());

    assert_eq!(harness.cache.delete_all(&short).await, Ok(1));
    assert_eq!(harness.cache_store.entries.lock().await.len(), 1);
}

#[tokio::test]
async fn subject_deletion_keeps_other_subjects() {
    let harness = Harness::new();
    let malmo = tenant_id("malmo_stad");
    let user_7 = TenantCacheService::subject_key("user-7", "profile")
        .unwrap_or_else(|_| unreachable!());
    let user_8 = TenantCacheService::subject_key("user-8", "profile")
        .unwrap_or_else(|_| unreachable!());
    assert!(harness.cache.set(&malmo, &user_7, json!(1), 60).await.is_ok());
    assert!(harness.cache.set(&malmo, &user_8, json!(1), 60).await.is_ok());

    assert_eq!(harness.cache.delete_subject(&malmo, "user-7").await, Ok(1));
    assert!(
        harness
            .cache_store
            .entries
            .lock()
            .await
            .contains_key("tenant:malmo_stad:subject:757365722d38:profile")
    );
}

#[tokio::test]
async fn wildcard_keys_are_rejected() {
    let harness = Harness::new();
    let malmo = tenant_id("malmo_stad");

    for key in ["", "*", "a b", "x?", "subject:[1]"] {
        let result = harness.cache.set(&malmo, key, json!(1), 60).await;
        assert!(matches!(result, Err(AppError::Validation(_))), "{key:?}");
    }
    assert!(TenantCacheService::subject_key("", "k").is_err());
}

#[test]
fn subject_keys_encode_separators() {
    let urn = TenantCacheService::subject_key("urn:user:7", "profile")
        .unwrap_or_else(|_| unreachable!());
    let short = TenantCacheService::subject_key("urn", "profile")
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(urn, "subject:75726e3a757365723a37:profile");
    assert!(!urn.starts_with(short.trim_end_matches("profile")));
}
