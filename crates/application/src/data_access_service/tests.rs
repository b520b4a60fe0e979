use std::sync::atomic::Ordering;

use civicvault_core::AppError;
use civicvault_domain::TenantRecord;
use serde_json::json;

use crate::test_support::{Harness, tenant_id};

#[tokio::test]
async fn p1_no_cross_tenant_read() {
    let harness = Harness::new();
    harness
        .seed(
            "berlin_de",
            "content_item",
            "content-42",
            None,
            json!({"title": "Haushalt 2025"}),
        )
        .await;

    let foreign = harness
        .dal
        .read(&tenant_id("malmo_stad"), "content_item", "content-42")
        .await;
    assert_eq!(foreign, Ok(None));

    let own = harness
        .dal
        .read(&tenant_id("berlin_de"), "content_item", "content-42")
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(own.is_some());
}

#[tokio::test]
async fn p3_write_under_other_tenant_fails_without_partial_write() {
    let harness = Harness::new();
    let berlin_record = TenantRecord::new(
        tenant_id("berlin_de"),
        "content_item",
        "content-1",
        None,
        json!({"title": "Stadtplan"}),
    )
    .unwrap_or_else(|_| unreachable!());

    let result = harness
        .dal
        .write(&tenant_id("malmo_stad"), berlin_record)
        .await;

    assert!(matches!(result, Err(AppError::TenantMismatch(_))));
    assert!(harness.records.records.lock().await.is_empty());
}

#[tokio::test]
async fn storage_leaks_are_dropped_before_returning() {
    let harness = Harness::new();
    harness
        .seed("berlin_de", "content_item", "content-42", None, json!({}))
        .await;
    *harness.records.leak_from.lock().await = Some(tenant_id("berlin_de"));

    let result = harness
        .dal
        .read(&tenant_id("malmo_stad"), "content_item", "content-42")
        .await;

    assert_eq!(result, Ok(None));
}

#[tokio::test]
async fn bulk_delete_is_scoped_to_one_tenant() {
    let harness = Harness::new();
    for id in ["a", "b", "c"] {
        harness
            .seed("malmo_stad", "session", id, None, json!({}))
            .await;
    }
    harness
        .seed("berlin_de", "session", "a", None, json!({}))
        .await;

    let removed = harness.dal.bulk_delete(&tenant_id("malmo_stad")).await;

    assert_eq!(removed, Ok(3));
    assert_eq!(harness.dal.count(&tenant_id("malmo_stad"), None).await, Ok(0));
    assert_eq!(harness.dal.count(&tenant_id("berlin_de"), None).await, Ok(1));
}

#[tokio::test]
async fn subject_delete_leaves_other_subjects() {
    let harness = Harness::new();
    harness
        .seed("malmo_stad", "session", "s-1", Some("user-7"), json!({}))
        .await;
    harness
        .seed("malmo_stad", "session", "s-2", Some("user-8"), json!({}))
        .await;

    let removed = harness
        .dal
        .delete_for_subject(&tenant_id("malmo_stad"), "user-7")
        .await;

    assert_eq!(removed, Ok(1));
    let remaining = harness
        .dal
        .list(&tenant_id("malmo_stad"), None, None)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].subject_id(), Some("user-8"));
}

#[tokio::test(start_paused = true)]
async fn slow_storage_times_out() {
    let harness = Harness::new();
    harness.records.stall_reads.store(true, Ordering::SeqCst);

    let result = harness
        .dal
        .read(&tenant_id("malmo_stad"), "content_item", "content-1")
        .await;

    assert!(matches!(result, Err(AppError::Timeout(_))));
    assert!(result.is_err_and(|error| error.is_retriable()));
}
