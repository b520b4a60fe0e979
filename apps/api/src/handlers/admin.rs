use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use chrono::{Duration, Utc};
use civicvault_application::{AdminOperation, MAX_AUDIT_PAGE};
use civicvault_core::TenantContext;
use serde_json::Value;

use crate::dto::{
    AccessEntriesQuery, RebalancePlanRequest, RegisterTenantRequest, TenantListQuery,
    UpdateTenantStatusRequest, UpgradeComplianceRequest, ViolationsQuery,
};
use crate::error::ApiResult;
use crate::middleware::RequestOrigin;
use crate::state::AppState;

use super::run_admin;

const DEFAULT_AUDIT_WINDOW_HOURS: i64 = 24;

pub async fn register_tenant_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Json(payload): Json<RegisterTenantRequest>,
) -> ApiResult<Json<Value>> {
    run_admin(
        &state,
        &caller,
        origin,
        AdminOperation::Register(payload.into()),
    )
    .await
}

pub async fn list_tenants_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Query(query): Query<TenantListQuery>,
) -> ApiResult<Json<Value>> {
    run_admin(
        &state,
        &caller,
        origin,
        AdminOperation::ListTenants(query.into()),
    )
    .await
}

pub async fn update_tenant_status_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Path(tenant_id): Path<String>,
    Json(payload): Json<UpdateTenantStatusRequest>,
) -> ApiResult<Json<Value>> {
    run_admin(
        &state,
        &caller,
        origin,
        AdminOperation::UpdateStatus {
            tenant_id,
            status: payload.status,
        },
    )
    .await
}

pub async fn upgrade_compliance_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Path(tenant_id): Path<String>,
    Json(payload): Json<UpgradeComplianceRequest>,
) -> ApiResult<Json<Value>> {
    run_admin(
        &state,
        &caller,
        origin,
        AdminOperation::UpgradeCompliance {
            tenant_id,
            level: payload.compliance_level,
        },
    )
    .await
}

pub async fn deregister_tenant_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Path(tenant_id): Path<String>,
) -> ApiResult<Json<Value>> {
    run_admin(
        &state,
        &caller,
        origin,
        AdminOperation::Deregister { tenant_id },
    )
    .await
}

pub async fn plan_rebalance_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Json(payload): Json<RebalancePlanRequest>,
) -> ApiResult<Json<Value>> {
    run_admin(
        &state,
        &caller,
        origin,
        AdminOperation::PlanRebalance {
            target_partition_count: payload.target_partition_count,
        },
    )
    .await
}

pub async fn list_violations_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Query(query): Query<ViolationsQuery>,
) -> ApiResult<Json<Value>> {
    let since = query
        .since
        .unwrap_or_else(|| Utc::now() - Duration::hours(DEFAULT_AUDIT_WINDOW_HOURS));

    run_admin(
        &state,
        &caller,
        origin,
        AdminOperation::ListViolations {
            violation_type: query.violation_type,
            since,
            limit: query.limit.unwrap_or(MAX_AUDIT_PAGE),
        },
    )
    .await
}

pub async fn list_access_entries_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Path(tenant_id): Path<String>,
    Query(query): Query<AccessEntriesQuery>,
) -> ApiResult<Json<Value>> {
    let since = query
        .since
        .unwrap_or_else(|| Utc::now() - Duration::hours(DEFAULT_AUDIT_WINDOW_HOURS));

    run_admin(
        &state,
        &caller,
        origin,
        AdminOperation::ListAccessEntries {
            tenant_id,
            since,
            limit: query.limit.unwrap_or(MAX_AUDIT_PAGE),
        },
    )
    .await
}
