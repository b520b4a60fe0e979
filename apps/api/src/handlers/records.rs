use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use civicvault_application::AccessOperation;
use civicvault_core::TenantContext;
use serde_json::Value;

use crate::dto::{ListRecordsQuery, PutRecordRequest, TenantScopeQuery};
use crate::error::ApiResult;
use crate::middleware::RequestOrigin;
use crate::state::AppState;

use super::run_access;

pub async fn get_record_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Path((resource_type, resource_id)): Path<(String, String)>,
    Query(scope): Query<TenantScopeQuery>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        scope.tenant_id,
        AccessOperation::ReadRecord {
            resource_type,
            resource_id,
        },
    )
    .await
}

pub async fn put_record_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Path((resource_type, resource_id)): Path<(String, String)>,
    Query(scope): Query<TenantScopeQuery>,
    Json(payload): Json<PutRecordRequest>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        scope.tenant_id,
        AccessOperation::WriteRecord {
            resource_type,
            resource_id,
            subject_id: payload.subject_id,
            data: payload.data,
        },
    )
    .await
}

pub async fn delete_record_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Path((resource_type, resource_id)): Path<(String, String)>,
    Query(scope): Query<TenantScopeQuery>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        scope.tenant_id,
        AccessOperation::DeleteRecord {
            resource_type,
            resource_id,
        },
    )
    .await
}

pub async fn list_records_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Query(query): Query<ListRecordsQuery>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        query.tenant_id,
        AccessOperation::ListRecords {
            resource_type: query.resource_type,
            subject_id: query.subject_id,
        },
    )
    .await
}
