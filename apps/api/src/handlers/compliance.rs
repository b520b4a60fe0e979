use axum::Json;
use axum::extract::{Extension, State};
use civicvault_application::AccessOperation;
use civicvault_core::TenantContext;
use serde_json::Value;

use crate::dto::{EraseRequest, ExportRequest, RectifyRequest};
use crate::error::ApiResult;
use crate::middleware::RequestOrigin;
use crate::state::AppState;

use super::run_access;

pub async fn export_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Json(payload): Json<ExportRequest>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        payload.tenant_id,
        AccessOperation::Export {
            subject_id: payload.subject_id,
        },
    )
    .await
}

pub async fn erase_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Json(payload): Json<EraseRequest>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        payload.tenant_id,
        AccessOperation::Erase {
            subject_id: payload.subject_id,
        },
    )
    .await
}

pub async fn rectify_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Json(payload): Json<RectifyRequest>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        payload.tenant_id,
        AccessOperation::Rectify {
            subject_id: payload.subject_id,
            changes: payload.changes,
        },
    )
    .await
}

pub async fn list_actions_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        None,
        AccessOperation::ListComplianceActions,
    )
    .await
}
