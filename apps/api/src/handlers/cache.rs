use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use civicvault_application::AccessOperation;
use civicvault_core::TenantContext;
use serde_json::Value;

use crate::dto::{PutCacheRequest, TenantScopeQuery};
use crate::error::ApiResult;
use crate::middleware::RequestOrigin;
use crate::state::AppState;

use super::run_access;

pub async fn get_cache_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Path(key): Path<String>,
    Query(scope): Query<TenantScopeQuery>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        scope.tenant_id,
        AccessOperation::CacheGet { key },
    )
    .await
}

pub async fn put_cache_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Path(key): Path<String>,
    Query(scope): Query<TenantScopeQuery>,
    Json(payload): Json<PutCacheRequest>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        scope.tenant_id,
        AccessOperation::CacheSet {
            key,
            subject_id: payload.subject_id,
            value: payload.value,
            ttl_seconds: payload.ttl_seconds,
        },
    )
    .await
}

pub async fn invalidate_cache_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Path(key): Path<String>,
    Query(scope): Query<TenantScopeQuery>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        scope.tenant_id,
        AccessOperation::CacheInvalidate { key },
    )
    .await
}
