use axum::Json;
use axum::extract::{Extension, Query, State};
use civicvault_application::AccessOperation;
use civicvault_core::TenantContext;
use serde_json::Value;

use crate::dto::StoragePathQuery;
use crate::error::ApiResult;
use crate::middleware::RequestOrigin;
use crate::state::AppState;

use super::run_access;

pub async fn resolve_storage_path_handler(
    State(state): State<AppState>,
    Extension(caller): Extension<TenantContext>,
    Extension(origin): Extension<RequestOrigin>,
    Query(query): Query<StoragePathQuery>,
) -> ApiResult<Json<Value>> {
    run_access(
        &state,
        &caller,
        origin,
        query.tenant_id,
        AccessOperation::ResolveStoragePath {
            resource_path: query.resource_path,
        },
    )
    .await
}
