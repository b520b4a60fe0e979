pub mod admin;
pub mod cache;
pub mod compliance;
pub mod health;
pub mod records;
pub mod storage;

use axum::Json;
use civicvault_application::{AccessOperation, AccessRequest, AdminOperation, AdminRequest};
use civicvault_core::TenantContext;
use serde_json::Value;

use crate::error::ApiResult;
use crate::middleware::RequestOrigin;
use crate::state::AppState;

async fn run_access(
    state: &AppState,
    caller: &TenantContext,
    origin: RequestOrigin,
    requested_tenant_id: Option<String>,
    operation: AccessOperation,
) -> ApiResult<Json<Value>> {
    let request = AccessRequest {
        requested_tenant_id,
        operation,
        source_ip: origin.source_ip,
        user_agent: origin.user_agent,
    };

    let response = state.middleware.handle(request, caller).await?;
    Ok(Json(response.payload))
}

async fn run_admin(
    state: &AppState,
    caller: &TenantContext,
    origin: RequestOrigin,
    operation: AdminOperation,
) -> ApiResult<Json<Value>> {
    let request = AdminRequest {
        operation,
        source_ip: origin.source_ip,
        user_agent: origin.user_agent,
    };

    let response = state.middleware.administer(request, caller).await?;
    Ok(Json(response.payload))
}
