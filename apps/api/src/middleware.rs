use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use civicvault_core::{AppError, TenantContext, TenantId, TenantRole};

use crate::error::ApiResult;
use crate::state::AppState;

pub const TENANT_ID_HEADER: &str = "x-civicvault-tenant-id";
pub const USER_ID_HEADER: &str = "x-civicvault-user-id";
pub const ROLE_HEADER: &str = "x-civicvault-role";

/// Network origin of the caller, copied into audit entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOrigin {
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Verifies the identity gateway's bearer secret and installs the caller's
/// [`TenantContext`] and [`RequestOrigin`] as request extensions.
pub async fn require_gateway_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let context = authenticate(request.headers(), &state.gateway_shared_secret)?;
    let origin = request_origin(request.headers());

    request.extensions_mut().insert(context);
    request.extensions_mut().insert(origin);
    Ok(next.run(request).await)
}

pub fn authenticate(headers: &HeaderMap, shared_secret: &str) -> Result<TenantContext, AppError> {
    let presented = header_value(headers, header::AUTHORIZATION.as_str())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::Unauthorized("gateway credentials required".to_owned()))?;

    if !constant_time_eq(presented.as_bytes(), shared_secret.as_bytes()) {
        return Err(AppError::Unauthorized(
            "gateway credentials rejected".to_owned(),
        ));
    }

    let tenant_id = header_value(headers, TENANT_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("{TENANT_ID_HEADER} header is required")))?;
    let user_id = header_value(headers, USER_ID_HEADER)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Unauthorized(format!("{USER_ID_HEADER} header is required")))?;
    let role = header_value(headers, ROLE_HEADER)
        .ok_or_else(|| AppError::Unauthorized(format!("{ROLE_HEADER} header is required")))?
        .parse::<TenantRole>()?;

    Ok(TenantContext::new(TenantId::parse(tenant_id)?, user_id, role))
}

fn request_origin(headers: &HeaderMap) -> RequestOrigin {
    let source_ip = header_value(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned);

    RequestOrigin {
        source_ip,
        user_agent: header_value(headers, header::USER_AGENT.as_str()).map(ToOwned::to_owned),
    }
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }

    left.iter()
        .zip(right)
        .fold(0_u8, |difference, (a, b)| difference | (a ^ b))
        == 0
}
