use serde::{Deserialize, Serialize};

/// Health response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub postgres: HealthDependencyStatus,
    pub redis: HealthDependencyStatus,
}

/// One backing store's health check result.
#[derive(Debug, Serialize)]
pub struct HealthDependencyStatus {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl HealthDependencyStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok",
            detail: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            status: "disabled",
            detail: None,
        }
    }

    pub fn error(detail: String) -> Self {
        Self {
            status: "error",
            detail: Some(detail),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

/// Optional target tenant of a tenant-scoped route.
///
/// Absent means the caller's own tenant. Any other value is checked by the
/// isolation validator and denied unless it equals the caller's tenant.
#[derive(Debug, Default, Deserialize)]
pub struct TenantScopeQuery {
    pub tenant_id: Option<String>,
}
