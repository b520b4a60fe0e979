use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AppError, TenantId};

/// Role claim attached to an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantRole {
    /// Ordinary application traffic.
    Member,
    /// Registry administration (provisioning, status changes).
    Administrator,
    /// Data-subject rights operations (export, erasure, rectification).
    ComplianceOfficer,
}

impl TenantRole {
    /// Returns a stable transport value for this role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Administrator => "administrator",
            Self::ComplianceOfficer => "compliance_officer",
        }
    }
}

impl FromStr for TenantRole {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "member" => Ok(Self::Member),
            "administrator" => Ok(Self::Administrator),
            "compliance_officer" => Ok(Self::ComplianceOfficer),
            _ => Err(AppError::Validation(format!("unknown role value '{value}'"))),
        }
    }
}

/// Verified caller identity supplied by the external identity collaborator.
///
/// The tenant is trusted as authenticated but is still re-validated against
/// the registry on every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantContext {
    tenant_id: TenantId,
    user_id: String,
    role: TenantRole,
}

impl TenantContext {
    /// Creates a context from verified authentication data.
    #[must_use]
    pub fn new(tenant_id: TenantId, user_id: impl Into<String>, role: TenantRole) -> Self {
        Self {
            tenant_id,
            user_id: user_id.into(),
            role,
        }
    }

    /// Returns the caller tenant.
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the stable user identifier from the identity provider.
    #[must_use]
    pub fn user_id(&self) -> &str {
        self.user_id.as_str()
    }

    /// Returns the caller role.
    #[must_use]
    pub fn role(&self) -> TenantRole {
        self.role
    }

    /// Fails with `Forbidden` unless the caller holds `required`.
    pub fn require_role(&self, required: TenantRole) -> Result<(), AppError> {
        if self.role == required {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "role '{}' is required",
            required.as_str()
        )))
    }
}
