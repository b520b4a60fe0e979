//! Tenant catalog entity and its administrative state machine.

use std::str::FromStr;

use civicvault_core::{AppError, AppResult, NonEmptyString, TenantId};
use serde::{Deserialize, Serialize};

/// Default retention period for tenant data (about seven years).
pub const DEFAULT_RETENTION_DAYS: u32 = 2555;

/// Regulatory tier a municipality is operated under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceLevel {
    /// Baseline data-protection obligations.
    Basic,
    /// Additional controls such as stricter retention review.
    Enhanced,
    /// Public-sector grade obligations.
    GovernmentGrade,
}

impl ComplianceLevel {
    /// Returns a stable storage value for this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Enhanced => "enhanced",
            Self::GovernmentGrade => "government_grade",
        }
    }
}

impl FromStr for ComplianceLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "basic" => Ok(Self::Basic),
            "enhanced" => Ok(Self::Enhanced),
            "government_grade" => Ok(Self::GovernmentGrade),
            _ => Err(AppError::Validation(format!(
                "unknown compliance level '{value}'"
            ))),
        }
    }
}

/// How strongly tenant storage is separated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    /// Shared tables filtered by tenant partition key.
    Logical,
    /// Dedicated storage for the tenant.
    Physical,
}

impl IsolationLevel {
    /// Returns a stable storage value for this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logical => "logical",
            Self::Physical => "physical",
        }
    }
}

impl FromStr for IsolationLevel {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "logical" => Ok(Self::Logical),
            "physical" => Ok(Self::Physical),
            _ => Err(AppError::Validation(format!(
                "unknown isolation level '{value}'"
            ))),
        }
    }
}

/// Operational status of a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// Serving requests.
    Active,
    /// Administratively blocked.
    Suspended,
    /// Moving between partitions; reads and writes are rejected.
    Migrating,
}

impl TenantStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Migrating => "migrating",
        }
    }

    /// Returns whether `next` is reachable in one administrative step.
    ///
    /// Allowed: `active <-> suspended` and `active -> migrating -> active`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Active, Self::Suspended)
                | (Self::Suspended, Self::Active)
                | (Self::Active, Self::Migrating)
                | (Self::Migrating, Self::Active)
        )
    }
}

impl FromStr for TenantStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "suspended" => Ok(Self::Suspended),
            "migrating" => Ok(Self::Migrating),
            _ => Err(AppError::Validation(format!(
                "unknown tenant status '{value}'"
            ))),
        }
    }
}

/// One municipality sharing the deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    tenant_id: TenantId,
    display_name: NonEmptyString,
    region: NonEmptyString,
    compliance_level: ComplianceLevel,
    isolation_level: IsolationLevel,
    status: TenantStatus,
    retention_days: u32,
    data_protection_contact: NonEmptyString,
}

/// Provisioning input for a new tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTenant {
    /// Requested identifier; validated again by [`TenantId`].
    pub tenant_id: TenantId,
    /// Human-readable municipality name.
    pub display_name: String,
    /// Data-residency jurisdiction.
    pub region: String,
    /// Regulatory tier.
    pub compliance_level: ComplianceLevel,
    /// Storage separation strength.
    pub isolation_level: IsolationLevel,
    /// Retention period override; defaults to [`DEFAULT_RETENTION_DAYS`].
    pub retention_days: Option<u32>,
    /// Data protection officer contact.
    pub data_protection_contact: String,
}

impl Tenant {
    /// Builds an active tenant from provisioning input.
    pub fn provision(input: NewTenant) -> AppResult<Self> {
        let retention_days = input.retention_days.unwrap_or(DEFAULT_RETENTION_DAYS);
        if retention_days == 0 {
            return Err(AppError::Validation(
                "retention_days must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            tenant_id: input.tenant_id,
            display_name: NonEmptyString::new(input.display_name)?,
            region: NonEmptyString::new(input.region)?,
            compliance_level: input.compliance_level,
            isolation_level: input.isolation_level,
            status: TenantStatus::Active,
            retention_days,
            data_protection_contact: NonEmptyString::new(input.data_protection_contact)?,
        })
    }

    /// Rehydrates a tenant from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        tenant_id: TenantId,
        display_name: String,
        region: String,
        compliance_level: ComplianceLevel,
        isolation_level: IsolationLevel,
        status: TenantStatus,
        retention_days: u32,
        data_protection_contact: String,
    ) -> AppResult<Self> {
        Ok(Self {
            tenant_id,
            display_name: NonEmptyString::new(display_name)?,
            region: NonEmptyString::new(region)?,
            compliance_level,
            isolation_level,
            status,
            retention_days,
            data_protection_contact: NonEmptyString::new(data_protection_contact)?,
        })
    }

    /// Returns the immutable tenant identifier.
    #[must_use]
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_str()
    }

    /// Returns the data-residency region.
    #[must_use]
    pub fn region(&self) -> &str {
        self.region.as_str()
    }

    /// Returns the compliance tier.
    #[must_use]
    pub fn compliance_level(&self) -> ComplianceLevel {
        self.compliance_level
    }

    /// Returns the isolation level.
    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> TenantStatus {
        self.status
    }

    /// Returns the retention period in days.
    #[must_use]
    pub fn retention_days(&self) -> u32 {
        self.retention_days
    }

    /// Returns the data protection contact.
    #[must_use]
    pub fn data_protection_contact(&self) -> &str {
        self.data_protection_contact.as_str()
    }

    /// Applies a status change, enforcing the transition table.
    pub fn transition_to(&mut self, next: TenantStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::InvalidTransition(format!(
                "tenant '{}' cannot move from '{}' to '{}'",
                self.tenant_id,
                self.status.as_str(),
                next.as_str()
            )));
        }

        self.status = next;
        Ok(())
    }

    /// Raises the compliance tier. Downgrades are rejected.
    pub fn upgrade_compliance(&mut self, level: ComplianceLevel) -> AppResult<()> {
        if level < self.compliance_level {
            return Err(AppError::InvalidTransition(format!(
                "tenant '{}' cannot downgrade compliance from '{}' to '{}'",
                self.tenant_id,
                self.compliance_level.as_str(),
                level.as_str()
            )));
        }

        self.compliance_level = level;
        Ok(())
    }
}

/// Registry listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantListFilter {
    /// Only tenants in this status.
    pub status: Option<TenantStatus>,
    /// Only tenants in this region.
    pub region: Option<String>,
    /// Only tenants at this compliance tier.
    pub compliance_level: Option<ComplianceLevel>,
}

impl TenantListFilter {
    /// Returns whether `tenant` satisfies every populated criterion.
    #[must_use]
    pub fn matches(&self, tenant: &Tenant) -> bool {
        self.status.is_none_or(|status| tenant.status() == status)
            && self
                .region
                .as_deref()
                .is_none_or(|region| tenant.region() == region)
            && self
                .compliance_level
                .is_none_or(|level| tenant.compliance_level() == level)
    }
}
