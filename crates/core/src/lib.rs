//! Shared primitives for all Rust crates in civicvault.

#![forbid(unsafe_code)]

/// Authenticated tenant context supplied by the identity gateway.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::{TenantContext, TenantRole};

/// Result type used across civicvault crates.
pub type AppResult<T> = Result<T, AppError>;

/// Maximum length of a tenant identifier.
pub const TENANT_ID_MAX_LENGTH: usize = 50;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Tenant identifier used as the partition key for every persisted resource.
///
/// Lowercase ASCII alphanumerics and underscores only, at most
/// [`TENANT_ID_MAX_LENGTH`] characters. Malformed input is rejected, never
/// coerced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parses and validates a tenant identifier.
    pub fn parse(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();

        if value.is_empty() {
            return Err(AppError::InvalidTenantId(
                "tenant id must not be empty".to_owned(),
            ));
        }

        if value.len() > TENANT_ID_MAX_LENGTH {
            return Err(AppError::InvalidTenantId(format!(
                "tenant id must be at most {TENANT_ID_MAX_LENGTH} characters"
            )));
        }

        if !value
            .bytes()
            .all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'_')
        {
            return Err(AppError::InvalidTenantId(
                "tenant id may only contain lowercase letters, digits and underscores".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for TenantId {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl Display for TenantId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Common application error categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller is not authenticated.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller is authenticated but blocked by policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Caller exceeded its tenant's request budget.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Tenant is not present in the registry.
    #[error("tenant not found: {0}")]
    TenantNotFound(String),

    /// Tenant exists but is suspended.
    #[error("tenant inactive: {0}")]
    TenantInactive(String),

    /// Tenant is between partitions and cannot serve reads or writes.
    #[error("tenant migrating: {0}")]
    TenantMigrating(String),

    /// Write payload tenant disagrees with the call context tenant.
    #[error("tenant mismatch: {0}")]
    TenantMismatch(String),

    /// Cross-tenant exposure detected by the isolation validator.
    #[error("isolation violation: {0}")]
    IsolationViolation(String),

    /// Malformed tenant identifier rejected at the boundary.
    #[error("invalid tenant id: {0}")]
    InvalidTenantId(String),

    /// Tenant identifier is already registered.
    #[error("duplicate tenant: {0}")]
    DuplicateTenant(String),

    /// Illegal tenant or compliance state change.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Backing store did not answer within the operation budget.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Tenant-scoped circuit breaker is open.
    #[error("tenant unavailable: {0}")]
    TenantUnavailable(String),

    /// Compliance deletion did not remove every storage record or cache key.
    #[error("partial erasure failure: {0}")]
    PartialErasureFailure(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether the caller may retry the operation with backoff.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::TenantUnavailable(_) | Self::RateLimited(_)
        )
    }

    /// Returns whether the error is caused by caller input and must not be retried.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::Conflict(_)
                | Self::TenantNotFound(_)
                | Self::TenantInactive(_)
                | Self::TenantMigrating(_)
                | Self::TenantMismatch(_)
                | Self::InvalidTenantId(_)
                | Self::DuplicateTenant(_)
                | Self::InvalidTransition(_)
        )
    }
}
