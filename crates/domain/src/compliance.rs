//! Data-subject rights operations and their lifecycle.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use civicvault_core::{AppError, AppResult, TenantId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of data-subject operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceActionType {
    /// Data portability export.
    Export,
    /// Right to erasure.
    Erasure,
    /// Right to rectification.
    Rectification,
}

impl ComplianceActionType {
    /// Returns a stable storage value for this action type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Export => "export",
            Self::Erasure => "erasure",
            Self::Rectification => "rectification",
        }
    }
}

impl FromStr for ComplianceActionType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "export" => Ok(Self::Export),
            "erasure" => Ok(Self::Erasure),
            "rectification" => Ok(Self::Rectification),
            _ => Err(AppError::Validation(format!(
                "unknown compliance action type '{value}'"
            ))),
        }
    }
}

/// Lifecycle of a compliance action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceActionStatus {
    /// Accepted, not started.
    Requested,
    /// Running.
    InProgress,
    /// Finished with exact counts.
    Completed,
    /// Finished incompletely; must be retried or escalated.
    Failed,
}

impl ComplianceActionStatus {
    /// Returns a stable storage value for this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl FromStr for ComplianceActionStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "requested" => Ok(Self::Requested),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown compliance action status '{value}'"
            ))),
        }
    }
}

/// Durable record of one export, erasure, or rectification.
///
/// Once `Completed` the record is immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceActionRecord {
    /// Unique action identifier.
    pub action_id: Uuid,
    /// Tenant the action applies to.
    pub tenant_id: TenantId,
    /// Data subject; `None` means the whole tenant.
    pub subject_id: Option<String>,
    /// Operation kind.
    pub action_type: ComplianceActionType,
    /// Current lifecycle state.
    pub status: ComplianceActionStatus,
    /// Storage records touched.
    pub affected_record_count: u64,
    /// Cache keys touched.
    pub affected_cache_key_count: u64,
    /// Time of the last state change.
    pub timestamp: DateTime<Utc>,
    /// Requesting officer.
    pub requested_by: String,
    /// Number of executions started.
    pub attempts: u32,
    /// Last failure reason, kept for escalation.
    pub failure_reason: Option<String>,
    /// Handed over to manual intervention.
    pub escalated: bool,
}

impl ComplianceActionRecord {
    /// Creates a `Requested` action.
    #[must_use]
    pub fn requested(
        tenant_id: TenantId,
        subject_id: Option<String>,
        action_type: ComplianceActionType,
        requested_by: impl Into<String>,
    ) -> Self {
        Self {
            action_id: Uuid::new_v4(),
            tenant_id,
            subject_id,
            action_type,
            status: ComplianceActionStatus::Requested,
            affected_record_count: 0,
            affected_cache_key_count: 0,
            timestamp: Utc::now(),
            requested_by: requested_by.into(),
            attempts: 0,
            failure_reason: None,
            escalated: false,
        }
    }

    /// Moves `Requested` or `Failed` to `InProgress`.
    pub fn start(&mut self) -> AppResult<()> {
        match self.status {
            ComplianceActionStatus::Requested | ComplianceActionStatus::Failed => {
                self.status = ComplianceActionStatus::InProgress;
                self.attempts = self.attempts.saturating_add(1);
                self.timestamp = Utc::now();
                Ok(())
            }
            other => Err(self.invalid_transition(other, ComplianceActionStatus::InProgress)),
        }
    }

    /// Moves `InProgress` to `Completed` with exact counts.
    pub fn complete(&mut self, records: u64, cache_keys: u64) -> AppResult<()> {
        if self.status != ComplianceActionStatus::InProgress {
            return Err(self.invalid_transition(self.status, ComplianceActionStatus::Completed));
        }

        self.status = ComplianceActionStatus::Completed;
        self.affected_record_count = records;
        self.affected_cache_key_count = cache_keys;
        self.failure_reason = None;
        self.timestamp = Utc::now();
        Ok(())
    }

    /// Moves `InProgress` to `Failed`, keeping whatever counts were observed.
    pub fn fail(&mut self, reason: impl Into<String>, records: u64, cache_keys: u64) -> AppResult<()> {
        if self.status != ComplianceActionStatus::InProgress {
            return Err(self.invalid_transition(self.status, ComplianceActionStatus::Failed));
        }

        self.status = ComplianceActionStatus::Failed;
        self.affected_record_count = records;
        self.affected_cache_key_count = cache_keys;
        self.failure_reason = Some(reason.into());
        self.timestamp = Utc::now();
        Ok(())
    }

    /// Flags a failed action for manual intervention.
    pub fn escalate(&mut self) -> AppResult<()> {
        if self.status != ComplianceActionStatus::Failed {
            return Err(AppError::InvalidTransition(format!(
                "only failed compliance actions can be escalated, action '{}' is '{}'",
                self.action_id,
                self.status.as_str()
            )));
        }

        self.escalated = true;
        self.timestamp = Utc::now();
        Ok(())
    }

    fn invalid_transition(
        &self,
        from: ComplianceActionStatus,
        to: ComplianceActionStatus,
    ) -> AppError {
        AppError::InvalidTransition(format!(
            "compliance action '{}' cannot move from '{}' to '{}'",
            self.action_id,
            from.as_str(),
            to.as_str()
        ))
    }
}
