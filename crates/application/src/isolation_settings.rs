use std::future::Future;
use std::time::Duration;

use civicvault_core::{AppError, AppResult};

/// Per-operation time budgets for storage, cache, and audit calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationSettings {
    /// Budget for single reads, writes, cache calls, and audit writes.
    pub read_timeout: Duration,
    /// Budget for bulk deletion and export scans.
    pub bulk_timeout: Duration,
}

impl Default for IsolationSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(2),
            bulk_timeout: Duration::from_secs(5),
        }
    }
}

/// Runs `operation` within `budget`, mapping expiry to a retriable `Timeout`.
pub(crate) async fn bounded<T, F>(budget: Duration, label: &str, operation: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    match tokio::time::timeout(budget, operation).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(format!(
            "{label} exceeded {}ms",
            budget.as_millis()
        ))),
    }
}
