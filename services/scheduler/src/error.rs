//! Error taxonomy for the scheduling engine.

use fleetplace_store::StoreError;
use thiserror::Error;

pub type SchedulingResult<T> = Result<T, SchedulingError>;

/// Errors surfaced by the scheduler and controller.
///
/// Only `Backend` is retryable; configuration problems are absorbed into the
/// placement's `Misconfigured` condition so the queue's backoff fires on
/// genuinely transient failures alone.
#[derive(Debug, Error)]
pub enum SchedulingError {
    /// Malformed placement policy: bad selector, bad toleration, unknown
    /// prioritizer, weight out of range.
    #[error("misconfigured placement: {0}")]
    Config(String),

    /// Backend write failed (version conflict or similar); requeue.
    #[error("backend error: {0}")]
    Backend(#[from] StoreError),

    /// Shutdown observed mid-reconcile; skip writes, do not requeue.
    #[error("reconcile cancelled")]
    Cancelled,
}

impl SchedulingError {
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}
