//! Executor error types.

use serde::{Deserialize, Serialize};

/// Errors surfaced by the executor before or while driving a plan.
///
/// Configuration problems are reported synchronously, before any work item
/// is dispatched. Failures of individual work items are never surfaced here;
/// they are collected into the plan's [`ExecutionReport`](crate::ExecutionReport).
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
  /// The requested concurrency cap is below one.
  #[error("invalid max_parallelism: {requested} (must be at least 1)")]
  InvalidParallelism { requested: usize },

  /// The plan contains no work items.
  #[error("execution plan contains no work items")]
  EmptyPlan,

  /// The spawned dispatch task failed to join.
  #[error("execution task failed: {message}")]
  Runtime { message: String },
}

/// Errors returned by a work item body.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum ItemError {
  /// The body observed the cancellation signal and aborted early.
  #[error("item interrupted by cancellation")]
  Interrupted,

  /// The body failed.
  #[error("{message}")]
  Failed { message: String },
}

impl ItemError {
  /// Create a failure from any displayable error.
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }
}
