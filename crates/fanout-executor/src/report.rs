//! Execution reports.
//!
//! Every submitted work item ends in exactly one terminal state, and the
//! report keeps all of them in submission order. The plan-level outcome is
//! derived from the item states with a fixed precedence: cancellation
//! casualties beat failures, failures beat completion.

use serde::{Deserialize, Serialize};

use crate::error::ItemError;

/// Terminal state of a single work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemOutcome {
  /// The body ran to completion.
  Finished,

  /// The body returned an error.
  Failed { error: ItemError },

  /// The body observed the cancellation signal and aborted mid-flight.
  Interrupted,

  /// The signal fired before the item was dispatched.
  Skipped,
}

impl ItemOutcome {
  /// Whether the item's body was started at all.
  pub fn started(&self) -> bool {
    !matches!(self, Self::Skipped)
  }

  /// Whether the body ran to completion.
  pub fn is_finished(&self) -> bool {
    matches!(self, Self::Finished)
  }
}

/// One failed work item, as aggregated into [`PlanOutcome::Faulted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
  pub ordinal: u64,
  pub error: ItemError,
}

/// Terminal outcome of a whole plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOutcome {
  /// Every item ran to completion.
  Completed,

  /// The signal fired before every item could finish. Items that completed
  /// before the signal still count as finished.
  Cancelled { started: usize, finished: usize },

  /// No cancellation casualties, but one or more bodies failed. All errors
  /// are aggregated, not just the first.
  Faulted { failures: Vec<ItemFailure> },
}

impl PlanOutcome {
  fn derive(items: &[ItemReport]) -> Self {
    let cancelled = items
      .iter()
      .any(|i| matches!(i.outcome, ItemOutcome::Interrupted | ItemOutcome::Skipped));

    if cancelled {
      let started = items.iter().filter(|i| i.outcome.started()).count();
      let finished = items.iter().filter(|i| i.outcome.is_finished()).count();
      return Self::Cancelled { started, finished };
    }

    let failures: Vec<ItemFailure> = items
      .iter()
      .filter_map(|i| match &i.outcome {
        ItemOutcome::Failed { error } => Some(ItemFailure {
          ordinal: i.ordinal,
          error: error.clone(),
        }),
        _ => None,
      })
      .collect();

    if !failures.is_empty() {
      return Self::Faulted { failures };
    }

    Self::Completed
  }
}

/// Terminal state of one work item, with its ordinal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemReport {
  pub ordinal: u64,
  pub outcome: ItemOutcome,
}

/// Aggregated result of a driven plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
  /// Unique id stamped on this invocation.
  pub execution_id: String,
  /// Per-item terminal states, in submission order.
  pub items: Vec<ItemReport>,
  /// Plan-level outcome derived from the item states.
  pub outcome: PlanOutcome,
}

impl ExecutionReport {
  pub(crate) fn from_items(execution_id: String, items: Vec<ItemReport>) -> Self {
    let outcome = PlanOutcome::derive(&items);
    Self {
      execution_id,
      items,
      outcome,
    }
  }

  /// Number of items whose body ran to completion.
  pub fn finished_count(&self) -> usize {
    self
      .items
      .iter()
      .filter(|i| i.outcome.is_finished())
      .count()
  }

  /// Number of items whose body was started.
  pub fn started_count(&self) -> usize {
    self.items.iter().filter(|i| i.outcome.started()).count()
  }

  /// Number of items never dispatched because the signal fired first.
  pub fn skipped_count(&self) -> usize {
    self.items.len() - self.started_count()
  }
}
