//! Execution events and notifiers for observability.
//!
//! Events are emitted while a plan is driven to allow consumers to observe
//! progress, stream to UIs, collect metrics, etc. The worker id carried by
//! item events identifies the slot the body ran on.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted while a plan is driven.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// Dispatch of a plan has started.
  PlanStarted {
    execution_id: String,
    total_items: usize,
    max_parallelism: usize,
  },

  /// A work item body has started on a worker slot.
  ItemStarted {
    execution_id: String,
    ordinal: u64,
    worker_id: usize,
  },

  /// A work item body ran to completion.
  ItemFinished {
    execution_id: String,
    ordinal: u64,
    worker_id: usize,
  },

  /// A work item body failed.
  ItemFailed {
    execution_id: String,
    ordinal: u64,
    worker_id: usize,
    error: String,
  },

  /// A work item body observed the cancellation signal and aborted.
  ItemInterrupted {
    execution_id: String,
    ordinal: u64,
    worker_id: usize,
  },

  /// Every item has reached a terminal state.
  PlanFinished {
    execution_id: String,
    finished: usize,
    skipped: usize,
  },
}

/// Trait for receiving execution events.
///
/// The executor calls `notify` for each event - implementations decide what
/// to do with them (broadcast, log, ignore, etc.). Implementations must not
/// block: `notify` is called from the dispatch path.
pub trait ExecutionNotifier: Send + Sync {
  /// Called when an execution event occurs.
  fn notify(&self, event: ExecutionEvent);
}

/// A no-op notifier that discards all events.
///
/// Useful for tests or when event observation is not needed.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {
    // Intentionally empty
  }
}

/// A notifier that sends events to an unbounded channel.
///
/// Use this when you need to consume events asynchronously (e.g., stream to
/// a UI or persist them).
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // NOTE: unbounded so a slow consumer never blocks dispatch. Event volume
  // is low (a handful per work item), so memory growth is unlikely in
  // practice.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  /// Create a new channel notifier.
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Ignore send errors - receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
