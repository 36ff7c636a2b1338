//! Bounded executor implementation.
//!
//! The dispatch loop walks the plan's items in submission order, gated by a
//! semaphore of K permits. Once the cancellation signal fires, no new item
//! is dispatched; bodies already in flight keep running until they finish or
//! observe the signal themselves.

use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::error::{ExecutorError, ItemError};
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::execution::Execution;
use crate::plan::{ExecutionPlan, WorkContext, WorkItem};
use crate::report::{ExecutionReport, ItemOutcome, ItemReport, PlanOutcome};

/// Runs execution plans with a hard cap on concurrently active work items.
///
/// Generic over `N: ExecutionNotifier` to allow different reporting sinks.
/// Use `Executor::new()` for an executor that only emits tracing logs, or
/// `Executor::with_notifier()` to observe execution events.
pub struct Executor<N: ExecutionNotifier = NoopNotifier> {
  notifier: Arc<N>,
}

impl Executor<NoopNotifier> {
  /// Create an executor with no-op event notifications.
  pub fn new() -> Self {
    Self::with_notifier(NoopNotifier)
  }
}

impl Default for Executor<NoopNotifier> {
  fn default() -> Self {
    Self::new()
  }
}

impl<N: ExecutionNotifier + 'static> Executor<N> {
  /// Create an executor with a custom event notifier.
  pub fn with_notifier(notifier: N) -> Self {
    Self {
      notifier: Arc::new(notifier),
    }
  }

  /// Run the plan, suspending the caller until every item has reached a
  /// terminal state.
  #[instrument(
    name = "plan_run",
    skip(self, plan),
    fields(
      total_items = plan.len(),
      max_parallelism = plan.options.max_parallelism,
    )
  )]
  pub async fn run(&self, plan: ExecutionPlan) -> Result<ExecutionReport, ExecutorError> {
    validate(&plan)?;
    Ok(drive(plan, Arc::clone(&self.notifier)).await)
  }

  /// Start the plan without suspending the caller.
  ///
  /// Configuration is validated synchronously, before any dispatch. The
  /// returned [`Execution`] is already running; await it with
  /// [`Execution::wait`] to obtain the same report [`run`](Executor::run)
  /// would produce.
  pub fn spawn(&self, plan: ExecutionPlan) -> Result<Execution, ExecutorError> {
    validate(&plan)?;
    let cancel = plan.options.cancel.clone();
    let handle = tokio::spawn(drive(plan, Arc::clone(&self.notifier)));
    Ok(Execution::new(handle, cancel))
  }
}

/// Reject plans that must not dispatch at all.
fn validate(plan: &ExecutionPlan) -> Result<(), ExecutorError> {
  if plan.options.max_parallelism < 1 {
    return Err(ExecutorError::InvalidParallelism {
      requested: plan.options.max_parallelism,
    });
  }
  if plan.is_empty() {
    return Err(ExecutorError::EmptyPlan);
  }
  Ok(())
}

/// Drive a validated plan to termination.
async fn drive<N: ExecutionNotifier + 'static>(
  plan: ExecutionPlan,
  notifier: Arc<N>,
) -> ExecutionReport {
  let ExecutionPlan { items, options } = plan;
  let execution_id = uuid::Uuid::new_v4().to_string();
  let total = items.len();
  let cancel = options.cancel;

  info!(
    execution_id = %execution_id,
    total_items = total,
    max_parallelism = options.max_parallelism,
    "plan_started"
  );
  notifier.notify(ExecutionEvent::PlanStarted {
    execution_id: execution_id.clone(),
    total_items: total,
    max_parallelism: options.max_parallelism,
  });

  // Arm the deadline timer. Its only effect is cancelling the shared token,
  // which is idempotent, so a concurrent explicit cancel is harmless.
  let deadline_timer = options.deadline.map(|deadline| {
    let cancel = cancel.clone();
    let execution_id = execution_id.clone();
    tokio::spawn(async move {
      tokio::time::sleep(deadline).await;
      warn!(execution_id = %execution_id, "deadline elapsed, cancelling plan");
      cancel.cancel();
    })
  });

  let semaphore = Arc::new(Semaphore::new(options.max_parallelism));
  let slots = Arc::new(SlotPool::new(options.max_parallelism));
  let mut handles: Vec<(u64, JoinHandle<ItemReport>)> = Vec::with_capacity(total);
  let mut skipped: Vec<ItemReport> = Vec::new();

  for item in items {
    // Stop dispatching as soon as the signal fires. The signal is monotonic,
    // so everything after the first skipped item is skipped too.
    if cancel.is_cancelled() {
      skipped.push(ItemReport {
        ordinal: item.ordinal,
        outcome: ItemOutcome::Skipped,
      });
      continue;
    }

    let permit = tokio::select! {
      permit = Arc::clone(&semaphore).acquire_owned() => {
        // the semaphore is never closed
        permit.expect("semaphore closed")
      }
      _ = cancel.cancelled() => {
        skipped.push(ItemReport {
          ordinal: item.ordinal,
          outcome: ItemOutcome::Skipped,
        });
        continue;
      }
    };

    // The signal may have fired while we held no permit and both select
    // branches were ready; re-check before starting the body.
    if cancel.is_cancelled() {
      skipped.push(ItemReport {
        ordinal: item.ordinal,
        outcome: ItemOutcome::Skipped,
      });
      continue;
    }

    let slot = slots.acquire();
    let ordinal = item.ordinal;
    let handle = tokio::spawn(run_item(
      item,
      slot,
      permit,
      cancel.clone(),
      execution_id.clone(),
      Arc::clone(&notifier),
    ));
    handles.push((ordinal, handle));
  }

  // Wait for every in-flight body, even after cancellation: bodies are
  // cooperative and must be allowed to reach their own terminal state.
  let joined = join_all(
    handles
      .into_iter()
      .map(|(ordinal, handle)| async move { (ordinal, handle.await) }),
  )
  .await;

  let mut reports: Vec<ItemReport> = Vec::with_capacity(total);
  for (ordinal, joined_result) in joined {
    match joined_result {
      Ok(item_report) => reports.push(item_report),
      Err(e) => {
        error!(execution_id = %execution_id, ordinal, error = %e, "item_task_failed");
        reports.push(ItemReport {
          ordinal,
          outcome: ItemOutcome::Failed {
            error: ItemError::failed(format!("item task panicked: {}", e)),
          },
        });
      }
    }
  }
  reports.extend(skipped);

  if let Some(timer) = deadline_timer {
    timer.abort();
  }

  let report = ExecutionReport::from_items(execution_id, reports);
  match &report.outcome {
    PlanOutcome::Completed => {
      info!(execution_id = %report.execution_id, "plan_completed");
    }
    PlanOutcome::Cancelled { started, finished } => {
      warn!(
        execution_id = %report.execution_id,
        started,
        finished,
        "plan_cancelled"
      );
    }
    PlanOutcome::Faulted { failures } => {
      error!(
        execution_id = %report.execution_id,
        failures = failures.len(),
        "plan_faulted"
      );
    }
  }
  notifier.notify(ExecutionEvent::PlanFinished {
    execution_id: report.execution_id.clone(),
    finished: report.finished_count(),
    skipped: report.skipped_count(),
  });

  report
}

/// Run a single dispatched item to its terminal state.
///
/// The slot guard and permit are dropped here, in that order, so the slot id
/// is back in the pool before the next permit is granted.
async fn run_item<N: ExecutionNotifier + 'static>(
  item: WorkItem,
  slot: SlotGuard,
  permit: OwnedSemaphorePermit,
  cancel: CancellationToken,
  execution_id: String,
  notifier: Arc<N>,
) -> ItemReport {
  let ordinal = item.ordinal;
  let worker_id = slot.id();
  let ctx = WorkContext::new(ordinal, worker_id, cancel);

  info!(execution_id = %execution_id, ordinal, worker_id, "item_started");
  notifier.notify(ExecutionEvent::ItemStarted {
    execution_id: execution_id.clone(),
    ordinal,
    worker_id,
  });

  let result = (item.body)(ctx).await;

  let outcome = match result {
    Ok(()) => {
      info!(execution_id = %execution_id, ordinal, worker_id, "item_completed");
      notifier.notify(ExecutionEvent::ItemFinished {
        execution_id: execution_id.clone(),
        ordinal,
        worker_id,
      });
      ItemOutcome::Finished
    }
    Err(ItemError::Interrupted) => {
      warn!(execution_id = %execution_id, ordinal, worker_id, "item_interrupted");
      notifier.notify(ExecutionEvent::ItemInterrupted {
        execution_id: execution_id.clone(),
        ordinal,
        worker_id,
      });
      ItemOutcome::Interrupted
    }
    Err(error) => {
      error!(execution_id = %execution_id, ordinal, worker_id, error = %error, "item_failed");
      notifier.notify(ExecutionEvent::ItemFailed {
        execution_id: execution_id.clone(),
        ordinal,
        worker_id,
        error: error.to_string(),
      });
      ItemOutcome::Failed { error }
    }
  };

  drop(slot);
  drop(permit);

  ItemReport { ordinal, outcome }
}

/// Pool of worker slot identifiers, one per semaphore permit.
///
/// A slot id is only acquired while a permit is held, so the free list can
/// never be empty at acquire time. The guard returns the id on drop, which
/// keeps the release exactly-once even if a body panics.
struct SlotPool {
  free: Mutex<Vec<usize>>,
}

impl SlotPool {
  fn new(capacity: usize) -> Self {
    Self {
      free: Mutex::new((0..capacity).rev().collect()),
    }
  }

  fn acquire(self: &Arc<Self>) -> SlotGuard {
    let id = self
      .free
      .lock()
      .expect("slot pool mutex poisoned")
      .pop()
      .expect("no free worker slot despite held permit");
    SlotGuard {
      id,
      pool: Arc::clone(self),
    }
  }
}

struct SlotGuard {
  id: usize,
  pool: Arc<SlotPool>,
}

impl SlotGuard {
  fn id(&self) -> usize {
    self.id
  }
}

impl Drop for SlotGuard {
  fn drop(&mut self) {
    self
      .pool
      .free
      .lock()
      .expect("slot pool mutex poisoned")
      .push(self.id);
  }
}
