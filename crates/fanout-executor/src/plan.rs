//! Execution plans and work item construction.
//!
//! A plan is built once from one of three work descriptions - an integer
//! range, a collection, or a fixed list of distinct actions - and is never
//! mutated after submission. All three reduce to the same [`WorkItem`] shape,
//! so the executor has a single dispatch path.

use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::ItemError;

pub(crate) type WorkBody =
  Box<dyn FnOnce(WorkContext) -> BoxFuture<'static, Result<(), ItemError>> + Send>;

/// One unit of independent work.
pub struct WorkItem {
  pub(crate) ordinal: u64,
  pub(crate) body: WorkBody,
}

impl WorkItem {
  /// The item's position in the plan (range index, element position, or
  /// action list position).
  pub fn ordinal(&self) -> u64 {
    self.ordinal
  }
}

/// Options controlling how a plan is driven.
#[derive(Debug, Clone)]
pub struct PlanOptions {
  /// Hard cap on concurrently running work items. Must be at least 1.
  pub max_parallelism: usize,
  /// Shared cancellation signal. Fires at most once; never resets.
  pub cancel: CancellationToken,
  /// Cancel the plan automatically after this duration.
  pub deadline: Option<Duration>,
}

impl PlanOptions {
  /// Create options with the given concurrency cap, a fresh cancellation
  /// token and no deadline.
  pub fn new(max_parallelism: usize) -> Self {
    Self {
      max_parallelism,
      cancel: CancellationToken::new(),
      deadline: None,
    }
  }

  /// Use a caller-owned cancellation token, e.g. one shared across plans.
  pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
    self.cancel = cancel;
    self
  }

  /// Cancel the plan once `deadline` has elapsed.
  pub fn with_deadline(mut self, deadline: Duration) -> Self {
    self.deadline = Some(deadline);
    self
  }
}

/// Context handed to every running work item body.
///
/// Carries the item's ordinal, the worker slot executing it, and the plan's
/// cancellation signal. The worker id is passed explicitly so bodies and
/// reporting sinks never have to reach for ambient thread identity.
#[derive(Debug, Clone)]
pub struct WorkContext {
  ordinal: u64,
  worker_id: usize,
  cancel: CancellationToken,
}

impl WorkContext {
  pub(crate) fn new(ordinal: u64, worker_id: usize, cancel: CancellationToken) -> Self {
    Self {
      ordinal,
      worker_id,
      cancel,
    }
  }

  /// The ordinal of the item this body is running as.
  pub fn ordinal(&self) -> u64 {
    self.ordinal
  }

  /// The worker slot (0..K) this body is running on.
  pub fn worker_id(&self) -> usize {
    self.worker_id
  }

  /// Whether the plan's cancellation signal has fired.
  ///
  /// Cancellation is cooperative: the executor never kills a running body,
  /// it only stops dispatching new ones. Bodies that want to stop early
  /// check this (or use [`WorkContext::sleep`]) themselves.
  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Sleep for `duration`, honoring the cancellation signal.
  ///
  /// Returns `Err(ItemError::Interrupted)` if the signal fires before the
  /// duration elapses.
  pub async fn sleep(&self, duration: Duration) -> Result<(), ItemError> {
    tokio::select! {
      _ = tokio::time::sleep(duration) => Ok(()),
      _ = self.cancel.cancelled() => Err(ItemError::Interrupted),
    }
  }
}

/// The set of work items to run plus the options driving them.
///
/// Created once per invocation via [`for_range`](ExecutionPlan::for_range),
/// [`for_each`](ExecutionPlan::for_each) or [`invoke`](ExecutionPlan::invoke).
pub struct ExecutionPlan {
  pub(crate) items: Vec<WorkItem>,
  pub(crate) options: PlanOptions,
}

impl ExecutionPlan {
  /// Plan one body invocation per index in `range`.
  ///
  /// The item ordinal is the index value itself.
  pub fn for_range<F, Fut>(range: Range<u64>, options: PlanOptions, body: F) -> Self
  where
    F: Fn(u64, WorkContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ItemError>> + Send + 'static,
  {
    let body = Arc::new(body);
    let items = range
      .map(|index| {
        let body = Arc::clone(&body);
        let item_body: WorkBody = Box::new(move |ctx| Box::pin((*body)(index, ctx)));
        WorkItem {
          ordinal: index,
          body: item_body,
        }
      })
      .collect();
    Self { items, options }
  }

  /// Plan one body invocation per element of `elements`.
  ///
  /// The item ordinal is the element's position in iteration order.
  pub fn for_each<I, T, F, Fut>(elements: I, options: PlanOptions, body: F) -> Self
  where
    I: IntoIterator<Item = T>,
    T: Send + 'static,
    F: Fn(T, WorkContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ItemError>> + Send + 'static,
  {
    let body = Arc::new(body);
    let items = elements
      .into_iter()
      .enumerate()
      .map(|(ordinal, element)| {
        let body = Arc::clone(&body);
        let item_body: WorkBody = Box::new(move |ctx| Box::pin((*body)(element, ctx)));
        WorkItem {
          ordinal: ordinal as u64,
          body: item_body,
        }
      })
      .collect();
    Self { items, options }
  }

  /// Plan a fixed list of distinct actions.
  ///
  /// The item ordinal is the action's position in the list; it carries no
  /// meaning beyond reporting.
  pub fn invoke(actions: Vec<Action>, options: PlanOptions) -> Self {
    let items = actions
      .into_iter()
      .enumerate()
      .map(|(ordinal, action)| WorkItem {
        ordinal: ordinal as u64,
        body: action.body,
      })
      .collect();
    Self { items, options }
  }

  /// Number of work items in the plan.
  pub fn len(&self) -> usize {
    self.items.len()
  }

  /// Whether the plan contains no work items.
  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

/// A single action for [`ExecutionPlan::invoke`].
///
/// Unlike the range and collection modes, each action is its own closure,
/// so a plan may mix arbitrarily different bodies.
pub struct Action {
  body: WorkBody,
}

impl Action {
  /// Wrap an async closure as an action.
  pub fn new<F, Fut>(f: F) -> Self
  where
    F: FnOnce(WorkContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), ItemError>> + Send + 'static,
  {
    Self {
      body: Box::new(move |ctx| Box::pin(f(ctx))),
    }
  }
}
