//! Awaitable execution handles.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::error::ExecutorError;
use crate::report::ExecutionReport;

/// A handle to a plan started with [`Executor::spawn`](crate::Executor::spawn).
///
/// The plan runs whether or not the handle is awaited; call
/// [`wait`](Execution::wait) to suspend until it reaches a terminal state.
pub struct Execution {
  handle: JoinHandle<ExecutionReport>,
  cancel: CancellationToken,
}

impl Execution {
  pub(crate) fn new(handle: JoinHandle<ExecutionReport>, cancel: CancellationToken) -> Self {
    Self { handle, cancel }
  }

  /// Fire the plan's cancellation signal.
  ///
  /// Cooperative: no new items are dispatched, and in-flight bodies keep
  /// running until they observe the signal or finish. Idempotent.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// Suspend until every item has reached a terminal state and return the
  /// aggregated report.
  #[instrument(name = "execution_wait", skip(self))]
  pub async fn wait(self) -> Result<ExecutionReport, ExecutorError> {
    self.handle.await.map_err(|e| ExecutorError::Runtime {
      message: format!("dispatch task failed to join: {}", e),
    })
  }
}
