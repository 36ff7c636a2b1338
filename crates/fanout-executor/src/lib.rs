//! Bounded parallel execution for independent work items.
//!
//! This crate provides the [`Executor`], which runs a set of independent
//! work items across at most K concurrently active workers, with a shared
//! one-shot cancellation signal that can be fired explicitly or by deadline
//! expiry. Cancellation is cooperative: in-flight bodies are never killed.
//!
//! # Architecture
//!
//! ```text
//! Executor
//! ├── run(plan) - drives the plan, suspending the caller until it terminates
//! └── spawn(plan) -> Execution - starts the plan without suspending the caller
//!
//! ExecutionPlan
//! ├── for_range(range, options, body) - one item per index
//! ├── for_each(elements, options, body) - one item per element
//! └── invoke(actions, options) - fixed list of distinct actions
//!
//! Execution
//! └── wait() - suspends until the plan terminates, yields the report
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::time::Duration;
//! use fanout_executor::{ExecutionPlan, Executor, PlanOptions, PlanOutcome};
//!
//! let options = PlanOptions::new(3).with_deadline(Duration::from_secs(10));
//! let plan = ExecutionPlan::for_range(0..5, options, |i, ctx| async move {
//!   ctx.sleep(Duration::from_millis(100 * i)).await?;
//!   Ok(())
//! });
//!
//! let report = Executor::new().run(plan).await?;
//! assert_eq!(report.outcome, PlanOutcome::Completed);
//! ```

mod error;
mod events;
mod execution;
mod executor;
mod plan;
mod report;

pub use error::{ExecutorError, ItemError};
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use execution::Execution;
pub use executor::Executor;
pub use plan::{Action, ExecutionPlan, PlanOptions, WorkContext, WorkItem};
pub use report::{ExecutionReport, ItemFailure, ItemOutcome, ItemReport, PlanOutcome};
