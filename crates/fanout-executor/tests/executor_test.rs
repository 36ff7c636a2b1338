//! Integration tests for Executor::run across the three plan modes.
//!
//! Timing-sensitive tests run on the paused test clock, so simulated delays
//! are deterministic and the tests finish instantly in real time.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fanout_executor::{
  Action, ExecutionPlan, Executor, ExecutorError, ItemError, PlanOptions, PlanOutcome,
};

/// Tracks how many bodies run at once, and the high-water mark.
struct ConcurrencyGauge {
  running: AtomicUsize,
  peak: AtomicUsize,
}

impl ConcurrencyGauge {
  fn new() -> Arc<Self> {
    Arc::new(Self {
      running: AtomicUsize::new(0),
      peak: AtomicUsize::new(0),
    })
  }

  fn enter(&self) {
    let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
    self.peak.fetch_max(now, Ordering::SeqCst);
  }

  fn exit(&self) {
    self.running.fetch_sub(1, Ordering::SeqCst);
  }

  fn peak(&self) -> usize {
    self.peak.load(Ordering::SeqCst)
  }
}

#[tokio::test(start_paused = true)]
async fn test_for_range_finishes_all_items() {
  let executor = Executor::new();

  // durations 40, 30, 20, 10, 0 ms across 3 workers
  let plan = ExecutionPlan::for_range(0..5, PlanOptions::new(3), |i, ctx| async move {
    ctx.sleep(Duration::from_millis((4 - i) * 10)).await
  });

  let started_at = tokio::time::Instant::now();
  let report = executor.run(plan).await.expect("run failed");
  let elapsed = started_at.elapsed();

  assert_eq!(report.outcome, PlanOutcome::Completed);
  assert_eq!(report.finished_count(), 5);
  // at least the longest single item, strictly less than running serially
  assert!(elapsed >= Duration::from_millis(40));
  assert!(elapsed < Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_never_exceeds_cap() {
  let gauge = ConcurrencyGauge::new();
  let body_gauge = Arc::clone(&gauge);

  let executor = Executor::new();
  let plan = ExecutionPlan::for_range(0..6, PlanOptions::new(2), move |_, ctx| {
    let gauge = Arc::clone(&body_gauge);
    async move {
      gauge.enter();
      let result = ctx.sleep(Duration::from_millis(10)).await;
      gauge.exit();
      result
    }
  });

  let report = executor.run(plan).await.expect("run failed");

  assert_eq!(report.outcome, PlanOutcome::Completed);
  assert_eq!(gauge.peak(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cap_above_item_count_runs_all_concurrently() {
  let gauge = ConcurrencyGauge::new();
  let body_gauge = Arc::clone(&gauge);

  let executor = Executor::new();
  let plan = ExecutionPlan::for_range(0..4, PlanOptions::new(8), move |_, ctx| {
    let gauge = Arc::clone(&body_gauge);
    async move {
      gauge.enter();
      let result = ctx.sleep(Duration::from_millis(10)).await;
      gauge.exit();
      result
    }
  });

  let started_at = tokio::time::Instant::now();
  let report = executor.run(plan).await.expect("run failed");
  let elapsed = started_at.elapsed();

  assert_eq!(report.outcome, PlanOutcome::Completed);
  assert_eq!(gauge.peak(), 4);
  assert!(elapsed < Duration::from_millis(20));
}

#[tokio::test(start_paused = true)]
async fn test_single_slot_serializes_items() {
  type Span = (u64, tokio::time::Instant, tokio::time::Instant);
  let spans: Arc<Mutex<Vec<Span>>> = Arc::new(Mutex::new(Vec::new()));
  let body_spans = Arc::clone(&spans);

  let executor = Executor::new();
  let plan = ExecutionPlan::for_range(0..4, PlanOptions::new(1), move |i, ctx| {
    let spans = Arc::clone(&body_spans);
    async move {
      let start = tokio::time::Instant::now();
      ctx.sleep(Duration::from_millis(10)).await?;
      spans
        .lock()
        .unwrap()
        .push((i, start, tokio::time::Instant::now()));
      Ok(())
    }
  });

  let report = executor.run(plan).await.expect("run failed");
  assert_eq!(report.outcome, PlanOutcome::Completed);

  let spans = spans.lock().unwrap();
  let ordinals: Vec<u64> = spans.iter().map(|(i, _, _)| *i).collect();
  assert_eq!(ordinals, vec![0, 1, 2, 3]);
  for pair in spans.windows(2) {
    let (_, _, prev_end) = pair[0];
    let (_, next_start, _) = pair[1];
    assert!(next_start >= prev_end);
  }
}

#[tokio::test(start_paused = true)]
async fn test_for_each_visits_every_element() {
  let visited: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
  let body_visited = Arc::clone(&visited);

  let elements = vec!["alpha", "beta", "gamma", "delta"];
  let executor = Executor::new();
  let plan = ExecutionPlan::for_each(
    elements.clone(),
    PlanOptions::new(2),
    move |element, ctx| {
      let visited = Arc::clone(&body_visited);
      async move {
        ctx.sleep(Duration::from_millis(5)).await?;
        visited.lock().unwrap().push(element.to_string());
        Ok(())
      }
    },
  );

  let report = executor.run(plan).await.expect("run failed");

  assert_eq!(report.outcome, PlanOutcome::Completed);
  let mut visited = visited.lock().unwrap().clone();
  visited.sort_unstable();
  let mut expected: Vec<String> = elements.iter().map(|e| e.to_string()).collect();
  expected.sort_unstable();
  assert_eq!(visited, expected);
}

#[tokio::test(start_paused = true)]
async fn test_invoke_runs_each_action_exactly_once() {
  let counters: Vec<Arc<AtomicUsize>> = (0..5).map(|_| Arc::new(AtomicUsize::new(0))).collect();

  let actions = counters
    .iter()
    .enumerate()
    .map(|(i, counter)| {
      let counter = Arc::clone(counter);
      Action::new(move |ctx| async move {
        counter.fetch_add(1, Ordering::SeqCst);
        ctx.sleep(Duration::from_millis(2 * i as u64)).await
      })
    })
    .collect();

  let executor = Executor::new();
  let report = executor
    .run(ExecutionPlan::invoke(actions, PlanOptions::new(3)))
    .await
    .expect("run failed");

  assert_eq!(report.outcome, PlanOutcome::Completed);
  assert_eq!(report.items.len(), 5);
  for counter in counters {
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }
}

#[tokio::test(start_paused = true)]
async fn test_item_failure_does_not_stop_dispatch() {
  let executor = Executor::new();
  let plan = ExecutionPlan::for_range(0..4, PlanOptions::new(2), |i, ctx| async move {
    if i == 1 {
      return Err(ItemError::failed("boom"));
    }
    ctx.sleep(Duration::from_millis(10)).await
  });

  let report = executor.run(plan).await.expect("run failed");

  assert_eq!(report.finished_count(), 3);
  assert_eq!(report.started_count(), 4);
  match &report.outcome {
    PlanOutcome::Faulted { failures } => {
      assert_eq!(failures.len(), 1);
      assert_eq!(failures[0].ordinal, 1);
      assert_eq!(failures[0].error, ItemError::failed("boom"));
    }
    other => panic!("expected Faulted, got {:?}", other),
  }
}

#[tokio::test(start_paused = true)]
async fn test_spawn_returns_before_completion() {
  let finished = Arc::new(AtomicUsize::new(0));
  let body_finished = Arc::clone(&finished);

  let executor = Executor::new();
  let plan = ExecutionPlan::for_range(0..3, PlanOptions::new(3), move |_, ctx| {
    let finished = Arc::clone(&body_finished);
    async move {
      ctx.sleep(Duration::from_millis(20)).await?;
      finished.fetch_add(1, Ordering::SeqCst);
      Ok(())
    }
  });

  let execution = executor.spawn(plan).expect("spawn failed");

  // No simulated time has passed, so nothing can have finished yet.
  assert_eq!(finished.load(Ordering::SeqCst), 0);

  let report = execution.wait().await.expect("wait failed");
  assert_eq!(report.outcome, PlanOutcome::Completed);
  assert_eq!(finished.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_zero_parallelism_is_rejected() {
  let executor = Executor::new();
  let plan = ExecutionPlan::for_range(0..5, PlanOptions::new(0), |_, _| async { Ok(()) });

  let result = executor.run(plan).await;
  assert!(matches!(
    result,
    Err(ExecutorError::InvalidParallelism { requested: 0 })
  ));
}

#[tokio::test]
async fn test_empty_plan_is_rejected() {
  let executor = Executor::new();
  let plan = ExecutionPlan::for_each(Vec::<u32>::new(), PlanOptions::new(2), |_, _| async {
    Ok(())
  });

  let result = executor.run(plan).await;
  assert!(matches!(result, Err(ExecutorError::EmptyPlan)));
}
