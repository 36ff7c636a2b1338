use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use fanout_executor::{
  Action, ExecutionPlan, ExecutionReport, Executor, ItemError, PlanOptions, WorkContext,
};

/// fanout - bounded parallel execution patterns over one executor
#[derive(Parser)]
#[command(name = "fanout")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Maximum number of concurrently running work items.
  #[arg(long, default_value_t = 3)]
  max_parallelism: usize,

  /// Cancel everything still running after this many seconds.
  #[arg(long, default_value_t = 10)]
  deadline_secs: u64,

  /// Duration of one simulated work step, in milliseconds.
  #[arg(long, default_value_t = 1000)]
  step_ms: u64,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    )
    .init();

  let cli = Cli::parse();
  let rt = tokio::runtime::Runtime::new()?;
  rt.block_on(run_patterns(cli))
}

async fn run_patterns(cli: Cli) -> Result<()> {
  // One signal shared by every pattern, fired by a single deadline, so the
  // whole demo is bounded the way one batch invocation would be. Patterns
  // still pending when it fires report themselves as cancelled.
  let cancel = CancellationToken::new();
  let deadline = {
    let cancel = cancel.clone();
    let secs = cli.deadline_secs;
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_secs(secs)).await;
      cancel.cancel();
    })
  };

  let executor = Executor::new();
  let step = Duration::from_millis(cli.step_ms);

  // Pattern 1: range loop, caller suspends until the plan terminates.
  eprintln!("-- for_range (blocking) --");
  let plan = range_plan(&cli, &cancel, step);
  print_report(&executor.run(plan).await?)?;

  // Pattern 2: the same range loop as an awaitable handle.
  eprintln!("-- for_range (awaitable) --");
  let plan = range_plan(&cli, &cancel, step);
  let execution = executor.spawn(plan)?;
  info!("plan running in the background, caller is free to do other work");
  print_report(&execution.wait().await?)?;

  // Pattern 3: collection loop, blocking.
  eprintln!("-- for_each (blocking) --");
  let plan = collection_plan(&cli, &cancel, step);
  print_report(&executor.run(plan).await?)?;

  // Pattern 4: collection loop, awaitable.
  eprintln!("-- for_each (awaitable) --");
  let plan = collection_plan(&cli, &cancel, step);
  let execution = executor.spawn(plan)?;
  info!("plan running in the background, caller is free to do other work");
  print_report(&execution.wait().await?)?;

  // Pattern 5: fixed list of distinct actions, blocking.
  eprintln!("-- invoke (blocking) --");
  let plan = invoke_plan(&cli, &cancel, step);
  print_report(&executor.run(plan).await?)?;

  deadline.abort();
  Ok(())
}

fn options(cli: &Cli, cancel: &CancellationToken) -> PlanOptions {
  PlanOptions::new(cli.max_parallelism).with_cancel(cancel.clone())
}

/// Five indexed items with simulated durations of (5 - i) steps each.
fn range_plan(cli: &Cli, cancel: &CancellationToken, step: Duration) -> ExecutionPlan {
  ExecutionPlan::for_range(1..6, options(cli, cancel), move |i, ctx| async move {
    simulate_work(&ctx, step * ((5 - i) as u32)).await
  })
}

/// One item per named batch, shorter the later it sits in the list.
fn collection_plan(cli: &Cli, cancel: &CancellationToken, step: Duration) -> ExecutionPlan {
  let batches = vec!["ingest", "resize", "encode", "upload", "notify"];
  ExecutionPlan::for_each(batches, options(cli, cancel), move |name, ctx| async move {
    info!(batch = name, worker = ctx.worker_id(), "batch running");
    simulate_work(&ctx, step * ((4 - ctx.ordinal()) as u32)).await
  })
}

/// Five distinct actions of fixed, different durations.
fn invoke_plan(cli: &Cli, cancel: &CancellationToken, step: Duration) -> ExecutionPlan {
  let actions = vec![
    Action::new(move |ctx| async move { simulate_work(&ctx, step * 5).await }),
    Action::new(move |ctx| async move { simulate_work(&ctx, step * 4).await }),
    Action::new(move |ctx| async move { simulate_work(&ctx, step * 3).await }),
    Action::new(move |ctx| async move { simulate_work(&ctx, step * 2).await }),
    Action::new(move |ctx| async move { simulate_work(&ctx, step).await }),
  ];
  ExecutionPlan::invoke(actions, options(cli, cancel))
}

/// Simulated work: a delay that honors the plan's cancellation signal.
async fn simulate_work(ctx: &WorkContext, duration: Duration) -> Result<(), ItemError> {
  info!(
    item = ctx.ordinal(),
    worker = ctx.worker_id(),
    duration_ms = duration.as_millis() as u64,
    "item working"
  );
  ctx.sleep(duration).await
}

fn print_report(report: &ExecutionReport) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(report)?);
  Ok(())
}
