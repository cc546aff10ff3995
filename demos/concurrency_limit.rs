use futures_ensemble::{BoxError, RunOptions, Scheduler};
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::info;

async fn long_task_fn(id: usize) -> Result<String, BoxError> {
  info!("Task {} starting (concurrency demo - should take 1s)", id);
  tokio::time::sleep(Duration::from_secs(1)).await;
  let result = format!("Task {} finished", id);
  info!("{}", result);
  Ok(result)
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Concurrency Limit Demo (Limit: 2) ---");

  let concurrency_limit = 2;
  let num_tasks = 5;
  let scheduler = Scheduler::new(Handle::current(), "concurrency_scheduler");

  info!(
    "Running {} tasks, each takes 1 sec. With concurrency {}, this should take ~{} secs.",
    num_tasks,
    concurrency_limit,
    (num_tasks as f32 / concurrency_limit as f32).ceil()
  );

  let tasks = (0..num_tasks).map(|i| move || long_task_fn(i));
  let options = RunOptions::new().with_concurrency(concurrency_limit);

  let started = Instant::now();
  match scheduler.run(tasks, options).await {
    Ok(outcome) => {
      for (i, result) in outcome.into_completed().unwrap_or_default().iter().enumerate() {
        info!("Slot {}: {}", i, result);
      }
    }
    Err(e) => info!("Run failed: {}", e),
  }

  info!("All tasks processed in {:?}.", started.elapsed());
  info!("--- Concurrency Limit Demo End ---");
}
