use futures_ensemble::{RunOptions, Scheduler};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::info;

async fn fetch(id: u64) -> Result<u64, String> {
  tokio::time::sleep(Duration::from_millis(50 * (5 - id))).await;
  if id % 2 == 1 {
    return Err(format!("record {} is unavailable", id));
  }
  Ok(id * 100)
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();
  info!("--- Collect-All Demo ---");

  let scheduler = Scheduler::new(Handle::current(), "collect_all_scheduler");
  let tasks = (0..5).map(|id| move || fetch(id));

  // Fail-fast: the first failure to complete ends the run.
  match scheduler.run(tasks.clone(), RunOptions::new().with_concurrency(3)).await {
    Ok(outcome) => info!("Unexpected success: {:?}", outcome),
    Err(e) => info!("Fail-fast run stopped: {} (index {})", e, e.index()),
  }

  // Collect-all: every task runs, failures stay in their slots.
  let settled = scheduler.run_collect_all(tasks, 3).await;
  for (index, slot) in settled.data.iter().enumerate() {
    match slot {
      Ok(value) => info!("Slot {}: {}", index, value),
      Err(e) => info!("Slot {}: failed with '{}'", index, e.message()),
    }
  }
  info!("Failed indexes: {:?}", settled.error_indexes);
  info!("--- Collect-All Demo End ---");
}
