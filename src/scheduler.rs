use crate::error::{BoxError, ConcurrencyError, TaskFailure};
use crate::options::RunOptions;
use crate::outcome::{RunOutcome, Settled};
use crate::task::{into_boxed_tasks, BoxedTask};
use crate::work_queue::WorkQueue;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use futures::future::join_all;
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::runtime::Handle as TokioHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

lazy_static::lazy_static! {
  static ref NEXT_RUN_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

const DEFAULT_SCHEDULER_NAME: &str = "futures_ensemble";

/// Shared state of one run. Created at run start, dropped once the run and
/// every worker holding a reference to it are gone.
struct RunState<T: Send + 'static> {
  queue: WorkQueue<BoxedTask<T>>,
  slots: Vec<Mutex<Option<Result<T, ConcurrencyError>>>>,
  failed_indexes: Mutex<Vec<usize>>,
  first_failure: Mutex<Option<ConcurrencyError>>,
  /// Tripped by the first failure in fail-fast mode.
  error_flag: CancellationToken,
  stop_on_error: bool,
}

impl<T: Send + 'static> RunState<T> {
  fn new(tasks: Vec<BoxedTask<T>>, stop_on_error: bool) -> Self {
    let slots = (0..tasks.len()).map(|_| Mutex::new(None)).collect();
    Self {
      queue: WorkQueue::new(tasks),
      slots,
      failed_indexes: Mutex::new(Vec::new()),
      first_failure: Mutex::new(None),
      error_flag: CancellationToken::new(),
      stop_on_error,
    }
  }

  fn record(&self, index: usize, outcome: Result<T, TaskFailure>) {
    let cause = match outcome {
      Ok(value) => {
        trace!(%index, "Task completed successfully.");
        *self.slots[index].lock() = Some(Ok(value));
        return;
      }
      Err(cause) => cause,
    };

    warn!(%index, panicked = cause.is_panic(), "Task failed: {}", cause);
    let failure = ConcurrencyError::new(index, cause);

    if self.stop_on_error {
      let mut first_failure = self.first_failure.lock();
      if first_failure.is_some() {
        debug!(%index, "Run already failed; discarding this later failure.");
        return;
      }
      let claimed = self.queue.halt();
      *first_failure = Some(failure);
      drop(first_failure);
      self.error_flag.cancel();
      info!(%index, claimed, total = self.queue.len(), "Stop-on-error: work queue halted after first failure.");
    } else {
      self.failed_indexes.lock().push(index);
      *self.slots[index].lock() = Some(Err(failure));
    }
  }

  /// Moves every slot out. A slot still empty here belongs to a task whose
  /// worker died before recording anything; it is reported as abandoned.
  fn drain_slots(&self) -> (Vec<Result<T, ConcurrencyError>>, Vec<usize>) {
    let mut failed_indexes = std::mem::take(&mut *self.failed_indexes.lock());
    let data = self
      .slots
      .iter()
      .enumerate()
      .map(|(index, slot)| match slot.lock().take() {
        Some(outcome) => outcome,
        None => {
          error!(%index, "No outcome recorded for task; reporting it as abandoned.");
          failed_indexes.push(index);
          Err(ConcurrencyError::new(index, TaskFailure::Abandoned))
        }
      })
      .collect();
    (data, failed_indexes)
  }
}

/// What a run left behind once it is over.
enum Execution<T> {
  /// Stop-on-error tripped. Whatever succeeded is discarded.
  Failed(ConcurrencyError),
  /// Every claimed task recorded an outcome.
  Finished {
    data: Vec<Result<T, ConcurrencyError>>,
    failed_indexes: Vec<usize>,
  },
}

/// Runs batches of async tasks with bounded concurrency, keeping results in
/// input order.
///
/// Each call to one of the `run*` methods is an independent one-shot batch:
/// workers are spawned on the scheduler's runtime for that batch only, and
/// nothing is retained once it returns. The scheduler itself only carries a
/// name (for tracing) and the runtime handle, so it is cheap to clone.
#[derive(Clone, Debug)]
pub struct Scheduler {
  name: Arc<String>,
  tokio_handle: TokioHandle,
}

impl Scheduler {
  pub fn new(tokio_handle: TokioHandle, name: &str) -> Self {
    Self {
      name: Arc::new(name.to_string()),
      tokio_handle,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Runs `tasks` according to `options`.
  ///
  /// With `stop_on_error` set, returns `RunOutcome::Completed` holding every
  /// value in input order, or the first failure (by completion time) as `Err`.
  /// Otherwise always returns `RunOutcome::Settled`.
  pub async fn run<I, F, Fut, T, E>(&self, tasks: I, options: RunOptions) -> Result<RunOutcome<T>, ConcurrencyError>
  where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + Send + 'static,
  {
    if options.stop_on_error {
      self
        .run_fail_fast(tasks, options.concurrency)
        .await
        .map(RunOutcome::Completed)
    } else {
      Ok(RunOutcome::Settled(self.run_collect_all(tasks, options.concurrency).await))
    }
  }

  /// Runs `tasks` with at most `concurrency` in flight, stopping at the first failure.
  ///
  /// Once a task fails no new task is started. Tasks already running are not
  /// cancelled; they finish in the background and their outcomes are ignored.
  ///
  /// # Errors
  /// Returns the `ConcurrencyError` of the first task to fail.
  pub async fn run_fail_fast<I, F, Fut, T, E>(&self, tasks: I, concurrency: usize) -> Result<Vec<T>, ConcurrencyError>
  where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + Send + 'static,
  {
    let options = RunOptions::new().with_concurrency(concurrency).with_stop_on_error(true);
    match self.execute(into_boxed_tasks(tasks), options).await {
      Execution::Failed(failure) => Err(failure),
      Execution::Finished { data, .. } => data.into_iter().collect(),
    }
  }

  /// Runs every task in `tasks` with at most `concurrency` in flight, storing
  /// failures in place instead of stopping.
  pub async fn run_collect_all<I, F, Fut, T, E>(&self, tasks: I, concurrency: usize) -> Settled<T>
  where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: Into<BoxError> + Send + 'static,
  {
    let options = RunOptions::new().with_concurrency(concurrency).with_stop_on_error(false);
    match self.execute(into_boxed_tasks(tasks), options).await {
      Execution::Finished { data, failed_indexes } => Settled::new(data, failed_indexes),
      Execution::Failed(_) => unreachable!("collect-all runs never record a first failure"),
    }
  }

  async fn execute<T: Send + 'static>(&self, tasks: Vec<BoxedTask<T>>, options: RunOptions) -> Execution<T> {
    let run_id = NEXT_RUN_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    let span = info_span!("scheduler_run", scheduler = %*self.name, %run_id);
    self.execute_in_span(tasks, options).instrument(span).await
  }

  async fn execute_in_span<T: Send + 'static>(&self, tasks: Vec<BoxedTask<T>>, options: RunOptions) -> Execution<T> {
    let task_count = tasks.len();
    if task_count == 0 {
      debug!("Empty batch; nothing to run.");
      return Execution::Finished {
        data: Vec::new(),
        failed_indexes: Vec::new(),
      };
    }

    if options.concurrency == 0 {
      warn!("Concurrency of 0 requested; clamping to 1.");
    }
    let worker_count = options.worker_count(task_count);
    info!(
      task_count,
      worker_count,
      stop_on_error = options.stop_on_error,
      "Starting run."
    );

    let state = Arc::new(RunState::new(tasks, options.stop_on_error));

    let worker_handles: Vec<_> = (0..worker_count)
      .map(|worker_id| {
        let worker_state = state.clone();
        self.tokio_handle.spawn(
          Self::run_worker(worker_id, worker_state).instrument(info_span!("scheduler_worker", %worker_id)),
        )
      })
      .collect();

    let all_workers = join_all(worker_handles);

    let join_results = if options.stop_on_error {
      tokio::select! {
        biased;

        _ = state.error_flag.cancelled() => {
          // Dropping the join handles detaches the remaining workers; their
          // in-flight tasks run to completion and nothing waits for them.
          None
        }

        results = all_workers => Some(results),
      }
    } else {
      Some(all_workers.await)
    };

    if let Some(results) = join_results {
      for (worker_id, result) in results.into_iter().enumerate() {
        if let Err(join_error) = result {
          error!(%worker_id, "Worker terminated abnormally: {:?}", join_error);
        }
      }
    }

    // Cloned, not taken: detached workers may still be recording and must keep
    // seeing that the run has already failed.
    let first_failure = state.first_failure.lock().clone();
    if let Some(failure) = first_failure {
      info!(index = failure.index(), "Run failed.");
      return Execution::Failed(failure);
    }

    let (data, failed_indexes) = state.drain_slots();
    info!(failed = failed_indexes.len(), "Run finished.");
    Execution::Finished { data, failed_indexes }
  }

  async fn run_worker<T: Send + 'static>(worker_id: usize, state: Arc<RunState<T>>) {
    debug!("Worker started.");
    let mut executed = 0usize;

    loop {
      if state.stop_on_error && state.error_flag.is_cancelled() {
        debug!("Run has failed; worker stops claiming.");
        break;
      }

      let Some(item) = state.queue.claim() else {
        trace!(claimed = state.queue.claimed(), "No unclaimed work left.");
        break;
      };

      let index = item.index;
      let task = item.job;
      trace!(%index, "Claimed task.");

      let outcome = match AssertUnwindSafe(async move { task().await }).catch_unwind().await {
        Ok(result) => result,
        Err(panic_payload) => Err(TaskFailure::from_panic(panic_payload)),
      };
      executed += 1;

      state.record(index, outcome);
    }

    debug!(%worker_id, executed, "Worker stopped.");
  }
}

/// Runs `tasks` on the current Tokio runtime with a default-named scheduler.
///
/// # Panics
/// Panics if called outside of a Tokio runtime.
pub async fn run<I, F, Fut, T, E>(tasks: I, options: RunOptions) -> Result<RunOutcome<T>, ConcurrencyError>
where
  I: IntoIterator<Item = F>,
  F: FnOnce() -> Fut + Send + 'static,
  Fut: Future<Output = Result<T, E>> + Send + 'static,
  T: Send + 'static,
  E: Into<BoxError> + Send + 'static,
{
  Scheduler::new(TokioHandle::current(), DEFAULT_SCHEDULER_NAME)
    .run(tasks, options)
    .await
}
