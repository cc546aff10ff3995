/// Number of workers used when the caller does not choose one.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Per-run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
  /// Maximum number of tasks running at once. `0` is clamped to `1`.
  pub concurrency: usize,
  /// `true`: the first failure aborts the run and is returned as the error.
  /// `false`: failures are stored in place and the run always completes.
  pub stop_on_error: bool,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      concurrency: DEFAULT_CONCURRENCY,
      stop_on_error: true,
    }
  }
}

impl RunOptions {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_concurrency(mut self, concurrency: usize) -> Self {
    self.concurrency = concurrency;
    self
  }

  pub fn with_stop_on_error(mut self, stop_on_error: bool) -> Self {
    self.stop_on_error = stop_on_error;
    self
  }

  /// Number of workers to launch for `task_count` tasks: `min(concurrency, task_count)`,
  /// with a zero concurrency treated as one.
  pub(crate) fn worker_count(&self, task_count: usize) -> usize {
    self.concurrency.max(1).min(task_count)
  }
}
