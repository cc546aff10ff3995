use crate::error::ConcurrencyError;

/// Result of a collect-all run.
///
/// `data[i]` holds the outcome of task `i`. `error_indexes` lists, in ascending
/// order, every position of `data` that holds an `Err`.
#[derive(Debug, Clone)]
pub struct Settled<T> {
  pub data: Vec<Result<T, ConcurrencyError>>,
  pub error_indexes: Vec<usize>,
}

impl<T> Settled<T> {
  pub(crate) fn new(data: Vec<Result<T, ConcurrencyError>>, mut error_indexes: Vec<usize>) -> Self {
    error_indexes.sort_unstable();
    Self { data, error_indexes }
  }

  pub fn len(&self) -> usize {
    self.data.len()
  }

  pub fn is_empty(&self) -> bool {
    self.data.is_empty()
  }

  pub fn has_errors(&self) -> bool {
    !self.error_indexes.is_empty()
  }

  /// Successful values with their task index, in input order.
  pub fn successes(&self) -> impl Iterator<Item = (usize, &T)> + '_ {
    self
      .data
      .iter()
      .enumerate()
      .filter_map(|(index, slot)| slot.as_ref().ok().map(|value| (index, value)))
  }

  /// Failures in input order.
  pub fn errors(&self) -> impl Iterator<Item = &ConcurrencyError> + '_ {
    self.data.iter().filter_map(|slot| slot.as_ref().err())
  }

  /// Converts into the fail-fast shape: all values, or the lowest-index failure.
  pub fn into_result(self) -> Result<Vec<T>, ConcurrencyError> {
    self.data.into_iter().collect()
  }
}

/// What `Scheduler::run` produces, depending on `RunOptions::stop_on_error`.
#[derive(Debug, Clone)]
pub enum RunOutcome<T> {
  /// Fail-fast run where every task succeeded.
  Completed(Vec<T>),
  /// Collect-all run.
  Settled(Settled<T>),
}

impl<T> RunOutcome<T> {
  pub fn is_settled(&self) -> bool {
    matches!(self, RunOutcome::Settled(_))
  }

  pub fn into_completed(self) -> Option<Vec<T>> {
    match self {
      RunOutcome::Completed(values) => Some(values),
      RunOutcome::Settled(_) => None,
    }
  }

  pub fn into_settled(self) -> Option<Settled<T>> {
    match self {
      RunOutcome::Settled(settled) => Some(settled),
      RunOutcome::Completed(_) => None,
    }
  }
}
