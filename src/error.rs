use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error type accepted from tasks. Anything convertible into it
/// (`&str`, `String`, any `std::error::Error`) can be returned by a task.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

const EMPTY_ERROR_MESSAGE: &str = "task failed without an error message";
const EMPTY_PANIC_MESSAGE: &str = "task panicked without a message";
const OPAQUE_PANIC_MESSAGE: &str = "task panicked with a non-string payload";
const ABANDONED_MESSAGE: &str = "worker terminated before the task reported an outcome";

/// The normalized cause of a single task failure.
///
/// Whatever a task produced when it failed (an error value of any type, or a
/// panic payload of any type) ends up here with a non-empty message.
#[derive(Error, Debug, Clone)]
pub enum TaskFailure {
  /// The task returned `Err`.
  #[error("{message}")]
  Returned {
    message: String,
    #[source]
    source: Arc<dyn StdError + Send + Sync + 'static>,
  },

  /// The task panicked while being polled.
  #[error("{message}")]
  Panicked { message: String },

  /// The worker executing the task terminated before recording an outcome,
  /// e.g. because the runtime was shut down underneath the run.
  #[error("{}", ABANDONED_MESSAGE)]
  Abandoned,
}

impl TaskFailure {
  pub fn from_error<E>(error: E) -> Self
  where
    E: Into<BoxError>,
  {
    let boxed: BoxError = error.into();
    let mut message = boxed.to_string();
    if message.trim().is_empty() {
      message = EMPTY_ERROR_MESSAGE.to_string();
    }
    TaskFailure::Returned {
      message,
      source: Arc::from(boxed),
    }
  }

  /// Normalizes a payload obtained from `catch_unwind`.
  pub fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
    let message = if let Some(text) = payload.downcast_ref::<&'static str>() {
      (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
      text.clone()
    } else {
      OPAQUE_PANIC_MESSAGE.to_string()
    };

    let message = if message.trim().is_empty() {
      EMPTY_PANIC_MESSAGE.to_string()
    } else {
      message
    };
    TaskFailure::Panicked { message }
  }

  pub fn message(&self) -> &str {
    match self {
      TaskFailure::Returned { message, .. } | TaskFailure::Panicked { message } => message,
      TaskFailure::Abandoned => ABANDONED_MESSAGE,
    }
  }

  pub fn is_panic(&self) -> bool {
    matches!(self, TaskFailure::Panicked { .. })
  }
}

/// A task failure together with the position of the task in the submitted batch.
#[derive(Error, Debug, Clone)]
#[error("Task at index {index} failed: {cause}")]
pub struct ConcurrencyError {
  index: usize,
  #[source]
  cause: TaskFailure,
}

impl ConcurrencyError {
  pub fn new(index: usize, cause: TaskFailure) -> Self {
    Self { index, cause }
  }

  /// Returns the 0-based position of the failed task in the input sequence.
  pub fn index(&self) -> usize {
    self.index
  }

  pub fn cause(&self) -> &TaskFailure {
    &self.cause
  }

  /// Shorthand for `self.cause().message()`.
  pub fn message(&self) -> &str {
    self.cause.message()
  }

  pub fn into_cause(self) -> TaskFailure {
    self.cause
  }
}
