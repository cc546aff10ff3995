use crate::error::{BoxError, TaskFailure};

use std::future::Future;
use std::pin::Pin;

/// The type of future a batch executes once its task has been invoked.
/// Failures are already normalized into a `TaskFailure`.
pub(crate) type TaskToExecute<T> = Pin<Box<dyn Future<Output = Result<T, TaskFailure>> + Send + 'static>>;

/// A caller-supplied nullary task, type-erased. Invoking it produces the future
/// to await; nothing runs before a worker claims it.
pub(crate) type BoxedTask<T> = Box<dyn FnOnce() -> TaskToExecute<T> + Send + 'static>;

/// Erases the caller's closure and error types so the run only deals with `T`.
pub(crate) fn into_boxed_tasks<I, F, Fut, T, E>(tasks: I) -> Vec<BoxedTask<T>>
where
  I: IntoIterator<Item = F>,
  F: FnOnce() -> Fut + Send + 'static,
  Fut: Future<Output = Result<T, E>> + Send + 'static,
  T: Send + 'static,
  E: Into<BoxError> + Send + 'static,
{
  tasks
    .into_iter()
    .map(|task| {
      let boxed: BoxedTask<T> = Box::new(move || -> TaskToExecute<T> {
        Box::pin(async move { task().await.map_err(TaskFailure::from_error) })
      });
      boxed
    })
    .collect()
}
