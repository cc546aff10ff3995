//! A Tokio-based runner for batches of futures with bounded concurrency,
//! results kept in input order, and fail-fast or collect-all error handling.

mod error;
mod options;
mod outcome;
mod scheduler;
mod task;
mod work_queue;

pub use error::{BoxError, ConcurrencyError, TaskFailure};
pub use options::{RunOptions, DEFAULT_CONCURRENCY};
pub use outcome::{RunOutcome, Settled};
pub use scheduler::{run, Scheduler};
