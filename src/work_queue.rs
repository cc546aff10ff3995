use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A job paired with its position in the submitted batch.
pub(crate) struct WorkItem<J> {
  pub(crate) index: usize,
  pub(crate) job: J,
}

impl<J> fmt::Debug for WorkItem<J> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkItem")
      .field("index", &self.index)
      .finish_non_exhaustive()
  }
}

/// A fixed, multi-consumer queue of indexed jobs.
///
/// The job list never changes shape after construction. Consumers claim work
/// by advancing a single atomic cursor, so every index is handed out at most
/// once and in ascending order, without a lock on the hot path. Each job sits
/// behind its own mutex only so the claiming consumer can move it out; that
/// lock is never contended because the cursor already made the claim exclusive.
pub(crate) struct WorkQueue<J> {
  jobs: Vec<Mutex<Option<J>>>,
  cursor: AtomicUsize,
}

impl<J> fmt::Debug for WorkQueue<J> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkQueue")
      .field("len", &self.len())
      .field("cursor", &self.cursor.load(Ordering::Acquire))
      .finish_non_exhaustive()
  }
}

impl<J> WorkQueue<J> {
  pub(crate) fn new(jobs: Vec<J>) -> Self {
    Self {
      jobs: jobs.into_iter().map(|job| Mutex::new(Some(job))).collect(),
      cursor: AtomicUsize::new(0),
    }
  }

  /// Total number of jobs the queue was built with.
  pub(crate) fn len(&self) -> usize {
    self.jobs.len()
  }

  /// Claims the next unclaimed job, or `None` once the queue is exhausted or halted.
  pub(crate) fn claim(&self) -> Option<WorkItem<J>> {
    let len = self.jobs.len();
    let index = self
      .cursor
      .fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| (next < len).then_some(next + 1))
      .ok()?;

    // The cursor handed `index` to this caller alone.
    let job = self.jobs[index].lock().take()?;
    Some(WorkItem { index, job })
  }

  /// Stops all further claims. Returns how many jobs had been claimed before the halt.
  ///
  /// Halting shares the cursor with `claim`, so any claim ordered after this call fails.
  pub(crate) fn halt(&self) -> usize {
    self.cursor.swap(self.jobs.len(), Ordering::AcqRel).min(self.jobs.len())
  }

  /// Number of jobs handed out so far (equal to `len()` once exhausted or halted).
  pub(crate) fn claimed(&self) -> usize {
    self.cursor.load(Ordering::Acquire).min(self.jobs.len())
  }
}
