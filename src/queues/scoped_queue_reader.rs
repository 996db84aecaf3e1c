use std::sync::Arc;

use crate::error::BeamError;
use crate::error::Result;
use crate::queues::Queue;
use crate::queues::QueueReader;
use crate::queues::StateQueue;

/// An owning handle to the read side of a queue.
///
/// A scoped reader represents the lifetime of a consumer: dropping it
/// breaks the source with [`PipeBroken`] so producers stop feeding a
/// consumer that is gone.
///
/// [`PipeBroken`]: crate::error::ErrorKind::PipeBroken
pub struct ScopedQueueReader<T>
where
  T: Clone + Send + 'static,
{
  source: Arc<dyn QueueReader<T>>,
}

impl<T> ScopedQueueReader<T>
where
  T: Clone + Send + 'static,
{
  /// Constructs a scoped reader owning `source`.
  pub fn new(source: Arc<dyn QueueReader<T>>) -> Self {
    Self { source }
  }

  /// Removes and returns the next value, parking while empty.
  pub async fn pop(&self) -> Result<T> {
    self.source.pop().await
  }

  /// Returns the next value without removing it, parking while empty.
  pub async fn top(&self) -> Result<T> {
    self.source.top().await
  }

  /// Removes and returns the next value without parking.
  pub fn try_pop(&self) -> Option<T> {
    self.source.try_pop()
  }

  /// Returns the next value without removing it and without parking.
  pub fn try_top(&self) -> Option<T> {
    self.source.try_top()
  }

  /// Breaks the source with `error`.
  pub fn break_with(&self, error: BeamError) {
    self.source.break_with(error);
  }

  /// Returns a shared handle to the source without scope ownership.
  pub fn share(&self) -> Arc<dyn QueueReader<T>> {
    Arc::clone(&self.source)
  }
}

impl<T> From<Arc<Queue<T>>> for ScopedQueueReader<T>
where
  T: Clone + Send + 'static,
{
  fn from(queue: Arc<Queue<T>>) -> Self {
    Self::new(queue)
  }
}

impl<T> From<Arc<StateQueue<T>>> for ScopedQueueReader<T>
where
  T: Clone + Send + 'static,
{
  fn from(queue: Arc<StateQueue<T>>) -> Self {
    Self::new(queue)
  }
}

impl<T> Drop for ScopedQueueReader<T>
where
  T: Clone + Send + 'static,
{
  fn drop(&mut self) {
    self.source.break_with(BeamError::pipe_broken());
  }
}
