use std::sync::Arc;

use crate::error::BeamError;
use crate::error::Result;
use crate::queues::Queue;
use crate::queues::QueueWriter;
use crate::queues::StateQueue;

/// An owning handle to the write side of a queue.
///
/// A scoped writer represents the lifetime of a producer: dropping it
/// breaks the target with [`PipeBroken`], releasing every reader still
/// parked on it.
///
/// [`PipeBroken`]: crate::error::ErrorKind::PipeBroken
pub struct ScopedQueueWriter<T>
where
  T: Send + 'static,
{
  target: Arc<dyn QueueWriter<T>>,
}

impl<T> ScopedQueueWriter<T>
where
  T: Send + 'static,
{
  /// Constructs a scoped writer owning `target`.
  pub fn new(target: Arc<dyn QueueWriter<T>>) -> Self {
    Self { target }
  }

  /// Appends `value` to the target.
  pub fn push(&self, value: T) -> Result<()> {
    self.target.push(value)
  }

  /// Breaks the target with `error`.
  pub fn break_with(&self, error: BeamError) {
    self.target.break_with(error);
  }
}

impl<T> From<Arc<Queue<T>>> for ScopedQueueWriter<T>
where
  T: Send + 'static,
{
  fn from(queue: Arc<Queue<T>>) -> Self {
    Self::new(queue)
  }
}

impl<T> From<Arc<StateQueue<T>>> for ScopedQueueWriter<T>
where
  T: Send + 'static,
{
  fn from(queue: Arc<StateQueue<T>>) -> Self {
    Self::new(queue)
  }
}

impl<T> Drop for ScopedQueueWriter<T>
where
  T: Send + 'static,
{
  fn drop(&mut self) {
    self.target.break_with(BeamError::pipe_broken());
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use crate::error::ErrorKind;
  use crate::queues::Queue;
  use crate::queues::ScopedQueueWriter;

  #[tokio::test]
  async fn test_break_on_drop() {
    let queue: Arc<Queue<u32>> = Arc::new(Queue::new());
    let writer: ScopedQueueWriter<u32> = ScopedQueueWriter::from(Arc::clone(&queue));

    writer.push(5).unwrap();
    drop(writer);

    assert_eq!(queue.pop().await.unwrap(), 5);
    assert_eq!(queue.pop().await.unwrap_err().kind(), ErrorKind::PipeBroken);
  }
}
