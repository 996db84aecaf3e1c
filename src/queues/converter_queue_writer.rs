use std::marker::PhantomData;

use crate::error::BeamError;
use crate::error::Result;
use crate::queues::QueueWriter;
use crate::queues::ScopedQueueWriter;

/// A queue writer that converts each value before forwarding it.
///
/// Errors from the downstream writer propagate to the pusher, and breaking
/// this writer breaks the downstream target.
pub struct ConverterQueueWriter<T, U, C>
where
  T: Send + 'static,
  U: Send + 'static,
  C: Fn(T) -> U + Send + Sync,
{
  target: ScopedQueueWriter<U>,
  converter: C,
  marker: PhantomData<fn(T)>,
}

impl<T, U, C> ConverterQueueWriter<T, U, C>
where
  T: Send + 'static,
  U: Send + 'static,
  C: Fn(T) -> U + Send + Sync,
{
  /// Constructs a converter forwarding into `target`.
  pub fn new(target: ScopedQueueWriter<U>, converter: C) -> Self {
    Self {
      target,
      converter,
      marker: PhantomData,
    }
  }
}

impl<T, U, C> QueueWriter<T> for ConverterQueueWriter<T, U, C>
where
  T: Send + 'static,
  U: Send + 'static,
  C: Fn(T) -> U + Send + Sync,
{
  fn push(&self, value: T) -> Result<()> {
    self.target.push((self.converter)(value))
  }

  fn break_with(&self, error: BeamError) {
    self.target.break_with(error);
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use crate::error::ErrorKind;
  use crate::queues::ConverterQueueWriter;
  use crate::queues::Queue;
  use crate::queues::QueueWriter;
  use crate::queues::ScopedQueueWriter;

  #[tokio::test]
  async fn test_converts_and_forwards() {
    let queue: Arc<Queue<String>> = Arc::new(Queue::new());

    let writer = ConverterQueueWriter::new(
      ScopedQueueWriter::from(Arc::clone(&queue)),
      |value: u32| format!("#{value}"),
    );

    writer.push(4).unwrap();
    assert_eq!(queue.pop().await.unwrap(), "#4");
  }

  #[tokio::test]
  async fn test_forwards_break() {
    let queue: Arc<Queue<u32>> = Arc::new(Queue::new());

    let writer = ConverterQueueWriter::new(
      ScopedQueueWriter::from(Arc::clone(&queue)),
      |value: u32| value * 2,
    );

    writer.break_with(crate::error::BeamError::end_of_file());

    assert_eq!(queue.pop().await.unwrap_err().kind(), ErrorKind::EndOfFile);
    assert_eq!(writer.push(1).unwrap_err().kind(), ErrorKind::EndOfFile);
  }
}
