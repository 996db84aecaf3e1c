use std::sync::Arc;
use std::sync::Weak;

use crate::error::BeamError;
use crate::error::Result;
use crate::queues::QueueWriter;

/// A non-owning queue writer.
///
/// Holds only a weak reference to the target: once every owning handle is
/// gone, `push` fails with [`PipeBroken`] and `break_with` is a no-op.
/// Used to hand a producer to a subscriber without keeping the
/// subscriber's queue alive.
///
/// [`PipeBroken`]: crate::error::ErrorKind::PipeBroken
pub struct WeakQueue<T>
where
  T: Send + 'static,
{
  target: Weak<dyn QueueWriter<T>>,
}

impl<T> WeakQueue<T>
where
  T: Send + 'static,
{
  /// Constructs a weak writer tracking `target`'s owning handles.
  pub fn new<Q>(target: &Arc<Q>) -> Self
  where
    Q: QueueWriter<T> + 'static,
  {
    let writer: Arc<dyn QueueWriter<T>> = Arc::clone(target) as Arc<dyn QueueWriter<T>>;

    Self {
      target: Arc::downgrade(&writer),
    }
  }
}

impl<T> QueueWriter<T> for WeakQueue<T>
where
  T: Send + 'static,
{
  fn push(&self, value: T) -> Result<()> {
    match self.target.upgrade() {
      Some(target) => target.push(value),
      None => Err(BeamError::pipe_broken()),
    }
  }

  fn break_with(&self, error: BeamError) {
    if let Some(target) = self.target.upgrade() {
      target.break_with(error);
    }
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
  use crate::queues::QueueWriter;
  use crate::queues::WeakQueue;

  #[tokio::test]
  async fn test_push_while_target_lives() {
    let queue: Arc<Queue<u32>> = Arc::new(Queue::new());
    let weak: WeakQueue<u32> = WeakQueue::new(&queue);

    weak.push(3).unwrap();
    assert_eq!(queue.pop().await.unwrap(), 3);
  }

  #[tokio::test]
  async fn test_push_after_target_drops() {
    let queue: Arc<Queue<u32>> = Arc::new(Queue::new());
    let weak: WeakQueue<u32> = WeakQueue::new(&queue);

    drop(queue);

    assert_eq!(weak.push(1).unwrap_err().kind(), ErrorKind::PipeBroken);

    // Breaking a dead target does nothing.
    weak.break_pipe();
  }
}
