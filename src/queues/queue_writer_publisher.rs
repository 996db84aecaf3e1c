use parking_lot::ReentrantMutex;
use std::cell::RefCell;

use crate::consts::CAP_PUBLISHER_MONITORS;
use crate::error::BeamError;
use crate::queues::Publisher;
use crate::queues::ScopedQueueWriter;

/// A snapshot-free publisher broadcasting each push to every subscriber.
///
/// Subscribers whose queue is gone are pruned on the push that discovers
/// them.
pub struct QueueWriterPublisher<T>
where
  T: Clone + Send + 'static,
{
  monitors: ReentrantMutex<RefCell<Vec<ScopedQueueWriter<T>>>>,
}

impl<T> QueueWriterPublisher<T>
where
  T: Clone + Send + 'static,
{
  /// Constructs a publisher with no subscribers.
  pub fn new() -> Self {
    Self {
      monitors: ReentrantMutex::new(RefCell::new(Vec::with_capacity(CAP_PUBLISHER_MONITORS))),
    }
  }

  /// Broadcasts `value` to every subscriber, pruning dead ones.
  ///
  /// Returns the number of subscribers remaining after the broadcast.
  pub fn push(&self, value: T) -> usize {
    let monitors = self.monitors.lock();
    let mut monitors = monitors.borrow_mut();

    monitors.retain(|monitor| monitor.push(value.clone()).is_ok());
    monitors.len()
  }

  /// Breaks every subscriber with `error` and clears the set.
  pub fn break_with(&self, error: BeamError) {
    let monitors = self.monitors.lock();

    for monitor in monitors.borrow_mut().drain(..) {
      monitor.break_with(error.clone());
    }
  }

  /// Number of live subscribers.
  pub fn monitor_count(&self) -> usize {
    self.monitors.lock().borrow().len()
  }
}

impl<T> Default for QueueWriterPublisher<T>
where
  T: Clone + Send + 'static,
{
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Publisher<T> for QueueWriterPublisher<T>
where
  T: Clone + Send + 'static,
{
  fn monitor(&self, monitor: ScopedQueueWriter<T>) {
    self.monitors.lock().borrow_mut().push(monitor);
  }

  fn with(&self, f: &mut dyn FnMut()) {
    let _guard = self.monitors.lock();
    f();
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use crate::queues::Publisher;
  use crate::queues::Queue;
  use crate::queues::QueueWriterPublisher;
  use crate::queues::ScopedQueueWriter;
  use crate::queues::WeakQueue;

  #[tokio::test]
  async fn test_broadcast() {
    let publisher: QueueWriterPublisher<u32> = QueueWriterPublisher::new();
    let first: Arc<Queue<u32>> = Arc::new(Queue::new());
    let second: Arc<Queue<u32>> = Arc::new(Queue::new());

    publisher.monitor(ScopedQueueWriter::from(Arc::clone(&first)));
    publisher.monitor(ScopedQueueWriter::from(Arc::clone(&second)));

    assert_eq!(publisher.push(11), 2);

    assert_eq!(first.pop().await.unwrap(), 11);
    assert_eq!(second.pop().await.unwrap(), 11);
  }

  #[tokio::test]
  async fn test_prunes_dead_subscribers() {
    let publisher: QueueWriterPublisher<u32> = QueueWriterPublisher::new();
    let queue: Arc<Queue<u32>> = Arc::new(Queue::new());

    publisher.monitor(ScopedQueueWriter::new(Arc::new(WeakQueue::new(&queue))));
    assert_eq!(publisher.push(1), 1);

    drop(queue);
    assert_eq!(publisher.push(2), 0);
    assert_eq!(publisher.monitor_count(), 0);
  }

  #[tokio::test]
  async fn test_with_excludes_push_and_allows_reentry() {
    let publisher: QueueWriterPublisher<u32> = QueueWriterPublisher::new();
    let queue: Arc<Queue<u32>> = Arc::new(Queue::new());

    let mut monitor = Some(ScopedQueueWriter::from(Arc::clone(&queue)));

    publisher.with(&mut || {
      publisher.monitor(monitor.take().unwrap());
    });

    assert_eq!(publisher.push(5), 1);
    assert_eq!(queue.pop().await.unwrap(), 5);
  }
}
