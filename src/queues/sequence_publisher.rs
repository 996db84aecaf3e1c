use parking_lot::ReentrantMutex;
use std::cell::RefCell;

use crate::consts::CAP_PUBLISHER_MONITORS;
use crate::error::BeamError;
use crate::queues::Publisher;
use crate::queues::ScopedQueueWriter;
use crate::queues::SnapshotPublisher;

/// A snapshot publisher replaying every prior push to a new monitor.
///
/// A monitor added while values have already been published receives the
/// full sequence first, atomically with respect to further pushes, and
/// then every later value in push order.
pub struct SequencePublisher<T>
where
  T: Clone + Send + 'static,
{
  state: ReentrantMutex<RefCell<SequenceState<T>>>,
}

struct SequenceState<T>
where
  T: Clone + Send + 'static,
{
  values: Vec<T>,
  monitors: Vec<ScopedQueueWriter<T>>,
}

impl<T> SequencePublisher<T>
where
  T: Clone + Send + 'static,
{
  /// Constructs an empty sequence publisher.
  pub fn new() -> Self {
    Self {
      state: ReentrantMutex::new(RefCell::new(SequenceState {
        values: Vec::new(),
        monitors: Vec::with_capacity(CAP_PUBLISHER_MONITORS),
      })),
    }
  }

  /// Appends `value` to the sequence and broadcasts it.
  ///
  /// Returns the number of subscribers remaining after the broadcast.
  pub fn push(&self, value: T) -> usize {
    let state = self.state.lock();
    let mut state = state.borrow_mut();

    state.values.push(value.clone());
    state
      .monitors
      .retain(|monitor| monitor.push(value.clone()).is_ok());

    state.monitors.len()
  }

  /// Breaks every subscriber with `error` and clears them.
  ///
  /// The recorded sequence is kept for later monitors.
  pub fn break_with(&self, error: BeamError) {
    let state = self.state.lock();

    for monitor in state.borrow_mut().monitors.drain(..) {
      monitor.break_with(error.clone());
    }
  }
}

impl<T> Default for SequencePublisher<T>
where
  T: Clone + Send + 'static,
{
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Publisher<T> for SequencePublisher<T>
where
  T: Clone + Send + 'static,
{
  fn monitor(&self, monitor: ScopedQueueWriter<T>) {
    let state = self.state.lock();
    let mut state = state.borrow_mut();

    for value in state.values.iter() {
      if monitor.push(value.clone()).is_err() {
        return;
      }
    }

    state.monitors.push(monitor);
  }

  fn with(&self, f: &mut dyn FnMut()) {
    let _guard = self.state.lock();
    f();
  }
}

impl<T> SnapshotPublisher<T> for SequencePublisher<T>
where
  T: Clone + Send + 'static,
{
  fn with_snapshot(&self, f: &mut dyn FnMut(Option<&[T]>)) {
    let state = self.state.lock();
    let state = state.borrow();

    if state.values.is_empty() {
      f(None);
    } else {
      f(Some(state.values.as_slice()));
    }
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
  use crate::queues::ScopedQueueWriter;
  use crate::queues::SequencePublisher;
  use crate::queues::SnapshotPublisher;

  #[tokio::test]
  async fn test_snapshot_then_deltas() {
    let publisher: SequencePublisher<u32> = SequencePublisher::new();

    publisher.push(1);
    publisher.push(2);

    let queue: Arc<Queue<u32>> = Arc::new(Queue::new());
    publisher.monitor(ScopedQueueWriter::from(Arc::clone(&queue)));

    publisher.push(3);

    assert_eq!(queue.pop().await.unwrap(), 1);
    assert_eq!(queue.pop().await.unwrap(), 2);
    assert_eq!(queue.pop().await.unwrap(), 3);
  }

  #[tokio::test]
  async fn test_with_snapshot() {
    let publisher: SequencePublisher<u32> = SequencePublisher::new();

    publisher.with_snapshot(&mut |snapshot| assert!(snapshot.is_none()));

    publisher.push(4);

    publisher.with_snapshot(&mut |snapshot| {
      assert_eq!(snapshot.unwrap(), &[4]);
    });
  }
}
