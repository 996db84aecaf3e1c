use async_trait::async_trait;
use parking_lot::Mutex as SpinMutex;
use std::collections::VecDeque;

use crate::error::BeamError;
use crate::error::Result;
use crate::queues::QueueReader;
use crate::queues::QueueWriter;
use crate::routines::Park;
use crate::routines::SuspendedRoutineQueue;

// -----------------------------------------------------------------------------
// Queue
// -----------------------------------------------------------------------------

/// An unbounded multi-producer, multi-consumer FIFO queue.
///
/// Readers park the calling routine while the queue is empty; each push
/// resumes exactly one parked reader, in FIFO order. Breaking the queue
/// resumes every parked reader; reads drain the remaining buffer first and
/// then fail with the break error.
#[derive(Debug)]
pub struct Queue<T> {
  core: SpinMutex<QueueCore<T>>,
}

#[derive(Debug)]
struct QueueCore<T> {
  buffer: VecDeque<T>,
  breach: Option<BeamError>,
  readers: SuspendedRoutineQueue,
}

impl<T> Queue<T>
where
  T: Send + 'static,
{
  /// Constructs an empty queue.
  pub fn new() -> Self {
    Self {
      core: SpinMutex::new(QueueCore {
        buffer: VecDeque::new(),
        breach: None,
        readers: SuspendedRoutineQueue::new(),
      }),
    }
  }

  /// Appends `value`, resuming one waiting reader.
  ///
  /// # Errors
  ///
  /// Fails with the break error once the queue is broken.
  pub fn push(&self, value: T) -> Result<()> {
    let mut core = self.core.lock();

    if let Some(error) = core.breach.as_ref() {
      return Err(error.clone());
    }

    core.buffer.push_back(value);
    core.readers.resume_front();

    Ok(())
  }

  /// Removes and returns the next value, parking while empty.
  pub async fn pop(&self) -> Result<T> {
    loop {
      let slot = {
        let mut core = self.core.lock();

        if let Some(value) = core.buffer.pop_front() {
          return Ok(value);
        }

        if let Some(error) = core.breach.as_ref() {
          return Err(error.clone());
        }

        core.readers.park_slot()
      };

      Park::new(slot).await;
    }
  }

  /// Removes and returns the next value without parking.
  pub fn try_pop(&self) -> Option<T> {
    self.core.lock().buffer.pop_front()
  }

  /// Breaks the queue, resuming every parked reader with `error`.
  pub fn break_with(&self, error: BeamError) {
    let mut core = self.core.lock();

    if core.breach.is_none() {
      core.breach = Some(error);
    }

    core.readers.resume_all();
  }

  /// Breaks the queue with the default [`PipeBroken`] error.
  ///
  /// [`PipeBroken`]: crate::error::ErrorKind::PipeBroken
  pub fn break_pipe(&self) {
    self.break_with(BeamError::pipe_broken());
  }

  /// Returns `true` once the queue is broken.
  pub fn is_broken(&self) -> bool {
    self.core.lock().breach.is_some()
  }

  /// Number of buffered values.
  pub fn len(&self) -> usize {
    self.core.lock().buffer.len()
  }

  /// Returns `true` if no values are buffered.
  pub fn is_empty(&self) -> bool {
    self.core.lock().buffer.is_empty()
  }
}

impl<T> Queue<T>
where
  T: Clone + Send + 'static,
{
  /// Returns the next value without removing it, parking while empty.
  pub async fn top(&self) -> Result<T> {
    loop {
      let slot = {
        let mut core = self.core.lock();

        if let Some(value) = core.buffer.front() {
          return Ok(value.clone());
        }

        if let Some(error) = core.breach.as_ref() {
          return Err(error.clone());
        }

        core.readers.park_slot()
      };

      Park::new(slot).await;
    }
  }

  /// Returns the next value without removing it and without parking.
  pub fn try_top(&self) -> Option<T> {
    self.core.lock().buffer.front().cloned()
  }
}

impl<T> Default for Queue<T>
where
  T: Send + 'static,
{
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

// -----------------------------------------------------------------------------
// Trait Impls
// -----------------------------------------------------------------------------

impl<T> QueueWriter<T> for Queue<T>
where
  T: Send + 'static,
{
  fn push(&self, value: T) -> Result<()> {
    Queue::push(self, value)
  }

  fn break_with(&self, error: BeamError) {
    Queue::break_with(self, error);
  }
}

#[async_trait]
impl<T> QueueReader<T> for Queue<T>
where
  T: Clone + Send + 'static,
{
  async fn pop(&self) -> Result<T> {
    Queue::pop(self).await
  }

  async fn top(&self) -> Result<T> {
    Queue::top(self).await
  }

  fn try_pop(&self) -> Option<T> {
    Queue::try_pop(self)
  }

  fn try_top(&self) -> Option<T> {
    Queue::try_top(self)
  }

  fn break_with(&self, error: BeamError) {
    Queue::break_with(self, error);
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use crate::error::BeamError;
  use crate::error::ErrorKind;
  use crate::queues::Queue;
  use crate::routines;
  use crate::routines::RoutineHandlerGroup;

  #[tokio::test]
  async fn test_fifo_order() {
    let queue: Queue<u32> = Queue::new();

    queue.push(1).unwrap();
    queue.push(2).unwrap();
    queue.push(3).unwrap();

    assert_eq!(queue.top().await.unwrap(), 1);
    assert_eq!(queue.pop().await.unwrap(), 1);
    assert_eq!(queue.pop().await.unwrap(), 2);
    assert_eq!(queue.pop().await.unwrap(), 3);
  }

  #[tokio::test]
  async fn test_pop_parks_until_push() {
    let queue: Arc<Queue<u32>> = Arc::new(Queue::new());
    let reader: Arc<Queue<u32>> = Arc::clone(&queue);

    let id = routines::spawn(async move {
      assert_eq!(reader.pop().await.unwrap(), 42);
    });

    routines::yield_now().await;
    queue.push(42).unwrap();
    routines::wait(&id).await;
  }

  #[tokio::test]
  async fn test_break_releases_parked_readers() {
    let queue: Arc<Queue<u32>> = Arc::new(Queue::new());
    let mut group: RoutineHandlerGroup = RoutineHandlerGroup::new();

    for _ in 0..2 {
      let queue = Arc::clone(&queue);

      group.spawn(async move {
        assert_eq!(queue.top().await.unwrap_err().kind(), ErrorKind::PipeBroken);
      });
    }

    routines::yield_now().await;
    queue.break_pipe();
    group.wait().await;
  }

  #[tokio::test]
  async fn test_break_drains_before_failing() {
    let queue: Queue<u32> = Queue::new();

    queue.push(7).unwrap();
    queue.break_with(BeamError::end_of_file());

    assert_eq!(queue.pop().await.unwrap(), 7);
    assert_eq!(queue.pop().await.unwrap_err().kind(), ErrorKind::EndOfFile);
  }

  #[tokio::test]
  async fn test_push_after_break_fails() {
    let queue: Queue<u32> = Queue::new();

    queue.break_pipe();
    assert_eq!(queue.push(1).unwrap_err().kind(), ErrorKind::PipeBroken);
  }

  #[tokio::test]
  async fn test_break_keeps_first_error() {
    let queue: Queue<u32> = Queue::new();

    queue.break_with(BeamError::end_of_file());
    queue.break_pipe();

    assert_eq!(queue.pop().await.unwrap_err().kind(), ErrorKind::EndOfFile);
  }
}
