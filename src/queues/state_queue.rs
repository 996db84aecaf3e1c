use async_trait::async_trait;
use parking_lot::Mutex as SpinMutex;

use crate::error::BeamError;
use crate::error::Result;
use crate::queues::QueueReader;
use crate::queues::QueueWriter;
use crate::routines::Park;
use crate::routines::SuspendedRoutineQueue;

/// A queue holding at most the most recently pushed value.
///
/// A push overwrites any value that was not yet read; `pop` waits for the
/// next write after the most recent `pop`. Useful for state streams where
/// only the latest value matters.
#[derive(Debug)]
pub struct StateQueue<T> {
  core: SpinMutex<StateCore<T>>,
}

#[derive(Debug)]
struct StateCore<T> {
  value: Option<T>,
  breach: Option<BeamError>,
  readers: SuspendedRoutineQueue,
}

impl<T> StateQueue<T>
where
  T: Send + 'static,
{
  /// Constructs an empty state queue.
  pub fn new() -> Self {
    Self {
      core: SpinMutex::new(StateCore {
        value: None,
        breach: None,
        readers: SuspendedRoutineQueue::new(),
      }),
    }
  }

  /// Replaces the stored value, resuming one waiting reader.
  pub fn push(&self, value: T) -> Result<()> {
    let mut core = self.core.lock();

    if let Some(error) = core.breach.as_ref() {
      return Err(error.clone());
    }

    core.value = Some(value);
    core.readers.resume_front();

    Ok(())
  }

  /// Takes the most recent value, parking until one is available.
  pub async fn pop(&self) -> Result<T> {
    loop {
      let slot = {
        let mut core = self.core.lock();

        if let Some(value) = core.value.take() {
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

  /// Takes the most recent value without parking.
  pub fn try_pop(&self) -> Option<T> {
    self.core.lock().value.take()
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
}

impl<T> StateQueue<T>
where
  T: Clone + Send + 'static,
{
  /// Reads the most recent value without taking it, parking until one is
  /// available.
  pub async fn top(&self) -> Result<T> {
    loop {
      let slot = {
        let mut core = self.core.lock();

        if let Some(value) = core.value.as_ref() {
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

  /// Reads the most recent value without taking it and without parking.
  pub fn try_top(&self) -> Option<T> {
    self.core.lock().value.clone()
  }
}

impl<T> Default for StateQueue<T>
where
  T: Send + 'static,
{
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl<T> QueueWriter<T> for StateQueue<T>
where
  T: Send + 'static,
{
  fn push(&self, value: T) -> Result<()> {
    StateQueue::push(self, value)
  }

  fn break_with(&self, error: BeamError) {
    StateQueue::break_with(self, error);
  }
}

#[async_trait]
impl<T> QueueReader<T> for StateQueue<T>
where
  T: Clone + Send + 'static,
{
  async fn pop(&self) -> Result<T> {
    StateQueue::pop(self).await
  }

  async fn top(&self) -> Result<T> {
    StateQueue::top(self).await
  }

  fn try_pop(&self) -> Option<T> {
    StateQueue::try_pop(self)
  }

  fn try_top(&self) -> Option<T> {
    StateQueue::try_top(self)
  }

  fn break_with(&self, error: BeamError) {
    StateQueue::break_with(self, error);
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::error::ErrorKind;
  use crate::queues::StateQueue;

  #[tokio::test]
  async fn test_last_value_wins() {
    let queue: StateQueue<u32> = StateQueue::new();

    queue.push(1).unwrap();
    queue.push(2).unwrap();
    queue.push(3).unwrap();

    assert_eq!(queue.pop().await.unwrap(), 3);
    assert_eq!(queue.try_pop(), None);
  }

  #[tokio::test]
  async fn test_pop_waits_for_next_write() {
    let queue: StateQueue<u32> = StateQueue::new();

    queue.push(1).unwrap();
    assert_eq!(queue.pop().await.unwrap(), 1);

    queue.push(2).unwrap();
    assert_eq!(queue.pop().await.unwrap(), 2);
  }

  #[tokio::test]
  async fn test_break_after_drain() {
    let queue: StateQueue<u32> = StateQueue::new();

    queue.push(9).unwrap();
    queue.break_pipe();

    assert_eq!(queue.pop().await.unwrap(), 9);
    assert_eq!(queue.pop().await.unwrap_err().kind(), ErrorKind::PipeBroken);
  }
}
