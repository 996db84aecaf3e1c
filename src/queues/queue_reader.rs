use async_trait::async_trait;

use crate::error::BeamError;
use crate::error::Result;

/// The read side of a queue.
///
/// `pop` and `top` are suspension points: they park the calling routine
/// while the queue is empty. Once a queue is broken, reads drain the
/// remaining buffer and then fail with the break error.
#[async_trait]
pub trait QueueReader<T>: Send + Sync
where
  T: Clone + Send + 'static,
{
  /// Removes and returns the next value, parking while empty.
  async fn pop(&self) -> Result<T>;

  /// Returns the next value without removing it, parking while empty.
  async fn top(&self) -> Result<T>;

  /// Removes and returns the next value without parking.
  fn try_pop(&self) -> Option<T>;

  /// Returns the next value without removing it and without parking.
  fn try_top(&self) -> Option<T>;

  /// Breaks the queue: every parked and future reader receives `error`
  /// once the buffered values drain.
  fn break_with(&self, error: BeamError);
}
