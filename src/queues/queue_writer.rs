use crate::error::BeamError;
use crate::error::Result;

/// The write side of a queue.
///
/// Pushing never parks the calling routine; it resumes exactly one reader
/// waiting on the target. Writers observe breakage as a failed push.
pub trait QueueWriter<T>: Send + Sync
where
  T: Send + 'static,
{
  /// Appends `value`, resuming one waiting reader.
  ///
  /// # Errors
  ///
  /// Fails with the break error once the target is broken.
  fn push(&self, value: T) -> Result<()>;

  /// Breaks the target: every parked and future reader receives `error`
  /// once the buffered values drain.
  ///
  /// Breaking an already broken target keeps the first error.
  fn break_with(&self, error: BeamError);

  /// Breaks the target with the default [`PipeBroken`] error.
  ///
  /// [`PipeBroken`]: crate::error::ErrorKind::PipeBroken
  fn break_pipe(&self) {
    self.break_with(BeamError::pipe_broken());
  }
}
