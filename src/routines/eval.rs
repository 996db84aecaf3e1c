use parking_lot::Mutex;
use triomphe::Arc;

use crate::error::BeamError;
use crate::error::Result;
use crate::routines::suspended_queue::Park;
use crate::routines::suspended_queue::SuspendedRoutineQueue;

// -----------------------------------------------------------------------------
// Async State
// -----------------------------------------------------------------------------

#[derive(Debug)]
struct AsyncInner<T> {
  value: Option<Result<T>>,
  waiters: SuspendedRoutineQueue,
  eval_taken: bool,
}

#[derive(Debug)]
struct AsyncState<T> {
  inner: Mutex<AsyncInner<T>>,
}

impl<T> AsyncState<T> {
  fn fulfil(&self, value: Result<T>) -> bool {
    let mut inner = self.inner.lock();

    if inner.value.is_some() {
      return false;
    }

    inner.value = Some(value);
    inner.waiters.resume_all();

    true
  }
}

// -----------------------------------------------------------------------------
// Async
// -----------------------------------------------------------------------------

/// The read side of a one-shot future.
///
/// [`get`] parks the calling routine until the paired [`Eval`] sets a
/// result or an error; every concurrent getter is resumed by the set.
///
/// [`get`]: Self::get
#[derive(Debug)]
pub struct Async<T> {
  state: Arc<AsyncState<T>>,
}

impl<T> Async<T>
where
  T: Clone,
{
  /// Constructs an unfulfilled Async.
  pub fn new() -> Self {
    Self {
      state: Arc::new(AsyncState {
        inner: Mutex::new(AsyncInner {
          value: None,
          waiters: SuspendedRoutineQueue::new(),
          eval_taken: false,
        }),
      }),
    }
  }

  /// Returns the single writer paired with this Async.
  ///
  /// # Panics
  ///
  /// Panics if the eval was already taken; there is exactly one writer.
  pub fn eval(&self) -> Eval<T> {
    let mut inner = self.state.inner.lock();

    assert!(!inner.eval_taken, "eval already taken");
    inner.eval_taken = true;

    Eval {
      state: Arc::clone(&self.state),
    }
  }

  /// Parks the current routine until a result is available.
  pub async fn get(&self) -> Result<T> {
    loop {
      let slot = {
        let mut inner = self.state.inner.lock();

        if let Some(value) = inner.value.as_ref() {
          return value.clone();
        }

        inner.waiters.park_slot()
      };

      Park::new(slot).await;
    }
  }

  /// Returns the result if one has been set.
  pub fn try_get(&self) -> Option<Result<T>> {
    self.state.inner.lock().value.clone()
  }
}

impl<T> Clone for Async<T> {
  fn clone(&self) -> Self {
    Self {
      state: Arc::clone(&self.state),
    }
  }
}

impl<T> Default for Async<T>
where
  T: Clone,
{
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

// -----------------------------------------------------------------------------
// Eval
// -----------------------------------------------------------------------------

/// The one-shot write side of an [`Async`].
///
/// Dropping an unset eval breaks the pipe: every getter resumes with
/// [`PipeBroken`] rather than parking forever.
///
/// [`PipeBroken`]: crate::error::ErrorKind::PipeBroken
#[derive(Debug)]
pub struct Eval<T> {
  state: Arc<AsyncState<T>>,
}

impl<T> Eval<T> {
  /// Fulfils the Async with `value`, resuming every getter.
  pub fn set(self, value: T) {
    self.state.fulfil(Ok(value));
  }

  /// Fails the Async with `error`, resuming every getter.
  pub fn set_error(self, error: BeamError) {
    self.state.fulfil(Err(error));
  }
}

impl<T> Drop for Eval<T> {
  fn drop(&mut self) {
    self.state.fulfil(Err(BeamError::pipe_broken()));
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc as StdArc;

  use crate::error::ErrorKind;
  use crate::routines;
  use crate::routines::Async;
  use crate::routines::RoutineHandlerGroup;

  #[tokio::test]
  async fn test_set_resumes_all_getters() {
    let value: StdArc<Async<u32>> = StdArc::new(Async::new());
    let eval = value.eval();

    let mut group: RoutineHandlerGroup = RoutineHandlerGroup::new();

    for _ in 0..3 {
      let value = StdArc::clone(&value);

      group.spawn(async move {
        assert_eq!(value.get().await.unwrap(), 99);
      });
    }

    routines::yield_now().await;
    eval.set(99);
    group.wait().await;
  }

  #[tokio::test]
  async fn test_set_error() {
    let value: Async<u32> = Async::new();
    value.eval().set_error(crate::error::BeamError::service_request("nope"));

    assert_eq!(value.get().await.unwrap_err().kind(), ErrorKind::ServiceRequest);
  }

  #[tokio::test]
  async fn test_dropped_eval_breaks_pipe() {
    let value: Async<u32> = Async::new();
    drop(value.eval());

    assert_eq!(value.get().await.unwrap_err().kind(), ErrorKind::PipeBroken);
  }

  #[tokio::test]
  async fn test_get_after_set() {
    let value: Async<&'static str> = Async::new();
    value.eval().set("done");

    assert_eq!(value.get().await.unwrap(), "done");
    assert_eq!(value.try_get().unwrap().unwrap(), "done");
  }
}
