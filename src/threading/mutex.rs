use parking_lot::Mutex as SpinMutex;
use std::cell::UnsafeCell;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::ops::Deref;
use std::ops::DerefMut;

use crate::routines::Park;
use crate::routines::SuspendedRoutineQueue;

// -----------------------------------------------------------------------------
// Mutex
// -----------------------------------------------------------------------------

/// A mutex that suspends the contending routine instead of blocking the
/// thread.
///
/// Unlocking hands the mutex directly to the routine at the head of the
/// waiter queue, so acquisition under contention is strictly FIFO and a
/// late `try_lock` cannot barge in front of a parked routine.
pub struct Mutex<T> {
  state: SpinMutex<MutexState>,
  value: UnsafeCell<T>,
}

#[derive(Debug)]
struct MutexState {
  locked: bool,
  waiters: SuspendedRoutineQueue,
}

// SAFETY: The mutex provides exclusive access to the inner value across
//         threads; sharing requires the value itself to be sendable.
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
  /// Constructs an unlocked mutex holding `value`.
  pub fn new(value: T) -> Self {
    Self {
      state: SpinMutex::new(MutexState {
        locked: false,
        waiters: SuspendedRoutineQueue::new(),
      }),
      value: UnsafeCell::new(value),
    }
  }

  /// Acquires the mutex, parking the current routine on contention.
  pub async fn lock(&self) -> MutexGuard<'_, T> {
    let slot = {
      let mut state = self.state.lock();

      if !state.locked {
        state.locked = true;
        return MutexGuard { mutex: self };
      }

      state.waiters.park_slot()
    };

    Park::new(slot).await;

    // The unlocking routine handed ownership to this slot.
    MutexGuard { mutex: self }
  }

  /// Acquires the mutex without parking.
  ///
  /// Returns `None` if the mutex is held.
  pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
    let mut state = self.state.lock();

    if state.locked {
      return None;
    }

    state.locked = true;
    Some(MutexGuard { mutex: self })
  }

  /// Consumes the mutex, returning the inner value.
  pub fn into_inner(self) -> T {
    self.value.into_inner()
  }

  fn unlock(&self) {
    let mut state = self.state.lock();

    if state.waiters.resume_front().is_none() {
      state.locked = false;
    }

    // A resumed waiter inherits the lock; `locked` stays set.
  }
}

impl<T: Debug> Debug for Mutex<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    match self.try_lock() {
      Some(guard) => f.debug_tuple("Mutex").field(&*guard).finish(),
      None => f.write_str("Mutex(<locked>)"),
    }
  }
}

impl<T: Default> Default for Mutex<T> {
  #[inline]
  fn default() -> Self {
    Self::new(T::default())
  }
}

// -----------------------------------------------------------------------------
// Mutex Guard
// -----------------------------------------------------------------------------

/// RAII guard granting access to the value behind a [`Mutex`].
pub struct MutexGuard<'a, T> {
  mutex: &'a Mutex<T>,
}

impl<'a, T> MutexGuard<'a, T> {
  pub(crate) fn mutex(&self) -> &'a Mutex<T> {
    self.mutex
  }
}

impl<T> Deref for MutexGuard<'_, T> {
  type Target = T;

  #[inline]
  fn deref(&self) -> &Self::Target {
    // SAFETY: The guard proves exclusive ownership of the mutex.
    unsafe { &*self.mutex.value.get() }
  }
}

impl<T> DerefMut for MutexGuard<'_, T> {
  #[inline]
  fn deref_mut(&mut self) -> &mut Self::Target {
    // SAFETY: The guard proves exclusive ownership of the mutex.
    unsafe { &mut *self.mutex.value.get() }
  }
}

impl<T> Drop for MutexGuard<'_, T> {
  fn drop(&mut self) {
    self.mutex.unlock();
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use crate::routines;
  use crate::routines::RoutineHandlerGroup;
  use crate::threading::Mutex;

  #[tokio::test]
  async fn test_exclusive_access() {
    let counter: Arc<Mutex<u64>> = Arc::new(Mutex::new(0));
    let mut group: RoutineHandlerGroup = RoutineHandlerGroup::new();

    for _ in 0..8 {
      let counter = Arc::clone(&counter);

      group.spawn(async move {
        for _ in 0..100 {
          let mut guard = counter.lock().await;
          *guard += 1;
        }
      });
    }

    group.wait().await;
    assert_eq!(*counter.lock().await, 800);
  }

  #[tokio::test]
  async fn test_try_lock_contended() {
    let mutex: Mutex<()> = Mutex::new(());

    let guard = mutex.lock().await;
    assert!(mutex.try_lock().is_none());

    drop(guard);
    assert!(mutex.try_lock().is_some());
  }

  #[tokio::test]
  async fn test_handoff_on_unlock() {
    let mutex: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    let held = mutex.lock().await;
    let contender = Arc::clone(&mutex);

    let id = routines::spawn(async move {
      contender.lock().await.push(1);
    });

    routines::yield_now().await;
    drop(held);

    routines::wait(&id).await;
    assert_eq!(*mutex.lock().await, vec![1]);
  }
}
