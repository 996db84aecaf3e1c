use parking_lot::Mutex as SpinMutex;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use crate::routines;
use crate::routines::Park;
use crate::routines::SuspendedRoutineQueue;

// -----------------------------------------------------------------------------
// Recursive Mutex
// -----------------------------------------------------------------------------

/// A mutex the owning routine may re-acquire without parking.
///
/// Tracks `(owner, depth)`: a relock by the owner increments the depth,
/// and dropping the final guard hands the mutex to the routine at the head
/// of the waiter queue. `depth > 0` if and only if an owner is recorded.
///
/// Recursion is identified by routine id; callers outside a routine can
/// hold the mutex but cannot re-enter it.
pub struct RecursiveMutex {
  state: SpinMutex<RecursiveState>,
}

#[derive(Debug)]
struct RecursiveState {
  owner: Option<u64>,
  depth: u32,
  waiters: SuspendedRoutineQueue,
}

impl RecursiveMutex {
  /// Constructs an unlocked recursive mutex.
  pub fn new() -> Self {
    Self {
      state: SpinMutex::new(RecursiveState {
        owner: None,
        depth: 0,
        waiters: SuspendedRoutineQueue::new(),
      }),
    }
  }

  /// Acquires the mutex, parking on contention with another routine.
  pub async fn lock(&self) -> RecursiveMutexGuard<'_> {
    let current: u64 = routines::current_id();

    let slot = {
      let mut state = self.state.lock();

      if state.owner.is_none() {
        state.owner = Some(current);
        state.depth = 1;
        return RecursiveMutexGuard { mutex: self };
      }

      if current != 0 && state.owner == Some(current) {
        state.depth += 1;
        return RecursiveMutexGuard { mutex: self };
      }

      state.waiters.park_slot()
    };

    Park::new(slot).await;

    // The unlocking routine recorded this slot's routine as the new owner.
    RecursiveMutexGuard { mutex: self }
  }

  /// Acquires the mutex without parking.
  pub fn try_lock(&self) -> Option<RecursiveMutexGuard<'_>> {
    let current: u64 = routines::current_id();
    let mut state = self.state.lock();

    if state.owner.is_none() {
      state.owner = Some(current);
      state.depth = 1;
      return Some(RecursiveMutexGuard { mutex: self });
    }

    if current != 0 && state.owner == Some(current) {
      state.depth += 1;
      return Some(RecursiveMutexGuard { mutex: self });
    }

    None
  }

  fn unlock(&self) {
    let mut state = self.state.lock();

    debug_assert!(state.depth > 0, "unlock of unowned recursive mutex");

    state.depth -= 1;

    if state.depth > 0 {
      return;
    }

    match state.waiters.resume_front() {
      Some(slot) => {
        state.owner = Some(slot.routine());
        state.depth = 1;
      }
      None => {
        state.owner = None;
      }
    }
  }
}

impl Debug for RecursiveMutex {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    let state = self.state.lock();

    f.debug_struct("RecursiveMutex")
      .field("owner", &state.owner)
      .field("depth", &state.depth)
      .finish()
  }
}

impl Default for RecursiveMutex {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

// -----------------------------------------------------------------------------
// Recursive Mutex Guard
// -----------------------------------------------------------------------------

/// RAII guard for one acquisition depth of a [`RecursiveMutex`].
#[derive(Debug)]
pub struct RecursiveMutexGuard<'a> {
  mutex: &'a RecursiveMutex,
}

impl Drop for RecursiveMutexGuard<'_> {
  fn drop(&mut self) {
    self.mutex.unlock();
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
