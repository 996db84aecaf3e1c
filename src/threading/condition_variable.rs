use parking_lot::Mutex as SpinMutex;

use crate::routines::Park;
use crate::routines::SuspendedRoutineQueue;
use crate::threading::Mutex;
use crate::threading::MutexGuard;

/// A condition variable that suspends the current routine.
///
/// `wait` enqueues the routine before releasing the supplied guard, so a
/// notification arriving between the release and the park still resumes
/// the waiter.
#[derive(Debug, Default)]
pub struct ConditionVariable {
  waiters: SpinMutex<SuspendedRoutineQueue>,
}

impl ConditionVariable {
  /// Constructs a ConditionVariable.
  pub fn new() -> Self {
    Self {
      waiters: SpinMutex::new(SuspendedRoutineQueue::new()),
    }
  }

  /// Parks the current routine until a notification is received.
  ///
  /// Releases `guard` atomically with the park and reacquires the mutex
  /// before returning.
  pub async fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    let mutex: &'a Mutex<T> = guard.mutex();
    let slot = self.waiters.lock().park_slot();

    drop(guard);
    Park::new(slot).await;

    mutex.lock().await
  }

  /// Resumes a single suspended routine.
  pub fn notify_one(&self) {
    self.waiters.lock().resume_front();
  }

  /// Resumes every suspended routine.
  pub fn notify_all(&self) {
    self.waiters.lock().resume_all();
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
  use crate::threading::ConditionVariable;
  use crate::threading::Mutex;

  struct Gate {
    open: Mutex<bool>,
    cond: ConditionVariable,
  }

  #[tokio::test]
  async fn test_notify_one() {
    let gate: Arc<Gate> = Arc::new(Gate {
      open: Mutex::new(false),
      cond: ConditionVariable::new(),
    });

    let waiter_gate = Arc::clone(&gate);

    let waiter = routines::spawn(async move {
      let mut open = waiter_gate.open.lock().await;

      while !*open {
        open = waiter_gate.cond.wait(open).await;
      }
    });

    routines::yield_now().await;

    *gate.open.lock().await = true;
    gate.cond.notify_one();

    routines::wait(&waiter).await;
  }

  #[tokio::test]
  async fn test_notify_all() {
    let gate: Arc<Gate> = Arc::new(Gate {
      open: Mutex::new(false),
      cond: ConditionVariable::new(),
    });

    let mut group: RoutineHandlerGroup = RoutineHandlerGroup::new();

    for _ in 0..3 {
      let gate = Arc::clone(&gate);

      group.spawn(async move {
        let mut open = gate.open.lock().await;

        while !*open {
          open = gate.cond.wait(open).await;
        }
      });
    }

    routines::yield_now().await;

    *gate.open.lock().await = true;
    gate.cond.notify_all();

    group.wait().await;
  }
}
