use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::Ordering;
use tokio::task::futures::TaskLocalFuture;

use crate::routines::suspended_queue::Park;
use crate::routines::suspended_queue::SuspendedRoutineQueue;

// -----------------------------------------------------------------------------
// Task Globals
// -----------------------------------------------------------------------------

tokio::task_local! {
  static CONTEXT: RoutineContext;
}

// -----------------------------------------------------------------------------
// Routine State
// -----------------------------------------------------------------------------

/// Lifecycle state of a routine.
///
/// Transitions are `Pending → Running`, `Running ↔ Suspended`, and a final
/// `→ Complete`; a routine never leaves `Complete`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[repr(u8)]
pub enum RoutineState {
  /// Spawned but not yet executed.
  Pending = 0,
  /// Executing, or ready and awaiting a worker.
  Running = 1,
  /// Parked on a suspension primitive.
  Suspended = 2,
  /// Finished; waiters have been resumed.
  Complete = 3,
}

impl RoutineState {
  #[inline]
  const fn from_bits(bits: u8) -> Self {
    match bits {
      0 => Self::Pending,
      1 => Self::Running,
      2 => Self::Suspended,
      _ => Self::Complete,
    }
  }
}

// -----------------------------------------------------------------------------
// Routine
// -----------------------------------------------------------------------------

/// Shared state of a spawned routine.
///
/// The spawned task itself holds the owning reference for as long as the
/// routine is live; [`RoutineId`] handles hold weak references.
///
/// [`RoutineId`]: crate::routines::RoutineId
#[derive(Debug)]
pub(crate) struct Routine {
  id: u64,
  state: AtomicU8,
  waiters: Mutex<SuspendedRoutineQueue>,
}

impl Routine {
  pub(crate) fn new(id: u64) -> Self {
    Self {
      id,
      state: AtomicU8::new(RoutineState::Pending as u8),
      waiters: Mutex::new(SuspendedRoutineQueue::new()),
    }
  }

  #[inline]
  pub(crate) fn id(&self) -> u64 {
    self.id
  }

  #[inline]
  pub(crate) fn state(&self) -> RoutineState {
    RoutineState::from_bits(self.state.load(Ordering::Acquire))
  }

  #[inline]
  pub(crate) fn set_state(&self, state: RoutineState) {
    self.state.store(state as u8, Ordering::Release);
  }

  /// Parks the current routine until this routine is `Complete`.
  ///
  /// Idempotent once complete.
  pub(crate) async fn wait(&self) {
    loop {
      let slot = {
        let mut waiters = self.waiters.lock();

        if self.state() == RoutineState::Complete {
          return;
        }

        waiters.park_slot()
      };

      Park::new(slot).await;
    }
  }

  /// Marks this routine `Complete` and resumes every waiter.
  ///
  /// The waiters lock orders the state transition against concurrent
  /// `wait` calls so no waiter parks after the final resume.
  pub(crate) fn complete(&self) {
    let mut waiters = self.waiters.lock();
    self.set_state(RoutineState::Complete);
    waiters.resume_all();
  }
}

// -----------------------------------------------------------------------------
// Routine Context
// -----------------------------------------------------------------------------

/// Task-local routine context.
#[derive(Clone, Debug)]
pub(crate) struct RoutineContext {
  pub(crate) routine: Arc<Routine>,
}

/// Binds `future` to the given routine context.
#[inline]
pub(crate) fn scope<F>(context: RoutineContext, future: F) -> TaskLocalFuture<RoutineContext, F>
where
  F: Future,
{
  CONTEXT.scope(context, future)
}

/// Returns the id of the current routine, or `0` outside a routine.
#[inline]
pub(crate) fn current_id() -> u64 {
  CONTEXT
    .try_with(|context| context.routine.id())
    .unwrap_or(0)
}

/// Updates the current routine's state, if called from within a routine.
#[inline]
pub(crate) fn set_current_state(state: RoutineState) {
  let _ = CONTEXT.try_with(|context| context.routine.set_state(state));
}
