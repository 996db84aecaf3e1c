use hashbrown::HashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use tokio::task;
use tokio::task::JoinHandle;

use crate::consts::CAP_ROUTINE_TABLE;
use crate::routines::RoutineId;
use crate::routines::RoutineState;
use crate::routines::routine;
use crate::routines::routine::Routine;
use crate::routines::routine::RoutineContext;

// -----------------------------------------------------------------------------
// Scheduler
// -----------------------------------------------------------------------------

/// Process-wide routine registry and id mint.
///
/// Kernel threads come from the tokio runtime the routines are spawned
/// onto; the scheduler tracks the routines themselves.
struct Scheduler {
  next_id: AtomicU64,
  routines: RwLock<HashMap<u64, Arc<Routine>>>,
}

static SCHEDULER: LazyLock<Scheduler> = LazyLock::new(|| Scheduler {
  next_id: AtomicU64::new(0),
  routines: RwLock::new(HashMap::with_capacity(CAP_ROUTINE_TABLE)),
});

impl Scheduler {
  fn insert(&self, routine: &Arc<Routine>) {
    self.routines.write().insert(routine.id(), Arc::clone(routine));
  }

  fn remove(&self, id: u64) {
    if self.routines.write().remove(&id).is_none() {
      tracing::error!(id, "dangling routine");
    }
  }
}

// -----------------------------------------------------------------------------
// Spawn
// -----------------------------------------------------------------------------

/// Spawns a routine executing `future`.
///
/// The routine starts `Pending`, transitions to `Running` on its first
/// poll, and completes when the future returns. A panic in the future is
/// logged and treated as normal completion; panics never cross the
/// scheduler boundary.
///
/// Safe to call from any thread of the runtime, including from within
/// another routine.
///
/// # Panics
///
/// Panics if called outside a tokio runtime.
pub fn spawn<F>(future: F) -> RoutineId
where
  F: Future<Output = ()> + Send + 'static,
{
  let id: u64 = SCHEDULER.next_id.fetch_add(1, Ordering::Relaxed) + 1;
  let data: Arc<Routine> = Arc::new(Routine::new(id));

  SCHEDULER.insert(&data);

  let handle: RoutineId = RoutineId::new(&data);

  let context: RoutineContext = RoutineContext {
    routine: Arc::clone(&data),
  };

  let scoped = routine::scope(context, async move {
    routine::set_current_state(RoutineState::Running);
    future.await;
  });

  // The task boundary contains panics; the supervisor observes them
  // through the join handle and still completes the routine.
  let task: JoinHandle<()> = task::spawn(scoped);

  task::spawn(async move {
    if let Err(error) = task.await {
      if error.is_panic() {
        let payload: Box<dyn Any + Send> = error.into_panic();
        tracing::error!(id, panic = payload_text(payload.as_ref()), "routine panicked");
      }
    }

    data.complete();
    SCHEDULER.remove(id);

    tracing::trace!(id, "routine complete");
  });

  handle
}

/// Extracts a readable message from a panic payload.
fn payload_text(payload: &(dyn Any + Send)) -> &str {
  payload
    .downcast_ref::<&'static str>()
    .copied()
    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
    .unwrap_or("routine panicked")
}

/// Parks the current routine until the routine behind `id` completes.
///
/// Returns immediately for a detached or already complete handle.
pub async fn wait(id: &RoutineId) {
  if let Some(routine) = id.routine() {
    routine.wait().await;
  }
}

/// Returns the id of the calling routine, or `0` outside a routine.
#[inline]
pub fn current_id() -> u64 {
  routine::current_id()
}

/// Yields execution of the current routine back to the scheduler.
///
/// The routine is re-queued and remains `Running`.
pub async fn yield_now() {
  task::yield_now().await;
}

/// Returns the number of live routines.
pub fn routine_count() -> usize {
  SCHEDULER.routines.read().len()
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::sync::atomic::AtomicBool;
  use std::sync::atomic::Ordering;

  use crate::routines;
  use crate::routines::RoutineState;

  #[tokio::test]
  async fn test_spawn_and_wait() {
    let done: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
    let flag: Arc<AtomicBool> = Arc::clone(&done);

    let id = routines::spawn(async move {
      flag.store(true, Ordering::SeqCst);
    });

    routines::wait(&id).await;

    assert!(done.load(Ordering::SeqCst));
    assert_eq!(id.state(), RoutineState::Complete);
  }

  #[tokio::test]
  async fn test_wait_is_idempotent() {
    let id = routines::spawn(async {});

    routines::wait(&id).await;
    routines::wait(&id).await;

    assert_eq!(id.state(), RoutineState::Complete);
  }

  #[tokio::test]
  async fn test_ids_are_monotone() {
    let first = routines::spawn(async {});
    let second = routines::spawn(async {});

    assert!(second.id() > first.id());

    routines::wait(&first).await;
    routines::wait(&second).await;
  }

  #[tokio::test]
  async fn test_panic_is_contained() {
    let id = routines::spawn(async {
      panic!("user code exploded");
    });

    // A panicking routine still completes and resumes its waiters.
    routines::wait(&id).await;
    assert_eq!(id.state(), RoutineState::Complete);
  }

  #[tokio::test]
  async fn test_spawn_from_routine() {
    let outer = routines::spawn(async {
      let inner = routines::spawn(async {});
      routines::wait(&inner).await;
    });

    routines::wait(&outer).await;
  }
}
