use parking_lot::Mutex;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::task::Waker;
use triomphe::Arc;

use crate::routines::RoutineState;
use crate::routines::routine;

// -----------------------------------------------------------------------------
// Park Slot
// -----------------------------------------------------------------------------

/// A single parked routine.
///
/// At most one live slot exists per routine at a time: a routine creates a
/// slot while holding the owning primitive's lock, releases that lock, and
/// then awaits [`Park`]. Resuming the slot is the only way the park ends.
#[derive(Debug)]
pub(crate) struct ParkSlot {
  routine: u64,
  state: Mutex<SlotState>,
}

#[derive(Debug)]
struct SlotState {
  resumed: bool,
  waker: Option<Waker>,
}

impl ParkSlot {
  fn new() -> Arc<Self> {
    Arc::new(Self {
      routine: routine::current_id(),
      state: Mutex::new(SlotState {
        resumed: false,
        waker: None,
      }),
    })
  }

  /// Returns the id of the routine parked on this slot.
  #[inline]
  pub(crate) fn routine(&self) -> u64 {
    self.routine
  }

  fn resume(&self) {
    let waker: Option<Waker> = {
      let mut state = self.state.lock();
      state.resumed = true;
      state.waker.take()
    };

    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

// -----------------------------------------------------------------------------
// Park
// -----------------------------------------------------------------------------

/// Future that parks the current routine until its slot is resumed.
///
/// The routine's public state is `Suspended` while parked and returns to
/// `Running` when the slot is resumed.
#[derive(Debug)]
#[repr(transparent)]
pub(crate) struct Park {
  slot: Arc<ParkSlot>,
}

impl Park {
  #[inline]
  pub(crate) fn new(slot: Arc<ParkSlot>) -> Self {
    Self { slot }
  }
}

impl Future for Park {
  type Output = ();

  fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
    let mut state = self.slot.state.lock();

    if state.resumed {
      drop(state);
      routine::set_current_state(RoutineState::Running);
      Poll::Ready(())
    } else {
      state.waker = Some(context.waker().clone());
      drop(state);
      routine::set_current_state(RoutineState::Suspended);
      Poll::Pending
    }
  }
}

// -----------------------------------------------------------------------------
// Suspended Routine Queue
// -----------------------------------------------------------------------------

/// FIFO of parked routines.
///
/// Every suspendable primitive owns one of these behind its own lock.
/// Resumption order is strictly the order in which routines parked.
#[derive(Debug, Default)]
pub(crate) struct SuspendedRoutineQueue {
  waiters: VecDeque<Arc<ParkSlot>>,
}

impl SuspendedRoutineQueue {
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      waiters: VecDeque::new(),
    }
  }

  /// Appends a slot for the current routine and returns it.
  ///
  /// The caller must release the primitive's lock before awaiting
  /// [`Park`] on the returned slot.
  pub(crate) fn park_slot(&mut self) -> Arc<ParkSlot> {
    let slot: Arc<ParkSlot> = ParkSlot::new();
    self.waiters.push_back(Arc::clone(&slot));
    slot
  }

  /// Resumes the routine at the head of the queue.
  ///
  /// Returns the resumed slot, or `None` if the queue was empty.
  pub(crate) fn resume_front(&mut self) -> Option<Arc<ParkSlot>> {
    let slot: Arc<ParkSlot> = self.waiters.pop_front()?;
    slot.resume();
    Some(slot)
  }

  /// Resumes every parked routine, in FIFO order.
  pub(crate) fn resume_all(&mut self) {
    while self.resume_front().is_some() {}
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.waiters.is_empty()
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.waiters.len()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use parking_lot::Mutex;
  use std::sync::Arc as StdArc;
  use std::sync::atomic::AtomicUsize;
  use std::sync::atomic::Ordering;
  use std::time::Duration;

  use crate::routines::suspended_queue::Park;
  use crate::routines::suspended_queue::SuspendedRoutineQueue;

  #[tokio::test]
  async fn test_resume_before_park() {
    let mut queue: SuspendedRoutineQueue = SuspendedRoutineQueue::new();
    let slot = queue.park_slot();

    assert!(queue.resume_front().is_some());

    // The slot was resumed before the park began; the future is ready.
    Park::new(slot).await;
  }

  #[tokio::test]
  async fn test_fifo_resumption() {
    let queue: StdArc<Mutex<SuspendedRoutineQueue>> =
      StdArc::new(Mutex::new(SuspendedRoutineQueue::new()));
    let order: StdArc<Mutex<Vec<usize>>> = StdArc::new(Mutex::new(Vec::new()));
    let parked: StdArc<AtomicUsize> = StdArc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();

    for index in 0..3 {
      let queue = StdArc::clone(&queue);
      let order = StdArc::clone(&order);
      let parked_task = StdArc::clone(&parked);

      tasks.push(tokio::spawn(async move {
        let slot = queue.lock().park_slot();
        parked_task.fetch_add(1, Ordering::SeqCst);
        Park::new(slot).await;
        order.lock().push(index);
      }));

      // Park in a deterministic order.
      while parked.load(Ordering::SeqCst) <= index {
        tokio::time::sleep(Duration::from_millis(1)).await;
      }
    }

    queue.lock().resume_all();

    for task in tasks {
      task.await.unwrap();
    }

    // FIFO: resumption wakes in park order; each task records after waking.
    assert_eq!(queue.lock().len(), 0);
    assert_eq!(*order.lock(), vec![0, 1, 2]);
  }
}
