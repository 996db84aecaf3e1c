use std::pin::Pin;
use std::sync::Arc;

use crate::error::BeamError;
use crate::error::Result;
use crate::queues::Queue;
use crate::queues::QueueWriter;
use crate::queues::ScopedQueueWriter;
use crate::routines;
use crate::routines::RoutineId;

type Task = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
type Slot<T> = Box<dyn Fn(T) -> Task + Send + Sync>;
type BreakSlot = Box<dyn Fn(BeamError) -> Task + Send + Sync>;

// -----------------------------------------------------------------------------
// Routine Task Queue
// -----------------------------------------------------------------------------

/// A queue of tasks drained by a single dedicated routine.
///
/// Handlers fed through [`get_slot`] run one at a time in the drain
/// routine, giving single-threaded semantics without a lock.
///
/// [`get_slot`]: Self::get_slot
pub struct RoutineTaskQueue {
  tasks: Arc<Queue<Task>>,
  drain: RoutineId,
}

impl RoutineTaskQueue {
  /// Constructs the queue and spawns its drain routine.
  pub fn new() -> Self {
    let tasks: Arc<Queue<Task>> = Arc::new(Queue::new());
    let source: Arc<Queue<Task>> = Arc::clone(&tasks);

    let drain: RoutineId = routines::spawn(async move {
      while let Ok(task) = source.pop().await {
        task.await;
      }
    });

    Self { tasks, drain }
  }

  /// Enqueues a task for the drain routine.
  pub fn push<F>(&self, task: F) -> Result<()>
  where
    F: Future<Output = ()> + Send + 'static,
  {
    self.tasks.push(Box::pin(task))
  }

  /// Returns a writer whose values are fed to `slot` in the drain routine.
  pub fn get_slot<T, F, Fut>(&self, slot: F) -> ScopedQueueWriter<T>
  where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.slot_writer(box_slot(slot), None)
  }

  /// Like [`get_slot`], additionally feeding the break error to
  /// `on_break` when the writer's scope ends.
  ///
  /// [`get_slot`]: Self::get_slot
  pub fn get_slot_with_break<T, F, Fut, B, BFut>(&self, slot: F, on_break: B) -> ScopedQueueWriter<T>
  where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
    B: Fn(BeamError) -> BFut + Send + Sync + 'static,
    BFut: Future<Output = ()> + Send + 'static,
  {
    let on_break: BreakSlot = Box::new(move |error| Box::pin(on_break(error)) as Task);
    self.slot_writer(box_slot(slot), Some(on_break))
  }

  /// Breaks the task queue and joins the drain routine.
  ///
  /// Tasks already buffered are still executed before the drain exits.
  pub async fn close(&self) {
    self.tasks.break_pipe();
    routines::wait(&self.drain).await;
  }

  fn slot_writer<T>(&self, slot: Slot<T>, on_break: Option<BreakSlot>) -> ScopedQueueWriter<T>
  where
    T: Send + 'static,
  {
    ScopedQueueWriter::new(Arc::new(TaskSlotWriter {
      tasks: Arc::clone(&self.tasks),
      slot,
      on_break,
    }))
  }
}

impl Default for RoutineTaskQueue {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

#[inline]
fn box_slot<T, F, Fut>(slot: F) -> Slot<T>
where
  T: Send + 'static,
  F: Fn(T) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = ()> + Send + 'static,
{
  Box::new(move |value| Box::pin(slot(value)) as Task)
}

// -----------------------------------------------------------------------------
// Task Slot Writer
// -----------------------------------------------------------------------------

/// Writer that wraps each value in a task invoking the slot handler.
///
/// Breaking the writer only retires this slot; the task queue itself stays
/// open for other slots.
struct TaskSlotWriter<T>
where
  T: Send + 'static,
{
  tasks: Arc<Queue<Task>>,
  slot: Slot<T>,
  on_break: Option<BreakSlot>,
}

impl<T> QueueWriter<T> for TaskSlotWriter<T>
where
  T: Send + 'static,
{
  fn push(&self, value: T) -> Result<()> {
    self.tasks.push((self.slot)(value))
  }

  fn break_with(&self, error: BeamError) {
    if let Some(on_break) = self.on_break.as_ref() {
      let _ = self.tasks.push((on_break)(error));
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
