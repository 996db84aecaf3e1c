use crate::routines::RoutineId;
use crate::routines::scheduler;

// -----------------------------------------------------------------------------
// Routine Handler
// -----------------------------------------------------------------------------

/// Owns a [`RoutineId`] and waits for its completion.
///
/// Unlike a bare id, a handler expresses intent: the holder is responsible
/// for joining the routine. Dropping a handler without waiting detaches
/// the routine, which keeps running to completion unobserved.
#[derive(Debug, Default)]
pub struct RoutineHandler {
  id: RoutineId,
}

impl RoutineHandler {
  /// Constructs a handler managing no routine.
  #[inline]
  pub fn new() -> Self {
    Self::default()
  }

  /// Returns the managed routine's id.
  #[inline]
  pub fn id(&self) -> &RoutineId {
    &self.id
  }

  /// Detaches the current routine from this handler.
  pub fn detach(&mut self) {
    self.id.detach();
  }

  /// Waits for the completion of the managed routine, then detaches.
  ///
  /// Returns immediately when no routine is managed.
  pub async fn wait(&mut self) {
    if self.id.is_detached() {
      return;
    }

    scheduler::wait(&self.id).await;
    self.id.detach();
  }

  /// Assigns a new routine, waiting for the previous one first.
  pub async fn assign(&mut self, id: RoutineId) {
    if self.id == id {
      return;
    }

    self.wait().await;
    self.id = id;
  }
}

impl From<RoutineId> for RoutineHandler {
  #[inline]
  fn from(id: RoutineId) -> Self {
    Self { id }
  }
}

// -----------------------------------------------------------------------------
// Routine Handler Group
// -----------------------------------------------------------------------------

/// A batch of [`RoutineHandler`]s joined together.
#[derive(Debug, Default)]
pub struct RoutineHandlerGroup {
  handlers: Vec<RoutineHandler>,
}

impl RoutineHandlerGroup {
  /// Constructs an empty group.
  #[inline]
  pub fn new() -> Self {
    Self::default()
  }

  /// Adds a routine to the group.
  pub fn add(&mut self, id: RoutineId) {
    self.handlers.push(RoutineHandler::from(id));
  }

  /// Spawns a routine directly into the group.
  pub fn spawn<F>(&mut self, future: F)
  where
    F: Future<Output = ()> + Send + 'static,
  {
    self.add(crate::routines::spawn(future));
  }

  /// Waits for every routine in the group, draining it.
  pub async fn wait(&mut self) {
    for handler in self.handlers.iter_mut() {
      handler.wait().await;
    }

    self.handlers.clear();
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::sync::Arc;
  use std::sync::atomic::AtomicUsize;
  use std::sync::atomic::Ordering;

  use crate::routines;
  use crate::routines::RoutineHandler;
  use crate::routines::RoutineHandlerGroup;

  #[tokio::test]
  async fn test_handler_wait() {
    let mut handler: RoutineHandler = RoutineHandler::from(routines::spawn(async {}));

    handler.wait().await;
    assert!(handler.id().is_detached());

    // A second wait is a no-op.
    handler.wait().await;
  }

  #[tokio::test]
  async fn test_group_wait() {
    let count: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    let mut group: RoutineHandlerGroup = RoutineHandlerGroup::new();

    for _ in 0..4 {
      let count = Arc::clone(&count);

      group.spawn(async move {
        count.fetch_add(1, Ordering::SeqCst);
      });
    }

    group.wait().await;
    assert_eq!(count.load(Ordering::SeqCst), 4);
  }
}
