use std::sync::Arc;
use std::sync::Weak;

use crate::routines::RoutineState;
use crate::routines::routine::Routine;

/// A weak handle to a spawned routine.
///
/// Ids are 64-bit, monotonically increasing, and never reused within a
/// process. Id `0` refers to no routine. The handle does not keep the
/// routine alive; it observes the routine's state and supports waiting for
/// completion through [`RoutineHandler`].
///
/// [`RoutineHandler`]: crate::routines::RoutineHandler
#[derive(Clone, Debug, Default)]
pub struct RoutineId {
  id: u64,
  routine: Weak<Routine>,
}

impl RoutineId {
  /// Returns a RoutineId referring to no routine.
  #[inline]
  pub fn none() -> Self {
    Self::default()
  }

  pub(crate) fn new(routine: &Arc<Routine>) -> Self {
    Self {
      id: routine.id(),
      routine: Arc::downgrade(routine),
    }
  }

  /// Returns the numeric id, `0` if detached.
  #[inline]
  pub const fn id(&self) -> u64 {
    self.id
  }

  /// Returns `true` if this handle refers to no routine.
  #[inline]
  pub const fn is_detached(&self) -> bool {
    self.id == 0
  }

  /// Returns the routine's current state.
  ///
  /// A routine whose task has fully unwound reports `Complete`.
  pub fn state(&self) -> RoutineState {
    match self.routine.upgrade() {
      Some(routine) => routine.state(),
      None => RoutineState::Complete,
    }
  }

  pub(crate) fn routine(&self) -> Option<Arc<Routine>> {
    self.routine.upgrade()
  }

  /// Detaches this handle from its routine.
  pub fn detach(&mut self) {
    self.id = 0;
    self.routine = Weak::new();
  }
}

impl PartialEq for RoutineId {
  #[inline]
  fn eq(&self, other: &Self) -> bool {
    self.id == other.id
  }
}

impl Eq for RoutineId {}
