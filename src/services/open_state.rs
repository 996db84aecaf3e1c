use parking_lot::Mutex as SpinMutex;

// -----------------------------------------------------------------------------
// Open Phase
// -----------------------------------------------------------------------------

/// Lifecycle phase of a channel or server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OpenPhase {
  Closed,
  Opening,
  Open,
  Closing,
}

// -----------------------------------------------------------------------------
// Open State
// -----------------------------------------------------------------------------

/// Tracks the `Closed → Opening → Open → Closing → Closed` lifecycle.
///
/// Transitions only move forward; a closed state may begin a fresh cycle.
#[derive(Debug)]
pub struct OpenState {
  phase: SpinMutex<OpenPhase>,
}

impl OpenState {
  /// Constructs a state in the `Closed` phase.
  pub fn new() -> Self {
    Self {
      phase: SpinMutex::new(OpenPhase::Closed),
    }
  }

  /// Begins opening.
  ///
  /// Returns `true` if the caller won the transition and should perform
  /// the initialization.
  pub fn set_opening(&self) -> bool {
    let mut phase = self.phase.lock();

    if *phase == OpenPhase::Closed {
      *phase = OpenPhase::Opening;
      return true;
    }

    false
  }

  /// Marks the open complete.
  pub fn set_open(&self) {
    let mut phase = self.phase.lock();

    if *phase == OpenPhase::Opening {
      *phase = OpenPhase::Open;
    }
  }

  /// Begins closing.
  ///
  /// Returns `true` if a close was already in progress (or done), in
  /// which case the caller must not tear down again.
  pub fn set_closing(&self) -> bool {
    let mut phase = self.phase.lock();

    match *phase {
      OpenPhase::Closing | OpenPhase::Closed => true,
      OpenPhase::Opening | OpenPhase::Open => {
        *phase = OpenPhase::Closing;
        false
      }
    }
  }

  /// Marks the close complete.
  pub fn set_closed(&self) {
    *self.phase.lock() = OpenPhase::Closed;
  }

  /// Returns `true` while fully open.
  pub fn is_open(&self) -> bool {
    *self.phase.lock() == OpenPhase::Open
  }

  /// Returns `true` while closing or closed.
  pub fn is_closing(&self) -> bool {
    matches!(*self.phase.lock(), OpenPhase::Closing | OpenPhase::Closed)
  }

  /// Returns `true` while fully closed.
  pub fn is_closed(&self) -> bool {
    *self.phase.lock() == OpenPhase::Closed
  }
}

impl Default for OpenState {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::services::OpenState;

  #[test]
  fn test_forward_cycle() {
    let state: OpenState = OpenState::new();

    assert!(state.set_opening());
    assert!(!state.set_opening());

    state.set_open();
    assert!(state.is_open());

    assert!(!state.set_closing());
    assert!(state.set_closing());
    assert!(state.is_closing());

    state.set_closed();
    assert!(state.is_closed());

    // A closed state may begin a new cycle.
    assert!(state.set_opening());
  }

  #[test]
  fn test_closing_from_opening() {
    let state: OpenState = OpenState::new();

    assert!(state.set_opening());
    assert!(!state.set_closing());
    assert!(state.is_closing());
  }
}
