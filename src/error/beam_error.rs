use std::error::Error;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;

use crate::error::ErrorKind;

type Cause = Box<dyn Error + Send + Sync + 'static>;

/// A structured error with kind, message, and optional cause.
///
/// Errors surface at the suspension point of the awaiting routine: a broken
/// queue delivers its break error to every parked and every future reader,
/// and a closed channel delivers [`NotConnected`] to every pending request.
///
/// # Display Format
///
/// Errors format as: `{kind}: {message}`
///
/// Example: `service request: invalid credentials`
///
/// [`NotConnected`]: ErrorKind::NotConnected
pub struct BeamError {
  kind: ErrorKind,
  message: String,
  cause: Option<Cause>,
}

impl BeamError {
  /// Creates a new error with the given kind and message.
  #[inline]
  pub fn new<T>(kind: ErrorKind, message: T) -> Self
  where
    T: Display,
  {
    Self {
      kind,
      message: message.to_string(),
      cause: None,
    }
  }

  /// Creates a new error with the given kind, message, and cause.
  #[inline]
  pub fn with_cause<T, C>(kind: ErrorKind, message: T, cause: C) -> Self
  where
    T: Display,
    C: Error + Send + Sync + 'static,
  {
    Self {
      kind,
      message: message.to_string(),
      cause: Some(Box::new(cause)),
    }
  }

  /// Returns the error's category.
  #[inline]
  pub const fn kind(&self) -> ErrorKind {
    self.kind
  }

  /// Returns the human-readable error message.
  #[inline]
  pub fn message(&self) -> &str {
    self.message.as_str()
  }

  /// Returns `true` if this error originated in the transport layer.
  #[inline]
  pub const fn is_transport(&self) -> bool {
    matches!(
      self.kind,
      ErrorKind::EndOfFile | ErrorKind::Socket | ErrorKind::Connect | ErrorKind::NotConnected
    )
  }

  // ---------------------------------------------------------------------------
  // Constructors
  // ---------------------------------------------------------------------------

  /// A queue or publisher endpoint is gone.
  #[inline]
  pub fn pipe_broken() -> Self {
    Self::new(ErrorKind::PipeBroken, "pipe broken")
  }

  /// The remote side closed the channel cleanly.
  #[inline]
  pub fn end_of_file() -> Self {
    Self::new(ErrorKind::EndOfFile, "end of file")
  }

  /// A fault on the underlying transport.
  #[inline]
  pub fn socket<T: Display>(message: T) -> Self {
    Self::new(ErrorKind::Socket, message)
  }

  /// A connection could not be established.
  #[inline]
  pub fn connect<T: Display>(message: T) -> Self {
    Self::new(ErrorKind::Connect, message)
  }

  /// The channel is not open.
  #[inline]
  pub fn not_connected() -> Self {
    Self::new(ErrorKind::NotConnected, "not connected")
  }

  /// The remote service rejected a request.
  #[inline]
  pub fn service_request<T: Display>(message: T) -> Self {
    Self::new(ErrorKind::ServiceRequest, message)
  }

  /// A routine aborted or the scheduler was torn down.
  #[inline]
  pub fn routine<T: Display>(message: T) -> Self {
    Self::new(ErrorKind::Routine, message)
  }

  /// A payload could not be encoded or decoded.
  #[inline]
  pub fn serialization<T: Display>(message: T) -> Self {
    Self::new(ErrorKind::Serialization, message)
  }

  /// A payload decoded to an incompatible type.
  #[inline]
  pub fn type_compatibility<T: Display>(message: T) -> Self {
    Self::new(ErrorKind::TypeCompatibility, message)
  }
}

impl Clone for BeamError {
  fn clone(&self) -> Self {
    // The cause is an opaque trait object; the clone keeps its text by
    // folding it into the message.
    let message: String = match self.cause.as_deref() {
      Some(cause) => format!("{} ({cause})", self.message),
      None => self.message.clone(),
    };

    Self {
      kind: self.kind,
      message,
      cause: None,
    }
  }
}

impl PartialEq for BeamError {
  fn eq(&self, other: &Self) -> bool {
    self.kind == other.kind && self.message == other.message
  }
}

impl Debug for BeamError {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Display::fmt(self, f)
  }
}

impl Display for BeamError {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "{}: {}", self.kind, self.message)
  }
}

impl Error for BeamError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    self
      .cause
      .as_deref()
      .map(|cause| cause as &(dyn Error + 'static))
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::io;

  use crate::error::BeamError;
  use crate::error::ErrorKind;

  #[test]
  fn test_display() {
    let error: BeamError = BeamError::service_request("invalid credentials");
    assert_eq!(format!("{error}"), "service request: invalid credentials");
  }

  #[test]
  fn test_clone_folds_cause() {
    let cause: io::Error = io::Error::other("reset");
    let error: BeamError = BeamError::with_cause(ErrorKind::Socket, "read failed", cause);
    let clone: BeamError = error.clone();

    assert_eq!(clone.kind(), ErrorKind::Socket);
    assert!(clone.message().contains("reset"));
  }

  #[test]
  fn test_transport_partition() {
    assert!(BeamError::end_of_file().is_transport());
    assert!(BeamError::not_connected().is_transport());
    assert!(!BeamError::pipe_broken().is_transport());
    assert!(!BeamError::service_request("no").is_transport());
  }
}
