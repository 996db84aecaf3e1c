use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;

/// Error category indicating the nature of the failure.
///
/// Kinds provide semantic information for error handling and logging, and
/// are the component of an error that travels across the wire.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
  /// A producer wrote to a queue whose consumers are gone, or a consumer
  /// read from a queue that was broken without a more specific error.
  PipeBroken,
  /// The remote side closed the channel cleanly.
  EndOfFile,
  /// A fault on the underlying transport.
  Socket,
  /// A connection could not be established.
  Connect,
  /// An operation was attempted on a channel that is not open.
  NotConnected,
  /// The remote service rejected a request.
  ///
  /// Carries the remote's message verbatim.
  ServiceRequest,
  /// A routine aborted or the scheduler was torn down.
  Routine,
  /// A payload could not be encoded or decoded.
  Serialization,
  /// A payload decoded to an incompatible type.
  TypeCompatibility,
}

impl ErrorKind {
  /// Wire discriminator for this kind.
  #[inline]
  pub(crate) const fn tag(&self) -> u8 {
    match self {
      Self::PipeBroken => 0,
      Self::EndOfFile => 1,
      Self::Socket => 2,
      Self::Connect => 3,
      Self::NotConnected => 4,
      Self::ServiceRequest => 5,
      Self::Routine => 6,
      Self::Serialization => 7,
      Self::TypeCompatibility => 8,
    }
  }

  /// Parses a wire discriminator back into a kind.
  #[inline]
  pub(crate) const fn from_tag(tag: u8) -> Option<Self> {
    match tag {
      0 => Some(Self::PipeBroken),
      1 => Some(Self::EndOfFile),
      2 => Some(Self::Socket),
      3 => Some(Self::Connect),
      4 => Some(Self::NotConnected),
      5 => Some(Self::ServiceRequest),
      6 => Some(Self::Routine),
      7 => Some(Self::Serialization),
      8 => Some(Self::TypeCompatibility),
      _ => None,
    }
  }

  #[inline]
  pub(crate) const fn label(&self) -> &'static str {
    match self {
      Self::PipeBroken => "pipe broken",
      Self::EndOfFile => "end of file",
      Self::Socket => "socket",
      Self::Connect => "connect",
      Self::NotConnected => "not connected",
      Self::ServiceRequest => "service request",
      Self::Routine => "routine",
      Self::Serialization => "serialization",
      Self::TypeCompatibility => "type compatibility",
    }
  }
}

impl Display for ErrorKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    f.write_str(self.label())
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
