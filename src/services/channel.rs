use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::error::Result;

// -----------------------------------------------------------------------------
// Connection
// -----------------------------------------------------------------------------

/// Control half of a channel.
#[async_trait]
pub trait Connection: Send + Sync {
  /// Closes both directions of the channel.
  ///
  /// Idempotent; readers observe [`EndOfFile`] once the buffered data
  /// drains.
  ///
  /// [`EndOfFile`]: crate::error::ErrorKind::EndOfFile
  async fn close(&self);
}

// -----------------------------------------------------------------------------
// Channel Reader
// -----------------------------------------------------------------------------

/// The receiving half of a channel.
#[async_trait]
pub trait ChannelReader: Send + Sync {
  /// Returns the next chunk of data, parking the calling routine until
  /// data is available.
  ///
  /// # Errors
  ///
  /// Fails with [`EndOfFile`] on a clean close and [`Socket`] on a
  /// transport fault.
  ///
  /// [`EndOfFile`]: crate::error::ErrorKind::EndOfFile
  /// [`Socket`]: crate::error::ErrorKind::Socket
  async fn read(&mut self) -> Result<Bytes>;

  /// Returns `true` if a `read` would return without parking.
  fn is_data_available(&self) -> bool;
}

// -----------------------------------------------------------------------------
// Channel Writer
// -----------------------------------------------------------------------------

/// The sending half of a channel.
///
/// Writes never park; transports with backpressure buffer internally.
pub trait ChannelWriter: Send + Sync {
  /// Queues `data` for transmission.
  fn write(&self, data: Bytes) -> Result<()>;
}

// -----------------------------------------------------------------------------
// Server Connection
// -----------------------------------------------------------------------------

/// A listening endpoint producing accepted channels.
#[async_trait]
pub trait ServerConnection: Send + Sync {
  /// Returns the next accepted channel, parking until one arrives.
  ///
  /// # Errors
  ///
  /// Fails with [`EndOfFile`] once the connection is closed.
  ///
  /// [`EndOfFile`]: crate::error::ErrorKind::EndOfFile
  async fn accept(&self) -> Result<Channel>;

  /// Stops accepting; parked `accept` calls are released.
  async fn close(&self);
}

// -----------------------------------------------------------------------------
// Channel
// -----------------------------------------------------------------------------

/// A bi-directional byte transport.
pub struct Channel {
  /// Opaque name identifying the peer, used in logs.
  pub identifier: String,
  /// Control half shared with every interested party.
  pub connection: Arc<dyn Connection>,
  /// Receiving half, owned by the single reader routine.
  pub reader: Box<dyn ChannelReader>,
  /// Sending half, shared between request and heartbeat paths.
  pub writer: Arc<dyn ChannelWriter>,
}

impl std::fmt::Debug for Channel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Channel")
      .field("identifier", &self.identifier)
      .finish_non_exhaustive()
  }
}
