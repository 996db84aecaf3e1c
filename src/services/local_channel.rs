use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::error::BeamError;
use crate::error::Result;
use crate::queues::Queue;
use crate::services::Channel;
use crate::services::ChannelReader;
use crate::services::ChannelWriter;
use crate::services::Connection;
use crate::services::ServerConnection;

// -----------------------------------------------------------------------------
// Local Connection
// -----------------------------------------------------------------------------

/// Connection over a pair of in-process byte queues.
struct LocalConnection {
  outbound: Arc<Queue<Bytes>>,
  inbound: Arc<Queue<Bytes>>,
}

#[async_trait]
impl Connection for LocalConnection {
  async fn close(&self) {
    self.outbound.break_with(BeamError::end_of_file());
    self.inbound.break_with(BeamError::end_of_file());
  }
}

// -----------------------------------------------------------------------------
// Local Reader / Writer
// -----------------------------------------------------------------------------

struct LocalReader {
  source: Arc<Queue<Bytes>>,
}

#[async_trait]
impl ChannelReader for LocalReader {
  async fn read(&mut self) -> Result<Bytes> {
    self.source.pop().await
  }

  fn is_data_available(&self) -> bool {
    !self.source.is_empty()
  }
}

struct LocalWriter {
  sink: Arc<Queue<Bytes>>,
}

impl ChannelWriter for LocalWriter {
  fn write(&self, data: Bytes) -> Result<()> {
    self.sink.push(data)
  }
}

// -----------------------------------------------------------------------------
// Local Server Connection
// -----------------------------------------------------------------------------

/// An in-process transport accepting channel pairs.
///
/// `connect` builds two coupled channels over a pair of byte queues and
/// hands the far end to `accept`. Closing either end breaks both
/// directions; closing the server connection releases parked acceptors.
pub struct LocalServerConnection {
  accepts: Queue<Channel>,
}

impl LocalServerConnection {
  /// Constructs a server connection with no pending channels.
  pub fn new() -> Arc<Self> {
    Arc::new(Self {
      accepts: Queue::new(),
    })
  }

  /// Opens a channel to this server.
  ///
  /// Returns the client end; the server end is queued for `accept`.
  pub fn connect<T: Into<String>>(&self, identifier: T) -> Result<Channel> {
    let identifier: String = identifier.into();

    let to_server: Arc<Queue<Bytes>> = Arc::new(Queue::new());
    let to_client: Arc<Queue<Bytes>> = Arc::new(Queue::new());

    let server_end: Channel = Channel {
      identifier: identifier.clone(),
      connection: Arc::new(LocalConnection {
        outbound: Arc::clone(&to_client),
        inbound: Arc::clone(&to_server),
      }),
      reader: Box::new(LocalReader {
        source: Arc::clone(&to_server),
      }),
      writer: Arc::new(LocalWriter {
        sink: Arc::clone(&to_client),
      }),
    };

    self.accepts.push(server_end).map_err(|_| {
      BeamError::connect("server connection closed")
    })?;

    Ok(Channel {
      identifier,
      connection: Arc::new(LocalConnection {
        outbound: to_server.clone(),
        inbound: to_client.clone(),
      }),
      reader: Box::new(LocalReader { source: to_client }),
      writer: Arc::new(LocalWriter { sink: to_server }),
    })
  }
}

#[async_trait]
impl ServerConnection for LocalServerConnection {
  async fn accept(&self) -> Result<Channel> {
    self.accepts.pop().await
  }

  async fn close(&self) {
    self.accepts.break_with(BeamError::end_of_file());
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use bytes::Bytes;
  use std::sync::Arc;

  use crate::error::ErrorKind;
  use crate::services::ChannelReader;
  use crate::services::ChannelWriter;
  use crate::services::Connection;
  use crate::services::LocalServerConnection;
  use crate::services::ServerConnection;

  #[tokio::test]
  async fn test_round_trip() {
    let server: Arc<LocalServerConnection> = LocalServerConnection::new();

    let client = server.connect("test").unwrap();
    let mut accepted = server.accept().await.unwrap();

    client.writer.write(Bytes::from_static(b"hello")).unwrap();
    assert_eq!(accepted.reader.read().await.unwrap().as_ref(), b"hello");
  }

  #[tokio::test]
  async fn test_close_breaks_both_directions() {
    let server: Arc<LocalServerConnection> = LocalServerConnection::new();

    let mut client = server.connect("test").unwrap();
    let accepted = server.accept().await.unwrap();

    accepted.connection.close().await;

    assert_eq!(client.reader.read().await.unwrap_err().kind(), ErrorKind::EndOfFile);
    assert!(client.writer.write(Bytes::new()).is_err());
  }

  #[tokio::test]
  async fn test_server_close_releases_accept() {
    let server: Arc<LocalServerConnection> = LocalServerConnection::new();

    server.close().await;
    assert_eq!(server.accept().await.unwrap_err().kind(), ErrorKind::EndOfFile);
    assert!(server.connect("late").is_err());
  }
}
