use parking_lot::Mutex as SpinMutex;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::BeamError;
use crate::error::Result;
use crate::routines;
use crate::routines::RoutineId;
use crate::services::Channel;
use crate::services::ChannelWriter;
use crate::services::Connection;
use crate::services::MessageSlot;
use crate::services::OpenState;
use crate::services::ServerConnection;
use crate::services::ServiceSlots;
use crate::services::frame::Frame;
use crate::services::frame::FrameDecoder;
use crate::services::slots::BoxFuture;

// -----------------------------------------------------------------------------
// Servlet Client
// -----------------------------------------------------------------------------

/// Server-side view of one accepted channel.
///
/// Handlers receive this to answer requests, push one-way messages, and
/// read or mutate the per-client session `S`.
pub struct ServletClient<S> {
  identifier: String,
  connection: Arc<dyn Connection>,
  writer: Arc<dyn ChannelWriter>,
  session: SpinMutex<S>,
}

impl<S> ServletClient<S> {
  /// Name of the peer, for logs.
  #[inline]
  pub fn identifier(&self) -> &str {
    self.identifier.as_str()
  }

  /// Per-client session state.
  #[inline]
  pub fn session(&self) -> &SpinMutex<S> {
    &self.session
  }

  /// Pushes a one-way message to this client.
  pub fn send_message<M: Serialize>(&self, slot: &MessageSlot<M>, message: &M) -> Result<()> {
    let body: Value =
      serde_json::to_value(message).map_err(|error| BeamError::serialization(error))?;

    let frame: Frame = Frame::Message {
      message: slot.id(),
      body,
    };

    self.writer.write(frame.encode()?)
  }

  /// Closes this client's channel.
  pub async fn close(&self) {
    self.connection.close().await;
  }
}

// -----------------------------------------------------------------------------
// Service Protocol Server
// -----------------------------------------------------------------------------

/// Hook run once per client after its channel ends.
pub type CloseSlot<S> = Arc<dyn Fn(Arc<ServletClient<S>>) -> BoxFuture<()> + Send + Sync>;

/// Servlet container: accepts channels and serves slot-bound requests.
///
/// One routine accepts connections; each accepted channel gets its own
/// serving routine. Requests on a single channel execute in arrival
/// order; slot errors become error responses. When a channel ends, the
/// servlet's close hook runs with that client's state.
pub struct ServiceProtocolServer<S>
where
  S: Default + Send + Sync + 'static,
{
  connection: Arc<dyn ServerConnection>,
  clients: Arc<SpinMutex<Vec<Arc<ServletClient<S>>>>>,
  servers: Arc<SpinMutex<Vec<RoutineId>>>,
  accepter: RoutineId,
  state: OpenState,
}

impl<S> ServiceProtocolServer<S>
where
  S: Default + Send + Sync + 'static,
{
  /// Starts a server over `connection` dispatching into `slots`.
  ///
  /// `on_close` runs once per client after its channel ends, before the
  /// client is forgotten.
  pub fn new(
    connection: Arc<dyn ServerConnection>,
    slots: ServiceSlots<S>,
    on_close: Option<CloseSlot<S>>,
  ) -> Self {
    let state: OpenState = OpenState::new();
    state.set_opening();
    state.set_open();

    let slots: Arc<ServiceSlots<S>> = Arc::new(slots);
    let clients: Arc<SpinMutex<Vec<Arc<ServletClient<S>>>>> = Arc::new(SpinMutex::new(Vec::new()));
    let servers: Arc<SpinMutex<Vec<RoutineId>>> = Arc::new(SpinMutex::new(Vec::new()));

    let accepter: RoutineId = {
      let connection = Arc::clone(&connection);
      let clients = Arc::clone(&clients);
      let servers = Arc::clone(&servers);

      routines::spawn(async move {
        loop {
          match connection.accept().await {
            Ok(channel) => {
              let slots = Arc::clone(&slots);
              let clients = Arc::clone(&clients);
              let on_close = on_close.clone();

              let server: RoutineId = routines::spawn(async move {
                serve_client(channel, slots, clients, on_close).await;
              });

              servers.lock().push(server);
            }
            Err(error) => {
              tracing::debug!(%error, "accept loop ended");
              break;
            }
          }
        }
      })
    };

    Self {
      connection,
      clients,
      servers,
      accepter,
      state,
    }
  }

  /// Clients currently being served.
  pub fn client_count(&self) -> usize {
    self.clients.lock().len()
  }

  /// Closes the server connection and every client, joining all routines.
  pub async fn close(&self) {
    if self.state.set_closing() {
      return;
    }

    self.connection.close().await;

    let clients: Vec<Arc<ServletClient<S>>> = self.clients.lock().clone();

    for client in clients {
      client.close().await;
    }

    routines::wait(&self.accepter).await;

    let servers: Vec<RoutineId> = std::mem::take(&mut *self.servers.lock());

    for server in servers.iter() {
      routines::wait(server).await;
    }

    self.state.set_closed();
  }
}

// -----------------------------------------------------------------------------
// Client Serving
// -----------------------------------------------------------------------------

async fn serve_client<S>(
  channel: Channel,
  slots: Arc<ServiceSlots<S>>,
  clients: Arc<SpinMutex<Vec<Arc<ServletClient<S>>>>>,
  on_close: Option<CloseSlot<S>>,
) where
  S: Default + Send + Sync + 'static,
{
  let Channel {
    identifier,
    connection,
    mut reader,
    writer,
  } = channel;

  let client: Arc<ServletClient<S>> = Arc::new(ServletClient {
    identifier,
    connection,
    writer,
    session: SpinMutex::new(S::default()),
  });

  clients.lock().push(Arc::clone(&client));

  tracing::debug!(client = client.identifier(), "client connected");

  let mut decoder: FrameDecoder = FrameDecoder::new();

  let error: BeamError = 'serve: loop {
    let chunk = match reader.read().await {
      Ok(chunk) => chunk,
      Err(error) => break 'serve error,
    };

    decoder.extend(&chunk);

    loop {
      match decoder.next() {
        Ok(Some(frame)) => {
          if let Err(error) = handle_frame(&client, &slots, frame).await {
            break 'serve error;
          }
        }
        Ok(None) => break,
        Err(error) => break 'serve error,
      }
    }
  };

  tracing::debug!(client = client.identifier(), %error, "client disconnected");

  clients.lock().retain(|entry| !Arc::ptr_eq(entry, &client));

  if let Some(on_close) = on_close {
    on_close(Arc::clone(&client)).await;
  }

  client.connection.close().await;
}

async fn handle_frame<S>(
  client: &Arc<ServletClient<S>>,
  slots: &Arc<ServiceSlots<S>>,
  frame: Frame,
) -> Result<()>
where
  S: Default + Send + Sync + 'static,
{
  match frame {
    Frame::Request {
      service,
      correlation,
      body,
    } => {
      let result: Result<Value> = match slots.service(service) {
        Some(handler) => handler(Arc::clone(client), body).await,
        None => Err(BeamError::service_request(format!("unknown service: {service}"))),
      };

      let response: Frame = Frame::Response {
        correlation,
        result,
      };

      client.writer.write(response.encode()?)
    }
    Frame::Message { message, body } => {
      if let Some(handler) = slots.message(message) {
        handler(Arc::clone(client), body).await;
      }

      Ok(())
    }
    Frame::Ping => client.writer.write(Frame::Pong.encode()?),
    Frame::Pong | Frame::Response { .. } => Ok(()),
  }
}
