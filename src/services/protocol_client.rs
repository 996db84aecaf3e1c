use hashbrown::HashMap;
use parking_lot::Mutex as SpinMutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use crate::consts::CAP_CORRELATION_TABLE;
use crate::error::BeamError;
use crate::error::Result;
use crate::queues::RoutineTaskQueue;
use crate::routines;
use crate::routines::Async;
use crate::routines::Eval;
use crate::routines::RoutineId;
use crate::services::Channel;
use crate::services::ChannelReader;
use crate::services::ChannelWriter;
use crate::services::Connection;
use crate::services::MessageSlot;
use crate::services::OpenState;
use crate::services::Service;
use crate::services::frame::Frame;
use crate::services::frame::FrameDecoder;
use crate::services::slots::BoxFuture;
use crate::threading::Timer;
use crate::threading::TimerResult;

type MessageDispatch = Arc<dyn Fn(Value) -> BoxFuture<()> + Send + Sync>;
type DisconnectSlot = Box<dyn Fn(BeamError) + Send + Sync>;

// -----------------------------------------------------------------------------
// Client Core
// -----------------------------------------------------------------------------

struct CorrelationTable {
  next: u32,
  pending: HashMap<u32, Eval<Value>>,
}

struct ClientCore {
  identifier: String,
  connection: Arc<dyn Connection>,
  writer: Arc<dyn ChannelWriter>,
  correlations: SpinMutex<CorrelationTable>,
  message_slots: SpinMutex<HashMap<u32, MessageDispatch>>,
  tasks: RoutineTaskQueue,
  state: OpenState,
  heartbeat: Box<dyn Timer>,
  traffic: AtomicBool,
  disconnect: SpinMutex<Option<DisconnectSlot>>,
}

impl ClientCore {
  fn fail_pending(&self, error: &BeamError) {
    let pending: Vec<Eval<Value>> = {
      let mut table = self.correlations.lock();
      table.pending.drain().map(|(_, eval)| eval).collect()
    };

    for eval in pending {
      eval.set_error(error.clone());
    }
  }
}

// -----------------------------------------------------------------------------
// Service Protocol Client
// -----------------------------------------------------------------------------

/// Client side of the framed request/response protocol.
///
/// Owns a single channel: a reader routine fulfils pending requests and
/// dispatches one-way messages, and a heartbeat routine pings the peer,
/// closing the channel after two silent intervals. A broken channel fails
/// every pending request; the client does not reconnect by itself.
pub struct ServiceProtocolClient {
  core: Arc<ClientCore>,
  reader: RoutineId,
  pulse: RoutineId,
}

impl ServiceProtocolClient {
  /// Constructs a client over `channel`, driven by `heartbeat`.
  pub fn new(channel: Channel, heartbeat: Box<dyn Timer>) -> Self {
    let Channel {
      identifier,
      connection,
      reader,
      writer,
    } = channel;

    let state: OpenState = OpenState::new();
    state.set_opening();
    state.set_open();

    let core: Arc<ClientCore> = Arc::new(ClientCore {
      identifier,
      connection,
      writer,
      correlations: SpinMutex::new(CorrelationTable {
        next: 0,
        pending: HashMap::with_capacity(CAP_CORRELATION_TABLE),
      }),
      message_slots: SpinMutex::new(HashMap::new()),
      tasks: RoutineTaskQueue::new(),
      state,
      heartbeat,
      traffic: AtomicBool::new(false),
      disconnect: SpinMutex::new(None),
    });

    let read_core: Arc<ClientCore> = Arc::clone(&core);
    let read_routine: RoutineId = routines::spawn(async move {
      read_loop(read_core, reader).await;
    });

    let pulse_core: Arc<ClientCore> = Arc::clone(&core);
    let pulse_routine: RoutineId = routines::spawn(async move {
      heartbeat_loop(pulse_core).await;
    });

    Self {
      core,
      reader: read_routine,
      pulse: pulse_routine,
    }
  }

  /// Name of the peer, for logs.
  #[inline]
  pub fn identifier(&self) -> &str {
    self.core.identifier.as_str()
  }

  /// Returns `true` while the channel is usable.
  pub fn is_open(&self) -> bool {
    self.core.state.is_open()
  }

  /// Sends a request and parks until the matching response arrives.
  ///
  /// # Errors
  ///
  /// Propagates the remote's error verbatim; a channel fault fails with
  /// the transport error and a close with [`NotConnected`].
  ///
  /// [`NotConnected`]: crate::error::ErrorKind::NotConnected
  pub async fn send_request<Req, Resp>(
    &self,
    service: &Service<Req, Resp>,
    request: &Req,
  ) -> Result<Resp>
  where
    Req: Serialize,
    Resp: DeserializeOwned,
  {
    if self.core.state.is_closing() {
      return Err(BeamError::not_connected());
    }

    let body: Value =
      serde_json::to_value(request).map_err(|error| BeamError::serialization(error))?;

    let response: Async<Value> = Async::new();

    let correlation: u32 = {
      let mut table = self.core.correlations.lock();
      table.next = table.next.wrapping_add(1);
      let id = table.next;
      table.pending.insert(id, response.eval());
      id
    };

    let frame: Frame = Frame::Request {
      service: service.id(),
      correlation,
      body,
    };

    tracing::trace!(
      client = self.identifier(),
      service = service.name(),
      correlation,
      "request",
    );

    if let Err(error) = frame.encode().and_then(|data| self.core.writer.write(data)) {
      self.core.correlations.lock().pending.remove(&correlation);
      return Err(error);
    }

    let value: Value = response.get().await?;
    serde_json::from_value(value)
      .map_err(|error| BeamError::type_compatibility(format!("{}: {error}", service.name())))
  }

  /// Sends a one-way message.
  pub fn send_message<M: Serialize>(&self, slot: &MessageSlot<M>, message: &M) -> Result<()> {
    if self.core.state.is_closing() {
      return Err(BeamError::not_connected());
    }

    let body: Value =
      serde_json::to_value(message).map_err(|error| BeamError::serialization(error))?;

    let frame: Frame = Frame::Message {
      message: slot.id(),
      body,
    };

    self.core.writer.write(frame.encode()?)
  }

  /// Binds `handler` to incoming one-way messages on `slot`.
  ///
  /// Handlers run one at a time in the client's task routine.
  pub fn set_message_slot<M, F, Fut>(&self, slot: &MessageSlot<M>, handler: F)
  where
    M: DeserializeOwned + Send + 'static,
    F: Fn(M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let name: &'static str = slot.name();

    let dispatch: MessageDispatch = Arc::new(move |body| {
      match serde_json::from_value::<M>(body) {
        Ok(message) => Box::pin(handler(message)) as BoxFuture<()>,
        Err(error) => {
          tracing::error!(slot = name, %error, "undecodable message");
          Box::pin(async {}) as BoxFuture<()>
        }
      }
    });

    self.core.message_slots.lock().insert(slot.id(), dispatch);
  }

  /// Registers a callback invoked once if the channel breaks without a
  /// local `close`.
  pub fn set_disconnect_slot<F>(&self, slot: F)
  where
    F: Fn(BeamError) + Send + Sync + 'static,
  {
    *self.core.disconnect.lock() = Some(Box::new(slot));
  }

  /// Closes the channel, failing every pending request with
  /// [`NotConnected`] and joining the client's routines. Idempotent.
  ///
  /// [`NotConnected`]: crate::error::ErrorKind::NotConnected
  pub async fn close(&self) {
    if self.core.state.set_closing() {
      return;
    }

    tracing::debug!(client = self.identifier(), "closing");

    self.core.heartbeat.cancel();
    self.core.connection.close().await;
    self.core.fail_pending(&BeamError::not_connected());
    self.core.tasks.close().await;

    routines::wait(&self.reader).await;
    routines::wait(&self.pulse).await;

    self.core.state.set_closed();
  }
}

// -----------------------------------------------------------------------------
// Reader Routine
// -----------------------------------------------------------------------------

async fn read_loop(core: Arc<ClientCore>, mut reader: Box<dyn ChannelReader>) {
  let mut decoder: FrameDecoder = FrameDecoder::new();

  let error: BeamError = 'read: loop {
    let chunk = match reader.read().await {
      Ok(chunk) => chunk,
      Err(error) => break 'read error,
    };

    core.traffic.store(true, Ordering::Release);
    decoder.extend(&chunk);

    loop {
      match decoder.next() {
        Ok(Some(frame)) => dispatch_frame(&core, frame),
        Ok(None) => break,
        Err(error) => break 'read error,
      }
    }
  };

  // A close in progress means the local side initiated the teardown.
  if core.state.set_closing() {
    return;
  }

  tracing::debug!(client = core.identifier.as_str(), %error, "channel broken");

  core.heartbeat.cancel();
  core.connection.close().await;
  core.fail_pending(&error);
  core.tasks.close().await;

  let disconnect: Option<DisconnectSlot> = core.disconnect.lock().take();

  if let Some(disconnect) = disconnect {
    disconnect(error);
  }

  core.state.set_closed();
}

fn dispatch_frame(core: &Arc<ClientCore>, frame: Frame) {
  match frame {
    Frame::Response {
      correlation,
      result,
    } => {
      let eval: Option<Eval<Value>> = core.correlations.lock().pending.remove(&correlation);

      match (eval, result) {
        (Some(eval), Ok(value)) => eval.set(value),
        (Some(eval), Err(error)) => eval.set_error(error),
        (None, _) => {
          tracing::trace!(correlation, "response without pending request");
        }
      }
    }
    Frame::Message { message, body } => {
      let dispatch: Option<MessageDispatch> = core.message_slots.lock().get(&message).cloned();

      if let Some(dispatch) = dispatch {
        let _ = core.tasks.push(dispatch(body));
      }
    }
    Frame::Ping => {
      if let Ok(data) = Frame::Pong.encode() {
        let _ = core.writer.write(data);
      }
    }
    Frame::Pong | Frame::Request { .. } => {}
  }
}

// -----------------------------------------------------------------------------
// Heartbeat Routine
// -----------------------------------------------------------------------------

async fn heartbeat_loop(core: Arc<ClientCore>) {
  let mut misses: u32 = 0;

  loop {
    core.heartbeat.start();

    // A close racing the gap between cycles must not be lost.
    if core.state.is_closing() {
      core.heartbeat.cancel();
    }

    match core.heartbeat.wait().await {
      TimerResult::Canceled => break,
      TimerResult::Expired => {
        if core.traffic.swap(false, Ordering::AcqRel) {
          misses = 0;
        } else {
          misses += 1;
        }

        if misses >= 2 {
          tracing::debug!(client = core.identifier.as_str(), "heartbeat timeout");
          core.connection.close().await;
          break;
        }

        if let Ok(data) = Frame::Ping.encode() {
          let _ = core.writer.write(data);
        }
      }
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use serde::Deserialize;
  use serde::Serialize;
  use std::sync::Arc;

  use crate::error::BeamError;
  use crate::error::ErrorKind;
  use crate::queues::Queue;
  use crate::routines;
  use crate::services::LocalServerConnection;
  use crate::services::MessageSlot;
  use crate::services::ServerConnection;
  use crate::services::Service;
  use crate::services::ServiceProtocolClient;
  use crate::services::ServiceProtocolServer;
  use crate::services::ServiceSlots;
  use crate::threading::TriggerTimer;

  #[derive(Clone, Debug, Serialize, Deserialize)]
  struct EchoRequest {
    text: String,
  }

  #[derive(Clone, Debug, Serialize, Deserialize)]
  struct EchoResponse {
    text: String,
  }

  const ECHO_SERVICE: Service<EchoRequest, EchoResponse> = Service::new(1, "echo");
  const FAIL_SERVICE: Service<EchoRequest, EchoResponse> = Service::new(2, "fail");
  const NEWS_MESSAGE: MessageSlot<String> = MessageSlot::new(1, "news");

  fn echo_server(server: &Arc<LocalServerConnection>) -> ServiceProtocolServer<()> {
    let mut slots: ServiceSlots<()> = ServiceSlots::new();

    slots.add_service(&ECHO_SERVICE, |client, request: EchoRequest| {
      let _ = client.send_message(&NEWS_MESSAGE, &"fresh".to_string());

      async move {
        Ok(EchoResponse {
          text: request.text,
        })
      }
    });

    slots.add_service(&FAIL_SERVICE, |_client, _request: EchoRequest| async {
      Err::<EchoResponse, _>(BeamError::service_request("rejected"))
    });

    ServiceProtocolServer::new(
      Arc::clone(server) as Arc<dyn ServerConnection>,
      slots,
      None,
    )
  }

  fn connect(server: &Arc<LocalServerConnection>) -> ServiceProtocolClient {
    let channel = server.connect("test").unwrap();
    ServiceProtocolClient::new(channel, Box::new(TriggerTimer::new()))
  }

  #[tokio::test]
  async fn test_request_response() {
    let connection = LocalServerConnection::new();
    let server = echo_server(&connection);
    let client = connect(&connection);

    let request: EchoRequest = EchoRequest {
      text: "hello".into(),
    };

    let response = client.send_request(&ECHO_SERVICE, &request).await.unwrap();
    assert_eq!(response.text, "hello");

    client.close().await;
    server.close().await;
  }

  #[tokio::test]
  async fn test_error_response() {
    let connection = LocalServerConnection::new();
    let server = echo_server(&connection);
    let client = connect(&connection);

    let request: EchoRequest = EchoRequest {
      text: "nope".into(),
    };

    let error = client.send_request(&FAIL_SERVICE, &request).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::ServiceRequest);
    assert_eq!(error.message(), "rejected");

    client.close().await;
    server.close().await;
  }

  #[tokio::test]
  async fn test_message_dispatch() {
    let connection = LocalServerConnection::new();
    let server = echo_server(&connection);
    let client = connect(&connection);

    let news: Arc<Queue<String>> = Arc::new(Queue::new());
    let sink: Arc<Queue<String>> = Arc::clone(&news);

    client.set_message_slot(&NEWS_MESSAGE, move |message: String| {
      let sink = Arc::clone(&sink);

      async move {
        let _ = sink.push(message);
      }
    });

    let request: EchoRequest = EchoRequest {
      text: "x".into(),
    };

    client.send_request(&ECHO_SERVICE, &request).await.unwrap();
    assert_eq!(news.pop().await.unwrap(), "fresh");

    client.close().await;
    server.close().await;
  }

  #[tokio::test]
  async fn test_close_fails_pending_requests() {
    let connection = LocalServerConnection::new();

    // No server: the request parks until the channel breaks.
    let client = Arc::new(connect(&connection));
    let requester = Arc::clone(&client);

    let id = routines::spawn(async move {
      let request: EchoRequest = EchoRequest {
        text: "void".into(),
      };

      let error = requester.send_request(&ECHO_SERVICE, &request).await.unwrap_err();
      assert_eq!(error.kind(), ErrorKind::NotConnected);
    });

    routines::yield_now().await;
    client.close().await;
    routines::wait(&id).await;
  }

  #[tokio::test]
  async fn test_disconnect_slot_fires_on_break() {
    let connection = LocalServerConnection::new();
    let server = echo_server(&connection);
    let client = connect(&connection);

    let breaks: Arc<Queue<ErrorKind>> = Arc::new(Queue::new());
    let sink: Arc<Queue<ErrorKind>> = Arc::clone(&breaks);

    client.set_disconnect_slot(move |error| {
      let _ = sink.push(error.kind());
    });

    // Let the accept routine register the channel before closing.
    routines::yield_now().await;
    server.close().await;

    assert_eq!(breaks.pop().await.unwrap(), ErrorKind::EndOfFile);
    client.close().await;
  }
}
