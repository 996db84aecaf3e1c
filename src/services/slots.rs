use hashbrown::HashMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::BeamError;
use crate::error::Result;
use crate::services::ServletClient;

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

type RequestHandler<S> =
  Box<dyn Fn(Arc<ServletClient<S>>, Value) -> BoxFuture<Result<Value>> + Send + Sync>;

type MessageHandler<S> = Box<dyn Fn(Arc<ServletClient<S>>, Value) -> BoxFuture<()> + Send + Sync>;

// -----------------------------------------------------------------------------
// Service
// -----------------------------------------------------------------------------

/// Descriptor of a request/response slot.
///
/// Declared as a `const` next to its request and response types; the id is
/// the wire identity and the name appears in logs.
#[derive(Debug)]
pub struct Service<Req, Resp> {
  id: u32,
  name: &'static str,
  marker: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> Service<Req, Resp> {
  /// Declares a service slot.
  pub const fn new(id: u32, name: &'static str) -> Self {
    Self {
      id,
      name,
      marker: PhantomData,
    }
  }

  /// Wire id of this service.
  #[inline]
  pub const fn id(&self) -> u32 {
    self.id
  }

  /// Human-readable name of this service.
  #[inline]
  pub const fn name(&self) -> &'static str {
    self.name
  }
}

// -----------------------------------------------------------------------------
// Message Slot
// -----------------------------------------------------------------------------

/// Descriptor of a one-way message slot.
#[derive(Debug)]
pub struct MessageSlot<M> {
  id: u32,
  name: &'static str,
  marker: PhantomData<fn(M)>,
}

impl<M> MessageSlot<M> {
  /// Declares a message slot.
  pub const fn new(id: u32, name: &'static str) -> Self {
    Self {
      id,
      name,
      marker: PhantomData,
    }
  }

  /// Wire id of this message.
  #[inline]
  pub const fn id(&self) -> u32 {
    self.id
  }

  /// Human-readable name of this message.
  #[inline]
  pub const fn name(&self) -> &'static str {
    self.name
  }
}

// -----------------------------------------------------------------------------
// Service Slots
// -----------------------------------------------------------------------------

/// Registry binding service and message ids to server-side handlers.
///
/// `S` is the per-client session state.
pub struct ServiceSlots<S> {
  services: HashMap<u32, RequestHandler<S>>,
  messages: HashMap<u32, MessageHandler<S>>,
}

impl<S> ServiceSlots<S>
where
  S: Send + Sync + 'static,
{
  /// Constructs an empty registry.
  pub fn new() -> Self {
    Self {
      services: HashMap::new(),
      messages: HashMap::new(),
    }
  }

  /// Binds `handler` to a service slot.
  ///
  /// The handler's error becomes the error response; its success value is
  /// encoded as the response body.
  pub fn add_service<Req, Resp, F, Fut>(&mut self, service: &Service<Req, Resp>, handler: F)
  where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + Send + 'static,
    F: Fn(Arc<ServletClient<S>>, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp>> + Send + 'static,
  {
    let name: &'static str = service.name();

    let erased: RequestHandler<S> = Box::new(move |client, body| {
      let request: Result<Req> = serde_json::from_value(body)
        .map_err(|error| BeamError::serialization(format!("{name}: {error}")));

      match request {
        Ok(request) => {
          let response = handler(client, request);

          Box::pin(async move {
            let response: Resp = response.await?;
            serde_json::to_value(response).map_err(|error| BeamError::serialization(error))
          }) as BoxFuture<Result<Value>>
        }
        Err(error) => Box::pin(async move { Err(error) }) as BoxFuture<Result<Value>>,
      }
    });

    self.services.insert(service.id(), erased);
  }

  /// Binds `handler` to a one-way message slot.
  pub fn add_message<M, F, Fut>(&mut self, slot: &MessageSlot<M>, handler: F)
  where
    M: DeserializeOwned + Send + 'static,
    F: Fn(Arc<ServletClient<S>>, M) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    let name: &'static str = slot.name();

    let erased: MessageHandler<S> = Box::new(move |client, body| {
      match serde_json::from_value::<M>(body) {
        Ok(message) => Box::pin(handler(client, message)) as BoxFuture<()>,
        Err(error) => {
          tracing::error!(slot = name, %error, "undecodable message");
          Box::pin(async {}) as BoxFuture<()>
        }
      }
    });

    self.messages.insert(slot.id(), erased);
  }

  pub(crate) fn service(&self, id: u32) -> Option<&RequestHandler<S>> {
    self.services.get(&id)
  }

  pub(crate) fn message(&self, id: u32) -> Option<&MessageHandler<S>> {
    self.messages.get(&id)
  }
}

impl<S> Default for ServiceSlots<S>
where
  S: Send + Sync + 'static,
{
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}
