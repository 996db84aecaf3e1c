use crate::consts;
use crate::error::Result;
use crate::services::Channel;
use crate::services::ServiceProtocolClient;
use crate::services::slots::BoxFuture;
use crate::threading::LiveTimer;
use crate::threading::Timer;

type ChannelFactory = Box<dyn Fn() -> BoxFuture<Result<Channel>> + Send + Sync>;
type TimerFactory = Box<dyn Fn() -> Box<dyn Timer> + Send + Sync>;

/// Builds [`ServiceProtocolClient`]s on demand.
///
/// Owning the channel and heartbeat factories lets a higher-level client
/// re-open its connection after a break without knowing the transport.
pub struct ServiceProtocolClientBuilder {
  channels: ChannelFactory,
  timers: TimerFactory,
}

impl ServiceProtocolClientBuilder {
  /// Constructs a builder from a channel factory and a timer factory.
  pub fn new<CF, Fut, TF>(channel_factory: CF, timer_factory: TF) -> Self
  where
    CF: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Channel>> + Send + 'static,
    TF: Fn() -> Box<dyn Timer> + Send + Sync + 'static,
  {
    Self {
      channels: Box::new(move || Box::pin(channel_factory()) as BoxFuture<Result<Channel>>),
      timers: Box::new(timer_factory),
    }
  }

  /// Like [`new`], with live heartbeat timers at the default interval.
  ///
  /// [`new`]: Self::new
  pub fn with_default_timers<CF, Fut>(channel_factory: CF) -> Self
  where
    CF: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Channel>> + Send + 'static,
  {
    Self::new(channel_factory, || {
      Box::new(LiveTimer::new(consts::HEARTBEAT_INTERVAL)) as Box<dyn Timer>
    })
  }

  /// Opens a fresh channel and wraps it in a protocol client.
  pub async fn build(&self) -> Result<ServiceProtocolClient> {
    let channel: Channel = (self.channels)().await?;
    Ok(ServiceProtocolClient::new(channel, (self.timers)()))
  }
}
