//! Framed request/response and one-way messaging over a channel.
//!
//! The service protocol consumes a [`Channel`] (connection + reader +
//! writer), frames typed payloads with correlation ids, and exposes typed
//! [`Service`] and [`MessageSlot`] descriptors bound to handlers on the
//! server and to pending [`Async`] results on the client.
//!
//! [`Async`]: crate::routines::Async

mod channel;
mod client_builder;
mod frame;
mod ip_address;
mod local_channel;
mod open_state;
mod protocol_client;
mod protocol_server;
mod slots;

pub use self::channel::Channel;
pub use self::channel::ChannelReader;
pub use self::channel::ChannelWriter;
pub use self::channel::Connection;
pub use self::channel::ServerConnection;
pub use self::client_builder::ServiceProtocolClientBuilder;
pub use self::ip_address::IpAddress;
pub use self::local_channel::LocalServerConnection;
pub use self::open_state::OpenState;
pub use self::protocol_client::ServiceProtocolClient;
pub use self::protocol_server::CloseSlot;
pub use self::protocol_server::ServiceProtocolServer;
pub use self::protocol_server::ServletClient;
pub use self::slots::MessageSlot;
pub use self::slots::Service;
pub use self::slots::ServiceSlots;

pub(crate) use self::slots::BoxFuture;
