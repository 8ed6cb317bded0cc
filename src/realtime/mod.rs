//! The `realtime` module is the client side of the multiplexed push channel.
//!
//! It defines the closed [`topic::Topic`] space and the wire messages, the
//! [`transport`] seam with a WebSocket and an in-memory implementation, and
//! the [`channel::RealtimeChannel`] that owns the single shared connection
//! and routes inbound events to listeners.

pub mod channel;
pub mod memory;
pub mod message;
pub mod topic;
pub mod transport;
pub mod websocket;

pub use channel::{
    ConnectionStatus, EventSink, RealtimeChannel, SharedChannel, SubscriptionHandle, deliver,
    pump,
};
pub use message::{Frame, InboundEvent};
pub use topic::{Registration, Topic, TopicFamily};
pub use transport::{ConnectionEvent, Connector, ReconnectPolicy, Transport, TransportEvent};
