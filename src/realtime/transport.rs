//! Transport seam
//!
//! The channel never touches a socket directly. A [`Connector`] creates the
//! one [`Transport`] instance the channel owns, and the transport reports
//! lifecycle changes and inbound text back as [`ConnectionEvent`]s, which a
//! driver (see [`crate::realtime::channel::pump`]) feeds into the channel.

use std::time::Duration;

use uuid::Uuid;

use crate::config::RealtimeSettings;
use crate::realtime::message::Frame;
use crate::utils::Result;

/// Signals a transport reports back to the channel.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// The connection is open and registrations may be sent.
    Open,
    /// A text frame was received.
    Message(String),
    /// The connection dropped. `exhausted` is set once the reconnect policy
    /// has given up; the transport stays down until `reconnect` is called.
    Closed { exhausted: bool },
}

/// A [`TransportEvent`] tagged with the connection that produced it, so
/// signals from a torn-down connection can be told apart from the live one.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionEvent {
    pub connection: Uuid,
    pub event: TransportEvent,
}

impl ConnectionEvent {
    pub fn new(connection: Uuid, event: TransportEvent) -> Self {
        Self { connection, event }
    }
}

/// The sending half of a realtime connection.
pub trait Transport: Send {
    /// Sends one frame. Fails when the transport has no live connection.
    fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Restarts connection attempts on this same instance.
    fn reconnect(&mut self);

    /// Closes the connection for good.
    fn close(&mut self);
}

/// Creates the transport for a new connection.
pub trait Connector: Send {
    type Transport: Transport;

    /// Opens the transport for `connection`, attaching `credentials` (an
    /// access token) to the handshake. Events it reports carry `connection`.
    fn connect(&mut self, connection: Uuid, credentials: Option<String>) -> Self::Transport;
}

/// Bounded retry with doubling delay, capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << shift)
            .min(self.max_delay)
    }

    /// True once `failures` consecutive attempts have failed.
    pub fn exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
        }
    }
}

impl From<&RealtimeSettings> for ReconnectPolicy {
    fn from(settings: &RealtimeSettings) -> Self {
        Self {
            max_attempts: settings.reconnect_attempts,
            initial_delay: Duration::from_millis(settings.reconnect_delay_ms),
            max_delay: Duration::from_millis(settings.reconnect_delay_max_ms),
        }
    }
}
