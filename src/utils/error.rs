//! The `error` module defines the error type shared by every `tourneysync`
//! component.
//!
//! Transport failures are retried by the reconnect policy and malformed
//! inbound events are discarded, so most of these errors stay inside the
//! crate and only surface through logs.

use tokio::sync::mpsc::error::SendError;

/// Errors produced by the real-time channel, its transports and configuration.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration could not be loaded or deserialized
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// JSON (de)serialization failed
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket protocol or handshake error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Realtime URL could not be parsed
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    /// The access token could not be used as a header value
    #[error("invalid credentials header")]
    InvalidCredentials,

    /// A topic string did not describe a well-formed topic
    #[error("malformed topic: {0}")]
    MalformedTopic(String),

    /// An inbound frame did not match any known event
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// The transport has no live outbound channel
    #[error("transport not connected")]
    NotConnected,

    /// An internal channel was closed
    #[error("channel closed")]
    ChannelClosed,
}

impl<T> From<SendError<T>> for Error {
    fn from(_: SendError<T>) -> Self {
        Error::ChannelClosed
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
