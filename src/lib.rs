//! # tourneysync
//!
//! `tourneysync` is the client-side real-time synchronization layer of a
//! gaming-tournament dashboard. It keeps one shared WebSocket connection per
//! process, multiplexes topic subscriptions over it, turns server pushes into
//! cache invalidations, and sequences the resulting user-facing notifications
//! so at most one is visible at a time.
//!
//! ## Core Modules
//!
//! - `realtime`: topics, wire messages, transports and the shared channel.
//! - `cache`: the query cache and the bridge from realtime events to invalidations.
//! - `notify`: the notification state machine and its producer handle.
//! - `session`: the authenticated identity the channel reads credentials and scopes from.
//! - `config`: loading settings from file and environment.
//! - `utils`: error type and logging setup.

pub mod cache;
pub mod config;
pub mod notify;
pub mod realtime;
pub mod session;
pub mod utils;

pub use utils::{Error, Result};
