//! In-memory transport
//!
//! Records everything the channel asks of its transport so behaviour can be
//! asserted without a socket. Lifecycle signals are injected by the caller
//! through `RealtimeChannel::handle_transport_event`, or tagged with
//! [`MemoryHandle::last_connection`] and fed through `deliver`.

use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::realtime::message::Frame;
use crate::realtime::transport::{Connector, Transport};
use crate::utils::{Error, Result};

#[derive(Debug, Default)]
pub struct MemoryLog {
    /// Credentials passed to each `connect`.
    pub connects: Vec<Option<String>>,
    /// Connection ids passed to each `connect`, in order.
    pub connections: Vec<Uuid>,
    pub reconnects: usize,
    pub closes: usize,
    pub sent: Vec<Frame>,
    /// When set, `send` fails as if the socket were gone.
    pub fail_sends: bool,
}

/// Shared view of what the memory transports did.
#[derive(Debug, Clone, Default)]
pub struct MemoryHandle {
    log: Arc<Mutex<MemoryLog>>,
}

impl MemoryHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, MemoryLog> {
        // a poisoned log still holds valid records
        self.log.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn sent(&self) -> Vec<Frame> {
        self.log().sent.clone()
    }

    /// Names of the sent frames, in order.
    pub fn sent_events(&self) -> Vec<String> {
        self.log().sent.iter().map(|f| f.event.clone()).collect()
    }

    pub fn count_sent(&self, event: &str) -> usize {
        self.log().sent.iter().filter(|f| f.event == event).count()
    }

    pub fn connects(&self) -> usize {
        self.log().connects.len()
    }

    /// Id of the most recently opened connection.
    pub fn last_connection(&self) -> Option<Uuid> {
        self.log().connections.last().copied()
    }

    pub fn reconnects(&self) -> usize {
        self.log().reconnects
    }

    pub fn closes(&self) -> usize {
        self.log().closes
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.log().fail_sends = fail;
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    handle: MemoryHandle,
}

impl MemoryConnector {
    pub fn new(handle: MemoryHandle) -> Self {
        Self { handle }
    }
}

impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    fn connect(&mut self, connection: Uuid, credentials: Option<String>) -> MemoryTransport {
        let mut log = self.handle.log();
        log.connects.push(credentials);
        log.connections.push(connection);
        drop(log);
        MemoryTransport {
            handle: self.handle.clone(),
        }
    }
}

#[derive(Debug)]
pub struct MemoryTransport {
    handle: MemoryHandle,
}

impl Transport for MemoryTransport {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        let mut log = self.handle.log();
        if log.fail_sends {
            return Err(Error::NotConnected);
        }
        log.sent.push(frame.clone());
        Ok(())
    }

    fn reconnect(&mut self) {
        self.handle.log().reconnects += 1;
    }

    fn close(&mut self) {
        self.handle.log().closes += 1;
    }
}
