//! Notification center
//!
//! The single funnel through which every producer (mutation results, bridge
//! events, validation) hands notifications to the sequencer.

use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::NotificationSettings;
use crate::notify::notification::{Notification, NotificationId, NotificationKind};
use crate::notify::sequencer::{Sequencer, SequencerEffect, SequencerInput, run_sequencer};

/// Cloneable producer handle feeding the sequencer.
#[derive(Debug, Clone)]
pub struct NotificationCenter {
    inputs: UnboundedSender<SequencerInput>,
    next_id: Arc<AtomicU64>,
    default_duration: Duration,
}

impl NotificationCenter {
    pub fn new(inputs: UnboundedSender<SequencerInput>, default_duration: Duration) -> Self {
        Self {
            inputs,
            next_id: Arc::new(AtomicU64::new(1)),
            default_duration,
        }
    }

    /// A center plus the receiving end its sequencer should consume.
    pub fn channel(default_duration: Duration) -> (Self, UnboundedReceiver<SequencerInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx, default_duration), rx)
    }

    /// Starts a sequencer task configured from `settings`.
    ///
    /// Returns the center, the stream of display effects and the task handle.
    pub fn spawn(
        settings: &NotificationSettings,
    ) -> (Self, UnboundedReceiver<SequencerEffect>, JoinHandle<()>) {
        let (center, inputs) = Self::channel(settings.default_duration());
        let (effects_tx, effects_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_sequencer(
            Sequencer::new(settings.debounce()),
            inputs,
            effects_tx,
        ));
        (center, effects_rx, task)
    }

    fn send(&self, input: SequencerInput) {
        if self.inputs.send(input).is_err() {
            debug!("notification sequencer is gone; input dropped");
        }
    }

    pub fn notify(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        duration: Option<Duration>,
    ) -> NotificationId {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let notification = Notification::new(
            id,
            kind,
            message,
            duration.unwrap_or(self.default_duration),
        );
        self.send(SequencerInput::Enqueue(notification));
        id
    }

    pub fn info(&self, message: impl Into<String>) -> NotificationId {
        self.notify(NotificationKind::Info, message, None)
    }

    pub fn success(&self, message: impl Into<String>) -> NotificationId {
        self.notify(NotificationKind::Success, message, None)
    }

    pub fn error(&self, message: impl Into<String>) -> NotificationId {
        self.notify(NotificationKind::Error, message, None)
    }

    /// Interception point for remote calls: an `Err` becomes an error
    /// notification, an `Ok` value is passed through.
    pub fn report<T, E: Display>(&self, result: Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("request failed: {e}");
                self.error(e.to_string());
                None
            }
        }
    }

    pub fn dismiss(&self, id: NotificationId) {
        self.send(SequencerInput::Dismiss(id));
    }

    /// Navigation discards everything queued or shown.
    pub fn route_changed(&self) {
        self.send(SequencerInput::RouteChanged);
    }
}
