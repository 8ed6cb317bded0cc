//! Notification sequencer
//!
//! Presents notifications one at a time through an explicit state machine:
//!
//! ```text
//!            enqueue                 dismiss / expired / error arrives
//!   Idle ─────────────▶ Showing ─────────────────────────────────▶ Debouncing
//!    ▲                                                                 │
//!    └──────────────────────── debounce interval ─────────────────────┘
//! ```
//!
//! An error that interrupts jumps to the head of the queue.
//! A route change resets every state to `Idle` and discards the queue.
//! The clock is passed in, so every transition is deterministic.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;
use tracing::debug;

use crate::notify::notification::{Notification, NotificationId};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, PartialEq)]
pub enum SequencerState {
    /// Nothing shown, nothing waiting to be promoted.
    Idle,
    Showing {
        current: Notification,
        since: Instant,
    },
    /// The slot is held empty until `since + debounce`.
    Debouncing { since: Instant },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SequencerInput {
    Enqueue(Notification),
    /// The view dismissed a notification, shown or still queued.
    Dismiss(NotificationId),
    /// Time passed; re-evaluate deadlines.
    Tick,
    RouteChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HideReason {
    Dismissed,
    Expired,
    /// An error pre-empted the shown notification.
    Interrupted,
    RouteChanged,
}

/// What the view layer should do in response to a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEffect {
    Show(Notification),
    Hide { id: NotificationId, reason: HideReason },
    /// The queue was flushed by a route change.
    Cleared { discarded: usize },
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    state: SequencerState,
    queue: VecDeque<Notification>,
    debounce: Duration,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl Sequencer {
    pub fn new(debounce: Duration) -> Self {
        Self {
            state: SequencerState::Idle,
            queue: VecDeque::new(),
            debounce,
        }
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn current(&self) -> Option<&Notification> {
        match &self.state {
            SequencerState::Showing { current, .. } => Some(current),
            _ => None,
        }
    }

    /// Notifications waiting for the slot, head first.
    pub fn pending(&self) -> impl Iterator<Item = &Notification> {
        self.queue.iter()
    }

    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    /// When the current state next changes on its own, if ever.
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            SequencerState::Idle => None,
            SequencerState::Showing { current, since } => {
                Some(*since + current.effective_duration(self.debounce))
            }
            SequencerState::Debouncing { since } => Some(*since + self.debounce),
        }
    }

    /// Applies one input at time `now` and returns the resulting effects in order.
    pub fn apply(&mut self, input: SequencerInput, now: Instant) -> Vec<SequencerEffect> {
        let mut effects = Vec::new();

        match input {
            SequencerInput::Enqueue(notification) => {
                let interrupts = notification.is_error()
                    && self
                        .current()
                        .is_some_and(|current| current.id != notification.id);
                if interrupts {
                    // the interrupting error is shown next, ahead of older arrivals
                    debug!("notification {} interrupts the current one", notification.id);
                    self.queue.push_front(notification);
                    self.hide_current(now, HideReason::Interrupted, &mut effects);
                } else {
                    debug!("queued notification {}", notification.id);
                    self.queue.push_back(notification);
                }
            }
            SequencerInput::Dismiss(id) => {
                if self.current().is_some_and(|current| current.id == id) {
                    self.hide_current(now, HideReason::Dismissed, &mut effects);
                } else {
                    self.queue.retain(|n| n.id != id);
                }
            }
            SequencerInput::Tick => {}
            SequencerInput::RouteChanged => {
                let mut discarded = self.queue.len();
                if let Some(current) = self.current() {
                    effects.push(SequencerEffect::Hide {
                        id: current.id,
                        reason: HideReason::RouteChanged,
                    });
                    discarded += 1;
                }
                self.queue.clear();
                self.state = SequencerState::Idle;
                effects.push(SequencerEffect::Cleared { discarded });
                return effects;
            }
        }

        self.advance(now, &mut effects);
        effects
    }

    fn hide_current(&mut self, now: Instant, reason: HideReason, effects: &mut Vec<SequencerEffect>) {
        if let Some(current) = self.current() {
            effects.push(SequencerEffect::Hide {
                id: current.id,
                reason,
            });
            self.state = SequencerState::Debouncing { since: now };
        }
    }

    /// Runs every transition that is due at `now`. Transitions are timed from
    /// their deadlines, not from when they are observed, so a late tick does
    /// not stretch display or debounce time.
    fn advance(&mut self, now: Instant, effects: &mut Vec<SequencerEffect>) {
        let mut free_since = now;

        loop {
            match &self.state {
                SequencerState::Idle => {
                    if let Some(next) = self.queue.pop_front() {
                        effects.push(SequencerEffect::Show(next.clone()));
                        self.state = SequencerState::Showing {
                            current: next,
                            since: free_since,
                        };
                        continue;
                    }
                    return;
                }
                SequencerState::Showing { current, since } => {
                    let expires = *since + current.effective_duration(self.debounce);
                    if now < expires {
                        return;
                    }
                    effects.push(SequencerEffect::Hide {
                        id: current.id,
                        reason: HideReason::Expired,
                    });
                    self.state = SequencerState::Debouncing { since: expires };
                }
                SequencerState::Debouncing { since } => {
                    let ends = *since + self.debounce;
                    if now < ends {
                        return;
                    }
                    free_since = ends;
                    self.state = SequencerState::Idle;
                }
            }
        }
    }
}

/// Drives a [`Sequencer`] from `inputs`, waking on its deadlines, and
/// forwards every effect. Stops when either side hangs up.
pub async fn run_sequencer(
    mut sequencer: Sequencer,
    mut inputs: UnboundedReceiver<SequencerInput>,
    effects: UnboundedSender<SequencerEffect>,
) {
    loop {
        let input = match sequencer.next_deadline() {
            Some(deadline) => tokio::select! {
                input = inputs.recv() => input,
                _ = tokio::time::sleep_until(deadline) => Some(SequencerInput::Tick),
            },
            None => inputs.recv().await,
        };

        let Some(input) = input else {
            debug!("notification inputs closed; sequencer stopping");
            return;
        };

        for effect in sequencer.apply(input, Instant::now()) {
            if effects.send(effect).is_err() {
                return;
            }
        }
    }
}
