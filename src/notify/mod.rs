//! The `notify` module serializes user-facing notifications into a single
//! display slot: a monotonic [`notification::Notification`] model, the
//! [`sequencer::Sequencer`] state machine with its async driver, and the
//! [`center::NotificationCenter`] producer handle.

pub mod center;
pub mod notification;
pub mod sequencer;

pub use center::NotificationCenter;
pub use notification::{Notification, NotificationId, NotificationKind};
pub use sequencer::{
    DEFAULT_DEBOUNCE, HideReason, Sequencer, SequencerEffect, SequencerInput, SequencerState,
    run_sequencer,
};

#[cfg(test)]
mod tests;
