use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::center::NotificationCenter;
use super::notification::{Notification, NotificationId, NotificationKind};
use super::sequencer::{
    DEFAULT_DEBOUNCE, HideReason, Sequencer, SequencerEffect, SequencerInput, SequencerState,
    run_sequencer,
};
use crate::config::Settings;

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn note(id: u64, kind: NotificationKind, duration_ms: u64) -> Notification {
    Notification::new(NotificationId(id), kind, format!("note {id}"), ms(duration_ms))
}

fn shown(effects: &[SequencerEffect]) -> Vec<NotificationId> {
    effects
        .iter()
        .filter_map(|e| match e {
            SequencerEffect::Show(n) => Some(n.id),
            _ => None,
        })
        .collect()
}

#[test]
fn test_effective_duration_floor() {
    let short = note(1, NotificationKind::Info, 1000);
    let long = note(2, NotificationKind::Info, 4500);
    assert_eq!(short.effective_duration(DEFAULT_DEBOUNCE), ms(3000));
    assert_eq!(long.effective_duration(DEFAULT_DEBOUNCE), ms(4500));
    assert_eq!(short.to_string(), "[info] note 1");
}

#[test]
fn test_enqueue_from_idle_shows_immediately() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    assert_eq!(seq.state(), &SequencerState::Idle);
    assert_eq!(seq.next_deadline(), None);

    let effects = seq.apply(
        SequencerInput::Enqueue(note(1, NotificationKind::Success, 1000)),
        t0,
    );
    assert_eq!(shown(&effects), vec![NotificationId(1)]);
    assert_eq!(seq.current().map(|n| n.id), Some(NotificationId(1)));
    assert_eq!(seq.pending().count(), 0);
    assert_eq!(seq.next_deadline(), Some(t0 + ms(3000)));
}

#[test]
fn test_short_duration_is_raised_to_debounce() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    seq.apply(SequencerInput::Enqueue(note(1, NotificationKind::Info, 500)), t0);

    assert!(seq.apply(SequencerInput::Tick, t0 + ms(2999)).is_empty());
    let effects = seq.apply(SequencerInput::Tick, t0 + ms(3000));
    assert_eq!(
        effects,
        vec![SequencerEffect::Hide {
            id: NotificationId(1),
            reason: HideReason::Expired
        }]
    );
    assert_eq!(
        seq.state(),
        &SequencerState::Debouncing {
            since: t0 + ms(3000)
        }
    );
}

#[test]
fn test_long_duration_is_kept() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    seq.apply(SequencerInput::Enqueue(note(1, NotificationKind::Info, 5000)), t0);

    assert!(seq.apply(SequencerInput::Tick, t0 + ms(4999)).is_empty());
    assert_eq!(seq.apply(SequencerInput::Tick, t0 + ms(5000)).len(), 1);
}

#[test]
fn test_burst_is_spaced_by_debounce() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    for id in 1..=3 {
        seq.apply(SequencerInput::Enqueue(note(id, NotificationKind::Info, 0)), t0);
    }
    assert_eq!(seq.pending().count(), 2);

    // N1 leaves at 3s, slot empty until 6s
    seq.apply(SequencerInput::Tick, t0 + ms(3000));
    assert!(matches!(seq.state(), SequencerState::Debouncing { .. }));
    assert!(shown(&seq.apply(SequencerInput::Tick, t0 + ms(5999))).is_empty());

    let effects = seq.apply(SequencerInput::Tick, t0 + ms(6000));
    assert_eq!(shown(&effects), vec![NotificationId(2)]);
}

#[test]
fn test_late_tick_replays_deadlines() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    seq.apply(SequencerInput::Enqueue(note(1, NotificationKind::Info, 0)), t0);
    seq.apply(SequencerInput::Enqueue(note(2, NotificationKind::Info, 0)), t0);

    // one tick long after: N1 expired at 3s, N2 shown at 6s
    let effects = seq.apply(SequencerInput::Tick, t0 + ms(7000));
    assert_eq!(
        effects,
        vec![
            SequencerEffect::Hide {
                id: NotificationId(1),
                reason: HideReason::Expired
            },
            SequencerEffect::Show(note_like(&seq, 2)),
        ]
    );
    assert_eq!(seq.next_deadline(), Some(t0 + ms(9000)));
}

fn note_like(seq: &Sequencer, id: u64) -> Notification {
    let current = seq.current().expect("a notification is showing");
    assert_eq!(current.id, NotificationId(id));
    current.clone()
}

#[test]
fn test_dismiss_current_enters_debounce() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    seq.apply(SequencerInput::Enqueue(note(1, NotificationKind::Info, 10_000)), t0);
    seq.apply(SequencerInput::Enqueue(note(2, NotificationKind::Info, 0)), t0);

    let effects = seq.apply(SequencerInput::Dismiss(NotificationId(1)), t0 + ms(1000));
    assert_eq!(
        effects,
        vec![SequencerEffect::Hide {
            id: NotificationId(1),
            reason: HideReason::Dismissed
        }]
    );
    assert!(shown(&seq.apply(SequencerInput::Tick, t0 + ms(3999))).is_empty());
    assert_eq!(
        shown(&seq.apply(SequencerInput::Tick, t0 + ms(4000))),
        vec![NotificationId(2)]
    );
}

#[test]
fn test_dismiss_pending_removes_it() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    seq.apply(SequencerInput::Enqueue(note(1, NotificationKind::Info, 0)), t0);
    seq.apply(SequencerInput::Enqueue(note(2, NotificationKind::Info, 0)), t0);

    assert!(seq.apply(SequencerInput::Dismiss(NotificationId(2)), t0).is_empty());
    assert_eq!(seq.pending().count(), 0);
    assert_eq!(seq.current().map(|n| n.id), Some(NotificationId(1)));
}

#[test]
fn test_error_interrupts_shown_notification() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    seq.apply(SequencerInput::Enqueue(note(1, NotificationKind::Success, 10_000)), t0);
    seq.apply(SequencerInput::Enqueue(note(2, NotificationKind::Info, 0)), t0 + ms(100));
    assert_eq!(seq.current().map(|n| n.id), Some(NotificationId(1)));

    let effects = seq.apply(
        SequencerInput::Enqueue(note(3, NotificationKind::Error, 0)),
        t0 + ms(200),
    );
    assert_eq!(
        effects,
        vec![SequencerEffect::Hide {
            id: NotificationId(1),
            reason: HideReason::Interrupted
        }]
    );
    assert_eq!(
        seq.state(),
        &SequencerState::Debouncing {
            since: t0 + ms(200)
        }
    );

    // the error jumps ahead of N2, which keeps its place behind it
    assert_eq!(
        shown(&seq.apply(SequencerInput::Tick, t0 + ms(3200))),
        vec![NotificationId(3)]
    );
    assert_eq!(
        seq.pending().map(|n| n.id).collect::<Vec<_>>(),
        vec![NotificationId(2)]
    );
    seq.apply(SequencerInput::Tick, t0 + ms(6200));
    assert_eq!(
        shown(&seq.apply(SequencerInput::Tick, t0 + ms(9200))),
        vec![NotificationId(2)]
    );
}

#[test]
fn test_error_interrupts_another_error() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    seq.apply(SequencerInput::Enqueue(note(1, NotificationKind::Error, 10_000)), t0);
    let effects = seq.apply(SequencerInput::Enqueue(note(2, NotificationKind::Error, 0)), t0);
    assert_eq!(effects.len(), 1);
    assert!(matches!(seq.state(), SequencerState::Debouncing { .. }));
}

#[test]
fn test_non_error_waits_its_turn() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    seq.apply(SequencerInput::Enqueue(note(1, NotificationKind::Info, 10_000)), t0);
    let effects = seq.apply(SequencerInput::Enqueue(note(2, NotificationKind::Success, 0)), t0);
    assert!(effects.is_empty());
    assert_eq!(seq.current().map(|n| n.id), Some(NotificationId(1)));
}

#[test]
fn test_error_during_debounce_is_queued() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    seq.apply(SequencerInput::Enqueue(note(1, NotificationKind::Info, 0)), t0);
    seq.apply(SequencerInput::Dismiss(NotificationId(1)), t0);

    let effects = seq.apply(SequencerInput::Enqueue(note(2, NotificationKind::Error, 0)), t0 + ms(10));
    assert!(effects.is_empty());
    assert_eq!(
        shown(&seq.apply(SequencerInput::Tick, t0 + ms(3000))),
        vec![NotificationId(2)]
    );
}

#[test]
fn test_route_change_discards_everything() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    seq.apply(SequencerInput::Enqueue(note(1, NotificationKind::Info, 0)), t0);
    seq.apply(SequencerInput::Enqueue(note(2, NotificationKind::Info, 0)), t0);
    seq.apply(SequencerInput::Enqueue(note(3, NotificationKind::Info, 0)), t0);

    let effects = seq.apply(SequencerInput::RouteChanged, t0 + ms(10));
    assert_eq!(
        effects,
        vec![
            SequencerEffect::Hide {
                id: NotificationId(1),
                reason: HideReason::RouteChanged
            },
            SequencerEffect::Cleared { discarded: 3 },
        ]
    );
    assert_eq!(seq.state(), &SequencerState::Idle);
    assert_eq!(seq.pending().count(), 0);
    assert_eq!(seq.next_deadline(), None);
}

#[test]
fn test_route_change_during_debounce_resets_to_idle() {
    let t0 = Instant::now();
    let mut seq = Sequencer::default();
    seq.apply(SequencerInput::Enqueue(note(1, NotificationKind::Info, 0)), t0);
    seq.apply(SequencerInput::Enqueue(note(2, NotificationKind::Info, 0)), t0);
    seq.apply(SequencerInput::Dismiss(NotificationId(1)), t0);

    let effects = seq.apply(SequencerInput::RouteChanged, t0 + ms(1));
    assert_eq!(effects, vec![SequencerEffect::Cleared { discarded: 1 }]);
    assert_eq!(seq.state(), &SequencerState::Idle);

    // a fresh notification shows without waiting for the old debounce
    let effects = seq.apply(SequencerInput::Enqueue(note(3, NotificationKind::Info, 0)), t0 + ms(2));
    assert_eq!(shown(&effects), vec![NotificationId(3)]);
}

#[test]
fn test_center_allocates_monotonic_ids() {
    let (center, mut inputs) = NotificationCenter::channel(ms(3000));
    let a = center.success("saved");
    let b = center.clone().error("failed");
    assert!(b > a);

    match inputs.try_recv().unwrap() {
        SequencerInput::Enqueue(n) => {
            assert_eq!(n.id, a);
            assert_eq!(n.kind, NotificationKind::Success);
            assert_eq!(n.duration, ms(3000));
        }
        other => panic!("unexpected input {other:?}"),
    }
    assert!(matches!(
        inputs.try_recv().unwrap(),
        SequencerInput::Enqueue(n) if n.kind == NotificationKind::Error
    ));
}

#[test]
fn test_center_report_funnels_errors() {
    let (center, mut inputs) = NotificationCenter::channel(ms(3000));

    let ok: Result<u32, String> = Ok(7);
    assert_eq!(center.report(ok), Some(7));
    assert!(inputs.try_recv().is_err());

    let failed: Result<u32, String> = Err("insufficient balance".to_string());
    assert_eq!(center.report(failed), None);
    match inputs.try_recv().unwrap() {
        SequencerInput::Enqueue(n) => {
            assert_eq!(n.kind, NotificationKind::Error);
            assert_eq!(n.message, "insufficient balance");
        }
        other => panic!("unexpected input {other:?}"),
    }
}

#[test]
fn test_center_forwards_controls() {
    let (center, mut inputs) = NotificationCenter::channel(ms(3000));
    center.dismiss(NotificationId(4));
    center.route_changed();
    assert_eq!(
        inputs.try_recv().unwrap(),
        SequencerInput::Dismiss(NotificationId(4))
    );
    assert_eq!(inputs.try_recv().unwrap(), SequencerInput::RouteChanged);

    // a closed sequencer does not make producers fail
    drop(inputs);
    center.info("ignored");
}

#[tokio::test(start_paused = true)]
async fn test_run_sequencer_times_transitions() {
    let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();
    let (effects_tx, mut effects_rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_sequencer(Sequencer::default(), inputs_rx, effects_tx));

    let start = Instant::now();
    inputs_tx
        .send(SequencerInput::Enqueue(note(1, NotificationKind::Info, 0)))
        .unwrap();
    inputs_tx
        .send(SequencerInput::Enqueue(note(2, NotificationKind::Info, 0)))
        .unwrap();

    assert!(matches!(effects_rx.recv().await, Some(SequencerEffect::Show(n)) if n.id == NotificationId(1)));
    assert!(matches!(
        effects_rx.recv().await,
        Some(SequencerEffect::Hide { reason: HideReason::Expired, .. })
    ));
    assert_eq!(start.elapsed(), ms(3000));

    assert!(matches!(effects_rx.recv().await, Some(SequencerEffect::Show(n)) if n.id == NotificationId(2)));
    assert_eq!(start.elapsed(), ms(6000));

    drop(inputs_tx);
    task.await.unwrap();
}

#[tokio::test]
async fn test_spawn_from_settings() {
    let settings = Settings::default();
    let (center, mut effects, task) = NotificationCenter::spawn(&settings.notifications);
    let id = center.error("boom");

    match effects.recv().await {
        Some(SequencerEffect::Show(n)) => {
            assert_eq!(n.id, id);
            assert_eq!(n.message, "boom");
        }
        other => panic!("unexpected effect {other:?}"),
    }

    drop(center);
    task.abort();
}
