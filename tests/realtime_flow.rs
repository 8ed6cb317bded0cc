use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use tourneysync::cache::{DataCache, InvalidationBridge, QueryCache, QueryKey};
use tourneysync::notify::{
    NotificationCenter, NotificationKind, Sequencer, SequencerEffect, SequencerInput,
    SequencerState,
};
use tourneysync::realtime::memory::{MemoryConnector, MemoryHandle};
use tourneysync::realtime::{
    ConnectionEvent, RealtimeChannel, SharedChannel, SubscriptionHandle, Topic, TransportEvent,
    deliver,
};
use tourneysync::session::{Role, Session, SessionStore};

#[derive(Default)]
struct RecordingCache {
    invalidated: Mutex<Vec<QueryKey>>,
}

impl DataCache for RecordingCache {
    fn invalidate(&self, prefix: &QueryKey) {
        self.invalidated.lock().unwrap().push(prefix.clone());
    }
}

impl RecordingCache {
    fn take(&self) -> Vec<QueryKey> {
        std::mem::take(&mut *self.invalidated.lock().unwrap())
    }
}

struct Harness {
    memory: MemoryHandle,
    channel: SharedChannel<MemoryConnector>,
    cache: Arc<RecordingCache>,
    bridge: InvalidationBridge,
    inputs: UnboundedReceiver<SequencerInput>,
}

impl Harness {
    fn new() -> Self {
        let memory = MemoryHandle::new();
        let session = SessionStore::with_session(Session {
            user_id: "U1".to_string(),
            role: Role::User,
            access_token: "token-u1".to_string(),
        });
        let channel = RealtimeChannel::new(MemoryConnector::new(memory.clone()), session).shared();
        let cache = Arc::new(RecordingCache::default());
        let (center, inputs) = NotificationCenter::channel(Duration::from_millis(3000));
        let bridge = InvalidationBridge::new(cache.clone(), center);
        Self {
            memory,
            channel,
            cache,
            bridge,
            inputs,
        }
    }

    fn watch(&self, topic: Topic) -> SubscriptionHandle<MemoryConnector> {
        SubscriptionHandle::new(&self.channel, topic, self.bridge.clone()).unwrap()
    }

    /// Feeds `event` as reported by the live connection's transport.
    fn transport(&self, event: TransportEvent) {
        let live = self.memory.last_connection().unwrap();
        deliver(&self.channel, ConnectionEvent::new(live, event));
    }

    fn push(&self, frame: serde_json::Value) {
        self.transport(TransportEvent::Message(frame.to_string()));
    }

    fn drain_inputs(&mut self) -> Vec<SequencerInput> {
        let mut drained = Vec::new();
        while let Ok(input) = self.inputs.try_recv() {
            drained.push(input);
        }
        drained
    }
}

#[test]
fn wallet_credit_invalidates_and_notifies() {
    let mut harness = Harness::new();
    let _wallet = harness.watch(Topic::wallet("U1"));
    harness.transport(TransportEvent::Open);

    assert_eq!(harness.memory.log().connects, vec![Some("token-u1".to_string())]);
    assert_eq!(harness.memory.sent_events(), vec!["subscribe:wallet"]);

    harness.push(json!({
        "event": "wallet:balance-updated",
        "data": { "userId": "U1", "balanceGC": 150, "previousBalance": 100 }
    }));

    assert_eq!(
        harness.cache.take(),
        vec![QueryKey::wallet_balance("U1"), QueryKey::wallet_history("U1")]
    );

    let inputs = harness.drain_inputs();
    assert_eq!(inputs.len(), 1);
    let SequencerInput::Enqueue(notification) = inputs[0].clone() else {
        panic!("expected an enqueue, got {:?}", inputs[0]);
    };
    assert_eq!(notification.kind, NotificationKind::Success);
    assert!(notification.message.contains("+50 GC"), "{}", notification.message);

    let mut sequencer = Sequencer::default();
    let effects = sequencer.apply(SequencerInput::Enqueue(notification.clone()), Instant::now());
    assert_eq!(effects, vec![SequencerEffect::Show(notification)]);
}

#[test]
fn sparse_history_update_still_invalidates() {
    let mut harness = Harness::new();
    let _wallet = harness.watch(Topic::wallet("U1"));
    harness.transport(TransportEvent::Open);

    harness.push(json!({
        "event": "wallet:history-updated",
        "data": { "transaction": { "id": "X1", "userId": "U1", "amountGC": 50 } }
    }));

    assert_eq!(harness.cache.take(), vec![QueryKey::wallet_history("U1")]);
    assert!(harness.drain_inputs().is_empty());
}

#[test]
fn events_for_other_users_have_no_effect() {
    let mut harness = Harness::new();
    let _wallet = harness.watch(Topic::wallet("U1"));
    harness.transport(TransportEvent::Open);

    harness.push(json!({
        "event": "wallet:balance-updated",
        "data": { "userId": "U2", "balanceGC": 10, "previousBalance": 500 }
    }));
    harness.push(json!({
        "event": "wallet:transaction-updated",
        "data": { "transactionId": "X1", "userId": "U2", "status": "approved", "amountGC": 5, "type": "topup" }
    }));

    assert!(harness.cache.take().is_empty());
    assert!(harness.drain_inputs().is_empty());
}

#[test]
fn unmounted_ticket_view_unsubscribes_once() {
    let mut harness = Harness::new();
    let ticket = harness.watch(Topic::ticket("K1"));
    harness.transport(TransportEvent::Open);

    let reply = json!({
        "event": "ticket:reply-added",
        "data": { "ticketId": "K1", "message": "we are looking into it" }
    });
    harness.push(reply.clone());
    assert_eq!(harness.cache.take().len(), 2);
    assert_eq!(harness.drain_inputs().len(), 1);

    drop(ticket);
    assert_eq!(harness.memory.count_sent("unsubscribe:ticket"), 1);

    harness.push(reply);
    harness.push(json!({ "event": "ticket:closed", "data": { "ticketId": "K1" } }));

    assert!(harness.cache.take().is_empty());
    assert!(harness.drain_inputs().is_empty());
    assert_eq!(harness.memory.count_sent("unsubscribe:ticket"), 1);
}

#[test]
fn reconnect_restores_subscriptions() {
    let mut harness = Harness::new();
    let _feed = harness.watch(Topic::AdminTournaments);
    harness.transport(TransportEvent::Open);
    harness.transport(TransportEvent::Closed { exhausted: false });
    harness.transport(TransportEvent::Open);

    assert_eq!(harness.memory.connects(), 1);
    assert_eq!(harness.memory.count_sent("subscribe:admin-tournaments"), 2);

    harness.push(json!({
        "event": "tournament:room-updated",
        "data": { "tournamentId": "T7", "room": { "id": "R1", "password": "pw" } }
    }));
    assert_eq!(harness.cache.take(), vec![QueryKey::tournaments_all()]);
    assert_eq!(harness.drain_inputs().len(), 1);
}

#[test]
fn route_change_discards_queued_notifications() {
    let (center, mut inputs) = NotificationCenter::channel(Duration::from_millis(3000));
    let mut sequencer = Sequencer::default();
    let now = Instant::now();

    center.info("first");
    center.success("second");
    center.info("third");
    center.route_changed();

    let mut effects = Vec::new();
    while let Ok(input) = inputs.try_recv() {
        effects.extend(sequencer.apply(input, now));
    }

    assert!(matches!(effects[0], SequencerEffect::Show(ref n) if n.message == "first"));
    assert!(matches!(
        effects.last(),
        Some(SequencerEffect::Cleared { discarded: 3 })
    ));
    assert_eq!(sequencer.state(), &SequencerState::Idle);
    assert_eq!(sequencer.current(), None);
    assert_eq!(sequencer.pending().count(), 0);

    // nothing resurfaces once the debounce window would have passed
    assert!(sequencer
        .apply(SequencerInput::Tick, now + Duration::from_secs(10))
        .is_empty());
}
