//! Realtime channel
//!
//! [`RealtimeChannel`] owns the single shared connection and the set of active
//! topic subscriptions:
//! - at most one connection exists; it is created lazily on first use and a
//!   disconnected one is reconnected in place rather than replaced
//! - each distinct topic is registered with the server at most once
//! - registrations requested before the connection is open are held and sent
//!   on `Open`, and re-sent after every reconnect
//! - inbound events are dispatched in delivery order to listeners whose topic
//!   is subscribed and accepts the event's scoping id
//!
//! The channel is synchronous and meant to sit behind [`SharedChannel`]. Every
//! mutation happens inside one lock scope, never across I/O. [`deliver`] (and
//! so [`pump`]) runs listener sinks after releasing that lock, so a sink may
//! create or drop [`SubscriptionHandle`]s on the same channel.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::realtime::message::InboundEvent;
use crate::realtime::topic::{Registration, Topic};
use crate::realtime::transport::{ConnectionEvent, Connector, Transport, TransportEvent};
use crate::session::SessionStore;

pub type ListenerId = u64;

pub type SharedChannel<C> = Arc<Mutex<RealtimeChannel<C>>>;

/// Locks a shared channel. A poisoned lock is recovered: the channel holds no
/// invariant a panicking listener could break halfway.
pub fn lock_channel<C: Connector>(channel: &SharedChannel<C>) -> MutexGuard<'_, RealtimeChannel<C>> {
    channel.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Receives the events a listener's topic accepts.
///
/// Sinks reached through [`deliver`] run without the channel lock held.
/// Sinks reached through [`RealtimeChannel::dispatch`] run inside whatever
/// lock the caller holds and must not lock the same [`SharedChannel`].
pub trait EventSink: Send {
    fn on_event(&mut self, topic: &Topic, event: &InboundEvent);
}

impl<F> EventSink for F
where
    F: FnMut(&Topic, &InboundEvent) + Send,
{
    fn on_event(&mut self, topic: &Topic, event: &InboundEvent) {
        self(topic, event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Disconnected,
}

/// The one live transport plus its observed status.
#[derive(Debug)]
pub struct Connection<T> {
    id: Uuid,
    status: ConnectionStatus,
    transport: T,
}

impl<T> Connection<T> {
    fn new(id: Uuid, transport: T) -> Self {
        Self {
            id,
            status: ConnectionStatus::Connecting,
            transport,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_open(&self) -> bool {
        self.status == ConnectionStatus::Open
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionState {
    /// Waiting for the connection to open.
    Pending,
    /// The subscribe frame went out on the current connection.
    Registered,
}

type SharedSink = Arc<Mutex<dyn EventSink>>;

struct Listener {
    topic: Topic,
    sink: SharedSink,
}

/// A listener picked for one event, invoked after the routing lock is gone.
struct Route {
    listener: ListenerId,
    topic: Topic,
    sink: SharedSink,
}

impl Route {
    fn invoke(&self, event: &InboundEvent) {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .on_event(&self.topic, event);
    }
}

pub struct RealtimeChannel<C: Connector> {
    connector: C,
    session: SessionStore,
    connection: Option<Connection<C::Transport>>,
    subscriptions: HashMap<Topic, SubscriptionState>,
    listeners: BTreeMap<ListenerId, Listener>,
    next_listener: ListenerId,
}

impl<C: Connector> RealtimeChannel<C> {
    pub fn new(connector: C, session: SessionStore) -> Self {
        Self {
            connector,
            session,
            connection: None,
            subscriptions: HashMap::new(),
            listeners: BTreeMap::new(),
            next_listener: 1,
        }
    }

    pub fn shared(self) -> SharedChannel<C> {
        Arc::new(Mutex::new(self))
    }

    /// Returns the live connection, creating it on first use.
    ///
    /// A connection that dropped is reconnected on the same instance. The
    /// session's access token is read only when a connection is created.
    pub fn acquire_connection(&mut self) -> &Connection<C::Transport> {
        let connector = &mut self.connector;
        let session = &self.session;
        let connection = self.connection.get_or_insert_with(|| {
            let id = Uuid::new_v4();
            let connection = Connection::new(id, connector.connect(id, session.access_token()));
            info!("realtime connection {} created", connection.id);
            connection
        });

        if connection.status == ConnectionStatus::Disconnected {
            info!("realtime connection {} reconnecting", connection.id);
            connection.transport.reconnect();
            connection.status = ConnectionStatus::Connecting;
        }

        connection
    }

    pub fn connection(&self) -> Option<&Connection<C::Transport>> {
        self.connection.as_ref()
    }

    /// Registers interest in `topic`.
    ///
    /// Returns false without any network effect when the topic is malformed
    /// or already subscribed.
    pub fn subscribe(&mut self, topic: Topic) -> bool {
        if !topic.is_well_formed() {
            warn!("ignoring subscription to malformed topic {topic:?}");
            return false;
        }
        if self.subscriptions.contains_key(&topic) {
            debug!("already subscribed to {topic}");
            return false;
        }

        let open = self.acquire_connection().is_open();
        let state = if open && self.register(&topic, Registration::Subscribe) {
            SubscriptionState::Registered
        } else {
            debug!("subscription to {topic} queued until the connection opens");
            SubscriptionState::Pending
        };
        self.subscriptions.insert(topic, state);
        true
    }

    /// Releases interest in `topic`. No-op if not subscribed.
    pub fn unsubscribe(&mut self, topic: &Topic) -> bool {
        match self.subscriptions.remove(topic) {
            None => false,
            Some(SubscriptionState::Registered) => {
                self.register(topic, Registration::Unsubscribe);
                true
            }
            Some(SubscriptionState::Pending) => {
                debug!("dropped queued subscription to {topic}");
                true
            }
        }
    }

    pub fn is_subscribed(&self, topic: &Topic) -> bool {
        self.subscriptions.contains_key(topic)
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &Topic> {
        self.subscriptions.keys()
    }

    /// Attaches `sink` to `topic`. The sink only sees events while the topic is subscribed.
    pub fn listen(&mut self, topic: Topic, sink: impl EventSink + 'static) -> ListenerId {
        let id = self.next_listener;
        self.next_listener += 1;
        self.listeners.insert(
            id,
            Listener {
                topic,
                sink: Arc::new(Mutex::new(sink)),
            },
        );
        id
    }

    /// Detaches a listener, returning the topic it was bound to.
    pub fn unlisten(&mut self, id: ListenerId) -> Option<Topic> {
        self.listeners.remove(&id).map(|listener| listener.topic)
    }

    pub fn listener_count(&self, topic: &Topic) -> usize {
        self.listeners.values().filter(|l| &l.topic == topic).count()
    }

    /// Removes a listener and unsubscribes its topic once nothing else listens to it.
    pub fn release(&mut self, id: ListenerId) {
        if let Some(topic) = self.unlisten(id) {
            if self.listener_count(&topic) == 0 {
                self.unsubscribe(&topic);
            }
        }
    }

    /// Applies a signal from the transport of the live connection and
    /// dispatches any inbound event it carries.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        if let Some(inbound) = self.apply_signal(event) {
            self.dispatch(&inbound);
        }
    }

    /// Like [`Self::handle_transport_event`], but ignores signals from any
    /// connection other than the live one.
    pub fn handle_connection_event(&mut self, event: ConnectionEvent) {
        if self.accepts_connection(&event) {
            self.handle_transport_event(event.event);
        }
    }

    /// Delivers `event` to every interested listener; returns how many received it.
    pub fn dispatch(&mut self, event: &InboundEvent) -> usize {
        let routes = self.route(event);
        for route in &routes {
            route.invoke(event);
        }
        routes.len()
    }

    fn accepts_connection(&self, event: &ConnectionEvent) -> bool {
        let live = self
            .connection
            .as_ref()
            .is_some_and(|c| c.id == event.connection);
        if !live {
            debug!(
                "ignoring {:?} from stale connection {}",
                event.event, event.connection
            );
        }
        live
    }

    /// Updates connection state for a lifecycle signal, or parses an inbound frame.
    fn apply_signal(&mut self, event: TransportEvent) -> Option<InboundEvent> {
        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Closed { exhausted } => self.on_closed(exhausted),
            TransportEvent::Message(text) => match InboundEvent::parse(&text) {
                Ok(event) => return Some(event),
                Err(e) => debug!("discarding inbound frame: {e}"),
            },
        }
        None
    }

    /// Listeners that should see `event`, in registration order.
    fn route(&self, event: &InboundEvent) -> Vec<Route> {
        self.listeners
            .iter()
            .filter(|(_, listener)| {
                if !self.subscriptions.contains_key(&listener.topic) {
                    return false;
                }
                if !listener.topic.accepts(event) {
                    trace!("{} ignored by listener on {}", event.name(), listener.topic);
                    return false;
                }
                true
            })
            .map(|(id, listener)| Route {
                listener: *id,
                topic: listener.topic.clone(),
                sink: Arc::clone(&listener.sink),
            })
            .collect()
    }

    /// Whether `id` is still attached to an active subscription.
    fn is_receiving(&self, id: ListenerId) -> bool {
        self.listeners
            .get(&id)
            .is_some_and(|listener| self.subscriptions.contains_key(&listener.topic))
    }

    /// Application-level teardown: closes the connection and forgets all state.
    pub fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            info!("closing realtime connection {}", connection.id);
            connection.transport.close();
        }
        self.subscriptions.clear();
        self.listeners.clear();
    }

    fn on_open(&mut self) {
        let Some(connection) = self.connection.as_mut() else {
            debug!("open signal without a connection");
            return;
        };
        connection.status = ConnectionStatus::Open;
        info!("realtime connection {} open", connection.id);

        let pending: Vec<Topic> = self
            .subscriptions
            .iter()
            .filter(|(_, state)| **state == SubscriptionState::Pending)
            .map(|(topic, _)| topic.clone())
            .collect();

        for topic in pending {
            if self.register(&topic, Registration::Subscribe) {
                if let Some(state) = self.subscriptions.get_mut(&topic) {
                    *state = SubscriptionState::Registered;
                }
            }
        }
    }

    fn on_closed(&mut self, exhausted: bool) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        connection.status = ConnectionStatus::Disconnected;
        if exhausted {
            warn!(
                "realtime connection {} gave up reconnecting; will retry on next use",
                connection.id
            );
        } else {
            info!("realtime connection {} dropped", connection.id);
        }

        for state in self.subscriptions.values_mut() {
            *state = SubscriptionState::Pending;
        }
    }

    /// Sends a registration frame if the connection is open.
    fn register(&mut self, topic: &Topic, registration: Registration) -> bool {
        let Some(connection) = self.connection.as_mut() else {
            return false;
        };
        if !connection.is_open() {
            return false;
        }

        let frame = topic.frame(registration);
        match connection.transport.send(&frame) {
            Ok(()) => {
                info!("sent {} for {topic}", frame.event);
                true
            }
            Err(e) => {
                warn!("failed to send {} for {topic}: {e}", frame.event);
                false
            }
        }
    }
}

impl<C: Connector> fmt::Debug for RealtimeChannel<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeChannel")
            .field("connection", &self.connection.as_ref().map(|c| (c.id, c.status)))
            .field("subscriptions", &self.subscriptions.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// A view's binding to a topic. Dropping it releases the listener and, when
/// it was the last one on the topic, the subscription.
pub struct SubscriptionHandle<C: Connector> {
    channel: SharedChannel<C>,
    topic: Topic,
    listener: ListenerId,
}

impl<C: Connector> SubscriptionHandle<C> {
    /// Subscribes `topic` and attaches `sink`. Returns `None` for malformed topics.
    pub fn new(
        channel: &SharedChannel<C>,
        topic: Topic,
        sink: impl EventSink + 'static,
    ) -> Option<Self> {
        if !topic.is_well_formed() {
            warn!("not watching malformed topic {topic:?}");
            return None;
        }

        let mut guard = lock_channel(channel);
        let listener = guard.listen(topic.clone(), sink);
        guard.subscribe(topic.clone());
        drop(guard);

        Some(Self {
            channel: Arc::clone(channel),
            topic,
            listener,
        })
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

impl<C: Connector> Drop for SubscriptionHandle<C> {
    fn drop(&mut self) {
        lock_channel(&self.channel).release(self.listener);
    }
}

impl<C: Connector> fmt::Debug for SubscriptionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("topic", &self.topic)
            .field("listener", &self.listener)
            .finish()
    }
}

/// Applies one tagged transport event to a shared channel.
///
/// Routing happens under the channel lock; the matching sinks then run with
/// the lock released, each one re-checked first so a listener released by an
/// earlier sink sees nothing. Returns how many sinks received the event.
pub fn deliver<C: Connector>(channel: &SharedChannel<C>, event: ConnectionEvent) -> usize {
    let (inbound, routes) = {
        let mut guard = lock_channel(channel);
        if !guard.accepts_connection(&event) {
            return 0;
        }
        let Some(inbound) = guard.apply_signal(event.event) else {
            return 0;
        };
        let routes = guard.route(&inbound);
        (inbound, routes)
    };

    let mut delivered = 0;
    for route in routes {
        if !lock_channel(channel).is_receiving(route.listener) {
            continue;
        }
        route.invoke(&inbound);
        delivered += 1;
    }
    delivered
}

/// Feeds transport events into the channel, in arrival order, until the
/// transport side hangs up.
pub async fn pump<C: Connector>(
    channel: SharedChannel<C>,
    mut events: UnboundedReceiver<ConnectionEvent>,
) {
    while let Some(event) = events.recv().await {
        deliver(&channel, event);
    }
    debug!("transport event stream ended");
}
