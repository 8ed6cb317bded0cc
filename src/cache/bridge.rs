//! Invalidation bridge
//!
//! Turns inbound realtime events into cache invalidations and, when the event
//! is a user-meaningful outcome, a notification. Invalidations are issued
//! as-is every time; coalescing repeated ones is the cache's job.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::cache::query_cache::{DataCache, QueryKey};
use crate::notify::{NotificationCenter, NotificationKind};
use crate::realtime::channel::EventSink;
use crate::realtime::message::{InboundEvent, WalletBalanceUpdated, WalletTransactionUpdated};
use crate::realtime::topic::Topic;

/// What one event translates into.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub invalidate: Vec<QueryKey>,
    pub notification: Option<(NotificationKind, String)>,
}

impl Plan {
    fn silent(invalidate: Vec<QueryKey>) -> Self {
        Self {
            invalidate,
            notification: None,
        }
    }

    fn with(mut self, kind: NotificationKind, message: String) -> Self {
        self.notification = Some((kind, message));
        self
    }
}

/// Formats a GC amount without a trailing `.0` for whole numbers.
pub fn format_gc(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}

fn ticket_keys(ticket_id: &str) -> Vec<QueryKey> {
    vec![
        QueryKey::support_tickets_list(),
        QueryKey::support_ticket(ticket_id),
    ]
}

fn wallet_keys(user_id: &str) -> Vec<QueryKey> {
    vec![
        QueryKey::wallet_balance(user_id),
        QueryKey::wallet_history(user_id),
    ]
}

fn balance_plan(event: &WalletBalanceUpdated) -> Plan {
    let plan = Plan::silent(wallet_keys(&event.user_id));
    let Some(previous) = event.previous_balance else {
        return plan;
    };

    let delta = event.balance_gc - previous;
    let balance = format_gc(event.balance_gc);
    if delta > 0.0 {
        plan.with(
            NotificationKind::Success,
            format!("Wallet updated: +{} GC (balance {balance} GC)", format_gc(delta)),
        )
    } else if delta < 0.0 {
        plan.with(
            NotificationKind::Info,
            format!("Wallet updated: -{} GC (balance {balance} GC)", format_gc(-delta)),
        )
    } else {
        plan
    }
}

fn transaction_plan(event: &WalletTransactionUpdated) -> Plan {
    let plan = Plan::silent(wallet_keys(&event.user_id));
    let amount = format_gc(event.amount_gc);

    match event.status.to_ascii_lowercase().as_str() {
        "approved" | "completed" | "success" => plan.with(
            NotificationKind::Success,
            format!("Payment approved! {amount} GC added"),
        ),
        status @ ("rejected" | "failed" | "cancelled") => plan.with(
            NotificationKind::Error,
            format!("Payment {status}: {amount} GC"),
        ),
        _ => plan,
    }
}

/// Maps an event onto the cache keys to invalidate and an optional notification.
pub fn plan(event: &InboundEvent) -> Plan {
    match event {
        // list views aggregate over tournaments, so the whole keyspace goes
        InboundEvent::TournamentStatusUpdated(_) => Plan::silent(vec![QueryKey::tournaments_all()]),
        InboundEvent::TournamentRoomUpdated(e) => Plan::silent(vec![QueryKey::tournaments_all()])
            .with(
                NotificationKind::Info,
                format!("Room details updated for tournament {}", e.tournament_id),
            ),
        InboundEvent::TicketReplyAdded(e) => Plan::silent(ticket_keys(&e.ticket_id)).with(
            NotificationKind::Info,
            format!("New reply on ticket {}", e.ticket_id),
        ),
        InboundEvent::TicketStatusUpdated(e) => Plan::silent(ticket_keys(&e.ticket_id)),
        InboundEvent::TicketClosed(e) => Plan::silent(ticket_keys(&e.ticket_id)).with(
            NotificationKind::Info,
            format!("Ticket {} was closed", e.ticket_id),
        ),
        InboundEvent::WalletBalanceUpdated(e) => balance_plan(e),
        InboundEvent::WalletTransactionUpdated(e) => transaction_plan(e),
        InboundEvent::WalletHistoryUpdated(e) => {
            Plan::silent(vec![QueryKey::wallet_history(&e.transaction.user_id)])
        }
    }
}

/// Listener that applies [`plan`] to a cache and a notification center.
#[derive(Clone)]
pub struct InvalidationBridge {
    cache: Arc<dyn DataCache>,
    notifications: NotificationCenter,
}

impl InvalidationBridge {
    pub fn new(cache: Arc<dyn DataCache>, notifications: NotificationCenter) -> Self {
        Self {
            cache,
            notifications,
        }
    }

    pub fn apply(&self, event: &InboundEvent) -> Plan {
        let plan = plan(event);
        for key in &plan.invalidate {
            self.cache.invalidate(key);
        }
        if let Some((kind, message)) = &plan.notification {
            self.notifications.notify(*kind, message.clone(), None);
        }
        plan
    }
}

impl EventSink for InvalidationBridge {
    fn on_event(&mut self, topic: &Topic, event: &InboundEvent) {
        debug!("{} on {topic}", event.name());
        self.apply(event);
    }
}

impl fmt::Debug for InvalidationBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidationBridge")
            .field("cache", &"dyn DataCache")
            .field("notifications", &self.notifications)
            .finish()
    }
}
