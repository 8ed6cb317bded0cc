//! Wire messages exchanged over the realtime connection
//!
//! Every frame is a JSON envelope `{"event": "<name>", "data": {...}}`.
//! Outbound frames are subscription registrations built from a [`Topic`];
//! inbound frames are the server pushes modelled by [`InboundEvent`].
//!
//! [`Topic`]: crate::realtime::topic::Topic

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::{Error, Result};

/// An outbound frame, serialized as `{"event": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    pub data: Value,
}

impl Frame {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentStatusUpdated {
    pub tournament_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TournamentRoomUpdated {
    pub tournament_id: String,
    pub room: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketReplyAdded {
    pub ticket_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketStatusUpdated {
    pub ticket_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketClosed {
    pub ticket_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletBalanceUpdated {
    pub user_id: String,
    #[serde(rename = "balanceGC")]
    pub balance_gc: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletTransactionUpdated {
    pub transaction_id: String,
    pub user_id: String,
    pub status: String,
    #[serde(rename = "amountGC")]
    pub amount_gc: f64,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Only `userId` is required; it scopes the event to a wallet.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    #[serde(rename = "amountGC", default, skip_serializing_if = "Option::is_none")]
    pub amount_gc: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WalletHistoryUpdated {
    pub transaction: TransactionRecord,
}

/// A server-pushed event. Consumed once, never persisted.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundEvent {
    #[serde(rename = "tournament:status-updated")]
    TournamentStatusUpdated(TournamentStatusUpdated),
    #[serde(rename = "tournament:room-updated")]
    TournamentRoomUpdated(TournamentRoomUpdated),
    #[serde(rename = "ticket:reply-added")]
    TicketReplyAdded(TicketReplyAdded),
    #[serde(rename = "ticket:status-updated")]
    TicketStatusUpdated(TicketStatusUpdated),
    #[serde(rename = "ticket:closed")]
    TicketClosed(TicketClosed),
    #[serde(rename = "wallet:balance-updated")]
    WalletBalanceUpdated(WalletBalanceUpdated),
    #[serde(rename = "wallet:transaction-updated")]
    WalletTransactionUpdated(WalletTransactionUpdated),
    #[serde(rename = "wallet:history-updated")]
    WalletHistoryUpdated(WalletHistoryUpdated),
}

impl InboundEvent {
    /// Parses one text frame. Unknown events and bad payloads are errors.
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            let preview: String = text.chars().take(100).collect();
            Error::MalformedEvent(format!("{e} | {preview}"))
        })
    }

    /// The wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::TournamentStatusUpdated(_) => "tournament:status-updated",
            InboundEvent::TournamentRoomUpdated(_) => "tournament:room-updated",
            InboundEvent::TicketReplyAdded(_) => "ticket:reply-added",
            InboundEvent::TicketStatusUpdated(_) => "ticket:status-updated",
            InboundEvent::TicketClosed(_) => "ticket:closed",
            InboundEvent::WalletBalanceUpdated(_) => "wallet:balance-updated",
            InboundEvent::WalletTransactionUpdated(_) => "wallet:transaction-updated",
            InboundEvent::WalletHistoryUpdated(_) => "wallet:history-updated",
        }
    }

    /// The id of the tournament the event is about, for tournament events.
    pub fn tournament_id(&self) -> Option<&str> {
        match self {
            InboundEvent::TournamentStatusUpdated(e) => Some(e.tournament_id.as_str()),
            InboundEvent::TournamentRoomUpdated(e) => Some(e.tournament_id.as_str()),
            _ => None,
        }
    }

    pub fn ticket_id(&self) -> Option<&str> {
        match self {
            InboundEvent::TicketReplyAdded(e) => Some(e.ticket_id.as_str()),
            InboundEvent::TicketStatusUpdated(e) => Some(e.ticket_id.as_str()),
            InboundEvent::TicketClosed(e) => Some(e.ticket_id.as_str()),
            _ => None,
        }
    }

    /// The wallet owner embedded in a wallet event.
    pub fn wallet_user_id(&self) -> Option<&str> {
        match self {
            InboundEvent::WalletBalanceUpdated(e) => Some(e.user_id.as_str()),
            InboundEvent::WalletTransactionUpdated(e) => Some(e.user_id.as_str()),
            InboundEvent::WalletHistoryUpdated(e) => Some(e.transaction.user_id.as_str()),
            _ => None,
        }
    }
}
