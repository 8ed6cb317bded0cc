//! Topic management
//!
//! A [`Topic`] names a server-side event stream. The set of topics is closed:
//! each variant belongs to one [`TopicFamily`] and carries at most one
//! scoping identifier. The transport multiplexes every topic of a family over
//! the same inbound event names, so [`Topic::accepts`] is what keeps a
//! listener for "tournament T1" from reacting to pushes about "T2".

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::realtime::message::{Frame, InboundEvent};
use crate::utils::Error;

/// The category a topic and its inbound events belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicFamily {
    Tournament,
    Ticket,
    Wallet,
}

/// Whether a frame registers or releases interest in a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Subscribe,
    Unsubscribe,
}

impl Registration {
    fn prefix(self) -> &'static str {
        match self {
            Registration::Subscribe => "subscribe",
            Registration::Unsubscribe => "unsubscribe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A single tournament.
    Tournament { tournament_id: String },
    /// Tournaments the user has joined.
    UserTournaments { user_id: String },
    /// Tournaments run by a host.
    HostTournaments { host_id: String },
    /// Every tournament, for operators.
    AdminTournaments,
    /// A single support ticket.
    Ticket { ticket_id: String },
    UserTickets { user_id: String },
    HostTickets { host_id: String },
    AdminTickets,
    /// A user's wallet balance and history.
    Wallet { user_id: String },
}

impl Topic {
    pub fn tournament(id: impl Into<String>) -> Self {
        Topic::Tournament {
            tournament_id: id.into(),
        }
    }

    pub fn ticket(id: impl Into<String>) -> Self {
        Topic::Ticket {
            ticket_id: id.into(),
        }
    }

    pub fn wallet(user_id: impl Into<String>) -> Self {
        Topic::Wallet {
            user_id: user_id.into(),
        }
    }

    pub fn family(&self) -> TopicFamily {
        match self {
            Topic::Tournament { .. }
            | Topic::UserTournaments { .. }
            | Topic::HostTournaments { .. }
            | Topic::AdminTournaments => TopicFamily::Tournament,
            Topic::Ticket { .. }
            | Topic::UserTickets { .. }
            | Topic::HostTickets { .. }
            | Topic::AdminTickets => TopicFamily::Ticket,
            Topic::Wallet { .. } => TopicFamily::Wallet,
        }
    }

    /// The scoping identifier, if the variant has one.
    pub fn scope(&self) -> Option<&str> {
        match self {
            Topic::Tournament { tournament_id } => Some(tournament_id.as_str()),
            Topic::UserTournaments { user_id }
            | Topic::UserTickets { user_id }
            | Topic::Wallet { user_id } => Some(user_id.as_str()),
            Topic::HostTournaments { host_id } | Topic::HostTickets { host_id } => {
                Some(host_id.as_str())
            }
            Topic::Ticket { ticket_id } => Some(ticket_id.as_str()),
            Topic::AdminTournaments | Topic::AdminTickets => None,
        }
    }

    /// A topic is well formed when every required scoping id is non-blank.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Topic::AdminTournaments | Topic::AdminTickets => true,
            _ => self.scope().is_some_and(|id| !id.trim().is_empty()),
        }
    }

    /// The family-specific name used in event names and the textual form.
    pub fn kind(&self) -> &'static str {
        match self {
            Topic::Tournament { .. } => "tournament",
            Topic::UserTournaments { .. } => "user-tournaments",
            Topic::HostTournaments { .. } => "host-tournaments",
            Topic::AdminTournaments => "admin-tournaments",
            Topic::Ticket { .. } => "ticket",
            Topic::UserTickets { .. } => "user-tickets",
            Topic::HostTickets { .. } => "host-tickets",
            Topic::AdminTickets => "admin-tickets",
            Topic::Wallet { .. } => "wallet",
        }
    }

    fn scope_field(&self) -> Option<&'static str> {
        match self {
            Topic::Tournament { .. } => Some("tournamentId"),
            Topic::Ticket { .. } => Some("ticketId"),
            Topic::UserTournaments { .. } | Topic::UserTickets { .. } | Topic::Wallet { .. } => {
                Some("userId")
            }
            Topic::HostTournaments { .. } | Topic::HostTickets { .. } => Some("hostId"),
            Topic::AdminTournaments | Topic::AdminTickets => None,
        }
    }

    /// Builds the registration frame, e.g. `subscribe:tournament {"tournamentId": "T1"}`.
    pub fn frame(&self, registration: Registration) -> Frame {
        let mut data = Map::new();
        if let (Some(field), Some(id)) = (self.scope_field(), self.scope()) {
            data.insert(field.to_string(), Value::String(id.to_string()));
        }
        Frame {
            event: format!("{}:{}", registration.prefix(), self.kind()),
            data: Value::Object(data),
        }
    }

    /// Scoping check applied before an event reaches a listener.
    ///
    /// Single-resource topics and the wallet topic only accept events carrying
    /// their own identifier; collection topics accept their whole family.
    pub fn accepts(&self, event: &InboundEvent) -> bool {
        if self.family() != event.family() {
            return false;
        }
        match self {
            Topic::Tournament { tournament_id } => {
                event.tournament_id() == Some(tournament_id.as_str())
            }
            Topic::Ticket { ticket_id } => event.ticket_id() == Some(ticket_id.as_str()),
            Topic::Wallet { user_id } => event.wallet_user_id() == Some(user_id.as_str()),
            Topic::UserTournaments { .. }
            | Topic::HostTournaments { .. }
            | Topic::AdminTournaments
            | Topic::UserTickets { .. }
            | Topic::HostTickets { .. }
            | Topic::AdminTickets => true,
        }
    }
}

impl InboundEvent {
    pub fn family(&self) -> TopicFamily {
        match self {
            InboundEvent::TournamentStatusUpdated(_) | InboundEvent::TournamentRoomUpdated(_) => {
                TopicFamily::Tournament
            }
            InboundEvent::TicketReplyAdded(_)
            | InboundEvent::TicketStatusUpdated(_)
            | InboundEvent::TicketClosed(_) => TopicFamily::Ticket,
            InboundEvent::WalletBalanceUpdated(_)
            | InboundEvent::WalletTransactionUpdated(_)
            | InboundEvent::WalletHistoryUpdated(_) => TopicFamily::Wallet,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope() {
            Some(id) => write!(f, "{}:{}", self.kind(), id),
            None => f.write_str(self.kind()),
        }
    }
}

/// Parses the textual form `kind[:id]`, e.g. `tournament:T1` or `admin-tickets`.
impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = match s.split_once(':') {
            Some((kind, id)) => (kind.trim(), Some(id.trim().to_string())),
            None => (s.trim(), None),
        };

        let topic = match (kind, id) {
            ("admin-tournaments", None) => Topic::AdminTournaments,
            ("admin-tickets", None) => Topic::AdminTickets,
            ("tournament", Some(tournament_id)) => Topic::Tournament { tournament_id },
            ("user-tournaments", Some(user_id)) => Topic::UserTournaments { user_id },
            ("host-tournaments", Some(host_id)) => Topic::HostTournaments { host_id },
            ("ticket", Some(ticket_id)) => Topic::Ticket { ticket_id },
            ("user-tickets", Some(user_id)) => Topic::UserTickets { user_id },
            ("host-tickets", Some(host_id)) => Topic::HostTickets { host_id },
            ("wallet", Some(user_id)) => Topic::Wallet { user_id },
            _ => return Err(Error::MalformedTopic(s.to_string())),
        };

        if topic.is_well_formed() {
            Ok(topic)
        } else {
            Err(Error::MalformedTopic(s.to_string()))
        }
    }
}
