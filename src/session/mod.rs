//! The `session` module models the authenticated identity the realtime layer
//! consumes: the access token attached to new connections and the user or
//! host id that scopes collection topics.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::realtime::channel::{SharedChannel, lock_channel};
use crate::realtime::topic::Topic;
use crate::realtime::transport::Connector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Host,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    pub access_token: String,
}

impl Session {
    /// The tournament collection this identity watches.
    pub fn tournament_feed(&self) -> Topic {
        match self.role {
            Role::Admin => Topic::AdminTournaments,
            Role::Host => Topic::HostTournaments {
                host_id: self.user_id.clone(),
            },
            Role::User => Topic::UserTournaments {
                user_id: self.user_id.clone(),
            },
        }
    }

    /// The support-ticket list this identity watches.
    pub fn ticket_feed(&self) -> Topic {
        match self.role {
            Role::Admin => Topic::AdminTickets,
            Role::Host => Topic::HostTickets {
                host_id: self.user_id.clone(),
            },
            Role::User => Topic::UserTickets {
                user_id: self.user_id.clone(),
            },
        }
    }

    /// Only end users own a wallet.
    pub fn wallet(&self) -> Option<Topic> {
        match self.role {
            Role::User => Some(Topic::wallet(self.user_id.clone())),
            Role::Admin | Role::Host => None,
        }
    }
}

/// Shared, cloneable holder of the current session.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        let store = Self::new();
        store.login(session);
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<Session>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<Session>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn login(&self, session: Session) {
        info!("session started for {} ({:?})", session.user_id, session.role);
        *self.write() = Some(session);
    }

    pub fn logout(&self) -> Option<Session> {
        self.write().take()
    }

    pub fn current(&self) -> Option<Session> {
        self.read().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().as_ref().map(|s| s.access_token.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }
}

/// Application-level logout: drops the session and tears down the shared connection.
pub fn logout_and_disconnect<C: Connector>(store: &SessionStore, channel: &SharedChannel<C>) {
    if let Some(session) = store.logout() {
        info!("session ended for {}", session.user_id);
    }
    lock_channel(channel).disconnect();
}
