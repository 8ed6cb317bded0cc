//! CLI for tourneysync
//!
//! Subcommands:
//! - `watch`: connect to the realtime endpoint, subscribe to topics and log
//!   the invalidations and notifications they produce
//! - `topics`: print the accepted topic syntax

use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use tourneysync::cache::{DataCache, InvalidationBridge, QueryKey};
use tourneysync::config::{Settings, load_config};
use tourneysync::notify::{NotificationCenter, SequencerEffect};
use tourneysync::realtime::websocket::WsConnector;
use tourneysync::realtime::{RealtimeChannel, ReconnectPolicy, SubscriptionHandle, Topic, pump};
use tourneysync::session::{Role, Session, SessionStore, logout_and_disconnect};
use tourneysync::utils::logging;

const TOPIC_FORMS: &[&str] = &[
    "tournament:<tournament-id>",
    "user-tournaments:<user-id>",
    "host-tournaments:<host-id>",
    "admin-tournaments",
    "ticket:<ticket-id>",
    "user-tickets:<user-id>",
    "host-tickets:<host-id>",
    "admin-tickets",
    "wallet:<user-id>",
];

#[derive(Parser)]
#[command(name = "tourneysync")]
enum Command {
    /// Subscribe to topics and log what the server pushes
    Watch {
        /// Topic to subscribe to; repeatable
        #[arg(long = "topic", required = true)]
        topics: Vec<Topic>,
        /// Access token sent with the handshake
        #[arg(long, env = "TOURNEYSYNC_TOKEN")]
        token: Option<String>,
        /// User id the token belongs to
        #[arg(long, default_value = "cli")]
        user: String,
        /// Realtime endpoint, overriding the configuration
        #[arg(long)]
        url: Option<String>,
    },
    /// Print the accepted topic syntax
    Topics,
}

/// Cache stand-in for the CLI: there is no query layer to refresh, so
/// invalidations are only reported.
struct LoggingCache;

impl DataCache for LoggingCache {
    fn invalidate(&self, prefix: &QueryKey) {
        info!("invalidate {prefix}");
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let settings = match load_config() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    logging::init(&settings.logging.level);

    match Command::parse() {
        Command::Watch {
            topics,
            token,
            user,
            url,
        } => {
            if let Err(e) = run_watch(settings, topics, token, user, url).await {
                error!("Watch failed: {e}");
            }
        }
        Command::Topics => {
            for form in TOPIC_FORMS {
                println!("{form}");
            }
        }
    }
}

async fn run_watch(
    settings: Settings,
    topics: Vec<Topic>,
    token: Option<String>,
    user: String,
    url: Option<String>,
) -> tourneysync::Result<()> {
    let url = url.unwrap_or_else(|| settings.realtime.url.clone());

    let session = SessionStore::new();
    if let Some(access_token) = token {
        session.login(Session {
            user_id: user,
            role: Role::User,
            access_token,
        });
    }

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let connector = WsConnector::new(&url, ReconnectPolicy::from(&settings.realtime), events_tx)?;
    let channel = RealtimeChannel::new(connector, session.clone()).shared();

    let (center, mut effects, sequencer) = NotificationCenter::spawn(&settings.notifications);
    let bridge = InvalidationBridge::new(Arc::new(LoggingCache), center.clone());

    let handles: Vec<_> = topics
        .into_iter()
        .filter_map(|topic| SubscriptionHandle::new(&channel, topic, bridge.clone()))
        .collect();
    info!("watching {} topic(s) on {url}", handles.len());

    let pump_task = tokio::spawn(pump(channel.clone(), events_rx));
    let display_task = tokio::spawn(async move {
        while let Some(effect) = effects.recv().await {
            match effect {
                SequencerEffect::Show(notification) => info!("{notification}"),
                SequencerEffect::Hide { id, reason } => debug!("hide {id} ({reason:?})"),
                SequencerEffect::Cleared { discarded } => {
                    debug!("cleared {discarded} notification(s)")
                }
            }
        }
    });

    tokio::select! {
        _ = pump_task => {
            error!("Realtime event stream ended unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    drop(handles);
    logout_and_disconnect(&session, &channel);
    sequencer.abort();
    display_task.abort();

    Ok(())
}
