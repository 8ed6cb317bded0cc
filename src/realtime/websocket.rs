//! WebSocket transport
//!
//! Client side of the realtime connection, built on tokio-tungstenite.
//! Responsibilities:
//! - attach the access token to the handshake as a bearer `Authorization` header
//! - retry failed connects with the bounded, capped backoff of [`ReconnectPolicy`]
//! - report `Open` / `Message` / `Closed` back to the channel driver
//! - keep reconnecting after a drop until the policy is exhausted
//!
//! Must be used from within a tokio runtime: connecting spawns a task.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};
use tungstenite::client::IntoClientRequest;
use tungstenite::handshake::client::Request;
use tungstenite::http::HeaderValue;
use tungstenite::http::header::AUTHORIZATION;
use tungstenite::protocol::Message as WsMessage;
use url::Url;
use uuid::Uuid;

use crate::realtime::message::Frame;
use crate::realtime::transport::{
    ConnectionEvent, Connector, ReconnectPolicy, Transport, TransportEvent,
};
use crate::utils::{Error, Result};

/// Opens [`WsTransport`]s against one realtime endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: Url,
    policy: ReconnectPolicy,
    events: UnboundedSender<ConnectionEvent>,
}

impl WsConnector {
    pub fn new(
        url: &str,
        policy: ReconnectPolicy,
        events: UnboundedSender<ConnectionEvent>,
    ) -> Result<Self> {
        Ok(Self {
            url: Url::parse(url)?,
            policy,
            events,
        })
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    fn connect(&mut self, connection: Uuid, credentials: Option<String>) -> WsTransport {
        let mut transport = WsTransport {
            connection,
            url: self.url.clone(),
            policy: self.policy,
            credentials,
            events: self.events.clone(),
            outbound: None,
            task: None,
        };
        transport.start();
        transport
    }
}

#[derive(Debug)]
pub struct WsTransport {
    connection: Uuid,
    url: Url,
    policy: ReconnectPolicy,
    credentials: Option<String>,
    events: UnboundedSender<ConnectionEvent>,
    outbound: Option<UnboundedSender<WsMessage>>,
    task: Option<JoinHandle<()>>,
}

impl WsTransport {
    fn start(&mut self) {
        let (tx, rx) = mpsc::unbounded_channel::<WsMessage>();
        self.outbound = Some(tx);
        self.task = Some(tokio::spawn(run_connection(
            self.connection,
            self.url.clone(),
            self.credentials.clone(),
            self.policy,
            rx,
            self.events.clone(),
        )));
    }

    fn running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Transport for WsTransport {
    fn send(&mut self, frame: &Frame) -> Result<()> {
        let outbound = self.outbound.as_ref().ok_or(Error::NotConnected)?;
        outbound.send(WsMessage::text(frame.to_json()?))?;
        Ok(())
    }

    fn reconnect(&mut self) {
        if self.running() {
            debug!("reconnect requested while connection task is still running");
            return;
        }
        info!("restarting realtime connection to {}", self.url);
        self.start();
    }

    fn close(&mut self) {
        self.outbound = None;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

/// Builds the handshake request, attaching `credentials` as a bearer token.
pub fn build_request(url: &Url, credentials: Option<&str>) -> Result<Request> {
    let mut request = url.as_str().into_client_request()?;
    if let Some(token) = credentials {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| Error::InvalidCredentials)?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    Ok(request)
}

async fn run_connection(
    connection: Uuid,
    url: Url,
    credentials: Option<String>,
    policy: ReconnectPolicy,
    mut outbound: UnboundedReceiver<WsMessage>,
    events: UnboundedSender<ConnectionEvent>,
) {
    let emit = |event: TransportEvent| events.send(ConnectionEvent::new(connection, event));
    let mut failures = 0u32;

    loop {
        let request = match build_request(&url, credentials.as_deref()) {
            Ok(request) => request,
            Err(e) => {
                error!("cannot build realtime handshake for {url}: {e}");
                let _ = emit(TransportEvent::Closed { exhausted: true });
                return;
            }
        };

        match connect_async(request).await {
            Ok((ws_stream, _response)) => {
                failures = 0;
                info!("realtime connection open: {url}");

                // frames queued for a previous socket are stale; the channel
                // re-registers everything on Open
                while outbound.try_recv().is_ok() {}

                if emit(TransportEvent::Open).is_err() {
                    return;
                }

                let (mut ws_sender, mut ws_receiver) = ws_stream.split();

                loop {
                    tokio::select! {
                        incoming = ws_receiver.next() => match incoming {
                            Some(Ok(WsMessage::Text(text))) => {
                                if emit(TransportEvent::Message(text.as_str().to_owned())).is_err() {
                                    return;
                                }
                            }
                            Some(Ok(WsMessage::Close(frame))) => {
                                info!("realtime connection closed by server: {frame:?}");
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("realtime connection error: {e}");
                                break;
                            }
                            None => break,
                        },
                        out = outbound.recv() => match out {
                            Some(msg) => {
                                if let Err(e) = ws_sender.send(msg).await {
                                    warn!("failed to send realtime frame: {e}");
                                    break;
                                }
                            }
                            // transport dropped
                            None => {
                                let _ = ws_sender.close().await;
                                return;
                            }
                        },
                    }
                }

                if emit(TransportEvent::Closed { exhausted: false }).is_err() {
                    return;
                }
            }
            Err(e) => {
                failures += 1;
                warn!(
                    "realtime connect attempt {failures}/{} failed: {e}",
                    policy.max_attempts
                );
            }
        }

        if policy.exhausted(failures) {
            warn!("giving up on realtime connection after {failures} attempts");
            let _ = emit(TransportEvent::Closed { exhausted: true });
            return;
        }

        tokio::time::sleep(policy.delay_for(failures.max(1))).await;
    }
}
