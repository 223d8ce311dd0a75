#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing,
    dead_code
)]
//! Shared test utilities for Drinkingames client integration tests.
//!
//! [`MockConnector`] hands the client an in-process [`ChannelTransport`] for
//! every connection lifetime and gives the test the other end as a
//! [`ServerLink`], so a test plays the server: it reads the client's frames,
//! acknowledges them and pushes events.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use drinkingames_client::protocol::{ack_frame, ServerEvent};
use drinkingames_client::{
    ClientConfig, ClientEvent, Connector, PartyError, RetryPolicy, Transport,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Upper bound for any single wait in a test.
pub const WAIT: Duration = Duration::from_secs(2);

// ── ChannelTransport ────────────────────────────────────────────────

/// Client half of an in-process connection.
pub struct ChannelTransport {
    outgoing: mpsc::UnboundedSender<String>,
    incoming: mpsc::UnboundedReceiver<String>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, message: String) -> Result<(), PartyError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PartyError::TransportClosed);
        }
        self.outgoing
            .send(message)
            .map_err(|_| PartyError::TransportSend("server hung up".into()))
    }

    async fn recv(&mut self) -> Option<Result<String, PartyError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), PartyError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

// ── ServerLink ──────────────────────────────────────────────────────

/// Server half of an in-process connection, driven by the test.
pub struct ServerLink {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<String>,
    /// Whether the client closed its end.
    pub closed: Arc<AtomicBool>,
}

impl ServerLink {
    /// Next frame the client sent, parsed as JSON.
    pub async fn next_frame(&mut self) -> Value {
        let text = tokio::time::timeout(WAIT, self.from_client.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("client transport dropped");
        serde_json::from_str(&text).expect("client frame is JSON")
    }

    /// Next frame, asserting its event name. Returns the ack id and data.
    pub async fn expect_action(&mut self, event: &str) -> (u64, Value) {
        let frame = self.next_frame().await;
        assert_eq!(frame["event"], event, "unexpected frame {frame}");
        let id = frame["ack"].as_u64().expect("action carries an ack id");
        (id, frame["data"].clone())
    }

    /// Returns `true` if the client sent nothing yet.
    pub fn is_quiet(&mut self) -> bool {
        self.from_client.try_recv().is_err()
    }

    pub fn ack(&self, id: u64, data: Value) {
        self.send_raw(ack_frame(id, &data).unwrap());
    }

    pub fn push(&self, event: &ServerEvent) {
        self.send_raw(event.to_frame().unwrap());
    }

    pub fn push_json(&self, event: &str, data: Value) {
        self.send_raw(json!({"event": event, "data": data}).to_string());
    }

    pub fn send_raw(&self, text: impl Into<String>) {
        let _ = self.to_client.send(text.into());
    }

    /// Drop the connection from the server side.
    pub fn hang_up(self) {}
}

// ── MockConnector ───────────────────────────────────────────────────

/// Connector producing a fresh [`ChannelTransport`] per dial.
#[derive(Clone)]
pub struct MockConnector {
    /// Outcome of upcoming dials (`false` refuses); empty means accept.
    plan: Arc<StdMutex<VecDeque<bool>>>,
    refuse_all: Arc<AtomicBool>,
    links: mpsc::UnboundedSender<ServerLink>,
    /// Number of dials attempted so far.
    pub dials: Arc<AtomicU32>,
}

impl MockConnector {
    /// Refuse the next `n` dials.
    pub fn refuse_next(&self, n: usize) {
        self.plan.lock().unwrap().extend(std::iter::repeat(false).take(n));
    }

    /// Refuse every dial from now on.
    pub fn refuse_all(&self) {
        self.refuse_all.store(true, Ordering::Release);
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = ChannelTransport;

    async fn connect(&self) -> Result<ChannelTransport, PartyError> {
        self.dials.fetch_add(1, Ordering::AcqRel);
        let accept = !self.refuse_all.load(Ordering::Acquire)
            && self.plan.lock().unwrap().pop_front().unwrap_or(true);
        if !accept {
            return Err(PartyError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let _ = self.links.send(ServerLink {
            from_client: server_rx,
            to_client: server_tx,
            closed: Arc::clone(&closed),
        });
        Ok(ChannelTransport {
            outgoing: client_tx,
            incoming: client_rx,
            closed,
        })
    }
}

/// Accepted connections, in dial order.
pub struct Links(mpsc::UnboundedReceiver<ServerLink>);

impl Links {
    pub async fn next(&mut self) -> ServerLink {
        tokio::time::timeout(WAIT, self.0.recv())
            .await
            .expect("timed out waiting for the client to connect")
            .expect("connector dropped")
    }
}

/// Create a connector and the receiver of its accepted connections.
pub fn mock_server() -> (MockConnector, Links) {
    let (tx, rx) = mpsc::unbounded_channel();
    let connector = MockConnector {
        plan: Arc::new(StdMutex::new(VecDeque::new())),
        refuse_all: Arc::new(AtomicBool::new(false)),
        links: tx,
        dials: Arc::new(AtomicU32::new(0)),
    };
    (connector, Links(rx))
}

// ── Client helpers ──────────────────────────────────────────────────

/// Fast retries, no catalogue fetch on connect.
pub fn test_config() -> ClientConfig {
    ClientConfig::new()
        .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
        .with_fetch_games_on_connect(false)
        .with_action_timeout(Some(WAIT))
}

/// Next event, failing the test after [`WAIT`].
pub async fn next_event(rx: &mut mpsc::Receiver<ClientEvent>) -> ClientEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Skip events until one matches `pred`.
pub async fn wait_for<F>(rx: &mut mpsc::Receiver<ClientEvent>, pred: F) -> ClientEvent
where
    F: Fn(&ClientEvent) -> bool,
{
    loop {
        let event = next_event(rx).await;
        if pred(&event) {
            return event;
        }
    }
}

// ── JSON helpers ────────────────────────────────────────────────────

pub fn player_json(id: &str, username: &str, is_host: bool) -> Value {
    json!({"id": id, "username": username, "isHost": is_host})
}

/// Lobby `code` hosted by `host`, listing `players` as `(id, username)`.
pub fn lobby_json(code: &str, host: &str, players: &[(&str, &str)]) -> Value {
    let players: Vec<Value> = players
        .iter()
        .map(|(id, name)| player_json(id, name, *id == host))
        .collect();
    json!({"code": code, "hostId": host, "players": players})
}

/// Body of a successful `lobby:create` / `lobby:join` acknowledgment.
pub fn joined_json(player: (&str, &str), lobby: Value) -> Value {
    let is_host = lobby["hostId"] == player.0;
    json!({"player": player_json(player.0, player.1, is_host), "lobby": lobby})
}

pub fn games_json() -> Value {
    json!({"games": [
        {"id": "queens", "name": "Queens", "description": "Place the queens", "minPlayers": 2},
        {"id": "poker", "name": "Poker", "description": "Texas hold'em", "minPlayers": 3}
    ]})
}
