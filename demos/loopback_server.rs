//! # Loopback Server Example
//!
//! Plays one round of a Queens-style puzzle against a tiny in-process server,
//! showing how to plug a custom [`Connector`] into [`PartyClient`]:
//!
//! 1. The connector hands out a channel pair per connection
//! 2. A server task answers actions with acknowledgments and pushes
//! 3. The client creates a lobby, starts a game, solves the puzzle and
//!    reads the results
//!
//! ## Running
//!
//! ```sh
//! cargo run --example loopback_server
//! RUST_LOG=drinkingames_client=debug cargo run --example loopback_server
//! ```

use std::time::Duration;

use async_trait::async_trait;
use drinkingames_client::protocol::ack_frame;
use drinkingames_client::{
    ClientConfig, ClientEvent, Connector, MemorySessionStore, PartyClient, PartyError, Transport,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

// ── Transport ───────────────────────────────────────────────────────

struct LoopbackTransport {
    to_server: mpsc::UnboundedSender<String>,
    from_server: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&mut self, message: String) -> Result<(), PartyError> {
        self.to_server
            .send(message)
            .map_err(|e| PartyError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, PartyError>> {
        self.from_server.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), PartyError> {
        Ok(())
    }
}

struct LoopbackConnector;

#[async_trait]
impl Connector for LoopbackConnector {
    type Transport = LoopbackTransport;

    async fn connect(&self) -> Result<LoopbackTransport, PartyError> {
        let (to_server, server_rx) = mpsc::unbounded_channel();
        let (server_tx, from_server) = mpsc::unbounded_channel();
        tokio::spawn(serve(server_rx, server_tx));
        Ok(LoopbackTransport {
            to_server,
            from_server,
        })
    }
}

// ── Server ──────────────────────────────────────────────────────────

fn lobby(name: &str) -> Value {
    json!({
        "code": "LOOP",
        "hostId": "p1",
        "players": [{"id": "p1", "username": name, "isHost": true}]
    })
}

fn frame(event: &str, data: Value) -> String {
    json!({"event": event, "data": data}).to_string()
}

async fn serve(mut inbox: mpsc::UnboundedReceiver<String>, outbox: mpsc::UnboundedSender<String>) {
    let mut username = String::new();
    while let Some(text) = inbox.recv().await {
        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let Some(ack) = request["ack"].as_u64() else {
            continue;
        };
        let data = &request["data"];
        let mut pushes = Vec::new();

        let reply = match request["event"].as_str().unwrap_or_default() {
            "games:list" => json!({"games": [
                {"id": "queens", "name": "Queens", "description": "One queen per region", "minPlayers": 1}
            ]}),
            "lobby:create" => {
                username = data["username"].as_str().unwrap_or("guest").to_string();
                json!({"player": {"id": "p1", "username": username, "isHost": true}, "lobby": lobby(&username)})
            }
            "game:start" => {
                pushes.push(frame("game:started", json!({"gameId": data["gameId"]})));
                pushes.push(frame(
                    "game:phase",
                    json!({"phase": "playing", "timeLimit": 3000, "grid": [[0, 0], [1, 1]]}),
                ));
                json!({"ok": true})
            }
            "game:action" if data["action"] == "solve" => {
                let solved = json!({"playerId": "p1", "username": username, "solveTime": 1200});
                pushes.push(frame("game:player-solved", solved.clone()));
                pushes.push(frame("game:results", json!({"losers": [], "players": [solved]})));
                pushes.push(frame("game:ended", json!({"lobby": lobby(&username)})));
                json!({"ok": true})
            }
            _ => json!({"error": "not supported by the loopback server"}),
        };

        let Ok(ack_text) = ack_frame(ack, &reply) else {
            continue;
        };
        if outbox.send(ack_text).is_err() {
            break;
        }
        for push in pushes {
            let _ = outbox.send(push);
        }
    }
}

// ── Client ──────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ClientConfig::new().with_action_timeout(Some(Duration::from_secs(2)));
    let (mut client, mut events) =
        PartyClient::start(LoopbackConnector, MemorySessionStore::new(), config);

    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::Resumed { restored: false } => {
                let joined = client.create_lobby("loopy").await?;
                tracing::info!("Created lobby {}", joined.lobby.code);
                client.start_game("queens").await?;
            }
            ClientEvent::GamesListed(games) => {
                tracing::info!("{} game(s) available", games.len());
            }
            ClientEvent::PhaseChanged { phase, .. } => {
                let game = client.game().await;
                let limit = game.as_ref().and_then(|g| g.data.time_limit);
                tracing::info!("Phase {phase}, time limit {limit:?} ms");
                client.send_game_action("solve", json!({"queens": [[0, 0], [1, 1]]})).await?;
            }
            ClientEvent::ResultsPosted { results, .. } => {
                for row in &results.players {
                    tracing::info!("{} solved it: {:?}", row.username, row.extra.get("solveTime"));
                }
            }
            ClientEvent::GameEnded => break,
            other => tracing::debug!("Event: {other:?}"),
        }
    }

    client.shutdown().await;
    Ok(())
}
