//! # Party Session Example
//!
//! A terminal participant for a Drinkingames server:
//!
//! 1. Connect over WebSocket and resume a saved session, if any
//! 2. Otherwise create a lobby, or join one when `DRINKINGAMES_LOBBY` is set
//! 3. Follow lobby and game pushes, with a countdown for timed phases
//! 4. Shut down gracefully on Ctrl+C
//!
//! The session record is kept in the working directory, so running the
//! example again after a crash or Ctrl+C rejoins the same lobby.
//!
//! ## Running
//!
//! ```sh
//! # Start a Drinkingames server on localhost:3001, then:
//! cargo run --example party_session
//!
//! # Join an existing lobby under a given name:
//! DRINKINGAMES_USERNAME=bobby DRINKINGAMES_LOBBY=QRST cargo run --example party_session
//!
//! # Override the server URL:
//! DRINKINGAMES_SERVER_URL=ws://my-server:3001/ws cargo run --example party_session
//! ```

use drinkingames_client::{
    server_url_from_env, ClientConfig, ClientEvent, FileSessionStore, PartyClient, PhaseTimers,
    WebSocketConnector,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // ── Logging ─────────────────────────────────────────────────────
    // Set `RUST_LOG=debug` for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // ── Configuration ───────────────────────────────────────────────
    let url = server_url_from_env();
    let username = std::env::var("DRINKINGAMES_USERNAME").unwrap_or_else(|_| "rustacean".into());
    let lobby_code = std::env::var("DRINKINGAMES_LOBBY").ok();
    tracing::info!("Connecting to {url}");

    let connector = WebSocketConnector::new(url);
    let store = FileSessionStore::in_dir(".");
    let (mut client, mut events) = PartyClient::start(connector, store, ClientConfig::new());
    let mut timers = PhaseTimers::new();

    // ── Event loop ──────────────────────────────────────────────────
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    tracing::info!("Event channel closed, exiting");
                    break;
                };

                match event {
                    ClientEvent::Connected => tracing::info!("Connected"),

                    // Nothing to resume: enter a lobby.
                    ClientEvent::Resumed { restored: false } | ClientEvent::ResumeFailed { .. } => {
                        if client.me().await.is_some() {
                            continue;
                        }
                        let joined = match &lobby_code {
                            Some(code) => client.join_lobby(&username, code).await,
                            None => client.create_lobby(&username).await,
                        };
                        match joined {
                            Ok(joined) => tracing::info!(
                                "In lobby {} as {} ({} player(s))",
                                joined.lobby.code,
                                joined.player.username,
                                joined.lobby.players.len()
                            ),
                            Err(e) => {
                                tracing::error!("Could not enter a lobby: {e}");
                                break;
                            }
                        }
                    }

                    ClientEvent::Resumed { restored: true } => {
                        if let Some(lobby) = client.lobby().await {
                            tracing::info!("Resumed lobby {}", lobby.code);
                        }
                    }

                    ClientEvent::LobbyUpdated(lobby) => {
                        let names: Vec<&str> =
                            lobby.players.iter().map(|p| p.username.as_str()).collect();
                        tracing::info!("Lobby {}: {}", lobby.code, names.join(", "));
                    }

                    ClientEvent::GamesListed(games) => {
                        for game in games {
                            tracing::info!("  {} (min {} players): {}", game.name, game.min_players, game.description);
                        }
                    }

                    ClientEvent::GameStarted { game_id } | ClientEvent::GameRestored { game_id } => {
                        tracing::info!("Playing {game_id}");
                        timers.sync(client.game().await.as_ref());
                    }

                    ClientEvent::PhaseChanged { phase, .. } => {
                        if timers.sync(client.game().await.as_ref()) {
                            if let Some(countdown) = timers.countdown() {
                                tracing::info!("Phase {phase}: {}s on the clock", countdown.remaining());
                            }
                        } else {
                            tracing::info!("Phase {phase}");
                        }
                    }

                    ClientEvent::ResultsPosted { results, .. } => {
                        let me = client.me().await;
                        let lost = me.as_ref().is_some_and(|me| results.is_loser(&me.id));
                        tracing::info!("Results are in: {}", if lost { "you drink!" } else { "you're safe" });
                    }

                    ClientEvent::GameEnded => {
                        timers.clear();
                        tracing::info!("Back in the lobby");
                    }

                    ClientEvent::Disconnected { reason } => {
                        tracing::warn!("Disconnected: {}", reason.as_deref().unwrap_or("server closed the connection"));
                    }

                    ClientEvent::ConnectionFailed { attempts } => {
                        tracing::error!("Server unreachable after {attempts} attempt(s)");
                        break;
                    }

                    other => tracing::debug!("Event: {other:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down…");
                break;
            }
        }
    }

    // ── Cleanup ─────────────────────────────────────────────────────
    client.shutdown().await;
    tracing::info!("Client shut down. Goodbye!");
    Ok(())
}
