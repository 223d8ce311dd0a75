//! # Drinkingames Client
//!
//! Session and game-phase synchronization for the Drinkingames party-game
//! server, over any bidirectional text transport.
//!
//! The crate keeps a client's view of the server consistent across drops:
//! it owns the connection lifecycle, resumes a stored session once per
//! connection lifetime, mirrors the lobby and the active game from server
//! pushes, and turns acknowledged actions into awaited results.
//!
//! ## Features
//!
//! - **Transport-agnostic**: implement [`Transport`] and [`Connector`] for any backend
//! - **WebSocket built-in**: the default `transport-websocket` feature provides [`WebSocketConnector`]
//! - **Single writer**: all synced state is mutated by one background task; readers get snapshots
//! - **Event-driven**: typed [`ClientEvent`]s arrive on a channel
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "transport-websocket")]
//! # async fn example() -> Result<(), drinkingames_client::PartyError> {
//! use drinkingames_client::{
//!     server_url_from_env, ClientConfig, ClientEvent, FileSessionStore, PartyClient,
//!     WebSocketConnector,
//! };
//!
//! let connector = WebSocketConnector::new(server_url_from_env());
//! let store = FileSessionStore::in_dir(".");
//! let (client, mut events) = PartyClient::start(connector, store, ClientConfig::new());
//!
//! while let Some(event) = events.recv().await {
//!     if let ClientEvent::Resumed { restored: false } = event {
//!         let joined = client.create_lobby("alice").await?;
//!         println!("lobby {}", joined.lobby.code);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "tokio-runtime")]
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod game;
pub mod lobby;
pub mod protocol;
pub mod reconnect;
pub mod rpc;
pub mod session;
pub mod state;
#[cfg(feature = "tokio-runtime")]
pub mod timer;
pub mod transport;
pub mod transports;

// Re-export primary types for ergonomic imports.
#[cfg(feature = "tokio-runtime")]
pub use client::PartyClient;
pub use config::{server_url_from_env, ClientConfig};
pub use connection::{ConnectionState, RetryPolicy};
pub use error::PartyError;
pub use event::ClientEvent;
pub use game::{GameSession, ListMerge};
pub use protocol::{ClientAction, GameInfo, Lobby, Phase, Player, ServerEvent};
pub use reconnect::ResumeState;
pub use session::{FileSessionStore, MemorySessionStore, SessionRecord, SessionStore};
pub use state::SyncState;
#[cfg(feature = "tokio-runtime")]
pub use timer::{Countdown, PhaseTimers};
pub use transport::{Connector, Transport};
#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketConnector;
#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
