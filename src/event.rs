//! Notifications emitted by the client.
//!
//! Events announce that owned state changed; the state itself is read through
//! the client's accessors, which always return a consistent snapshot.

use crate::protocol::{GameInfo, GameResults, Lobby, Phase, Player};

/// A state-change notification delivered on the client's event channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// A new connection lifetime started.
    Connected,
    /// The current connection lifetime ended.
    Disconnected {
        /// Why the connection ended, if known.
        reason: Option<String>,
    },
    /// The connect retry budget was exhausted. The server is unreachable and
    /// the client will not try again on its own.
    ConnectionFailed {
        /// Number of attempts made.
        attempts: u32,
    },
    /// The resume step of this lifetime finished without error.
    Resumed {
        /// `true` if a stored session was restored, `false` if there was none.
        restored: bool,
    },
    /// The stored session was rejected and has been cleared.
    ResumeFailed {
        /// Server-supplied or local reason.
        reason: String,
    },
    /// Identity adopted from a create/join/resume acknowledgment.
    Identified(Player),
    /// The lobby snapshot was replaced.
    LobbyUpdated(Lobby),
    /// The player left the lobby; identity and session were cleared.
    LobbyLeft,
    /// A game started; game data was reset.
    GameStarted {
        game_id: String,
    },
    /// The active game entered a new phase.
    PhaseChanged {
        game_id: String,
        phase: Phase,
    },
    /// Game data of the active game changed.
    GameDataUpdated {
        game_id: String,
    },
    /// Terminal results were posted for the active game.
    ResultsPosted {
        game_id: String,
        results: GameResults,
    },
    /// Game state was rebuilt from a reconnect snapshot.
    GameRestored {
        game_id: String,
    },
    /// The active game ended and the client is back in the lobby.
    GameEnded,
    /// The game catalogue was refreshed.
    GamesListed(Vec<GameInfo>),
}
