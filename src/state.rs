//! Client-owned synchronized state.
//!
//! [`SyncState`] bundles everything the core owns: connection and resume
//! progress, the player's identity, the lobby, the active game and the game
//! catalogue. Only the client's background task mutates it, one whole
//! transition at a time; readers receive clones.

use tracing::debug;

use crate::connection::ConnectionState;
use crate::event::ClientEvent;
use crate::game::{GameChange, GameMachine, GameSession, ListMerge};
use crate::lobby::LobbyMachine;
use crate::protocol::{GameInfo, Lobby, LobbyJoined, Player, ServerEvent};
use crate::reconnect::{ResumeOutcome, ResumeState};

/// Everything the client keeps in sync with the server.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub connection: ConnectionState,
    pub resume: ResumeState,
    /// This client's player, once created, joined or resumed.
    pub me: Option<Player>,
    pub lobby: LobbyMachine,
    pub game: GameMachine,
    /// Game catalogue from the last `games:list`.
    pub games: Vec<GameInfo>,
    /// Last user-facing error (connection failure, rejected create/join).
    pub last_error: Option<String>,
}

impl SyncState {
    pub fn new(list_merge: ListMerge) -> Self {
        Self {
            game: GameMachine::new(list_merge),
            ..Self::default()
        }
    }

    /// Current lobby snapshot.
    pub fn lobby(&self) -> Option<&Lobby> {
        self.lobby.lobby()
    }

    /// Active game, if any.
    pub fn game(&self) -> Option<&GameSession> {
        self.game.session()
    }

    /// Returns `true` if this client's player hosts the current lobby.
    pub fn is_host(&self) -> bool {
        self.me.as_ref().is_some_and(|me| self.lobby.is_host(&me.id))
    }

    /// Dispatch one push event to the lobby and game reducers.
    pub fn apply_push(&mut self, event: &ServerEvent) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        if self.lobby.apply(event) {
            if let Some(lobby) = self.lobby.lobby() {
                events.push(ClientEvent::LobbyUpdated(lobby.clone()));
            }
        }
        if let Some(change) = self.game.apply(event) {
            events.extend(self.game_event(change));
        }
        events
    }

    fn game_event(&self, change: GameChange) -> Option<ClientEvent> {
        if change == GameChange::Ended {
            return Some(ClientEvent::GameEnded);
        }
        let session = self.game.session()?;
        let game_id = session.game_id.clone();
        Some(match change {
            GameChange::Started => ClientEvent::GameStarted { game_id },
            GameChange::PhaseChanged => ClientEvent::PhaseChanged {
                game_id,
                phase: session.phase.clone()?,
            },
            GameChange::DataUpdated => ClientEvent::GameDataUpdated { game_id },
            GameChange::Results => ClientEvent::ResultsPosted {
                game_id,
                results: session.results.clone()?,
            },
            GameChange::Ended => ClientEvent::GameEnded,
        })
    }

    /// Adopt the identity and lobby from a create/join acknowledgment.
    pub fn enter_lobby(&mut self, joined: LobbyJoined) -> Vec<ClientEvent> {
        debug!(player_id = %joined.player.id, code = %joined.lobby.code, "entered lobby");
        self.last_error = None;
        self.me = Some(joined.player.clone());
        self.lobby.set(joined.lobby.clone());
        vec![
            ClientEvent::Identified(joined.player),
            ClientEvent::LobbyUpdated(joined.lobby),
        ]
    }

    /// Return to the fresh-visitor state.
    pub fn forget_identity(&mut self) {
        self.me = None;
        self.lobby.clear();
        self.game.clear();
    }

    /// Apply the outcome of the lifetime's resume attempt.
    pub fn apply_resume(&mut self, outcome: ResumeOutcome) -> Vec<ClientEvent> {
        match outcome {
            ResumeOutcome::Restored {
                player,
                lobby,
                game_state,
            } => {
                self.resume = ResumeState::Resumed;
                self.me = Some(player.clone());
                self.lobby.set(lobby.clone());
                let mut events = vec![
                    ClientEvent::Identified(player),
                    ClientEvent::LobbyUpdated(lobby),
                ];
                match game_state {
                    Some(snapshot) => {
                        if self.game.rehydrate(&snapshot) {
                            if let Some(game_id) = self.game.current_game() {
                                events.push(ClientEvent::GameRestored {
                                    game_id: game_id.to_string(),
                                });
                            }
                        }
                    }
                    None => {
                        if self.game.session().is_some() {
                            events.push(ClientEvent::GameEnded);
                        }
                        self.game.clear();
                    }
                }
                events.push(ClientEvent::Resumed { restored: true });
                events
            }
            ResumeOutcome::Rejected { reason } => {
                self.resume = ResumeState::ResumeFailed;
                self.forget_identity();
                vec![ClientEvent::ResumeFailed { reason }]
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::protocol::{
        GameEndedPayload, GameStartedPayload, GameStateSnapshot, Phase, PhasePayload,
    };

    fn player(id: &str) -> Player {
        Player {
            id: id.into(),
            username: format!("user-{id}"),
            is_host: false,
        }
    }

    fn lobby(host: &str) -> Lobby {
        Lobby {
            code: "ABCD".into(),
            host_id: host.into(),
            players: vec![player("p1"), player("p2")],
        }
    }

    #[test]
    fn push_events_fan_out_to_reducers() {
        let mut state = SyncState::default();
        state.enter_lobby(LobbyJoined {
            player: player("p1"),
            lobby: lobby("p1"),
        });
        assert!(state.is_host());

        let events = state.apply_push(&ServerEvent::GameStarted(GameStartedPayload {
            game_id: "queens".into(),
            lobby: Some(lobby("p2")),
        }));
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ClientEvent::LobbyUpdated(_)));
        assert_eq!(
            events[1],
            ClientEvent::GameStarted {
                game_id: "queens".into()
            }
        );
        assert!(!state.is_host());

        let events = state.apply_push(&ServerEvent::Phase(PhasePayload {
            phase: Phase::from("playing"),
            ..Default::default()
        }));
        assert_eq!(
            events,
            vec![ClientEvent::PhaseChanged {
                game_id: "queens".into(),
                phase: Phase::from("playing")
            }]
        );

        let events = state.apply_push(&ServerEvent::GameEnded(GameEndedPayload {
            lobby: Some(lobby("p1")),
        }));
        assert!(matches!(events[0], ClientEvent::LobbyUpdated(_)));
        assert_eq!(events[1], ClientEvent::GameEnded);
        assert!(state.game().is_none());
    }

    #[test]
    fn bare_game_ended_still_leaves_the_game() {
        let mut state = SyncState::default();
        state.enter_lobby(LobbyJoined {
            player: player("p1"),
            lobby: lobby("p1"),
        });
        state.apply_push(&ServerEvent::GameStarted(GameStartedPayload {
            game_id: "queens".into(),
            lobby: None,
        }));
        let events = state.apply_push(&ServerEvent::GameEnded(GameEndedPayload::default()));
        assert_eq!(events, vec![ClientEvent::GameEnded]);
        assert!(state.game().is_none());
        assert_eq!(state.lobby().unwrap().code, "ABCD");
    }

    #[test]
    fn resume_without_snapshot_drops_stale_game() {
        let mut state = SyncState::default();
        state.apply_push(&ServerEvent::GameStarted(GameStartedPayload {
            game_id: "queens".into(),
            lobby: None,
        }));
        let events = state.apply_resume(ResumeOutcome::Restored {
            player: player("p1"),
            lobby: lobby("p1"),
            game_state: None,
        });
        assert!(state.game().is_none());
        assert!(events.contains(&ClientEvent::GameEnded));
        assert_eq!(events.last(), Some(&ClientEvent::Resumed { restored: true }));
        assert_eq!(state.resume, ResumeState::Resumed);
    }

    #[test]
    fn resume_with_snapshot_restores_game() {
        let mut state = SyncState::default();
        let events = state.apply_resume(ResumeOutcome::Restored {
            player: player("p1"),
            lobby: lobby("p1"),
            game_state: Some(GameStateSnapshot {
                game_id: Some("g1".into()),
                phase: Some(Phase::from("playing")),
                ..Default::default()
            }),
        });
        assert!(events.contains(&ClientEvent::GameRestored {
            game_id: "g1".into()
        }));
        assert!(state.game().unwrap().in_phase("playing"));
    }

    #[test]
    fn rejected_resume_forgets_everything() {
        let mut state = SyncState::default();
        state.enter_lobby(LobbyJoined {
            player: player("p1"),
            lobby: lobby("p1"),
        });
        let events = state.apply_resume(ResumeOutcome::Rejected {
            reason: "expired".into(),
        });
        assert_eq!(
            events,
            vec![ClientEvent::ResumeFailed {
                reason: "expired".into()
            }]
        );
        assert!(state.me.is_none());
        assert!(state.lobby().is_none());
        assert_eq!(state.resume, ResumeState::ResumeFailed);
    }
}
