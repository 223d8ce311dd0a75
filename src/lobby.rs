//! Lobby state machine.
//!
//! Every lobby-affecting push carries a complete [`Lobby`] snapshot, which
//! unconditionally replaces the current one. There is no field-level merge.

use tracing::debug;

use crate::protocol::{GameEndedPayload, GameStartedPayload, Lobby, ServerEvent};

/// Reducer owning the current lobby snapshot.
#[derive(Debug, Clone, Default)]
pub struct LobbyMachine {
    lobby: Option<Lobby>,
}

impl LobbyMachine {
    /// The current lobby, if the player has created or joined one.
    pub fn lobby(&self) -> Option<&Lobby> {
        self.lobby.as_ref()
    }

    /// Replace the lobby wholesale (create/join/resume acknowledgments).
    pub fn set(&mut self, lobby: Lobby) {
        debug!(code = %lobby.code, players = lobby.players.len(), "lobby replaced");
        self.lobby = Some(lobby);
    }

    /// Forget the lobby (leave, failed resume).
    pub fn clear(&mut self) {
        self.lobby = None;
    }

    /// Returns `true` if `player_id` is the lobby's host.
    pub fn is_host(&self, player_id: &str) -> bool {
        self.lobby.as_ref().is_some_and(|l| l.host_id == player_id)
    }

    /// Apply one push event. Returns `true` if the lobby was replaced.
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        let snapshot = match event {
            ServerEvent::PlayerJoined(p)
            | ServerEvent::PlayerLeft(p)
            | ServerEvent::HostChanged(p)
            | ServerEvent::PlayerDisconnected(p)
            | ServerEvent::PlayerReconnected(p) => &p.lobby,
            ServerEvent::GameStarted(GameStartedPayload {
                lobby: Some(lobby), ..
            })
            | ServerEvent::GameEnded(GameEndedPayload { lobby: Some(lobby) }) => lobby,
            _ => return false,
        };
        self.set(snapshot.clone());
        true
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
    use crate::protocol::{LobbyPayload, Player, SolvedPlayer};

    fn lobby(host: &str, ids: &[&str]) -> Lobby {
        Lobby {
            code: "ABCD".into(),
            host_id: host.into(),
            players: ids
                .iter()
                .map(|id| Player {
                    id: (*id).into(),
                    username: format!("user-{id}"),
                    is_host: *id == host,
                })
                .collect(),
        }
    }

    #[test]
    fn latest_snapshot_wins() {
        let mut machine = LobbyMachine::default();
        let events = [
            ServerEvent::PlayerJoined(LobbyPayload {
                lobby: lobby("p1", &["p1", "p2"]),
            }),
            ServerEvent::PlayerJoined(LobbyPayload {
                lobby: lobby("p1", &["p1", "p2", "p3"]),
            }),
            ServerEvent::PlayerLeft(LobbyPayload {
                lobby: lobby("p1", &["p1", "p3"]),
            }),
            ServerEvent::HostChanged(LobbyPayload {
                lobby: lobby("p3", &["p3"]),
            }),
            ServerEvent::PlayerDisconnected(LobbyPayload {
                lobby: lobby("p3", &["p3", "p4"]),
            }),
            ServerEvent::PlayerReconnected(LobbyPayload {
                lobby: lobby("p4", &["p4"]),
            }),
        ];
        for event in &events {
            assert!(machine.apply(event));
            let (ServerEvent::PlayerJoined(p)
            | ServerEvent::PlayerLeft(p)
            | ServerEvent::HostChanged(p)
            | ServerEvent::PlayerDisconnected(p)
            | ServerEvent::PlayerReconnected(p)) = event
            else {
                panic!("unexpected event");
            };
            assert_eq!(machine.lobby(), Some(&p.lobby));
        }
        assert!(machine.is_host("p4"));
        assert!(!machine.is_host("p1"));
    }

    #[test]
    fn game_pushes_leave_lobby_alone() {
        let mut machine = LobbyMachine::default();
        machine.set(lobby("p1", &["p1"]));
        let changed = machine.apply(&ServerEvent::PlayerSolved(SolvedPlayer {
            player_id: "p1".into(),
            username: "alice".into(),
            solve_time: 1,
        }));
        assert!(!changed);
        assert_eq!(machine.lobby().unwrap().host_id, "p1");
    }

    #[test]
    fn game_ended_replaces_lobby() {
        let mut machine = LobbyMachine::default();
        machine.set(lobby("p1", &["p1", "p2"]));
        assert!(machine.apply(&ServerEvent::GameEnded(GameEndedPayload {
            lobby: Some(lobby("p2", &["p2"])),
        })));
        assert!(machine.is_host("p2"));
        assert_eq!(machine.lobby().unwrap().players.len(), 1);
    }

    #[test]
    fn game_ended_without_lobby_keeps_snapshot() {
        let mut machine = LobbyMachine::default();
        machine.set(lobby("p1", &["p1", "p2"]));
        assert!(!machine.apply(&ServerEvent::GameEnded(GameEndedPayload::default())));
        assert_eq!(machine.lobby().unwrap().players.len(), 2);
    }
}
