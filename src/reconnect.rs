//! Session-resume protocol.
//!
//! At the start of every connection lifetime the client consults the session
//! store exactly once. With no stored record the protocol goes straight from
//! `Idle` to `Resumed`; otherwise it issues a single `player:reconnect`
//! action and waits for its acknowledgment:
//!
//! ```text
//! Idle ──(no record)──────────────────────────────▶ Resumed
//!  │
//!  └─(record)─▶ AttemptingResume ─(success ack)──▶ Resumed
//!                        │
//!                        └─(error / invalid ack)──▶ ResumeFailed
//! ```
//!
//! An attempt left unacknowledged past the action timeout counts as failed.
//! A failed resume clears the stored record; a transport fault never does.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::protocol::{ack_error, ClientAction, GameStateSnapshot, Lobby, Player, ReconnectResponse};
use crate::session::SessionRecord;

/// Reason reported when the server never acknowledges `player:reconnect`.
pub const RESUME_TIMEOUT_REASON: &str = "reconnect timed out";

/// Progress of the resume step within one connection lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumeState {
    #[default]
    Idle,
    AttemptingResume,
    Resumed,
    ResumeFailed,
}

/// Result of evaluating a `player:reconnect` acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub enum ResumeOutcome {
    Restored {
        player: Player,
        lobby: Lobby,
        game_state: Option<GameStateSnapshot>,
    },
    Rejected {
        reason: String,
    },
}

/// Per-lifetime resume tracker. Allows at most one attempt.
#[derive(Debug, Default)]
pub struct Resumption {
    state: ResumeState,
}

impl Resumption {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ResumeState {
        self.state
    }

    /// Leave `Idle`. Returns the action to send when a record exists; with no
    /// record the tracker is already `Resumed` on return.
    ///
    /// Any call after the first is a no-op returning `None`.
    pub fn begin(&mut self, record: Option<&SessionRecord>) -> Option<ClientAction> {
        if self.state != ResumeState::Idle {
            warn!(state = ?self.state, "resume already handled in this lifetime");
            return None;
        }
        match record {
            None => {
                debug!("no stored session, nothing to resume");
                self.state = ResumeState::Resumed;
                None
            }
            Some(record) => {
                info!(player_id = %record.player_id, lobby = %record.lobby_code, "resuming session");
                self.state = ResumeState::AttemptingResume;
                Some(ClientAction::PlayerReconnect {
                    player_id: record.player_id.clone(),
                    lobby_code: record.lobby_code.clone(),
                })
            }
        }
    }

    /// Give up on an attempt whose acknowledgment never arrived. Returns
    /// `None` unless an attempt is in flight.
    pub fn expire(&mut self) -> Option<ResumeOutcome> {
        if self.state != ResumeState::AttemptingResume {
            return None;
        }
        self.state = ResumeState::ResumeFailed;
        Some(ResumeOutcome::Rejected {
            reason: RESUME_TIMEOUT_REASON.into(),
        })
    }

    /// Evaluate the acknowledgment and move to `Resumed` or `ResumeFailed`.
    pub fn finish(&mut self, body: Value) -> ResumeOutcome {
        let outcome = evaluate(body);
        self.state = match outcome {
            ResumeOutcome::Restored { .. } => ResumeState::Resumed,
            ResumeOutcome::Rejected { .. } => ResumeState::ResumeFailed,
        };
        outcome
    }
}

/// Interpret a `player:reconnect` acknowledgment body.
///
/// Success requires `success: true` together with both `player` and `lobby`.
pub fn evaluate(body: Value) -> ResumeOutcome {
    if let Some(reason) = ack_error(&body) {
        return ResumeOutcome::Rejected { reason };
    }
    let response: ReconnectResponse = match serde_json::from_value(body) {
        Ok(response) => response,
        Err(e) => {
            return ResumeOutcome::Rejected {
                reason: format!("invalid reconnect response: {e}"),
            }
        }
    };
    match response {
        ReconnectResponse {
            success: true,
            player: Some(player),
            lobby: Some(lobby),
            game_state,
            ..
        } => ResumeOutcome::Restored {
            player,
            lobby,
            game_state,
        },
        ReconnectResponse { success: false, .. } => ResumeOutcome::Rejected {
            reason: "server declined to resume the session".into(),
        },
        _ => ResumeOutcome::Rejected {
            reason: "reconnect response is missing player or lobby".into(),
        },
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
    use serde_json::json;

    fn record() -> SessionRecord {
        SessionRecord {
            player_id: "p1".into(),
            username: "alice".into(),
            lobby_code: "ABCD".into(),
        }
    }

    fn lobby_json() -> Value {
        json!({"code": "ABCD", "hostId": "p1", "players": [{"id": "p1", "username": "alice", "isHost": true}]})
    }

    #[test]
    fn no_record_resumes_without_action() {
        let mut resume = Resumption::new();
        assert_eq!(resume.begin(None), None);
        assert_eq!(resume.state(), ResumeState::Resumed);
    }

    #[test]
    fn record_issues_one_reconnect() {
        let mut resume = Resumption::new();
        let action = resume.begin(Some(&record())).unwrap();
        assert_eq!(
            action,
            ClientAction::PlayerReconnect {
                player_id: "p1".into(),
                lobby_code: "ABCD".into()
            }
        );
        assert_eq!(resume.state(), ResumeState::AttemptingResume);
        assert_eq!(resume.begin(Some(&record())), None);
    }

    #[test]
    fn success_without_game_state() {
        let mut resume = Resumption::new();
        resume.begin(Some(&record()));
        let outcome = resume.finish(json!({
            "success": true,
            "player": {"id": "p1", "username": "alice"},
            "lobby": lobby_json()
        }));
        let ResumeOutcome::Restored {
            player,
            lobby,
            game_state,
        } = outcome
        else {
            panic!("expected restore");
        };
        assert_eq!(player.id, "p1");
        assert_eq!(lobby.code, "ABCD");
        assert!(game_state.is_none());
        assert_eq!(resume.state(), ResumeState::Resumed);
    }

    #[test]
    fn success_with_game_state() {
        let outcome = evaluate(json!({
            "success": true,
            "player": {"id": "p1", "username": "alice"},
            "lobby": lobby_json(),
            "gameState": {"gameId": "g1", "phase": "playing", "grid": [[0, 1], [1, 1]], "solved": true}
        }));
        let ResumeOutcome::Restored { game_state, .. } = outcome else {
            panic!("expected restore");
        };
        let snapshot = game_state.unwrap();
        assert_eq!(snapshot.game_id.as_deref(), Some("g1"));
        assert_eq!(snapshot.solved, Some(true));
    }

    #[test]
    fn error_and_invalid_bodies_fail() {
        let mut resume = Resumption::new();
        resume.begin(Some(&record()));
        let outcome = resume.finish(json!({"success": false, "error": "Lobby not found"}));
        assert_eq!(
            outcome,
            ResumeOutcome::Rejected {
                reason: "Lobby not found".into()
            }
        );
        assert_eq!(resume.state(), ResumeState::ResumeFailed);

        assert!(matches!(evaluate(json!({"success": false})), ResumeOutcome::Rejected { .. }));
        assert!(matches!(evaluate(json!({"success": true})), ResumeOutcome::Rejected { .. }));
        assert!(matches!(evaluate(json!("garbage")), ResumeOutcome::Rejected { .. }));
        assert!(matches!(
            evaluate(json!({"success": true, "player": 7, "lobby": lobby_json()})),
            ResumeOutcome::Rejected { .. }
        ));
    }

    #[test]
    fn expiry_fails_only_an_attempt_in_flight() {
        let mut resume = Resumption::new();
        assert_eq!(resume.expire(), None);
        resume.begin(Some(&record()));
        assert_eq!(
            resume.expire(),
            Some(ResumeOutcome::Rejected {
                reason: RESUME_TIMEOUT_REASON.into()
            })
        );
        assert_eq!(resume.state(), ResumeState::ResumeFailed);
        assert_eq!(resume.expire(), None);
    }
}
