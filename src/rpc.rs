//! Request/response over the push channel.
//!
//! Every outgoing action carries an acknowledgment id. [`PendingAcks`] maps
//! those ids to the waiting caller, so that each action settles exactly once:
//! with the acknowledgment body, with the error that body carries, or with
//! [`PartyError::NotConnected`] when the connection lifetime ends first.
//!
//! The table belongs to one connection lifetime and is released as a unit
//! on teardown. Nothing is retried.

use std::collections::HashMap;

use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{PartyError, Result};
use crate::protocol::{ack_error, ClientAction};

/// Convert an acknowledgment body into a single outcome.
///
/// # Errors
///
/// Returns [`PartyError::Action`] carrying the body's `error` message.
pub fn settle(body: Value) -> Result<Value> {
    match ack_error(&body) {
        Some(message) => Err(PartyError::Action { message }),
        None => Ok(body),
    }
}

/// Local state change applied when an acknowledgment arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckHook {
    /// No local effect beyond settling the caller.
    None,
    /// `lobby:create` / `lobby:join`: adopt identity and lobby, save the session.
    EnterLobby,
    /// `lobby:leave`: forget identity and lobby, clear the session.
    LeaveLobby,
    /// `games:list`: cache the catalogue.
    GamesList,
    /// `player:reconnect`: finish the resume attempt.
    Resume,
}

impl AckHook {
    /// The hook an action implies.
    pub fn for_action(action: &ClientAction) -> Self {
        match action {
            ClientAction::LobbyCreate { .. } | ClientAction::LobbyJoin { .. } => Self::EnterLobby,
            ClientAction::LobbyLeave => Self::LeaveLobby,
            ClientAction::GamesList => Self::GamesList,
            ClientAction::PlayerReconnect { .. } => Self::Resume,
            ClientAction::GameStart { .. }
            | ClientAction::GameAction { .. }
            | ClientAction::GameEnd => Self::None,
        }
    }
}

/// Sender half a caller is waiting on.
pub type Reply = oneshot::Sender<Result<Value>>;

/// One action awaiting its acknowledgment.
#[derive(Debug)]
pub struct PendingAck {
    pub action: &'static str,
    pub hook: AckHook,
    /// `None` for actions the client issues on its own behalf.
    pub reply: Option<Reply>,
}

impl PendingAck {
    /// Deliver the outcome to the caller, if one is waiting.
    pub fn resolve(self, outcome: Result<Value>) {
        if let Some(reply) = self.reply {
            if reply.send(outcome).is_err() {
                debug!(action = self.action, "caller stopped waiting for ack");
            }
        }
    }
}

/// Acknowledgment table for one connection lifetime.
#[derive(Debug, Default)]
pub struct PendingAcks {
    next_id: u64,
    waiting: HashMap<u64, PendingAck>,
}

impl PendingAcks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action and return the ack id to send it with.
    pub fn register(&mut self, action: &ClientAction, hook: AckHook, reply: Option<Reply>) -> u64 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.waiting.insert(
            id,
            PendingAck {
                action: action.name(),
                hook,
                reply,
            },
        );
        id
    }

    /// Remove and return the entry for `id`. A second ack for the same id
    /// finds nothing, which keeps settlement single.
    pub fn take(&mut self, id: u64) -> Option<PendingAck> {
        self.waiting.remove(&id)
    }

    /// Number of actions still waiting.
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// Settle every waiting caller with [`PartyError::NotConnected`].
    pub fn release_all(&mut self) {
        if !self.waiting.is_empty() {
            debug!(count = self.waiting.len(), "releasing pending acks");
        }
        for (_, pending) in self.waiting.drain() {
            pending.resolve(Err(PartyError::NotConnected));
        }
    }
}

impl Drop for PendingAcks {
    fn drop(&mut self) {
        self.release_all();
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

    #[test]
    fn settle_rejects_with_server_message() {
        let err = settle(json!({"error": "not your turn"})).unwrap_err();
        assert_eq!(err.action_message(), Some("not your turn"));
        assert_eq!(err.to_string(), "not your turn");
        assert_eq!(settle(json!({"ok": true})).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn hooks_follow_actions() {
        assert_eq!(
            AckHook::for_action(&ClientAction::LobbyCreate {
                username: "alice".into()
            }),
            AckHook::EnterLobby
        );
        assert_eq!(AckHook::for_action(&ClientAction::LobbyLeave), AckHook::LeaveLobby);
        assert_eq!(AckHook::for_action(&ClientAction::GameEnd), AckHook::None);
    }

    #[tokio::test]
    async fn each_id_settles_once() {
        let mut table = PendingAcks::new();
        let (tx, rx) = oneshot::channel();
        let id = table.register(&ClientAction::GameEnd, AckHook::None, Some(tx));
        let other = table.register(&ClientAction::GamesList, AckHook::GamesList, None);
        assert_ne!(id, other);
        assert_eq!(table.len(), 2);

        table.take(id).unwrap().resolve(settle(json!({"ok": true})));
        assert!(table.take(id).is_none());
        assert_eq!(rx.await.unwrap().unwrap(), json!({"ok": true}));
    }

    #[tokio::test]
    async fn release_all_rejects_waiters() {
        let mut table = PendingAcks::new();
        let (tx, rx) = oneshot::channel();
        table.register(
            &ClientAction::GameStart {
                game_id: "queens".into(),
            },
            AckHook::None,
            Some(tx),
        );
        table.release_all();
        assert!(table.is_empty());
        assert!(matches!(rx.await.unwrap(), Err(PartyError::NotConnected)));
    }

    #[tokio::test]
    async fn dropping_the_table_releases_waiters() {
        let (tx, rx) = oneshot::channel();
        {
            let mut table = PendingAcks::new();
            table.register(&ClientAction::GameEnd, AckHook::None, Some(tx));
        }
        assert!(matches!(rx.await.unwrap(), Err(PartyError::NotConnected)));
    }
}
