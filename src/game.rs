//! Game phase multiplexer.
//!
//! Tracks `{current game, phase, accumulated game data, results}` across an
//! arbitrary sequence of server pushes. Phase tags are opaque; the only
//! transitions that clear anything are `game:started` and `game:ended`.
//!
//! [`GameData`] is additive: a field, once present, stays readable until one
//! of those two reset points. List-valued fields grow by appending, governed
//! by [`ListMerge`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::protocol::{
    Card, GameResults, GameStateSnapshot, Grid, Phase, PhasePayload, ServerEvent, ShownDrawing,
    SolvedPlayer, Submission,
};

/// How list-valued game data grows when an entry is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListMerge {
    /// Append every delivery, duplicates included.
    #[default]
    Append,
    /// Key entries by player id; a redelivery for the same player replaces
    /// the earlier entry in place instead of appending.
    DedupByPlayer,
}

impl ListMerge {
    fn push<T>(self, list: &mut Option<Vec<T>>, entry: T, key: impl Fn(&T) -> Option<&str>) {
        let list = list.get_or_insert_with(Vec::new);
        if self == Self::DedupByPlayer {
            if let Some(id) = key(&entry) {
                if let Some(slot) = list.iter_mut().find(|e| key(&**e) == Some(id)) {
                    *slot = entry;
                    return;
                }
            }
        }
        list.push(entry);
    }
}

/// Accumulated per-game data. Absent fields were never delivered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<Grid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hole_cards: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hole_cards_dealt: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_cards: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_card: Option<Card>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_card_position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_submissions: Option<Vec<Submission>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drawing_submissions: Option<Vec<Submission>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_drawing: Option<ShownDrawing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved_players: Option<Vec<SolvedPlayer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved: Option<bool>,
}

fn set_if_present<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if let Some(v) = value {
        *slot = Some(v.clone());
    }
}

impl GameData {
    /// Returns `true` if no field has been delivered yet.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the optional fields of a `game:phase` push.
    pub fn merge_phase(&mut self, payload: &PhasePayload) {
        set_if_present(&mut self.time_limit, &payload.time_limit);
        set_if_present(&mut self.word, &payload.word);
        set_if_present(&mut self.questions, &payload.questions);
        set_if_present(&mut self.penalty_time, &payload.penalty_time);
        set_if_present(&mut self.grid, &payload.grid);
    }

    /// Merge the recognized optional fields of a reconnect snapshot.
    ///
    /// Lists in a snapshot are complete server-side views, so they replace
    /// the local list rather than being appended to it.
    pub fn merge_snapshot(&mut self, snapshot: &GameStateSnapshot) {
        set_if_present(&mut self.time_limit, &snapshot.time_limit);
        set_if_present(&mut self.word, &snapshot.word);
        set_if_present(&mut self.questions, &snapshot.questions);
        set_if_present(&mut self.penalty_time, &snapshot.penalty_time);
        set_if_present(&mut self.hole_cards, &snapshot.hole_cards);
        set_if_present(&mut self.community_cards, &snapshot.community_cards);
        set_if_present(&mut self.current_drawing, &snapshot.current_drawing);
        set_if_present(&mut self.grid, &snapshot.grid);
        set_if_present(&mut self.solved_players, &snapshot.solved_players);
        set_if_present(&mut self.solved, &snapshot.solved);
    }

    /// View the data as a flat JSON object keyed by wire names.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// An active game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    pub game_id: String,
    /// `None` until the first `game:phase` arrives.
    pub phase: Option<Phase>,
    pub data: GameData,
    /// Terminal once set.
    pub results: Option<GameResults>,
}

impl GameSession {
    fn new(game_id: impl Into<String>) -> Self {
        Self {
            game_id: game_id.into(),
            phase: None,
            data: GameData::default(),
            results: None,
        }
    }

    /// Returns `true` if the session is currently in the given phase.
    pub fn in_phase(&self, tag: &str) -> bool {
        self.phase.as_ref().is_some_and(|p| p.as_str() == tag)
    }
}

/// What a processed push changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameChange {
    Started,
    PhaseChanged,
    DataUpdated,
    Results,
    Ended,
}

/// Reducer owning the optional [`GameSession`].
#[derive(Debug, Clone, Default)]
pub struct GameMachine {
    session: Option<GameSession>,
    list_merge: ListMerge,
}

impl GameMachine {
    pub fn new(list_merge: ListMerge) -> Self {
        Self {
            session: None,
            list_merge,
        }
    }

    /// The active game, if any.
    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    /// Id of the active game, if any.
    pub fn current_game(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.game_id.as_str())
    }

    /// Drop any active game.
    pub fn clear(&mut self) {
        self.session = None;
    }

    /// Apply one push event. Returns `None` for events this reducer ignores.
    pub fn apply(&mut self, event: &ServerEvent) -> Option<GameChange> {
        match event {
            ServerEvent::GameStarted(payload) => {
                debug!(game_id = %payload.game_id, "game started");
                self.session = Some(GameSession::new(payload.game_id.clone()));
                return Some(GameChange::Started);
            }
            ServerEvent::GameEnded(_) => {
                debug!("game ended");
                self.session = None;
                return Some(GameChange::Ended);
            }
            _ => {}
        }

        let list_merge = self.list_merge;
        let Some(session) = self.session.as_mut() else {
            debug!(event = event.name(), "no active game, ignoring game push");
            return None;
        };
        let data = &mut session.data;

        match event {
            ServerEvent::Phase(payload) => {
                debug!(phase = %payload.phase, "phase changed");
                session.phase = Some(payload.phase.clone());
                data.merge_phase(payload);
                Some(GameChange::PhaseChanged)
            }
            ServerEvent::HoleCards(payload) => {
                data.hole_cards = Some(payload.cards.clone());
                Some(GameChange::DataUpdated)
            }
            ServerEvent::HoleCardsComplete(_) => {
                data.hole_cards_dealt = Some(true);
                Some(GameChange::DataUpdated)
            }
            ServerEvent::CommunityCard(payload) => {
                data.community_cards = Some(payload.community_cards.clone());
                data.last_card = Some(payload.card.clone());
                data.last_card_position = Some(payload.position);
                Some(GameChange::DataUpdated)
            }
            ServerEvent::WordSubmitted(entry) => {
                list_merge.push(&mut data.word_submissions, entry.clone(), |s| {
                    s.player_id.as_deref()
                });
                Some(GameChange::DataUpdated)
            }
            ServerEvent::DrawingSubmitted(entry) => {
                list_merge.push(&mut data.drawing_submissions, entry.clone(), |s| {
                    s.player_id.as_deref()
                });
                Some(GameChange::DataUpdated)
            }
            ServerEvent::ShowDrawing(drawing) => {
                data.current_drawing = Some(drawing.clone());
                Some(GameChange::DataUpdated)
            }
            ServerEvent::PlayerSolved(entry) => {
                list_merge.push(&mut data.solved_players, entry.clone(), |s| {
                    Some(s.player_id.as_str())
                });
                Some(GameChange::DataUpdated)
            }
            ServerEvent::Results(results) => {
                if session.results.is_some() {
                    warn!(game_id = %session.game_id, "results already posted, ignoring");
                    return None;
                }
                session.results = Some(results.clone());
                Some(GameChange::Results)
            }
            _ => None,
        }
    }

    /// Rebuild game state from a reconnect snapshot.
    ///
    /// A snapshot for the live game merges into it; a snapshot for any other
    /// game starts a fresh session. Returns `false` if the snapshot names no
    /// game and none is active.
    pub fn rehydrate(&mut self, snapshot: &GameStateSnapshot) -> bool {
        let session = match (&snapshot.game_id, self.session.take()) {
            (Some(id), Some(live)) if live.game_id == *id => live,
            (Some(id), _) => GameSession::new(id.clone()),
            (None, Some(live)) => live,
            (None, None) => {
                warn!("reconnect snapshot names no game, ignoring");
                return false;
            }
        };
        let session = self.session.insert(session);
        if let Some(phase) = &snapshot.phase {
            session.phase = Some(phase.clone());
        }
        if let Some(results) = &snapshot.results {
            session.results = Some(results.clone());
        }
        session.data.merge_snapshot(snapshot);
        debug!(game_id = %session.game_id, "game state rehydrated");
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
    use crate::protocol::{
        CommunityCardPayload, EmptyPayload, GameEndedPayload, GameStartedPayload,
        HoleCardsPayload, Lobby,
    };
    use serde_json::json;

    fn started(id: &str) -> ServerEvent {
        ServerEvent::GameStarted(GameStartedPayload {
            game_id: id.into(),
            lobby: None,
        })
    }

    fn phase(tag: &str) -> PhasePayload {
        PhasePayload {
            phase: Phase::from(tag),
            ..Default::default()
        }
    }

    fn solved(id: &str, ms: u64) -> ServerEvent {
        ServerEvent::PlayerSolved(SolvedPlayer {
            player_id: id.into(),
            username: format!("user-{id}"),
            solve_time: ms,
        })
    }

    fn ended() -> ServerEvent {
        ServerEvent::GameEnded(GameEndedPayload {
            lobby: Some(Lobby {
                code: "ABCD".into(),
                host_id: "p1".into(),
                players: vec![],
            }),
        })
    }

    fn results() -> GameResults {
        serde_json::from_value(json!({"losers": [], "players": [], "word": "giraffe"})).unwrap()
    }

    #[test]
    fn started_resets_everything() {
        let mut game = GameMachine::default();
        game.apply(&started("multiply-madness"));
        let mut p = phase("playing");
        p.time_limit = Some(30_000);
        game.apply(&ServerEvent::Phase(p));
        game.apply(&ServerEvent::Results(results()));

        assert_eq!(game.apply(&started("queens")), Some(GameChange::Started));
        let session = game.session().unwrap();
        assert_eq!(session.game_id, "queens");
        assert!(session.phase.is_none());
        assert!(session.data.is_empty());
        assert!(session.results.is_none());
    }

    #[test]
    fn phase_merge_keeps_absent_fields() {
        let mut game = GameMachine::default();
        game.apply(&started("drawing-game"));
        let mut first = phase("drawing");
        first.word = Some("giraffe".into());
        first.time_limit = Some(60_000);
        game.apply(&ServerEvent::Phase(first));
        let mut second = phase("voting");
        second.time_limit = Some(10_000);
        game.apply(&ServerEvent::Phase(second));

        let session = game.session().unwrap();
        assert!(session.in_phase("voting"));
        assert_eq!(session.data.word.as_deref(), Some("giraffe"));
        assert_eq!(session.data.time_limit, Some(10_000));
    }

    #[test]
    fn duplicate_solves_are_appended_in_order() {
        let mut game = GameMachine::default();
        game.apply(&started("queens"));
        let mut p = phase("playing");
        p.grid = Some(vec![vec![0, 0, 1], vec![0, 1, 1], vec![2, 2, 2]]);
        game.apply(&ServerEvent::Phase(p));
        game.apply(&solved("p2", 4200));
        game.apply(&solved("p2", 4200));

        let data = &game.session().unwrap().data;
        let list = data.solved_players.as_ref().unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|s| s.player_id == "p2" && s.solve_time == 4200));
        assert_eq!(data.grid.as_ref().unwrap()[2], vec![2, 2, 2]);
    }

    #[test]
    fn dedup_by_player_replaces_in_place() {
        let mut game = GameMachine::new(ListMerge::DedupByPlayer);
        game.apply(&started("queens"));
        game.apply(&solved("p2", 4200));
        game.apply(&solved("p3", 5000));
        game.apply(&solved("p2", 4100));

        let list = game.session().unwrap().data.solved_players.clone().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].player_id, "p2");
        assert_eq!(list[0].solve_time, 4100);
        assert_eq!(list[1].player_id, "p3");
    }

    #[test]
    fn poker_deal_sets_card_fields() {
        let mut game = GameMachine::default();
        game.apply(&started("dead-draw-poker"));
        let card = |s: &str, r: &str| Card {
            suit: s.into(),
            rank: json!(r),
        };
        game.apply(&ServerEvent::HoleCards(HoleCardsPayload {
            cards: vec![card("hearts", "A"), card("spades", "K")],
        }));
        game.apply(&ServerEvent::HoleCardsComplete(EmptyPayload {}));
        game.apply(&ServerEvent::CommunityCard(CommunityCardPayload {
            community_cards: vec![card("clubs", "2")],
            card: card("clubs", "2"),
            position: 0,
        }));

        let data = &game.session().unwrap().data;
        assert_eq!(data.hole_cards.as_ref().unwrap().len(), 2);
        assert_eq!(data.hole_cards_dealt, Some(true));
        assert_eq!(data.last_card_position, Some(0));
        assert_eq!(data.community_cards.as_ref().unwrap().len(), 1);
    }

    #[test]
    fn results_keep_game_data_and_are_terminal() {
        let mut game = GameMachine::default();
        game.apply(&started("drawing-game"));
        let mut p = phase("drawing");
        p.word = Some("giraffe".into());
        game.apply(&ServerEvent::Phase(p));

        assert_eq!(
            game.apply(&ServerEvent::Results(results())),
            Some(GameChange::Results)
        );
        assert_eq!(game.apply(&ServerEvent::Results(results())), None);
        let session = game.session().unwrap();
        assert_eq!(session.data.word.as_deref(), Some("giraffe"));
        assert!(session.results.is_some());

        assert_eq!(game.apply(&ended()), Some(GameChange::Ended));
        assert!(game.session().is_none());
    }

    #[test]
    fn game_pushes_without_a_game_are_ignored() {
        let mut game = GameMachine::default();
        assert_eq!(game.apply(&solved("p1", 10)), None);
        assert_eq!(game.apply(&ServerEvent::Phase(phase("playing"))), None);
        assert!(game.session().is_none());
    }

    #[test]
    fn rehydrate_sets_only_supplied_fields() {
        let mut game = GameMachine::default();
        let grid: Grid = vec![vec![0, 1], vec![1, 1]];
        let snapshot = GameStateSnapshot {
            game_id: Some("g1".into()),
            phase: Some(Phase::from("playing")),
            grid: Some(grid.clone()),
            solved: Some(true),
            ..Default::default()
        };
        assert!(game.rehydrate(&snapshot));

        let session = game.session().unwrap();
        assert_eq!(session.game_id, "g1");
        assert!(session.in_phase("playing"));
        assert_eq!(session.data.grid, Some(grid));
        assert_eq!(session.data.solved, Some(true));
        assert!(session.data.word.is_none());
        assert!(session.data.time_limit.is_none());
        assert!(session.results.is_none());
        assert_eq!(
            session.data.to_value(),
            json!({"grid": [[0, 1], [1, 1]], "solved": true})
        );
    }

    #[test]
    fn rehydrate_same_game_merges_into_live_state() {
        let mut game = GameMachine::default();
        game.apply(&started("drawing-game"));
        let mut p = phase("drawing");
        p.word = Some("giraffe".into());
        game.apply(&ServerEvent::Phase(p));

        game.rehydrate(&GameStateSnapshot {
            game_id: Some("drawing-game".into()),
            phase: Some(Phase::from("voting")),
            ..Default::default()
        });
        let session = game.session().unwrap();
        assert!(session.in_phase("voting"));
        assert_eq!(session.data.word.as_deref(), Some("giraffe"));
    }

    #[test]
    fn rehydrate_other_game_starts_fresh() {
        let mut game = GameMachine::default();
        game.apply(&started("drawing-game"));
        let mut p = phase("drawing");
        p.word = Some("giraffe".into());
        game.apply(&ServerEvent::Phase(p));

        game.rehydrate(&GameStateSnapshot {
            game_id: Some("queens".into()),
            ..Default::default()
        });
        let session = game.session().unwrap();
        assert_eq!(session.game_id, "queens");
        assert!(session.data.is_empty());
    }

    #[test]
    fn rehydrate_without_any_game_is_ignored() {
        let mut game = GameMachine::default();
        assert!(!game.rehydrate(&GameStateSnapshot {
            phase: Some(Phase::from("playing")),
            ..Default::default()
        }));
        assert!(game.session().is_none());
    }
}
