//! Wire-compatible protocol types for the Drinkingames party-game server.
//!
//! The server speaks a socket-style JSON envelope over text frames:
//!
//! - client → server actions: `{"event": "lobby:join", "data": {…}, "ack": 7}`
//! - server → client pushes: `{"event": "game:phase", "data": {…}}`
//! - server → client acknowledgments: `{"ack": 7, "data": {…}}`
//!
//! Payload keys are camelCase on the wire. Per-game values the client never
//! interprets (cards' ranks, question sets, submissions) stay as
//! [`serde_json::Value`] so that game rules remain the server's business.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PartyError, Result};

// ── Type aliases ────────────────────────────────────────────────────

/// Server-assigned player identifier, stable across reconnects.
pub type PlayerId = String;

/// Puzzle grid of region ids, row-major.
pub type Grid = Vec<Vec<u32>>;

// ── Core entities ───────────────────────────────────────────────────

/// A player as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    #[serde(default)]
    pub is_host: bool,
}

/// Full lobby snapshot. Always replaced wholesale, never diffed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lobby {
    pub code: String,
    pub host_id: PlayerId,
    #[serde(default)]
    pub players: Vec<Player>,
}

impl Lobby {
    /// Look up a player in the roster by id.
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }
}

/// An entry of the server's game catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub min_players: usize,
}

impl GameInfo {
    /// Returns `true` if a lobby with `player_count` players may start this game.
    pub fn can_start(&self, player_count: usize) -> bool {
        player_count >= self.min_players
    }
}

/// A playing card. The rank is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub suit: String,
    pub rank: Value,
}

/// Opaque, game-specific phase tag (e.g. `"flop"`, `"drawing"`, `"playing"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Phase(pub String);

impl Phase {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Phase {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A player who solved the puzzle, in the order the server announced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolvedPlayer {
    pub player_id: PlayerId,
    /// Empty when the server announces only the id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    /// Milliseconds from phase start to solution.
    pub solve_time: u64,
}

/// A word or drawing submission announcement. Only the submitter identity is
/// interpreted; everything else is carried as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The drawing currently shown for voting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShownDrawing {
    pub drawing_player_id: PlayerId,
    pub drawing_player_username: String,
    /// Encoded image (typically a data URL); absent if the player drew nothing.
    #[serde(default)]
    pub drawing: Option<String>,
    pub index: u32,
    pub total: u32,
}

/// One row of a results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEntry {
    pub player_id: PlayerId,
    pub username: String,
    /// Game-specific breakdown (`correct`, `solveTime`, hand rank, …).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Terminal results of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResults {
    #[serde(default)]
    pub losers: Vec<ResultEntry>,
    #[serde(default)]
    pub players: Vec<ResultEntry>,
    /// The target word, for word-based games.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
}

impl GameResults {
    /// Returns `true` if the given player is among the losers.
    pub fn is_loser(&self, player_id: &str) -> bool {
        self.losers.iter().any(|l| l.player_id == player_id)
    }
}

// ── Push payloads ───────────────────────────────────────────────────

/// Payload of every `lobby:*` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyPayload {
    pub lobby: Lobby,
}

/// Payload of `game:ended`. The game is over whether or not a lobby is
/// attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameEndedPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lobby: Option<Lobby>,
}

/// Payload of `game:started`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStartedPayload {
    pub game_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lobby: Option<Lobby>,
}

/// Payload of `game:phase`. Every optional field is merged only when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhasePayload {
    pub phase: Phase,
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
}

impl Default for Phase {
    fn default() -> Self {
        Self(String::new())
    }
}

/// Payload of `game:hole-cards`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleCardsPayload {
    pub cards: Vec<Card>,
}

/// Payload of `game:community-card`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityCardPayload {
    pub community_cards: Vec<Card>,
    pub card: Card,
    pub position: u32,
}

/// Payload for pushes that carry no data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyPayload {}

/// Flat game snapshot returned by `player:reconnect`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStateSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<GameResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub penalty_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hole_cards: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_cards: Option<Vec<Card>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_drawing: Option<ShownDrawing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<Grid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved_players: Option<Vec<SolvedPlayer>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved: Option<bool>,
}

// ── Messages ────────────────────────────────────────────────────────

/// Push events sent from server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "lobby:player-joined")]
    PlayerJoined(LobbyPayload),
    #[serde(rename = "lobby:player-left")]
    PlayerLeft(LobbyPayload),
    #[serde(rename = "lobby:host-changed")]
    HostChanged(LobbyPayload),
    #[serde(rename = "lobby:player-disconnected")]
    PlayerDisconnected(LobbyPayload),
    #[serde(rename = "lobby:player-reconnected")]
    PlayerReconnected(LobbyPayload),
    #[serde(rename = "game:started")]
    GameStarted(GameStartedPayload),
    #[serde(rename = "game:phase")]
    Phase(PhasePayload),
    #[serde(rename = "game:hole-cards")]
    HoleCards(HoleCardsPayload),
    #[serde(rename = "game:hole-cards-complete")]
    HoleCardsComplete(EmptyPayload),
    #[serde(rename = "game:community-card")]
    CommunityCard(CommunityCardPayload),
    #[serde(rename = "game:word-submitted")]
    WordSubmitted(Submission),
    #[serde(rename = "game:drawing-submitted")]
    DrawingSubmitted(Submission),
    #[serde(rename = "game:show-drawing")]
    ShowDrawing(ShownDrawing),
    #[serde(rename = "game:player-solved")]
    PlayerSolved(SolvedPlayer),
    #[serde(rename = "game:results")]
    Results(GameResults),
    #[serde(rename = "game:ended")]
    GameEnded(GameEndedPayload),
}

impl ServerEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayerJoined(_) => "lobby:player-joined",
            Self::PlayerLeft(_) => "lobby:player-left",
            Self::HostChanged(_) => "lobby:host-changed",
            Self::PlayerDisconnected(_) => "lobby:player-disconnected",
            Self::PlayerReconnected(_) => "lobby:player-reconnected",
            Self::GameStarted(_) => "game:started",
            Self::Phase(_) => "game:phase",
            Self::HoleCards(_) => "game:hole-cards",
            Self::HoleCardsComplete(_) => "game:hole-cards-complete",
            Self::CommunityCard(_) => "game:community-card",
            Self::WordSubmitted(_) => "game:word-submitted",
            Self::DrawingSubmitted(_) => "game:drawing-submitted",
            Self::ShowDrawing(_) => "game:show-drawing",
            Self::PlayerSolved(_) => "game:player-solved",
            Self::Results(_) => "game:results",
            Self::GameEnded(_) => "game:ended",
        }
    }

    /// Serialize as a push frame, the way the server would send it.
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Actions sent from client to server. Every action expects one acknowledgment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientAction {
    #[serde(rename = "lobby:create")]
    LobbyCreate { username: String },
    #[serde(rename = "lobby:join")]
    LobbyJoin {
        username: String,
        #[serde(rename = "lobbyCode")]
        lobby_code: String,
    },
    #[serde(rename = "lobby:leave")]
    LobbyLeave,
    #[serde(rename = "player:reconnect")]
    PlayerReconnect {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        #[serde(rename = "lobbyCode")]
        lobby_code: String,
    },
    #[serde(rename = "games:list")]
    GamesList,
    #[serde(rename = "game:start")]
    GameStart {
        #[serde(rename = "gameId")]
        game_id: String,
    },
    #[serde(rename = "game:action")]
    GameAction { action: String, data: Value },
    #[serde(rename = "game:end")]
    GameEnd,
}

impl ClientAction {
    /// Wire name of this action.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LobbyCreate { .. } => "lobby:create",
            Self::LobbyJoin { .. } => "lobby:join",
            Self::LobbyLeave => "lobby:leave",
            Self::PlayerReconnect { .. } => "player:reconnect",
            Self::GamesList => "games:list",
            Self::GameStart { .. } => "game:start",
            Self::GameAction { .. } => "game:action",
            Self::GameEnd => "game:end",
        }
    }

    /// Serialize as an outgoing frame carrying acknowledgment id `ack`.
    pub fn encode(&self, ack: u64) -> Result<String> {
        let mut frame = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut frame {
            map.insert("ack".to_string(), Value::from(ack));
        }
        Ok(serde_json::to_string(&frame)?)
    }
}

// ── Acknowledgment bodies ───────────────────────────────────────────

/// Ack body of `lobby:create` and `lobby:join`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyJoined {
    pub player: Player,
    pub lobby: Lobby,
}

/// Ack body of `games:list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GamesListResponse {
    #[serde(default)]
    pub games: Vec<GameInfo>,
}

/// Ack body of `player:reconnect`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconnectResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<Player>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lobby: Option<Lobby>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_state: Option<GameStateSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Extract the error carried by an acknowledgment body, if any.
///
/// Absent, `null`, `false` and empty-string `error` fields mean success.
pub fn ack_error(body: &Value) -> Option<String> {
    match body.get("error")? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ── Inbound framing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawFrame {
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    ack: Option<u64>,
}

/// A decoded server → client frame.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingFrame {
    /// Acknowledgment of the action sent with id `id`.
    Ack { id: u64, data: Value },
    /// Server-initiated push event.
    Push(ServerEvent),
}

impl IncomingFrame {
    /// Decode one text frame.
    ///
    /// # Errors
    ///
    /// Returns [`PartyError::Serialization`] for malformed JSON, unknown event
    /// names or payloads that do not match their schema.
    pub fn parse(text: &str) -> Result<Self> {
        let raw: RawFrame = serde_json::from_str(text)?;
        if let Some(id) = raw.ack {
            return Ok(Self::Ack {
                id,
                data: raw.data.unwrap_or(Value::Null),
            });
        }
        let Some(event) = raw.event else {
            return Err(PartyError::Serialization(serde::de::Error::custom(
                "frame carries neither `event` nor `ack`",
            )));
        };
        let data = raw.data.unwrap_or_else(|| Value::Object(Map::new()));
        let mut envelope = Map::new();
        envelope.insert("event".to_string(), Value::String(event));
        envelope.insert("data".to_string(), data);
        Ok(Self::Push(serde_json::from_value(Value::Object(envelope))?))
    }
}

/// Serialize an acknowledgment frame, the way the server would send it.
pub fn ack_frame(id: u64, data: &Value) -> Result<String> {
    Ok(serde_json::to_string(&serde_json::json!({ "ack": id, "data": data }))?)
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
    fn phase_push_parses_optional_fields() {
        let text = r#"{"event":"game:phase","data":{"phase":"playing","timeLimit":60000,"grid":[[0,1],[1,1]]}}"#;
        let frame = IncomingFrame::parse(text).unwrap();
        let IncomingFrame::Push(ServerEvent::Phase(p)) = frame else {
            panic!("expected phase push, got {frame:?}");
        };
        assert_eq!(p.phase.as_str(), "playing");
        assert_eq!(p.time_limit, Some(60_000));
        assert_eq!(p.grid, Some(vec![vec![0, 1], vec![1, 1]]));
        assert!(p.word.is_none());
        assert!(p.penalty_time.is_none());
    }

    #[test]
    fn dataless_push_parses() {
        let frame = IncomingFrame::parse(r#"{"event":"game:hole-cards-complete"}"#).unwrap();
        assert_eq!(
            frame,
            IncomingFrame::Push(ServerEvent::HoleCardsComplete(EmptyPayload {}))
        );
        let frame =
            IncomingFrame::parse(r#"{"event":"game:hole-cards-complete","data":{}}"#).unwrap();
        assert!(matches!(
            frame,
            IncomingFrame::Push(ServerEvent::HoleCardsComplete(_))
        ));
    }

    #[test]
    fn ack_frame_takes_precedence() {
        let frame = IncomingFrame::parse(r#"{"ack":9,"data":{"games":[]}}"#).unwrap();
        assert_eq!(
            frame,
            IncomingFrame::Ack {
                id: 9,
                data: json!({"games": []})
            }
        );
    }

    #[test]
    fn unknown_event_is_an_error() {
        let err = IncomingFrame::parse(r#"{"event":"chat:message","data":{}}"#).unwrap_err();
        assert!(matches!(err, PartyError::Serialization(_)));
        let err = IncomingFrame::parse(r#"{"data":{}}"#).unwrap_err();
        assert!(matches!(err, PartyError::Serialization(_)));
    }

    #[test]
    fn action_encoding_carries_ack_and_camel_case() {
        let action = ClientAction::LobbyJoin {
            username: "alice".into(),
            lobby_code: "ABCD".into(),
        };
        let text = action.encode(3).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"event":"lobby:join","data":{"username":"alice","lobbyCode":"ABCD"},"ack":3})
        );
        assert_eq!(action.name(), "lobby:join");
    }

    #[test]
    fn dataless_action_omits_data() {
        let value: Value = serde_json::from_str(&ClientAction::GameEnd.encode(1).unwrap()).unwrap();
        assert_eq!(value, json!({"event":"game:end","ack":1}));
        let decoded: ClientAction = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, ClientAction::GameEnd);
    }

    #[test]
    fn ack_error_truthiness() {
        assert_eq!(ack_error(&json!({"error":"not your turn"})).as_deref(), Some("not your turn"));
        assert_eq!(ack_error(&json!({"error":""})), None);
        assert_eq!(ack_error(&json!({"error":null})), None);
        assert_eq!(ack_error(&json!({"success":true})), None);
        assert_eq!(ack_error(&json!(null)), None);
    }

    #[test]
    fn results_keep_game_specific_columns() {
        let results: GameResults = serde_json::from_value(json!({
            "losers": [{"playerId":"p2","username":"bob","correct":3}],
            "players": [
                {"playerId":"p1","username":"alice","correct":9},
                {"playerId":"p2","username":"bob","correct":3}
            ]
        }))
        .unwrap();
        assert!(results.is_loser("p2"));
        assert!(!results.is_loser("p1"));
        assert_eq!(results.players[0].extra.get("correct"), Some(&json!(9)));
        assert!(results.word.is_none());
    }

    #[test]
    fn game_info_minimum_players() {
        let info: GameInfo = serde_json::from_value(
            json!({"id":"queens","name":"Queens","description":"","minPlayers":2}),
        )
        .unwrap();
        assert!(!info.can_start(1));
        assert!(info.can_start(2));
    }
}
