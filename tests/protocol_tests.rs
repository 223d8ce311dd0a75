#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Protocol tests for the Drinkingames client.
//!
//! Decodes JSON fixtures shaped like real server output, checks the frames
//! the client produces, and drives the game reducer through whole rounds of
//! the poker and drawing games from raw frames.

use drinkingames_client::game::{GameChange, GameMachine, ListMerge};
use drinkingames_client::protocol::{
    ack_error, ClientAction, GamesListResponse, IncomingFrame, LobbyJoined, ReconnectResponse,
    ServerEvent,
};
use drinkingames_client::PartyError;
use serde_json::{json, Value};

// ════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════

fn push(text: &str) -> ServerEvent {
    match IncomingFrame::parse(text).expect("frame parses") {
        IncomingFrame::Push(event) => event,
        other => panic!("expected a push, got {other:?}"),
    }
}

fn feed(game: &mut GameMachine, frames: &[Value]) -> Vec<Option<GameChange>> {
    frames
        .iter()
        .map(|frame| game.apply(&push(&frame.to_string())))
        .collect()
}

fn lobby() -> Value {
    json!({
        "code": "QRST",
        "hostId": "p1",
        "players": [
            {"id": "p1", "username": "alice", "isHost": true},
            {"id": "p2", "username": "bob", "isHost": false},
            {"id": "p3", "username": "carol", "isHost": false}
        ]
    })
}

// ════════════════════════════════════════════════════════════════════
// Inbound frames
// ════════════════════════════════════════════════════════════════════

#[test]
fn every_lobby_push_carries_a_full_snapshot() {
    for name in [
        "lobby:player-joined",
        "lobby:player-left",
        "lobby:host-changed",
        "lobby:player-disconnected",
        "lobby:player-reconnected",
    ] {
        let event = push(&json!({"event": name, "data": {"lobby": lobby()}}).to_string());
        assert_eq!(event.name(), name);
        let lobby = match event {
            ServerEvent::PlayerJoined(p)
            | ServerEvent::PlayerLeft(p)
            | ServerEvent::HostChanged(p)
            | ServerEvent::PlayerDisconnected(p)
            | ServerEvent::PlayerReconnected(p) => p.lobby,
            other => panic!("{name} decoded as {other:?}"),
        };
        assert_eq!(lobby.code, "QRST");
        assert_eq!(lobby.players.len(), 3);
        assert!(lobby.player("p1").unwrap().is_host);
    }
}

#[test]
fn game_started_may_carry_the_lobby() {
    let bare = push(r#"{"event":"game:started","data":{"gameId":"poker"}}"#);
    let ServerEvent::GameStarted(payload) = bare else {
        panic!("expected game:started");
    };
    assert_eq!(payload.game_id, "poker");
    assert!(payload.lobby.is_none());

    let with_lobby = push(
        &json!({"event": "game:started", "data": {"gameId": "poker", "lobby": lobby()}})
            .to_string(),
    );
    let ServerEvent::GameStarted(payload) = with_lobby else {
        panic!("expected game:started");
    };
    assert_eq!(payload.lobby.unwrap().host_id, "p1");
}

#[test]
fn show_drawing_tolerates_missing_image() {
    let event = push(
        r#"{"event":"game:show-drawing","data":{
            "drawingPlayerId":"p2","drawingPlayerUsername":"bob","index":1,"total":3}}"#,
    );
    let ServerEvent::ShowDrawing(shown) = event else {
        panic!("expected game:show-drawing");
    };
    assert_eq!(shown.drawing_player_username, "bob");
    assert!(shown.drawing.is_none());
    assert_eq!((shown.index, shown.total), (1, 3));
}

#[test]
fn acknowledgments_are_recognized_by_id() {
    let frame = IncomingFrame::parse(r#"{"ack":12,"data":{"error":"Lobby is full"}}"#).unwrap();
    let IncomingFrame::Ack { id, data } = frame else {
        panic!("expected an ack");
    };
    assert_eq!(id, 12);
    assert_eq!(ack_error(&data).as_deref(), Some("Lobby is full"));
}

#[test]
fn malformed_frames_are_serialization_errors() {
    for text in [
        "",
        "[]",
        r#"{"data":{}}"#,
        r#"{"event":"game:teleport","data":{}}"#,
        r#"{"event":"game:phase","data":{"timeLimit":1000}}"#,
        r#"{"event":"game:player-solved","data":{"playerId":"p1"}}"#,
    ] {
        let err = IncomingFrame::parse(text).unwrap_err();
        assert!(
            matches!(err, PartyError::Serialization(_)),
            "{text:?} gave {err:?}"
        );
    }
}

// ════════════════════════════════════════════════════════════════════
// Acknowledgment bodies
// ════════════════════════════════════════════════════════════════════

#[test]
fn lobby_joined_body() {
    let joined: LobbyJoined = serde_json::from_value(json!({
        "player": {"id": "p2", "username": "bob", "isHost": false},
        "lobby": lobby()
    }))
    .unwrap();
    assert_eq!(joined.player.username, "bob");
    assert_eq!(joined.lobby.players[2].id, "p3");
}

#[test]
fn games_list_body() {
    let list: GamesListResponse = serde_json::from_value(json!({"games": [
        {"id": "poker", "name": "Poker", "description": "Texas hold'em", "minPlayers": 3},
        {"id": "drawing", "name": "Drawing", "description": "Draw the word", "minPlayers": 3}
    ]}))
    .unwrap();
    assert_eq!(list.games.len(), 2);
    assert!(!list.games[0].can_start(2));
    assert!(list.games[1].can_start(3));
}

#[test]
fn reconnect_body_with_poker_state() {
    let response: ReconnectResponse = serde_json::from_value(json!({
        "success": true,
        "player": {"id": "p1", "username": "alice"},
        "lobby": lobby(),
        "gameState": {
            "gameId": "poker",
            "phase": "flop",
            "holeCards": [{"suit": "hearts", "rank": "A"}, {"suit": "spades", "rank": 10}],
            "communityCards": [
                {"suit": "clubs", "rank": 2},
                {"suit": "clubs", "rank": 3},
                {"suit": "diamonds", "rank": "K"}
            ]
        }
    }))
    .unwrap();
    assert!(response.success);
    let state = response.game_state.unwrap();
    assert_eq!(state.hole_cards.unwrap()[1].rank, json!(10));
    assert_eq!(state.community_cards.unwrap().len(), 3);
}

// ════════════════════════════════════════════════════════════════════
// Outbound frames
// ════════════════════════════════════════════════════════════════════

#[test]
fn action_frames_match_server_expectations() {
    let cases = [
        (
            ClientAction::LobbyCreate {
                username: "alice".into(),
            },
            json!({"event": "lobby:create", "data": {"username": "alice"}, "ack": 0}),
        ),
        (
            ClientAction::LobbyJoin {
                username: "bob".into(),
                lobby_code: "QRST".into(),
            },
            json!({"event": "lobby:join", "data": {"username": "bob", "lobbyCode": "QRST"}, "ack": 0}),
        ),
        (
            ClientAction::PlayerReconnect {
                player_id: "p1".into(),
                lobby_code: "QRST".into(),
            },
            json!({"event": "player:reconnect", "data": {"playerId": "p1", "lobbyCode": "QRST"}, "ack": 0}),
        ),
        (
            ClientAction::GameStart {
                game_id: "poker".into(),
            },
            json!({"event": "game:start", "data": {"gameId": "poker"}, "ack": 0}),
        ),
        (
            ClientAction::GameAction {
                action: "vote".into(),
                data: json!({"score": 4}),
            },
            json!({"event": "game:action", "data": {"action": "vote", "data": {"score": 4}}, "ack": 0}),
        ),
    ];
    for (action, expected) in cases {
        let frame: Value = serde_json::from_str(&action.encode(0).unwrap()).unwrap();
        assert_eq!(frame, expected, "{}", action.name());
    }
}

#[test]
fn dataless_actions_keep_their_name_and_ack() {
    for action in [
        ClientAction::LobbyLeave,
        ClientAction::GamesList,
        ClientAction::GameEnd,
    ] {
        let frame: Value = serde_json::from_str(&action.encode(41).unwrap()).unwrap();
        assert_eq!(frame["event"], action.name());
        assert_eq!(frame["ack"], 41);
    }
}

// ════════════════════════════════════════════════════════════════════
// Whole rounds through the reducer
// ════════════════════════════════════════════════════════════════════

#[test]
fn poker_round_accumulates_cards() {
    let mut game = GameMachine::default();
    let changes = feed(
        &mut game,
        &[
            json!({"event": "game:started", "data": {"gameId": "poker"}}),
            json!({"event": "game:phase", "data": {"phase": "preflop"}}),
            json!({"event": "game:hole-cards", "data": {"cards": [
                {"suit": "hearts", "rank": "A"}, {"suit": "hearts", "rank": "K"}
            ]}}),
            json!({"event": "game:hole-cards-complete", "data": {}}),
            json!({"event": "game:phase", "data": {"phase": "flop"}}),
            json!({"event": "game:community-card", "data": {
                "communityCards": [{"suit": "hearts", "rank": "Q"}],
                "card": {"suit": "hearts", "rank": "Q"},
                "position": 0
            }}),
            json!({"event": "game:community-card", "data": {
                "communityCards": [{"suit": "hearts", "rank": "Q"}, {"suit": "hearts", "rank": "J"}],
                "card": {"suit": "hearts", "rank": "J"},
                "position": 1
            }}),
        ],
    );
    assert_eq!(
        changes,
        vec![
            Some(GameChange::Started),
            Some(GameChange::PhaseChanged),
            Some(GameChange::DataUpdated),
            Some(GameChange::DataUpdated),
            Some(GameChange::PhaseChanged),
            Some(GameChange::DataUpdated),
            Some(GameChange::DataUpdated),
        ]
    );

    let session = game.session().unwrap();
    assert!(session.in_phase("flop"));
    assert_eq!(session.data.hole_cards.as_ref().unwrap().len(), 2);
    assert_eq!(session.data.hole_cards_dealt, Some(true));
    assert_eq!(session.data.community_cards.as_ref().unwrap().len(), 2);
    assert_eq!(session.data.last_card.as_ref().unwrap().rank, json!("J"));
    assert_eq!(session.data.last_card_position, Some(1));
}

#[test]
fn queens_solves_without_username_are_appended_in_order() {
    let mut game = GameMachine::default();
    let solved = r#"{"event":"game:player-solved","data":{"playerId":"p2","solveTime":4200}}"#;
    let changes: Vec<_> = [
        r#"{"event":"game:started","data":{"gameId":"queens"}}"#,
        r#"{"event":"game:phase","data":{"phase":"playing","grid":[[0,0,1],[0,1,1],[2,2,2]]}}"#,
        solved,
        solved,
    ]
    .iter()
    .map(|text| game.apply(&push(text)))
    .collect();
    assert_eq!(
        changes,
        vec![
            Some(GameChange::Started),
            Some(GameChange::PhaseChanged),
            Some(GameChange::DataUpdated),
            Some(GameChange::DataUpdated),
        ]
    );

    let data = &game.session().unwrap().data;
    let list = data.solved_players.as_ref().unwrap();
    assert_eq!(list.len(), 2);
    for entry in list {
        assert_eq!(entry.player_id, "p2");
        assert_eq!(entry.solve_time, 4200);
        assert!(entry.username.is_empty());
    }
    assert_eq!(data.grid.as_ref().unwrap()[2], vec![2, 2, 2]);
}

#[test]
fn game_ended_resets_even_without_a_lobby() {
    for ended in [
        r#"{"event":"game:ended","data":{}}"#,
        r#"{"event":"game:ended"}"#,
    ] {
        let mut game = GameMachine::default();
        game.apply(&push(r#"{"event":"game:started","data":{"gameId":"queens"}}"#));
        assert_eq!(game.apply(&push(ended)), Some(GameChange::Ended));
        assert!(game.session().is_none());
    }
}

#[test]
fn drawing_round_collects_submissions_and_posts_results_once() {
    let mut game = GameMachine::new(ListMerge::DedupByPlayer);
    feed(
        &mut game,
        &[
            json!({"event": "game:started", "data": {"gameId": "drawing"}}),
            json!({"event": "game:phase", "data": {"phase": "drawing", "word": "lighthouse", "timeLimit": 60000}}),
            json!({"event": "game:drawing-submitted", "data": {"playerId": "p2", "username": "bob"}}),
            json!({"event": "game:drawing-submitted", "data": {"playerId": "p3", "username": "carol"}}),
            // A repeated announcement replaces the earlier entry.
            json!({"event": "game:drawing-submitted", "data": {"playerId": "p2", "username": "bob", "late": true}}),
            json!({"event": "game:phase", "data": {"phase": "voting", "timeLimit": 10000}}),
            json!({"event": "game:show-drawing", "data": {
                "drawingPlayerId": "p3", "drawingPlayerUsername": "carol",
                "drawing": "data:image/png;base64,AAAA", "index": 0, "total": 2
            }}),
        ],
    );

    let session = game.session().unwrap();
    assert!(session.in_phase("voting"));
    assert_eq!(session.data.word.as_deref(), Some("lighthouse"));
    assert_eq!(session.data.time_limit, Some(10_000));
    let submissions = session.data.drawing_submissions.as_ref().unwrap();
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].extra.get("late"), Some(&json!(true)));
    assert_eq!(
        session.data.current_drawing.as_ref().unwrap().drawing_player_id,
        "p3"
    );

    let results = json!({"event": "game:results", "data": {
        "losers": [{"playerId": "p2", "username": "bob", "score": 3}],
        "players": [
            {"playerId": "p3", "username": "carol", "score": 9},
            {"playerId": "p2", "username": "bob", "score": 3}
        ],
        "word": "lighthouse"
    }});
    let changes = feed(&mut game, &[results.clone(), results]);
    assert_eq!(changes, vec![Some(GameChange::Results), None]);
    let posted = game.session().unwrap().results.as_ref().unwrap();
    assert_eq!(posted.word.as_deref(), Some("lighthouse"));
    assert_eq!(posted.players[0].extra.get("score"), Some(&json!(9)));
}

#[test]
fn game_pushes_without_a_game_are_ignored() {
    let mut game = GameMachine::default();
    let changes = feed(
        &mut game,
        &[
            json!({"event": "game:phase", "data": {"phase": "playing"}}),
            json!({"event": "game:player-solved", "data": {"playerId": "p1", "username": "alice", "solveTime": 1}}),
            json!({"event": "game:results", "data": {"losers": [], "players": []}}),
        ],
    );
    assert_eq!(changes, vec![None, None, None]);
    assert!(game.session().is_none());
}
