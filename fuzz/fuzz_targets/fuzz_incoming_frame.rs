#![no_main]

use drinkingames_client::game::GameMachine;
use drinkingames_client::lobby::LobbyMachine;
use drinkingames_client::protocol::IncomingFrame;
use drinkingames_client::reconnect::evaluate;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    match IncomingFrame::parse(text) {
        // Any decodable push must reduce without panicking.
        Ok(IncomingFrame::Push(event)) => {
            let mut lobby = LobbyMachine::default();
            let mut game = GameMachine::default();
            lobby.apply(&event);
            game.apply(&event);
            game.apply(&event);
        }
        Ok(IncomingFrame::Ack { data, .. }) => {
            let _ = evaluate(data);
        }
        Err(_) => {}
    }
});
