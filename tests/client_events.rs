mod common;

use std::time::Duration;

use common::*;
use goban_review::client::{Key, Modal, Modifiers, NotableEvent, WRONG_PASSWORD_MESSAGE};
use goban_review::color::Color;
use goban_review::coord::{BoardSize, Coord};
use goban_review::error::{EventError, ProtocolError};
use goban_review::event::{ClientEvent, NavKey, RawCoord, ReviewSettings};
use goban_review::minimap::CELL_STEP;
use goban_review::review::Tool;
use goban_review::tree::NodeId;
use instant::Instant;
use pretty_assertions::assert_eq;


fn shift() -> Modifiers { Modifiers { shift: true, ..Modifiers::default() } }

#[test]
fn handshake_restores_the_room() {
    let mut client = TestClient::shared();
    client.receive(
        r#"{"event": "handshake", "value": {
            "sgf": "(;SZ[9]HA[2]AB[cc][gg];W[ee];B[dd])",
            "loc": "0",
            "prefs": {"0": 0, "1": 0},
            "buffer": 250,
            "next_index": 7
        }}"#,
    );
    let review = client.review();
    assert_eq!(review.size(), BoardSize::new(9).unwrap());
    assert_eq!(review.move_number(), 1);
    assert_eq!(review.current_move(), Some(Coord::new(4, 4)));
    assert_eq!(stone_at(review, 2, 2), Some(Color::Black));
    assert_eq!(stone_at(review, 4, 4), Some(Color::White));
    assert_eq!(stone_at(review, 3, 3), None);
    assert_eq!(review.color(), Color::Black);
    assert_eq!(review.buffer(), 250);
    assert_eq!(review.tree().next_index(), 7);
}

#[test]
fn handshake_follows_branch_preferences() {
    let mut client = TestClient::shared();
    client.receive(
        r#"{"event": "handshake", "value": {
            "sgf": "(;SZ[9](;B[aa];W[bb])(;B[cc];W[dd]))",
            "loc": "1,0",
            "prefs": {"0": 1}
        }}"#,
    );
    let review = client.review();
    assert_eq!(review.move_number(), 2);
    assert_eq!(stone_at(review, 2, 2), Some(Color::Black));
    assert_eq!(stone_at(review, 3, 3), Some(Color::White));
    assert_eq!(stone_at(review, 0, 0), None);
    // White moved last.
    assert_eq!(review.color(), Color::Black);
}

#[test]
fn handshake_starting_at_the_root() {
    let mut client = TestClient::shared();
    client.receive(r#"{"event": "handshake", "value": {"sgf": "(;SZ[13]HA[3]PB[Honinbo]BR[9d])"}}"#);
    let review = client.review();
    assert_eq!(review.size(), BoardSize::new(13).unwrap());
    assert_eq!(review.board().current(), NodeId::ROOT);
    assert_eq!(review.color(), Color::White);
    assert_eq!(review.game_info().black, "Honinbo [9d]");
}

#[test]
fn bad_record_is_reported() {
    let mut client = TestClient::shared();
    let result = client.state.process_server_message(r#"{"event": "handshake", "value": {"sgf": "(;SZ[x])"}}"#);
    assert!(matches!(result, Err(EventError::Protocol(ProtocolError::Sgf(_)))));
    assert!(client.state.modals().contains(&Modal::Error));
}

#[test]
fn malformed_messages_are_reported() {
    let mut client = TestClient::shared();
    assert!(matches!(
        client.state.process_server_message("{not json"),
        Err(EventError::Protocol(ProtocolError::MalformedJson(_)))
    ));
    assert_eq!(
        client.state.process_server_message(r#"{"event": "teleport"}"#),
        Err(EventError::Protocol(ProtocolError::UnknownEvent("teleport".to_owned())))
    );
    assert!(client.state.modals().contains(&Modal::Error));
}

#[test]
fn server_error_opens_error_modal() {
    let mut client = TestClient::shared();
    let result = client.state.process_server_message(r#"{"event": "error", "value": "room closed"}"#);
    assert_eq!(result, Err(EventError::ServerReturnedError("room closed".to_owned())));
    assert!(client.state.modals().contains(&Modal::Error));
}

#[test]
fn outbound_wire_format() {
    let mut client = TestClient::shared();
    client.state.click(RawCoord(3, 3), Modifiers::default());
    client.state.pass();
    client.state.rewind();
    let wire: Vec<_> = client.sent().iter().map(|e| e.to_wire().to_json()).collect();
    assert_eq!(wire, vec![
        r#"{"event":"add_stone","value":[3,3],"color":1}"#.to_owned(),
        r#"{"event":"pass","color":1}"#.to_owned(),
        r#"{"event":"button","value":"Rewind"}"#.to_owned(),
    ]);
}

#[test]
fn clicks_off_the_board_are_ignored() {
    let mut client = TestClient::shared();
    client.state.click(RawCoord(-1, 3), Modifiers::default());
    client.state.click(RawCoord(19, 0), Modifiers::default());
    assert!(client.sent().is_empty());
}

#[test]
fn fixed_color_mode() {
    let mut client = TestClient::shared();
    client.state.key_down(Key::Digit(3), Modifiers::default());
    client.state.click(RawCoord(3, 3), Modifiers::default());
    client.state.click(RawCoord(4, 4), shift());
    assert_eq!(client.echo(), vec![
        ClientEvent::AddStone { coord: Coord::new(3, 3), color: Color::White },
        ClientEvent::AddStone { coord: Coord::new(4, 4), color: Color::Black },
    ]);
    // Clicking a stone removes it.
    client.state.click(RawCoord(3, 3), Modifiers::default());
    assert_eq!(client.echo(), vec![ClientEvent::RemoveStone(Coord::new(3, 3))]);
    assert_eq!(stone_at(client.review(), 3, 3), None);
    assert_eq!(client.review().color(), Color::White);
}

#[test]
fn shift_click_jumps_to_the_move() {
    let mut client = TestClient::shared();
    for (x, y) in [(2, 2), (3, 3), (4, 4)] {
        client.state.click(RawCoord(x, y), Modifiers::default());
        client.echo();
    }
    client.state.click(RawCoord(2, 2), shift());
    assert_eq!(client.echo(), vec![ClientEvent::GotoCoord(Coord::new(2, 2))]);
    assert_eq!(client.review().move_number(), 1);
    assert_eq!(client.review().color(), Color::White);
}

#[test]
fn modal_gate_uses_the_allow_list() {
    let mut client = TestClient::shared();
    client.state.open_modal(Modal::Settings);
    client.state.click(RawCoord(3, 3), Modifiers::default());
    client.state.left();
    client.state.comment("hidden".to_owned());
    client.state.trash();
    client.state.update_settings(ReviewSettings { buffer: 0, size: 13, password: String::new() });
    client.state.scissors();
    client.state.request_sgf("https://example.com/game.sgf".to_owned());
    let names: Vec<_> = client.sent().iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["trash", "update_settings", "scissors", "request_sgf"]);

    client.state.close_modal(Modal::Settings);
    client.state.click(RawCoord(3, 3), Modifiers::default());
    assert_eq!(client.sent().len(), 1);
}

#[test]
fn settings_resize_the_board() {
    let mut client = TestClient::shared();
    client.state.click(RawCoord(3, 3), Modifiers::default());
    client.echo();
    client.state.update_settings(ReviewSettings { buffer: 100, size: 13, password: "pw".to_owned() });
    client.echo();
    let review = client.review();
    assert_eq!(review.size(), BoardSize::new(13).unwrap());
    assert_eq!(review.board().grid().num_stones(), 0);
    assert_eq!(review.buffer(), 100);
    assert_eq!(review.password(), "pw");
}

#[test]
fn cut_from_the_scissors_button() {
    let mut client = TestClient::shared();
    for (x, y) in [(2, 2), (3, 3), (4, 4)] {
        client.state.click(RawCoord(x, y), Modifiers::default());
        client.echo();
    }
    client.state.left();
    client.echo();
    let a = client.review().tree().preferred_line()[1];
    client.state.scissors();
    client.echo();
    assert_eq!(client.review().board().current(), a);
    assert_eq!(client.review().tree().len(), 2);
    assert_eq!(client.review().move_number(), 1);
}

#[test]
fn trash_clears_everything() {
    let mut client = TestClient::shared();
    client.state.click(RawCoord(3, 3), Modifiers::default());
    client.state.key_down(Key::Digit(5), Modifiers::default());
    client.state.click(RawCoord(5, 5), Modifiers::default());
    client.echo();
    client.state.trash();
    client.echo();
    let review = client.review();
    assert_eq!(review.tree().len(), 1);
    assert!(review.marks().is_empty());
    assert_eq!(review.tool(), Tool::Stone);
    assert_eq!(review.board().grid().num_stones(), 0);
}

#[test]
fn arrows_jump_between_explorer_rows() {
    let mut client = TestClient::local();
    client.state.click(RawCoord(0, 0), Modifiers::default());
    client.state.key_down(Key::Arrow(NavKey::ArrowLeft), Modifiers::default());
    client.state.click(RawCoord(1, 1), Modifiers::default());
    let root = client.review().tree().root();
    let (first, second) = (root.down()[0], root.down()[1]);
    assert_eq!(client.review().board().current(), second);

    client.state.key_down(Key::Arrow(NavKey::ArrowUp), Modifiers::default());
    assert_eq!(client.review().board().current(), first);
    client.state.key_down(Key::Arrow(NavKey::ArrowDown), Modifiers::default());
    assert_eq!(client.review().board().current(), second);

    // With shift the arrows switch the preferred branch instead.
    client.state.key_down(Key::Arrow(NavKey::ArrowLeft), Modifiers::default());
    assert_eq!(client.review().tree().root().preferred(), Some(second));
    client.state.key_down(Key::Arrow(NavKey::ArrowUp), shift());
    assert_eq!(client.review().board().current(), NodeId::ROOT);
    assert_eq!(client.review().tree().root().preferred(), Some(first));
}

#[test]
fn explorer_click_selects_node() {
    let mut client = TestClient::shared();
    for (x, y) in [(2, 2), (3, 3)] {
        client.state.click(RawCoord(x, y), Modifiers::default());
        client.echo();
    }
    let first = client.review().tree().preferred_line()[1];
    client.state.explorer_click(CELL_STEP * 1.5, CELL_STEP * 0.5);
    assert_eq!(client.echo(), vec![ClientEvent::GotoGrid(first)]);
    assert_eq!(client.review().board().current(), first);
    client.state.explorer_click(CELL_STEP * 5.5, CELL_STEP * 3.5);
    assert!(client.sent().is_empty());
}

#[test]
fn password_flow() {
    let mut client = TestClient::shared();
    assert_eq!(
        client.state.process_server_message(r#"{"event": "isprotected", "value": true}"#),
        Ok(NotableEvent::PasswordRequired)
    );
    assert!(client.state.is_protected());
    assert!(client.state.modals().contains(&Modal::Password));

    client.state.check_password("guess".to_owned());
    assert_eq!(client.sent(), vec![ClientEvent::CheckPassword("guess".to_owned())]);
    assert_eq!(
        client.state.process_server_message(r#"{"event": "checkpassword", "value": ""}"#),
        Ok(NotableEvent::Toast(WRONG_PASSWORD_MESSAGE.to_owned()))
    );
    assert!(client.state.modals().is_empty());

    client.receive(r#"{"event": "checkpassword", "value": "secret"}"#);
    assert_eq!(client.review().password(), "secret");
}

#[test]
fn users_come_and_go() {
    let mut client = TestClient::shared();
    client.receive(r#"{"event": "connected_users", "value": {"u1": "alice", "abcd1234": ""}}"#);
    assert_eq!(client.state.user_names(), vec!["Guest-abcd".to_owned(), "alice".to_owned()]);
    assert_eq!(
        client.state.process_server_message(r#"{"event": "disconnection", "userid": "u1"}"#),
        Ok(NotableEvent::UsersChanged)
    );
    client.receive(r#"{"event": "connection", "userid": "zz99"}"#);
    assert_eq!(client.state.user_names(), vec!["Guest-abcd".to_owned(), "Guest-zz99".to_owned()]);
    assert_eq!(
        client.state.process_server_message(r#"{"event": "global", "value": "Server restarting"}"#),
        Ok(NotableEvent::Toast("Server restarting".to_owned()))
    );
}

#[test]
fn keepalive_ignores_modals() {
    let mut client = TestClient::shared();
    let now = Instant::now();
    client.state.refresh(now);
    assert!(client.sent().is_empty());
    client.state.open_modal(Modal::Upload);
    client.state.refresh(now + Duration::from_secs(31));
    assert_eq!(client.sent(), vec![ClientEvent::Ping]);
}

#[test]
fn lost_connection_drops_local_state() {
    let mut client = TestClient::shared();
    client.state.click(RawCoord(3, 3), Modifiers::default());
    client.echo();
    let now = Instant::now();
    client.state.connection_lost(now);
    assert!(!client.state.is_connected());
    assert_eq!(client.review().tree().len(), 1);
    assert!(client.state.modals().contains(&Modal::Info));

    client.state.click(RawCoord(4, 4), Modifiers::default());
    assert!(client.sent().is_empty());
    assert!(!client.state.should_reconnect(now));
    assert!(client.state.should_reconnect(now + Duration::from_secs(2)));
    assert!(!client.state.should_reconnect(now + Duration::from_secs(3)));

    client.state.connection_established();
    assert!(client.state.modals().is_empty());
    client.state.click(RawCoord(4, 4), Modifiers::default());
    assert_eq!(client.sent().len(), 1);
}

#[test]
fn local_mode_needs_no_server() {
    let mut client = TestClient::local();
    assert!(client.state.is_connected());
    client.state.click(RawCoord(3, 3), Modifiers::default());
    client.state.click(RawCoord(4, 4), Modifiers::default());
    assert_eq!(stone_at(client.review(), 4, 4), Some(Color::White));
    client.state.rewind();
    assert_eq!(client.review().board().grid().num_stones(), 0);
    client.state.fastforward();
    assert_eq!(client.review().move_number(), 2);

    client.state.upload_sgf("(;SZ[9];B[aa];W[bb])");
    assert_eq!(client.review().size(), BoardSize::new(9).unwrap());
    assert_eq!(client.review().board().current(), NodeId::ROOT);
    client.state.fastforward();
    assert_eq!(stone_at(client.review(), 1, 1), Some(Color::White));

    client.state.request_sgf("https://example.com/game.sgf".to_owned());
    client.state.link_ogs_game("https://online-go.com/game/1".to_owned());
    assert!(client.sent().is_empty());
    assert_eq!(
        client.state.process_server_message(r#"{"event": "button", "value": "Rewind"}"#),
        Ok(NotableEvent::BoardUpdated)
    );
    assert_eq!(client.review().board().grid().num_stones(), 0);
}
