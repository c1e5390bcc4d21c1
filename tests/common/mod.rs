// Rust-upgrade (https://github.com/rust-lang/rust/issues/46379):
//   remove `#[allow(dead_code)]` before public functions.

use std::sync::mpsc;

use goban_review::client::{ClientOptions, ClientState, ConnectionMode};
use goban_review::color::Color;
use goban_review::coord::{BoardSize, Coord};
use goban_review::event::{ClientEvent, Handshake, ServerEvent};
use goban_review::grid::{Grid, GridItem};
use goban_review::review::ReviewState;
use goban_review::sgf;
use goban_review::tree::{MoveTree, NodeId, NodeKind};


// Grid obtained by replaying root..`id` from an empty board, independently of `Board`.
#[allow(dead_code)]
pub fn replay_grid(tree: &MoveTree, size: BoardSize, id: NodeId) -> Grid {
    let mut grid = Grid::new(size);
    for step in tree.path_to(id) {
        let node = tree.node(step).unwrap();
        for (color, stones) in node.added_stones() {
            for pos in stones {
                grid.set(pos, Some(color));
            }
        }
        if let NodeKind::Move { coord, color } = node.kind() {
            grid.set(coord, Some(color));
        }
        for pos in node.captured.values().flatten() {
            grid.set(*pos, None);
        }
    }
    grid
}

#[allow(dead_code)]
pub fn review_from_tree(tree: &MoveTree) -> ReviewState {
    review_from_sgf(&sgf::write(tree))
}

#[allow(dead_code)]
pub fn review_from_sgf(text: &str) -> ReviewState {
    let mut review = ReviewState::default();
    review.handshake(&Handshake { sgf: text.to_owned(), ..Default::default() }).unwrap();
    review
}

#[allow(dead_code)]
pub fn stone_at(review: &ReviewState, x: u8, y: u8) -> Option<Color> {
    match review.board().get(Coord::new(x, y)) {
        GridItem::Stone(color) => Some(color),
        _ => None,
    }
}

#[allow(dead_code)]
pub struct TestClient {
    pub state: ClientState,
    pub outgoing: mpsc::Receiver<ClientEvent>,
}

#[allow(dead_code)]
impl TestClient {
    pub fn shared() -> Self {
        let (tx, rx) = mpsc::channel();
        let mut state = ClientState::new(ConnectionMode::Shared, ClientOptions::default(), tx);
        state.connection_established();
        TestClient { state, outgoing: rx }
    }

    pub fn local() -> Self {
        let (tx, rx) = mpsc::channel();
        let state = ClientState::new(ConnectionMode::Local, ClientOptions::default(), tx);
        TestClient { state, outgoing: rx }
    }

    // Raw JSON as it would arrive from the server.
    pub fn receive(&mut self, json: &str) {
        self.state.process_server_message(json).unwrap();
    }

    pub fn receive_event(&mut self, event: ServerEvent) {
        self.state.process_server_event(event).unwrap();
    }

    pub fn sent(&self) -> Vec<ClientEvent> { self.outgoing.try_iter().collect() }

    // Delivers everything this client sent back to it, the way the server echoes to the room.
    pub fn echo(&mut self) -> Vec<ClientEvent> {
        let sent = self.sent();
        for event in &sent {
            let inbound = ServerEvent::decode(&event.to_wire()).unwrap();
            self.receive_event(inbound);
        }
        sent
    }

    pub fn review(&self) -> &ReviewState { self.state.review() }
}
