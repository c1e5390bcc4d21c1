// Review session state: the board with its move tree, annotations, the color of the next stone
// and everything the renderer shows next to the board.
//
// There is one `ReviewState` per session. It is reset, not recreated, when the room is cleared
// or the connection is lost. Every mutation is synchronous and leaves the state consistent; the
// renderer learns about changes by draining `ViewUpdate`s.

use log::{debug, warn};

use crate::board::Board;
use crate::color::Color;
use crate::coord::{BoardSize, Coord};
use crate::error::{CutError, PlaceError, ProtocolError};
use crate::event::{Handshake, ReviewSettings};
use crate::frame::{Frame, FrameType, Marks};
use crate::game_info::GameInfo;
use crate::grid::{GridDiff, GridItem};
use crate::marks::{Mark, MarkChange, MarkKind, MarkRegistry};
use crate::minimap::Minimap;
use crate::pen::{PEN_KEY, PenCanvas, PenStroke};
use crate::sgf::{self, COMMENT_KEY, HANDICAP_KEY};
use crate::tree::{Fields, MoveTree, NodeId};
use crate::turn::TurnColor;


// What a click on the board does.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Tool {
    Stone,
    Mark(MarkKind),
    Pen,
}

// Change notifications for the renderer. Variants without payload mean "re-read this part of
// the state".
#[derive(Clone, PartialEq, Debug)]
pub enum ViewUpdate {
    // The board was recreated: redraw everything.
    Reset { size: BoardSize },
    Stones(GridDiff),
    CurrentMove(Option<Coord>),
    MoveNumber(u32),
    TurnColor(Color),
    Tool(Tool),
    Marks,
    Pen(PenStroke),
    PenErased,
    Comments(Vec<String>),
    GameInfo,
    Explorer,
}

pub struct ReviewState {
    board: Board,
    marks: MarkRegistry,
    turn: TurnColor,
    tool: Tool,
    pen: PenCanvas,
    strokes: Vec<PenStroke>,
    game_info: GameInfo,
    minimap: Minimap,
    comments: Vec<String>,
    current_move: Option<Coord>,
    move_number: u32,
    buffer: i64,
    password: String,
    updates: Vec<ViewUpdate>,
}

impl ReviewState {
    pub fn new(size: BoardSize) -> Self {
        let board = Board::new(size);
        let minimap = Minimap::layout(board.tree());
        ReviewState {
            board,
            marks: MarkRegistry::new(),
            turn: TurnColor::default(),
            tool: Tool::Stone,
            pen: PenCanvas::default(),
            strokes: Vec::new(),
            game_info: GameInfo::default(),
            minimap,
            comments: Vec::new(),
            current_move: None,
            move_number: 0,
            buffer: 0,
            password: String::new(),
            updates: Vec::new(),
        }
    }

    pub fn board(&self) -> &Board { &self.board }
    pub fn tree(&self) -> &MoveTree { self.board.tree() }
    pub fn size(&self) -> BoardSize { self.board.size() }
    pub fn marks(&self) -> &MarkRegistry { &self.marks }
    pub fn turn(&self) -> &TurnColor { &self.turn }
    pub fn color(&self) -> Color { self.turn.color() }
    pub fn tool(&self) -> Tool { self.tool }
    pub fn pen(&self) -> &PenCanvas { &self.pen }
    pub fn pen_mut(&mut self) -> &mut PenCanvas { &mut self.pen }
    pub fn strokes(&self) -> &[PenStroke] { &self.strokes }
    pub fn game_info(&self) -> &GameInfo { &self.game_info }
    pub fn minimap(&self) -> &Minimap { &self.minimap }
    pub fn comments(&self) -> &[String] { &self.comments }
    pub fn current_move(&self) -> Option<Coord> { self.current_move }
    pub fn move_number(&self) -> u32 { self.move_number }
    pub fn buffer(&self) -> i64 { self.buffer }
    pub fn set_buffer(&mut self, buffer: i64) { self.buffer = buffer; }
    pub fn password(&self) -> &str { &self.password }
    pub fn set_password(&mut self, password: String) { self.password = password; }

    pub fn take_view_updates(&mut self) -> Vec<ViewUpdate> { std::mem::take(&mut self.updates) }

    // Serialized tree, for diagnostics.
    pub fn to_sgf(&self) -> String { sgf::write(self.board.tree()) }

    // Back to an empty board of the same size. Tool and color mode go back to defaults.
    pub fn reset(&mut self) {
        let size = self.size();
        self.clear_all(size);
        self.publish_all();
    }

    pub fn resize(&mut self, size: BoardSize) {
        self.clear_all(size);
        self.publish_all();
    }

    // Joins a room: loads the record, restores branch preferences and walks to the position
    // everyone else is looking at. The view is refreshed once at the end.
    pub fn handshake(&mut self, handshake: &Handshake) -> Result<(), ProtocolError> {
        let record = sgf::parse(&handshake.sgf_text()?)?;
        let mut board = Board::load(record.size, record.tree);
        board.set_prefs(&handshake.prefs());
        board.set_next_index(handshake.next_index);
        // Following preferred children is enough: the server keeps `loc` on the preferred line.
        for _ in handshake.location() {
            if board.step_right().is_none() {
                warn!("Handshake location {:?} is deeper than the tree", handshake.loc);
                break;
            }
        }
        self.clear_all(record.size);
        self.board = board;
        self.buffer = handshake.buffer;
        self.game_info = GameInfo::from_fields(&self.tree().root().fields);
        self.turn.reset(self.initial_color());
        self.recompute_color();
        debug!(
            "Handshake: {} nodes, at {}, next index {}",
            self.tree().len(),
            self.board.current(),
            self.tree().next_index()
        );
        self.publish_all();
        Ok(())
    }

    pub fn update_settings(&mut self, settings: &ReviewSettings) {
        self.buffer = settings.buffer;
        self.password = settings.password.clone();
        if settings.size != self.size().get() {
            match BoardSize::new(settings.size) {
                Some(size) => self.resize(size),
                None => warn!("Ignoring invalid board size {}", settings.size),
            }
        }
    }

    pub fn place_stone(&mut self, pos: Coord, color: Color) -> Result<Vec<Coord>, PlaceError> {
        let mut result = Ok(Vec::new());
        let diff = self.board.replay(|board| result = board.place(pos, color));
        match &result {
            Ok(_) => {
                self.turn.after_placement();
                self.publish_position(diff);
            }
            Err(err) => debug!("Rejected stone: {err}"),
        }
        result
    }

    pub fn remove_stone(&mut self, pos: Coord) -> bool {
        let mut removed = None;
        let diff = self.board.replay(|board| removed = board.remove(pos));
        if removed.is_none() {
            debug!("No stone to remove at {pos:?}");
            return false;
        }
        self.publish_position(diff);
        true
    }

    pub fn pass(&mut self, color: Color) {
        self.board.push_pass(color);
        self.turn.after_placement();
        self.publish_position(GridDiff::default());
    }

    pub fn left(&mut self) -> Option<NodeId> {
        let mut left = None;
        let diff = self.board.replay(|board| left = board.step_left());
        left?;
        self.after_navigation(diff);
        left
    }

    pub fn right(&mut self) -> Option<NodeId> {
        let mut right = None;
        let diff = self.board.replay(|board| right = board.step_right());
        right?;
        self.after_navigation(diff);
        right
    }

    // Branch switching: only the preferred child of the current node changes.
    pub fn up(&mut self) {
        self.board.up();
        self.publish_explorer();
    }

    pub fn down(&mut self) {
        self.board.down();
        self.publish_explorer();
    }

    pub fn rewind(&mut self) {
        let diff = self.board.replay(Board::rewind);
        if self.turn.is_toggling() {
            self.turn.reset(self.initial_color());
        }
        self.after_navigation(diff);
    }

    pub fn fastforward(&mut self) {
        let diff = self.board.replay(Board::fastforward);
        self.after_navigation(diff);
    }

    // Replays root..`id` silently and refreshes the view once. Unknown nodes are ignored.
    pub fn goto_index(&mut self, id: NodeId) -> bool {
        if !self.tree().contains(id) {
            debug!("Cannot go to unknown node {id}");
            return false;
        }
        let diff = self.board.replay(|board| {
            board.goto(id);
        });
        self.after_navigation(diff);
        true
    }

    pub fn goto_coord(&mut self, pos: Coord) -> bool {
        match self.board.find_coord(pos) {
            Some(id) => self.goto_index(id),
            None => false,
        }
    }

    // Cuts the subtree at `id`. If the current node is inside it, first steps out to the
    // subtree's parent.
    pub fn cut(&mut self, id: NodeId) -> Result<NodeId, CutError> {
        if id == NodeId::ROOT {
            return Err(CutError::Root);
        }
        let parent = self.tree().node(id).and_then(|n| n.up()).ok_or(CutError::UnknownNode(id))?;
        if self.tree().is_ancestor_or_self(id, self.board.current()) {
            if self.board.current() == id {
                self.left();
            } else {
                self.goto_index(parent);
            }
        }
        let result = self.board.cut(id);
        match &result {
            Ok(_) => {
                self.recompute_color();
                self.publish_explorer();
                self.publish_move_number();
                self.updates.push(ViewUpdate::TurnColor(self.color()));
            }
            Err(err) => debug!("Refused cut: {err}"),
        }
        result
    }

    // Toggle semantics: marking a marked point clears it.
    pub fn draw_mark(&mut self, pos: Coord, kind: MarkKind) -> MarkChange {
        if !self.size().contains(pos) {
            return MarkChange::Unchanged;
        }
        let change = self.marks.draw_mark(pos, kind);
        match change {
            MarkChange::Added(mark) => self.store_mark(pos, None, Some(mark)),
            MarkChange::Removed(mark) => self.store_mark(pos, Some(mark), None),
            MarkChange::Unchanged => {}
        }
        change
    }

    pub fn place_triangle(&mut self, pos: Coord) -> bool { self.place_mark(pos, Mark::Triangle) }
    pub fn place_square(&mut self, pos: Coord) -> bool { self.place_mark(pos, Mark::Square) }
    pub fn place_letter(&mut self, pos: Coord, index: u8) -> bool { self.place_mark(pos, Mark::Letter(index)) }
    pub fn place_number(&mut self, pos: Coord, number: u32) -> bool { self.place_mark(pos, Mark::Number(number)) }

    pub fn place_label(&mut self, pos: Coord, text: &str) -> bool {
        match Mark::from_label(text) {
            Some(mark) => self.place_mark(pos, mark),
            None => {
                debug!("Ignoring label {text:?} at {pos:?}");
                false
            }
        }
    }

    pub fn remove_mark(&mut self, pos: Coord) -> Option<Mark> {
        let mark = self.marks.remove_mark(pos)?;
        self.store_mark(pos, Some(mark), None);
        Some(mark)
    }

    pub fn draw_pen(&mut self, stroke: PenStroke) {
        self.board.current_fields_mut().add(PEN_KEY, stroke.encode());
        self.strokes.push(stroke.clone());
        self.updates.push(ViewUpdate::Pen(stroke));
    }

    pub fn erase_pen(&mut self) {
        self.board.current_fields_mut().remove(PEN_KEY);
        self.strokes.clear();
        self.updates.push(ViewUpdate::PenErased);
    }

    pub fn add_comment(&mut self, text: &str) {
        self.board.current_fields_mut().add(COMMENT_KEY, text);
        self.comments = comment_lines(&self.board.current_node().fields);
        self.updates.push(ViewUpdate::Comments(self.comments.clone()));
    }

    // Applies an authoritative server frame. Stones are written without legality checks and the
    // move-number hook fires exactly once, however many stones the frame carries.
    pub fn apply_frame(&mut self, frame: &Frame) {
        self.marks.clear();
        self.current_move = None;
        if let Some(metadata) = &frame.metadata {
            if let Some(size) = metadata.size {
                match BoardSize::new(size) {
                    Some(size) => {
                        self.clear_all(size);
                        self.updates.push(ViewUpdate::Reset { size });
                        self.game_info = GameInfo::from_fields(&Fields::from(metadata.fields.clone()));
                        self.updates.push(ViewUpdate::GameInfo);
                    }
                    None => warn!("Ignoring frame metadata with board size {size}"),
                }
            }
        }
        if let Some(diff) = &frame.diff {
            let frame_type = frame.frame_type;
            let stones = self.board.replay(|board| {
                if frame_type == FrameType::Full {
                    board.clear_stones();
                }
                for set in &diff.add {
                    let Some(color) = set.color else {
                        debug!("Skipping colorless stones in frame");
                        continue;
                    };
                    for pos in &set.coords {
                        board.set(*pos, Some(color));
                    }
                }
                for set in &diff.remove {
                    for pos in &set.coords {
                        board.set(*pos, None);
                    }
                }
            });
            if !stones.is_empty() {
                self.updates.push(ViewUpdate::Stones(stones));
            }
        }
        if let Some(marks) = &frame.marks {
            self.apply_frame_marks(marks);
        }
        self.updates.push(ViewUpdate::Marks);
        self.updates.push(ViewUpdate::CurrentMove(self.current_move));

        if let Some(explorer) = &frame.explorer {
            self.minimap.apply_delta(explorer);
            if let Some(current) = explorer.current {
                self.move_number = current.x;
            }
            if explorer.current_color.is_some() {
                self.turn.recompute(explorer.current_color, None);
            }
            self.updates.push(ViewUpdate::Explorer);
        } else if let Some(GridItem::Stone(color)) = self.current_move.map(|pos| self.board.get(pos)) {
            self.turn.recompute(Some(color), None);
        }
        if let Some(comments) = &frame.comments {
            self.comments = comments.iter().flat_map(|c| c.trim().lines().map(str::to_owned)).collect();
            self.updates.push(ViewUpdate::Comments(self.comments.clone()));
        }
        self.updates.push(ViewUpdate::MoveNumber(self.move_number));
        self.updates.push(ViewUpdate::TurnColor(self.color()));
    }

    pub fn set_toggle(&mut self) {
        self.turn.set_toggling();
        self.recompute_color();
        self.set_tool(Tool::Stone);
        self.updates.push(ViewUpdate::TurnColor(self.color()));
    }

    pub fn set_black(&mut self) { self.set_fixed(Color::Black); }
    pub fn set_white(&mut self) { self.set_fixed(Color::White); }

    pub fn set_tool(&mut self, tool: Tool) {
        if tool != Tool::Pen {
            self.pen.pen_up();
        }
        self.tool = tool;
        self.updates.push(ViewUpdate::Tool(tool));
    }

    // Nearest explorer node in the same column above / below the current one.
    pub fn index_up(&self) -> Option<NodeId> { self.minimap.index_up() }
    pub fn index_down(&self) -> Option<NodeId> { self.minimap.index_down() }

    fn set_fixed(&mut self, color: Color) {
        self.turn.set_fixed(color);
        self.set_tool(Tool::Stone);
        self.updates.push(ViewUpdate::TurnColor(color));
    }

    fn initial_color(&self) -> Color {
        if self.tree().root().fields.has(HANDICAP_KEY) { Color::White } else { Color::Black }
    }

    fn recompute_color(&mut self) {
        let node = self.board.current_node();
        let first_child_color = node.down().first().and_then(|id| self.tree().node(*id)).and_then(|n| n.color());
        let node_color = node.color();
        self.turn.recompute(node_color, first_child_color);
    }

    fn clear_all(&mut self, size: BoardSize) {
        self.board = Board::new(size);
        self.marks.clear();
        self.turn = TurnColor::default();
        self.tool = Tool::Stone;
        self.pen.pen_up();
        self.strokes.clear();
        self.game_info = GameInfo::default();
        self.minimap = Minimap::layout(self.board.tree());
        self.comments.clear();
        self.current_move = None;
        self.move_number = 0;
    }

    fn place_mark(&mut self, pos: Coord, mark: Mark) -> bool {
        if !self.size().contains(pos) {
            return false;
        }
        let old = self.marks.get(pos);
        if !self.marks.place(pos, mark) {
            return false;
        }
        self.store_mark(pos, old, Some(mark));
        true
    }

    // Mirrors a registry change into the current node and notifies the renderer.
    fn store_mark(&mut self, pos: Coord, old: Option<Mark>, new: Option<Mark>) {
        let fields = self.board.current_fields_mut();
        if let Some(old) = old {
            let (key, value) = old.to_field(pos);
            fields.remove_value(key, &value);
        }
        if let Some(new) = new {
            let (key, value) = new.to_field(pos);
            fields.add(key, value);
        }
        self.updates.push(ViewUpdate::Marks);
    }

    // Off-board coordinates are dropped silently.
    fn apply_frame_marks(&mut self, marks: &Marks) {
        let size = self.size();
        if let Some(current) = marks.current.filter(|pos| size.contains(*pos)) {
            self.current_move = Some(current);
        }
        for pos in marks.squares.iter().filter(|pos| size.contains(**pos)) {
            self.marks.place_square(*pos);
        }
        for pos in marks.triangles.iter().filter(|pos| size.contains(**pos)) {
            self.marks.place_triangle(*pos);
        }
        for label in marks.labels.iter().filter(|label| size.contains(label.coord)) {
            self.marks.place_label(label.coord, &label.text);
        }
    }

    fn after_navigation(&mut self, diff: GridDiff) {
        self.recompute_color();
        self.publish_position(diff);
    }

    // Annotations belong to nodes, so they are reloaded whenever the current node changes.
    fn publish_position(&mut self, diff: GridDiff) {
        if !diff.is_empty() {
            self.updates.push(ViewUpdate::Stones(diff));
        }
        self.reload_annotations();
        self.updates.push(ViewUpdate::CurrentMove(self.current_move));
        self.updates.push(ViewUpdate::Marks);
        self.updates.push(ViewUpdate::PenErased);
        for stroke in &self.strokes {
            self.updates.push(ViewUpdate::Pen(stroke.clone()));
        }
        self.updates.push(ViewUpdate::Comments(self.comments.clone()));
        self.publish_move_number();
        self.publish_explorer();
        self.updates.push(ViewUpdate::TurnColor(self.color()));
    }

    fn publish_all(&mut self) {
        self.updates.push(ViewUpdate::Reset { size: self.size() });
        self.updates.push(ViewUpdate::GameInfo);
        self.updates.push(ViewUpdate::Tool(self.tool));
        self.publish_position(GridDiff::default());
    }

    fn publish_move_number(&mut self) {
        self.move_number = self.board.current_node().depth();
        self.updates.push(ViewUpdate::MoveNumber(self.move_number));
    }

    fn publish_explorer(&mut self) {
        self.minimap = Minimap::layout(self.board.tree());
        self.updates.push(ViewUpdate::Explorer);
    }

    fn reload_annotations(&mut self) {
        let node = self.board.current_node();
        self.current_move = node.coord();
        self.marks.load_from_fields(&node.fields);
        self.strokes = node.fields.get(PEN_KEY).iter().filter_map(|s| PenStroke::decode(s)).collect();
        self.comments = comment_lines(&node.fields);
    }
}

impl Default for ReviewState {
    fn default() -> Self { Self::new(BoardSize::default()) }
}

fn comment_lines(fields: &Fields) -> Vec<String> {
    fields.get(COMMENT_KEY).iter().flat_map(|c| c.trim().lines().map(str::to_owned)).collect()
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn nine() -> ReviewState { ReviewState::new(BoardSize::new(9).unwrap()) }
    fn c(x: u8, y: u8) -> Coord { Coord::new(x, y) }

    #[test]
    fn marks_follow_their_node() {
        let mut state = nine();
        state.place_stone(c(2, 2), Color::Black).unwrap();
        assert_eq!(state.draw_mark(c(3, 3), MarkKind::Letter), MarkChange::Added(Mark::Letter(0)));
        assert!(state.place_triangle(c(4, 4)));
        assert!(!state.place_triangle(c(4, 4)));
        state.left();
        assert!(state.marks().is_empty());
        state.right();
        assert_eq!(state.marks().get(c(3, 3)), Some(Mark::Letter(0)));
        assert_eq!(state.marks().get(c(4, 4)), Some(Mark::Triangle));
        assert_eq!(state.remove_mark(c(3, 3)), Some(Mark::Letter(0)));
        state.left();
        state.right();
        assert_eq!(state.marks().len(), 1);
    }

    #[test]
    fn navigation_recomputes_color() {
        let mut state = nine();
        state.place_stone(c(0, 0), Color::Black).unwrap();
        state.place_stone(c(1, 1), Color::White).unwrap();
        state.left();
        assert_eq!(state.color(), Color::White);
        state.rewind();
        assert_eq!(state.color(), Color::Black);
        state.set_white();
        state.fastforward();
        assert_eq!(state.color(), Color::White);
        state.set_toggle();
        assert_eq!(state.color(), Color::Black);
    }

    #[test]
    fn illegal_move_publishes_nothing() {
        let mut state = nine();
        state.place_stone(c(0, 0), Color::Black).unwrap();
        state.take_view_updates();
        assert_eq!(state.place_stone(c(0, 0), Color::White), Err(PlaceError::Occupied(c(0, 0))));
        assert_eq!(state.take_view_updates(), vec![]);
        assert_eq!(state.color(), Color::White);
    }

    #[test]
    fn cut_steps_out_of_the_subtree() {
        let mut state = nine();
        state.place_stone(c(0, 0), Color::Black).unwrap();
        let b = state.place_stone(c(1, 1), Color::White).map(|_| state.board().current()).unwrap();
        state.place_stone(c(2, 2), Color::Black).unwrap();
        assert_eq!(state.cut(NodeId::ROOT), Err(CutError::Root));
        let parent = state.cut(b).unwrap();
        assert_eq!(state.board().current(), parent);
        assert_eq!(state.board().grid().num_stones(), 1);
        assert_eq!(state.tree().len(), 2);
    }

    #[test]
    fn pen_strokes_live_in_the_node() {
        let mut state = nine();
        state.place_stone(c(0, 0), Color::Black).unwrap();
        state.draw_pen(PenStroke::decode("-1:-1:0.25:0.5:#ff0000").unwrap());
        assert_eq!(state.tree().current_node().fields.get(PEN_KEY), ["-1.0000:-1.0000:0.2500:0.5000:#ff0000"]);
        state.left();
        assert!(state.strokes().is_empty());
        state.right();
        assert_eq!(state.strokes().len(), 1);
        state.erase_pen();
        assert!(!state.tree().current_node().fields.has(PEN_KEY));
    }

    #[test]
    fn comments_are_split_into_lines() {
        let mut state = nine();
        state.add_comment("  first\nsecond ");
        assert_eq!(state.comments(), ["first", "second"]);
    }

    #[test]
    fn settings_resize_the_board() {
        let mut state = nine();
        state.place_stone(c(0, 0), Color::Black).unwrap();
        state.update_settings(&ReviewSettings { buffer: 100, size: 9, password: String::new() });
        assert_eq!(state.board().grid().num_stones(), 1);
        state.update_settings(&ReviewSettings { buffer: 100, size: 13, password: "pw".to_owned() });
        assert_eq!(state.size().get(), 13);
        assert_eq!(state.board().grid().num_stones(), 0);
        assert_eq!(state.buffer(), 100);
        assert_eq!(state.password(), "pw");
    }
}
