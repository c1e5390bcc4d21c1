// Go board: a grid of stones kept in sync with the current node of a move tree.
//
// The grid is always the replay of root..current: stepping right applies the node's setup
// stones, its move and its captures; stepping left undoes exactly that. Authoritative server
// frames bypass the tree and write the grid directly via `set`.
//
// There is no ko rule.

use std::collections::{BTreeMap, BTreeSet};

use enum_map::EnumMap;
use log::debug;

use crate::color::Color;
use crate::coord::{BoardSize, Coord};
use crate::error::{CutError, PlaceError};
use crate::grid::{Grid, GridDiff, GridItem};
use crate::tree::{Fields, MoveTree, Node, NodeId, NodeKind};


// Setup property listing points cleared by a node.
pub const CLEAR_KEY: &str = "AE";

#[derive(Clone, Debug)]
pub struct Board {
    grid: Grid,
    tree: MoveTree,
}

impl Board {
    pub fn new(size: BoardSize) -> Self { Board { grid: Grid::new(size), tree: MoveTree::new() } }

    // Adopts a tree built elsewhere (e.g. read from a game record), computes what every move
    // captures and leaves the board at the root.
    pub fn load(size: BoardSize, tree: MoveTree) -> Self {
        let mut board = Board { grid: Grid::new(size), tree };
        board.tree.rewind();
        board.apply_setup();
        board.compute_captures(NodeId::ROOT);
        board
    }

    pub fn size(&self) -> BoardSize { self.grid.size() }
    pub fn grid(&self) -> &Grid { &self.grid }
    pub fn tree(&self) -> &MoveTree { &self.tree }
    pub fn get(&self, pos: Coord) -> GridItem { self.grid.get(pos) }
    pub fn current(&self) -> NodeId { self.tree.current() }
    pub fn current_node(&self) -> &Node { self.tree.current_node() }
    pub fn current_fields_mut(&mut self) -> &mut Fields { &mut self.tree.current_node_mut().fields }

    // Raw write that bypasses the tree. Out-of-bounds coords are ignored.
    pub fn set(&mut self, pos: Coord, color: Option<Color>) { self.grid.set(pos, color); }

    // Grid only; the tree keeps its position.
    pub fn clear_stones(&mut self) { self.grid.clear(); }

    // Empties the grid and points the tree back at the root. Nodes are kept.
    pub fn clear(&mut self) {
        self.grid.clear();
        self.tree.rewind();
    }

    // Plays a move as a child of the current node. Returns the captured stones.
    pub fn place(&mut self, pos: Coord, color: Color) -> Result<Vec<Coord>, PlaceError> {
        match self.grid.get(pos) {
            GridItem::OutOfBounds => return Err(PlaceError::OutOfBounds(pos)),
            GridItem::Stone(_) => return Err(PlaceError::Occupied(pos)),
            GridItem::Empty => {}
        }
        let captured = {
            let grid = self.grid.scoped_set(pos, Some(color));
            let dead = grid.dead_neighbors(pos, color.opposite());
            if dead.is_empty() && grid.find_group(pos).is_some_and(|g| g.is_dead()) {
                return Err(PlaceError::Suicide(pos));
            }
            dead.into_iter().collect::<BTreeSet<_>>().into_iter().collect::<Vec<_>>()
        };
        let (id, created) = self.tree.push(NodeKind::Move { coord: pos, color }, Fields::new());
        if created {
            self.tree.current_node_mut().captured[color.opposite()] = captured;
        }
        self.apply_node(id);
        Ok(self.tree.current_node().captured[color.opposite()].clone())
    }

    pub fn push_pass(&mut self, color: Color) -> NodeId {
        self.tree.push(NodeKind::Pass { color }, Fields::new()).0
    }

    // Manual removal. Recorded as a setup node so that stepping back restores the stone.
    pub fn remove(&mut self, pos: Coord) -> Option<NodeId> {
        let GridItem::Stone(color) = self.grid.get(pos) else {
            return None;
        };
        let mut fields = Fields::new();
        fields.add(CLEAR_KEY, pos.to_letters());
        let (id, _) = self.tree.push(NodeKind::Setup, fields);
        self.tree.current_node_mut().captured[color] = vec![pos];
        self.apply_node(id);
        Some(id)
    }

    pub fn step_right(&mut self) -> Option<NodeId> {
        let id = self.tree.right()?;
        self.apply_node(id);
        Some(id)
    }

    // Undoes the current node and moves to its parent. Returns the node that was left.
    pub fn step_left(&mut self) -> Option<NodeId> {
        let node = self.tree.current_node();
        node.up()?;
        let (coord, added, captured) = (node.coord(), node.added_stones(), node.captured.clone());
        if let Some(coord) = coord {
            self.grid.set(coord, None);
        }
        for pos in added.values().flatten() {
            self.grid.set(*pos, None);
        }
        for (color, stones) in captured {
            for pos in stones {
                self.grid.set(pos, Some(color));
            }
        }
        self.tree.left()
    }

    pub fn up(&mut self) { self.tree.up(); }
    pub fn down(&mut self) { self.tree.down(); }

    // Back to the root position: empty grid plus the root's setup stones.
    pub fn rewind(&mut self) {
        self.clear();
        self.apply_setup();
    }

    pub fn fastforward(&mut self) {
        while self.step_right().is_some() {}
    }

    // Makes the path to `id` preferred and replays it from scratch.
    pub fn goto(&mut self, id: NodeId) -> bool {
        if !self.tree.set_preferred(id) {
            return false;
        }
        self.rewind();
        while self.current() != id {
            if self.step_right().is_none() {
                break;
            }
        }
        self.current() == id
    }

    // Runs a batch of navigation steps and reports their combined effect on the grid.
    pub fn replay(&mut self, f: impl FnOnce(&mut Board)) -> GridDiff {
        let before = self.grid.clone();
        f(self);
        before.diff(&self.grid)
    }

    pub fn cut(&mut self, id: NodeId) -> Result<NodeId, CutError> {
        let parent = self.tree.cut(id)?;
        debug!("Cut subtree {id}, {} nodes remain", self.tree.len());
        Ok(parent)
    }

    pub fn set_prefs(&mut self, prefs: &BTreeMap<NodeId, usize>) {
        self.tree.set_prefs(prefs);
    }
    pub fn set_next_index(&mut self, next_index: u32) { self.tree.set_next_index(next_index); }

    pub fn find_coord(&self, pos: Coord) -> Option<NodeId> { self.tree.find_coord(pos) }

    fn apply_setup(&mut self) {
        for (color, stones) in self.tree.root().added_stones() {
            for pos in stones {
                self.grid.set(pos, Some(color));
            }
        }
    }

    fn apply_node(&mut self, id: NodeId) {
        let Some(node) = self.tree.node(id) else {
            return;
        };
        let (kind, added, captured) = (node.kind(), node.added_stones(), node.captured.clone());
        for (color, stones) in added {
            for pos in stones {
                self.grid.set(pos, Some(color));
            }
        }
        if let NodeKind::Move { coord, color } = kind {
            self.grid.set(coord, Some(color));
        }
        for pos in captured.values().flatten() {
            self.grid.set(*pos, None);
        }
    }

    // Depth-first replay below `id` that fills in `captured` for every node. Each pending node
    // carries the grid of its parent. The grid is restored at the end.
    fn compute_captures(&mut self, id: NodeId) {
        let start = self.grid.clone();
        let children_of = |tree: &MoveTree, id| tree.node(id).map(|n| n.down().to_vec()).unwrap_or_default();
        let mut stack: Vec<(NodeId, Grid)> =
            children_of(&self.tree, id).into_iter().rev().map(|child| (child, start.clone())).collect();
        while let Some((child, grid)) = stack.pop() {
            self.grid = grid;
            let captured = self.captures_of(child);
            if let Some(node) = self.tree.node_mut(child) {
                node.captured = captured;
            }
            self.apply_node(child);
            let grandchildren = children_of(&self.tree, child);
            stack.extend(grandchildren.into_iter().rev().map(|next| (next, self.grid.clone())));
        }
        self.grid = start;
    }

    // What `id` would capture if played on the current grid.
    fn captures_of(&self, id: NodeId) -> EnumMap<Color, Vec<Coord>> {
        let mut captured = EnumMap::<Color, Vec<Coord>>::default();
        let Some(node) = self.tree.node(id) else {
            return captured;
        };
        for pos in node.fields.coords(CLEAR_KEY) {
            if let GridItem::Stone(color) = self.grid.get(pos) {
                captured[color].push(pos);
            }
        }
        if let NodeKind::Move { coord, color } = node.kind() {
            if self.grid.contains(coord) {
                let mut grid = self.grid.clone();
                for (c, stones) in node.added_stones() {
                    for pos in stones {
                        grid.set(pos, Some(c));
                    }
                }
                grid.set(coord, Some(color));
                let dead: BTreeSet<_> = grid.dead_neighbors(coord, color.opposite()).into_iter().collect();
                captured[color.opposite()].extend(dead);
            }
        }
        captured
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn nine() -> BoardSize { BoardSize::new(9).unwrap() }
    fn c(x: u8, y: u8) -> Coord { Coord::new(x, y) }

    #[test]
    fn capture_and_undo() {
        let mut board = Board::new(nine());
        board.place(c(1, 1), Color::White).unwrap();
        board.place(c(1, 0), Color::Black).unwrap();
        board.place(c(0, 1), Color::Black).unwrap();
        board.place(c(2, 1), Color::Black).unwrap();
        let captured = board.place(c(1, 2), Color::Black).unwrap();
        assert_eq!(captured, vec![c(1, 1)]);
        assert_eq!(board.get(c(1, 1)), GridItem::Empty);
        assert_eq!(board.current_node().captured[Color::White], vec![c(1, 1)]);
        board.step_left();
        assert_eq!(board.get(c(1, 1)), GridItem::Stone(Color::White));
        assert_eq!(board.get(c(1, 2)), GridItem::Empty);
    }

    #[test]
    fn illegal_moves_leave_state_intact() {
        let mut board = Board::new(nine());
        board.place(c(1, 0), Color::Black).unwrap();
        board.place(c(0, 1), Color::Black).unwrap();
        let before = board.grid().clone();
        assert_eq!(board.place(c(0, 0), Color::White), Err(PlaceError::Suicide(c(0, 0))));
        assert_eq!(board.place(c(1, 0), Color::White), Err(PlaceError::Occupied(c(1, 0))));
        assert_eq!(board.place(c(9, 0), Color::White), Err(PlaceError::OutOfBounds(c(9, 0))));
        assert_eq!(board.grid(), &before);
        assert_eq!(board.tree().len(), 3);
    }

    #[test]
    fn capturing_is_not_suicide() {
        let mut board = Board::new(nine());
        board.place(c(1, 0), Color::Black).unwrap();
        board.place(c(2, 0), Color::White).unwrap();
        board.place(c(0, 1), Color::Black).unwrap();
        board.place(c(1, 1), Color::White).unwrap();
        board.place(c(8, 8), Color::Black).unwrap();
        board.place(c(0, 2), Color::White).unwrap();
        board.place(c(7, 8), Color::Black).unwrap();
        let captured = board.place(c(0, 0), Color::White).unwrap();
        assert_eq!(captured, vec![c(0, 1), c(1, 0)]);
    }

    #[test]
    fn removal_is_undoable() {
        let mut board = Board::new(nine());
        board.place(c(4, 4), Color::Black).unwrap();
        assert!(board.remove(c(4, 4)).is_some());
        assert_eq!(board.get(c(4, 4)), GridItem::Empty);
        assert!(board.remove(c(4, 4)).is_none());
        board.step_left();
        assert_eq!(board.get(c(4, 4)), GridItem::Stone(Color::Black));
    }

    #[test]
    fn load_computes_captures() {
        let mut tree = MoveTree::new();
        let mut parent = NodeId::ROOT;
        for (x, y, color) in [(1, 1, Color::White), (1, 0, Color::Black), (0, 1, Color::Black),
            (2, 1, Color::Black), (1, 2, Color::Black)]
        {
            parent = tree.add_child(parent, NodeKind::Move { coord: c(x, y), color }, Fields::new());
        }
        let mut board = Board::load(nine(), tree);
        assert_eq!(board.current(), NodeId::ROOT);
        assert_eq!(board.grid().num_stones(), 0);
        board.fastforward();
        assert_eq!(board.current(), parent);
        assert_eq!(board.get(c(1, 1)), GridItem::Empty);
        assert_eq!(board.grid().num_stones(), 4);
    }

    #[test]
    fn load_keeps_sibling_branches_apart() {
        let mut tree = MoveTree::new();
        let mut parent = NodeId::ROOT;
        for (x, y, color) in [(1, 1, Color::White), (1, 0, Color::Black), (0, 1, Color::Black),
            (2, 1, Color::Black)]
        {
            parent = tree.add_child(parent, NodeKind::Move { coord: c(x, y), color }, Fields::new());
        }
        let capture = tree.add_child(parent, NodeKind::Move { coord: c(1, 2), color: Color::Black }, Fields::new());
        let other = tree.add_child(parent, NodeKind::Move { coord: c(5, 5), color: Color::Black }, Fields::new());
        let after_capture =
            tree.add_child(capture, NodeKind::Move { coord: c(1, 1), color: Color::Black }, Fields::new());
        let board = Board::load(nine(), tree);
        let node = |id| board.tree().node(id).unwrap();
        assert_eq!(node(capture).captured[Color::White], vec![c(1, 1)]);
        assert!(node(other).captured.values().all(Vec::is_empty));
        assert!(node(after_capture).captured.values().all(Vec::is_empty));
        assert_eq!(board.grid().num_stones(), 0);
    }

    #[test]
    fn load_handles_very_long_records() {
        let mut tree = MoveTree::new();
        let mut parent = NodeId::ROOT;
        for i in 0..50_000 {
            let color = if i % 2 == 0 { Color::Black } else { Color::White };
            parent = tree.add_child(parent, NodeKind::Pass { color }, Fields::new());
        }
        let mut board = Board::load(nine(), tree);
        board.fastforward();
        assert_eq!(board.current(), parent);
    }

    #[test]
    fn replay_reports_net_diff() {
        let mut board = Board::new(nine());
        board.place(c(0, 0), Color::Black).unwrap();
        board.place(c(1, 1), Color::White).unwrap();
        let diff = board.replay(|b| {
            b.rewind();
            b.fastforward();
        });
        assert!(diff.is_empty());
        let diff = board.replay(|b| b.rewind());
        assert_eq!(diff.removed.len(), 2);
    }
}
