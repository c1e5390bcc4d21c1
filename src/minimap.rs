// Tree explorer layout.
//
// Every node gets a cell: `x` is its depth, `y` a row shared by a run of nodes in one variation.
// Branches go to new rows; a node may climb back up towards its parent's row as long as it does
// not cross the parent's diagonal. When a node ends up more than one row below its parent, the
// cell at (x-1, y-1) is reserved as a waypoint for the bent edge.

use std::collections::HashMap;

use derive_new::new;
use serde::{Deserialize, Serialize};

use crate::color::{self, Color};
use crate::tree::{MoveTree, NodeId};


// Radius of a drawn node is 12 px; cells are three radii apart.
pub const CELL_STEP: f64 = 36.0;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize, new)]
pub struct GridPos {
    pub x: u32,
    pub y: u32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Edge {
    pub start: GridPos,
    pub end: GridPos,
}

impl Edge {
    // Straight when the rows are adjacent, otherwise down the parent's column and then diagonally
    // through the waypoint.
    pub fn segments(&self) -> Vec<(GridPos, GridPos)> {
        let Edge { start, end } = *self;
        if end.y > start.y + 1 {
            let bend = GridPos::new(start.x, end.y - 1);
            vec![(start, bend), (bend, end)]
        } else {
            vec![(start, end)]
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MinimapNode {
    pub coord: GridPos,
    #[serde(with = "color::code", default)]
    pub color: Option<Color>,
    pub index: NodeId,
}

// Layout update as sent by the server. Absent parts are left unchanged.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct MinimapDelta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<MinimapNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<Edge>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_nodes: Option<Vec<MinimapNode>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<GridPos>,
    #[serde(with = "color::code", default)]
    pub current_color: Option<Color>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Cell {
    Node { index: NodeId, color: Option<Color> },
    // Taken by a bent edge.
    Waypoint,
}

#[derive(Clone, Debug, Default)]
pub struct Minimap {
    rows: Vec<Vec<Option<Cell>>>,
    loc: HashMap<NodeId, GridPos>,
    edges: Vec<Edge>,
    preferred: Vec<MinimapNode>,
    current: Option<GridPos>,
}

enum Visit {
    Node(NodeId),
    // Returning from a subtree.
    Back,
}

impl Minimap {
    pub fn new() -> Self { Self::default() }

    pub fn layout(tree: &MoveTree) -> Self {
        let width = tree.max_depth() as usize + 1;
        let mut rows: Vec<Vec<Option<Cell>>> = vec![vec![None; width]];
        let mut loc: HashMap<NodeId, GridPos> = HashMap::new();
        let mut edges = Vec::new();
        let mut stack = vec![Visit::Node(NodeId::ROOT)];
        let mut x = 0usize;
        while let Some(visit) = stack.pop() {
            let id = match visit {
                Visit::Back => {
                    x = x.saturating_sub(1);
                    continue;
                }
                Visit::Node(id) => id,
            };
            let Some(node) = tree.node(id) else {
                continue;
            };
            let parent = node.up().and_then(|p| loc.get(&p)).map(|p| (p.x as usize, p.y as usize));
            let mut y = rows.len() - 1;
            if rows[y][x].is_some() {
                rows.push(vec![None; width]);
                y += 1;
            } else {
                while y > 0 {
                    if let Some((x1, y1)) = parent {
                        if x + y1 >= x1 + y || y == y1 {
                            break;
                        }
                    }
                    if rows[y][x].is_none() && rows[y - 1][x].is_some() {
                        break;
                    }
                    y -= 1;
                }
            }
            rows[y][x] = Some(Cell::Node { index: id, color: node.color() });
            let pos = GridPos::new(x as u32, y as u32);
            loc.insert(id, pos);
            if let Some((x1, y1)) = parent {
                if y > y1 + 1 && rows[y - 1][x - 1].is_none() {
                    rows[y - 1][x - 1] = Some(Cell::Waypoint);
                }
                edges.push(Edge { start: GridPos::new(x1 as u32, y1 as u32), end: pos });
            }
            x += 1;
            for child in node.down().iter().rev() {
                stack.push(Visit::Back);
                stack.push(Visit::Node(*child));
            }
        }
        let preferred = tree
            .preferred_line()
            .into_iter()
            .filter_map(|id| Some(MinimapNode { coord: *loc.get(&id)?, color: tree.node(id)?.color(), index: id }))
            .collect();
        let current = loc.get(&tree.current()).copied();
        Minimap { rows, loc, edges, preferred, current }
    }

    // Replaces the parts of the layout present in `delta`.
    pub fn apply_delta(&mut self, delta: &MinimapDelta) {
        if let Some(nodes) = &delta.nodes {
            self.rows.clear();
            self.loc.clear();
            for node in nodes {
                let (x, y) = (node.coord.x as usize, node.coord.y as usize);
                if self.rows.len() <= y {
                    self.rows.resize(y + 1, Vec::new());
                }
                let row = &mut self.rows[y];
                if row.len() <= x {
                    row.resize(x + 1, None);
                }
                row[x] = Some(Cell::Node { index: node.index, color: node.color });
                self.loc.insert(node.index, node.coord);
            }
        }
        if let Some(edges) = &delta.edges {
            self.edges = edges.clone();
        }
        if let Some(preferred) = &delta.preferred_nodes {
            self.preferred = preferred.clone();
        }
        if let Some(current) = delta.current {
            self.current = Some(current);
        }
    }

    pub fn height(&self) -> usize { self.rows.len() }
    pub fn width(&self) -> usize { self.rows.iter().map(Vec::len).max().unwrap_or(0) }
    pub fn edges(&self) -> &[Edge] { &self.edges }
    pub fn current(&self) -> Option<GridPos> { self.current }
    pub fn loc(&self, id: NodeId) -> Option<GridPos> { self.loc.get(&id).copied() }

    pub fn cell(&self, pos: GridPos) -> Option<Cell> {
        self.rows.get(pos.y as usize)?.get(pos.x as usize).copied().flatten()
    }

    pub fn node_at(&self, pos: GridPos) -> Option<NodeId> {
        match self.cell(pos)? {
            Cell::Node { index, .. } => Some(index),
            Cell::Waypoint => None,
        }
    }

    pub fn preferred_nodes(&self) -> &[MinimapNode] { &self.preferred }

    // Segments of the highlighted main line.
    pub fn preferred_edges(&self) -> Vec<Edge> {
        self.preferred.windows(2).map(|w| Edge { start: w[0].coord, end: w[1].coord }).collect()
    }

    // Node under a point given in pixels relative to the explorer's top-left corner.
    pub fn capture_mouse(&self, px: f64, py: f64, step: f64) -> Option<NodeId> {
        if !(px >= 0.0 && py >= 0.0 && step > 0.0) {
            return None;
        }
        let pos = GridPos::new((px / step).floor() as u32, (py / step).floor() as u32);
        self.node_at(pos)
    }

    // Nearest node in the same column above the current one.
    pub fn index_up(&self) -> Option<NodeId> {
        let current = self.current?;
        (0..current.y).rev().find_map(|y| self.node_at(GridPos::new(current.x, y)))
    }

    pub fn index_down(&self) -> Option<NodeId> {
        let current = self.current?;
        (current.y + 1..self.rows.len() as u32).find_map(|y| self.node_at(GridPos::new(current.x, y)))
    }
}
