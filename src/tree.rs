// Move tree shared by everyone in a review room.
//
// Nodes live in an arena keyed by their index. Indices are assigned by a monotonic counter
// (which the server may override during handshake) and are never reused within a session.
// The parent link is a plain index, so there are no ownership cycles.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use enum_map::EnumMap;
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::coord::Coord;
use crate::error::CutError;


#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub const ROOT: NodeId = NodeId(0);
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "#{}", self.0) }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NodeKind {
    Root,
    Move { coord: Coord, color: Color },
    Pass { color: Color },
    // Only adds or removes stones via fields (AB / AW / AE).
    Setup,
}

// Multi-valued SGF-like properties keyed by short tags ("C", "TR", "SQ", "LB", "PX", ...).
#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fields(BTreeMap<String, Vec<String>>);

impl Fields {
    pub fn new() -> Self { Fields(BTreeMap::new()) }

    pub fn has(&self, key: &str) -> bool { self.0.contains_key(key) }
    pub fn get(&self, key: &str) -> &[String] { self.0.get(key).map_or(&[], Vec::as_slice) }
    pub fn first(&self, key: &str) -> Option<&str> { self.get(key).first().map(String::as_str) }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> { self.0.iter() }

    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.0.entry(key.to_owned()).or_default().push(value.into());
    }

    // Removes one occurrence of `value`. Drops the key once it has no values.
    pub fn remove_value(&mut self, key: &str, value: &str) -> bool {
        let Some(values) = self.0.get_mut(key) else {
            return false;
        };
        let Some(pos) = values.iter().rposition(|v| v == value) else {
            return false;
        };
        values.remove(pos);
        if values.is_empty() {
            self.0.remove(key);
        }
        true
    }

    pub fn remove(&mut self, key: &str) -> Vec<String> { self.0.remove(key).unwrap_or_default() }

    pub fn coords(&self, key: &str) -> Vec<Coord> {
        self.get(key).iter().filter_map(|s| Coord::from_letters(s)).collect()
    }
}

impl From<BTreeMap<String, Vec<String>>> for Fields {
    fn from(map: BTreeMap<String, Vec<String>>) -> Self { Fields(map) }
}

#[derive(Clone, Debug)]
pub struct Node {
    index: NodeId,
    up: Option<NodeId>,
    down: Vec<NodeId>,
    preferred_child: usize,
    depth: u32,
    kind: NodeKind,
    pub fields: Fields,
    // Stones removed from the board by this node, keyed by the color of the removed stones.
    pub captured: EnumMap<Color, Vec<Coord>>,
}

impl Node {
    fn new(index: NodeId, up: Option<NodeId>, depth: u32, kind: NodeKind, fields: Fields) -> Self {
        Node {
            index,
            up,
            down: Vec::new(),
            preferred_child: 0,
            depth,
            kind,
            fields,
            captured: EnumMap::default(),
        }
    }

    pub fn index(&self) -> NodeId { self.index }
    pub fn up(&self) -> Option<NodeId> { self.up }
    pub fn down(&self) -> &[NodeId] { &self.down }
    pub fn preferred_child(&self) -> usize { self.preferred_child }
    pub fn preferred(&self) -> Option<NodeId> { self.down.get(self.preferred_child).copied() }
    pub fn depth(&self) -> u32 { self.depth }
    pub fn kind(&self) -> NodeKind { self.kind }

    pub fn color(&self) -> Option<Color> {
        match self.kind {
            NodeKind::Move { color, .. } | NodeKind::Pass { color } => Some(color),
            NodeKind::Root | NodeKind::Setup => None,
        }
    }
    pub fn coord(&self) -> Option<Coord> {
        match self.kind {
            NodeKind::Move { coord, .. } => Some(coord),
            _ => None,
        }
    }
    pub fn has_move(&self) -> bool { matches!(self.kind, NodeKind::Move { .. }) }
    pub fn is_pass(&self) -> bool { matches!(self.kind, NodeKind::Pass { .. }) }

    // Setup stones added by this node (distinct from its own move).
    pub fn added_stones(&self) -> EnumMap<Color, Vec<Coord>> {
        EnumMap::from_fn(|color: Color| self.fields.coords(setup_key(color)))
    }
}

pub fn setup_key(color: Color) -> &'static str {
    match color {
        Color::Black => "AB",
        Color::White => "AW",
    }
}

#[derive(Clone, Debug)]
pub struct MoveTree {
    nodes: HashMap<NodeId, Node>,
    current: NodeId,
    next_index: u32,
}

impl MoveTree {
    pub fn new() -> Self { Self::with_root_fields(Fields::new()) }

    pub fn with_root_fields(fields: Fields) -> Self {
        let root = Node::new(NodeId::ROOT, None, 0, NodeKind::Root, fields);
        MoveTree {
            nodes: HashMap::from([(NodeId::ROOT, root)]),
            current: NodeId::ROOT,
            next_index: 1,
        }
    }

    pub fn len(&self) -> usize { self.nodes.len() }
    pub fn contains(&self, id: NodeId) -> bool { self.nodes.contains_key(&id) }
    pub fn node(&self, id: NodeId) -> Option<&Node> { self.nodes.get(&id) }
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> { self.nodes.get_mut(&id) }

    pub fn root(&self) -> &Node { self.expect_node(NodeId::ROOT) }
    pub fn current(&self) -> NodeId { self.current }
    pub fn current_node(&self) -> &Node { self.expect_node(self.current) }
    pub fn current_node_mut(&mut self) -> &mut Node {
        let current = self.current;
        self.nodes.get_mut(&current).unwrap_or_else(|| panic!("{}", missing_node(current)))
    }
    pub fn current_depth(&self) -> u32 { self.current_node().depth }

    pub fn max_depth(&self) -> u32 { self.nodes.values().map(|n| n.depth).max().unwrap_or(0) }

    pub fn next_index(&self) -> u32 { self.next_index }
    pub fn set_next_index(&mut self, next_index: u32) {
        let min_free = self.nodes.keys().map(|id| id.0 + 1).max().unwrap_or(1);
        self.next_index = next_index.max(min_free);
    }

    // Adds a child of `current` and moves there. A move that matches an existing child is not
    // duplicated: the existing child becomes preferred and current instead.
    // Returns the node and whether it was newly created.
    pub fn push(&mut self, kind: NodeKind, fields: Fields) -> (NodeId, bool) {
        if let NodeKind::Move { .. } = kind {
            let current = self.current_node();
            let existing = current.down.iter().position(|id| self.expect_node(*id).kind == kind);
            if let Some(pos) = existing {
                let id = current.down[pos];
                self.current_node_mut().preferred_child = pos;
                self.current = id;
                return (id, false);
            }
        }
        let parent = self.current;
        let id = self.add_child(parent, kind, fields);
        self.current = id;
        (id, true)
    }

    // Appends a child to an arbitrary node without moving `current`. Used when building trees.
    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind, fields: Fields) -> NodeId {
        self.insert_child(parent, None, kind, fields)
    }

    // Like `add_child`, but keeps an index assigned elsewhere (e.g. by the server) when it is
    // still free.
    pub fn insert_child(
        &mut self, parent: NodeId, index: Option<NodeId>, kind: NodeKind, fields: Fields,
    ) -> NodeId {
        let id = match index {
            Some(id) if id != NodeId::ROOT && !self.contains(id) => id,
            _ => NodeId(self.next_index),
        };
        self.next_index = self.next_index.max(id.0 + 1);
        let parent_node = self.nodes.get_mut(&parent).unwrap_or_else(|| panic!("{}", missing_node(parent)));
        let depth = parent_node.depth + 1;
        parent_node.down.push(id);
        parent_node.preferred_child = parent_node.down.len() - 1;
        self.nodes.insert(id, Node::new(id, Some(parent), depth, kind, fields));
        id
    }

    // Moves to the preferred child. Returns the new current node.
    pub fn right(&mut self) -> Option<NodeId> {
        let next = self.current_node().preferred()?;
        self.current = next;
        Some(next)
    }

    // Moves to the parent. Returns the node that was left.
    pub fn left(&mut self) -> Option<NodeId> {
        let left = self.current;
        self.current = self.current_node().up?;
        Some(left)
    }

    // Cycles the preferred child of `current`, wrapping around at both ends.
    pub fn up(&mut self) { self.shift_preferred(-1); }
    pub fn down(&mut self) { self.shift_preferred(1); }

    fn shift_preferred(&mut self, delta: i64) {
        let node = self.current_node_mut();
        let n = node.down.len() as i64;
        if n == 0 {
            return;
        }
        node.preferred_child = (node.preferred_child as i64 + delta).rem_euclid(n) as usize;
    }

    pub fn rewind(&mut self) { self.current = NodeId::ROOT; }

    // Walks from `id` to the root (inclusive on both ends).
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = &Node> {
        std::iter::successors(self.node(id), |n| n.up.and_then(|up| self.node(up)))
    }

    // Root-to-`id` path. Empty if `id` is unknown.
    pub fn path_to(&self, id: NodeId) -> Vec<NodeId> {
        let mut path: Vec<_> = self.ancestors(id).map(|n| n.index).collect();
        path.reverse();
        path
    }

    pub fn is_ancestor_or_self(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|n| n.index == ancestor)
    }

    // Makes the root-to-`id` path consist of preferred children only.
    pub fn set_preferred(&mut self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        let path = self.path_to(id);
        for (parent, child) in path.iter().zip(path.iter().skip(1)) {
            let node = self.nodes.get_mut(parent).unwrap_or_else(|| panic!("{}", missing_node(*parent)));
            if let Some(pos) = node.down.iter().position(|d| d == child) {
                node.preferred_child = pos;
            }
        }
        true
    }

    pub fn prefs(&self) -> BTreeMap<NodeId, usize> {
        self.nodes.values().map(|n| (n.index, n.preferred_child)).collect()
    }

    // Nodes missing from `prefs` (and out-of-range entries) fall back to the first child.
    pub fn set_prefs(&mut self, prefs: &BTreeMap<NodeId, usize>) {
        for node in self.nodes.values_mut() {
            let p = prefs.get(&node.index).copied().unwrap_or(0);
            node.preferred_child = if p < node.down.len() { p } else { 0 };
        }
    }

    // Child positions along the root-to-current path.
    pub fn locate(&self) -> Vec<usize> {
        let path = self.path_to(self.current);
        path.iter()
            .zip(path.iter().skip(1))
            .filter_map(|(parent, child)| self.expect_node(*parent).down.iter().position(|d| d == child))
            .collect()
    }

    // Detaches the subtree rooted at `id` and drops its nodes.
    // Precondition: `current` must not be inside the subtree; step left out of it first.
    pub fn cut(&mut self, id: NodeId) -> Result<NodeId, CutError> {
        if id == NodeId::ROOT {
            return Err(CutError::Root);
        }
        let parent = self.node(id).ok_or(CutError::UnknownNode(id))?.up.ok_or(CutError::Root)?;
        if self.is_ancestor_or_self(id, self.current) {
            return Err(CutError::CurrentInSubtree { node: id, current: self.current });
        }
        let subtree = self.preorder_from(id);
        for n in subtree {
            self.nodes.remove(&n);
        }
        let parent_node = self.nodes.get_mut(&parent).unwrap_or_else(|| panic!("{}", missing_node(parent)));
        if let Some(pos) = parent_node.down.iter().position(|d| *d == id) {
            parent_node.down.remove(pos);
            if parent_node.preferred_child > pos {
                parent_node.preferred_child -= 1;
            } else if parent_node.preferred_child >= parent_node.down.len() {
                parent_node.preferred_child = 0;
            }
        }
        Ok(parent)
    }

    // First node carrying a move at `coord`: searches forward along preferred children, then
    // backward towards the root.
    pub fn find_coord(&self, coord: Coord) -> Option<NodeId> {
        let forward = std::iter::successors(Some(self.current_node()), |n| {
            n.preferred().and_then(|id| self.node(id))
        });
        forward
            .chain(self.ancestors(self.current))
            .find(|n| n.coord() == Some(coord))
            .map(|n| n.index)
    }

    pub fn preferred_line(&self) -> Vec<NodeId> {
        std::iter::successors(Some(self.root()), |n| n.preferred().and_then(|id| self.node(id)))
            .map(|n| n.index)
            .collect()
    }

    pub fn preorder(&self) -> Vec<NodeId> { self.preorder_from(NodeId::ROOT) }

    pub fn preorder_from(&self, start: NodeId) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(id) = stack.pop() {
            let Some(node) = self.node(id) else {
                continue;
            };
            order.push(id);
            stack.extend(node.down.iter().rev());
        }
        order
    }

    #[track_caller]
    fn expect_node(&self, id: NodeId) -> &Node {
        self.nodes.get(&id).unwrap_or_else(|| panic!("{}", missing_node(id)))
    }
}

fn missing_node(id: NodeId) -> String {
    crate::internal_error_message!("node {id} is not in the tree")
}
