// Test utilities that cannot be moved to the "tests" folder, because unit tests use them too.

use rand::{Rng, SeedableRng};

use crate::color::Color;
use crate::coord::{BoardSize, Coord};
use crate::tree::{Fields, MoveTree, NodeId, NodeKind};


// In theory random tests verify statistical properties that should always hold, but let's fix
// the seed to avoid sporadic failures.
pub fn deterministic_rng() -> impl Rng { rand::rngs::StdRng::from_seed([0; 32]) }

pub fn nine() -> BoardSize { BoardSize::new(9).unwrap() }

// Main line of alternating moves starting with black, e.g. `linear_tree(&[(2, 2), (6, 6)])`.
pub fn linear_tree(moves: &[(u8, u8)]) -> (MoveTree, Vec<NodeId>) {
    let mut tree = MoveTree::new();
    let mut parent = NodeId::ROOT;
    let mut ids = Vec::new();
    for (i, &(x, y)) in moves.iter().enumerate() {
        let color = if i % 2 == 0 { Color::Black } else { Color::White };
        parent = tree.add_child(parent, NodeKind::Move { coord: Coord::new(x, y), color }, Fields::new());
        ids.push(parent);
    }
    tree.set_prefs(&Default::default());
    (tree, ids)
}

// Random tree with `num_nodes` nodes besides the root where no node has more than
// `max_children` children. Every move is on a different point; once the board runs out of
// points the remaining nodes are passes.
pub fn random_tree(rng: &mut impl Rng, size: BoardSize, num_nodes: usize, max_children: usize) -> MoveTree {
    let mut tree = MoveTree::new();
    let mut points: Vec<Coord> = size.coords().collect();
    let mut open = vec![NodeId::ROOT];
    for _ in 0..num_nodes {
        let slot = rng.random_range(0..open.len());
        let parent = open[slot];
        let depth = tree.node(parent).map_or(0, |n| n.depth());
        let color = if depth % 2 == 0 { Color::Black } else { Color::White };
        let kind = if points.is_empty() {
            NodeKind::Pass { color }
        } else {
            let coord = points.swap_remove(rng.random_range(0..points.len()));
            NodeKind::Move { coord, color }
        };
        let id = tree.add_child(parent, kind, Fields::new());
        open.push(id);
        if tree.node(parent).map_or(0, |n| n.down().len()) >= max_children {
            open.swap_remove(slot);
        }
    }
    tree.set_prefs(&Default::default());
    tree
}
