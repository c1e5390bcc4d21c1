use std::collections::HashSet;
use std::{fmt, ops};

use enum_map::EnumMap;
use ndarray::{Array, Array2};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::coord::{BoardSize, Coord};


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum GridItem {
    Stone(Color),
    Empty,
    OutOfBounds,
}

impl GridItem {
    pub fn is_free(self) -> bool { matches!(self, GridItem::Empty) }
}

// A connected set of same-colored stones together with its liberties.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Group {
    pub color: Color,
    pub stones: HashSet<Coord>,
    pub liberties: HashSet<Coord>,
}

impl Group {
    pub fn is_dead(&self) -> bool { self.liberties.is_empty() }
}

// Difference between two grids: stones that appeared and points that became empty.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct GridDiff {
    pub added: EnumMap<Color, Vec<Coord>>,
    pub removed: Vec<Coord>,
}

impl GridDiff {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.values().all(|v| v.is_empty())
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grid {
    // Indexed as [y, x].
    data: Array2<Option<Color>>,
}

impl Grid {
    pub fn new(size: BoardSize) -> Self {
        let n = size.get() as usize;
        Grid { data: Array::from_elem((n, n), None) }
    }

    pub fn size(&self) -> BoardSize {
        // The grid is only ever constructed from a valid `BoardSize`.
        BoardSize::new(self.data.shape()[0] as u8).unwrap_or_default()
    }

    pub fn contains(&self, pos: Coord) -> bool { self.size().contains(pos) }

    pub fn get(&self, pos: Coord) -> GridItem {
        match self.data.get(coord_to_index(pos)) {
            None => GridItem::OutOfBounds,
            Some(None) => GridItem::Empty,
            Some(Some(color)) => GridItem::Stone(*color),
        }
    }

    // Out-of-bounds writes are ignored.
    pub fn set(&mut self, pos: Coord, color: Option<Color>) {
        if let Some(point) = self.data.get_mut(coord_to_index(pos)) {
            *point = color;
        }
    }

    pub fn clear(&mut self) { self.data.fill(None); }

    pub fn stones(&self) -> impl Iterator<Item = (Coord, Color)> + '_ {
        self.data
            .indexed_iter()
            .filter_map(|((y, x), v)| v.map(|color| (Coord::new(x as u8, y as u8), color)))
    }

    pub fn num_stones(&self) -> usize { self.data.iter().filter(|v| v.is_some()).count() }

    pub fn find_group(&self, start: Coord) -> Option<Group> {
        let GridItem::Stone(color) = self.get(start) else {
            return None;
        };
        let size = self.size();
        let mut stones = HashSet::new();
        let mut liberties = HashSet::new();
        let mut stack = vec![start];
        while let Some(point) = stack.pop() {
            if !stones.insert(point) {
                continue;
            }
            for nb in point.neighbors(size) {
                match self[nb] {
                    Some(c) if c == color && !stones.contains(&nb) => stack.push(nb),
                    Some(_) => {}
                    None => {
                        liberties.insert(nb);
                    }
                }
            }
        }
        Some(Group { color, stones, liberties })
    }

    // Groups of `color` adjacent to `pos` that have no liberties left.
    pub fn dead_neighbors(&self, pos: Coord, color: Color) -> HashSet<Coord> {
        let mut dead = HashSet::new();
        for nb in pos.neighbors(self.size()) {
            if dead.contains(&nb) || self[nb] != Some(color) {
                continue;
            }
            if let Some(group) = self.find_group(nb) {
                if group.is_dead() {
                    dead.extend(group.stones);
                }
            }
        }
        dead
    }

    // Idea. A separate class GridView that allows to make only temporary changes.
    pub fn scoped_set<'a>(
        &'a mut self, pos: Coord, color: Option<Color>,
    ) -> impl ops::DerefMut<Target = &'a mut Self> + 'a {
        let original = self[pos];
        self[pos] = color;
        scopeguard::guard(self, move |grid| grid[pos] = original)
    }

    pub fn diff(&self, after: &Grid) -> GridDiff {
        let mut diff = GridDiff::default();
        for (((y, x), before), now) in self.data.indexed_iter().zip(after.data.iter()) {
            let pos = Coord::new(x as u8, y as u8);
            match (*before, *now) {
                (b, Some(n)) if b != Some(n) => diff.added[n].push(pos),
                (Some(_), None) => diff.removed.push(pos),
                _ => {}
            }
        }
        diff
    }
}

impl ops::Index<Coord> for Grid {
    type Output = Option<Color>;
    #[track_caller]
    fn index(&self, pos: Coord) -> &Self::Output {
        let size = self.size();
        self.data
            .get(coord_to_index(pos))
            .unwrap_or_else(|| panic!("{}", out_of_bound_message(pos, size)))
    }
}

impl ops::IndexMut<Coord> for Grid {
    #[track_caller]
    fn index_mut(&mut self, pos: Coord) -> &mut Self::Output {
        let size = self.size();
        self.data
            .get_mut(coord_to_index(pos))
            .unwrap_or_else(|| panic!("{}", out_of_bound_message(pos, size)))
    }
}

fn coord_to_index(pos: Coord) -> [usize; 2] { [pos.y as usize, pos.x as usize] }

fn out_of_bound_message(pos: Coord, size: BoardSize) -> String {
    format!("Coord ({}, {}) is out of bound for {}x{} board", pos.x, pos.y, size.get(), size.get())
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Grid")?;
        for row in self.data.rows() {
            for point in row {
                let c = match point {
                    None => '.',
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn nine() -> BoardSize { BoardSize::new(9).unwrap() }

    #[test]
    fn scoped_set() {
        let mut g = Grid::new(nine());
        g[Coord::new(0, 0)] = Some(Color::Black);
        g[Coord::new(2, 2)] = Some(Color::White);
        {
            let mut g = g.scoped_set(Coord::new(0, 0), Some(Color::White));
            let mut g = g.scoped_set(Coord::new(0, 0), None);
            let g = g.scoped_set(Coord::new(2, 2), Some(Color::Black));
            assert_eq!(g[Coord::new(0, 0)], None);
            assert_eq!(g[Coord::new(2, 2)], Some(Color::Black));
        }
        assert_eq!(g[Coord::new(0, 0)], Some(Color::Black));
        assert_eq!(g[Coord::new(2, 2)], Some(Color::White));
    }

    #[test]
    fn group_liberties() {
        let mut g = Grid::new(nine());
        g.set(Coord::new(0, 0), Some(Color::Black));
        g.set(Coord::new(1, 0), Some(Color::Black));
        g.set(Coord::new(0, 1), Some(Color::White));
        let group = g.find_group(Coord::new(0, 0)).unwrap();
        assert_eq!(group.stones.len(), 2);
        assert_eq!(group.liberties, HashSet::from([Coord::new(2, 0), Coord::new(1, 1)]));
        assert!(g.find_group(Coord::new(5, 5)).is_none());
    }

    #[test]
    fn out_of_bounds_is_reported() {
        let g = Grid::new(nine());
        assert_eq!(g.get(Coord::new(9, 0)), GridItem::OutOfBounds);
        assert!(g.get(Coord::new(8, 8)).is_free());
    }

    #[test]
    fn diff_between_grids() {
        let mut before = Grid::new(nine());
        before.set(Coord::new(1, 1), Some(Color::White));
        let mut after = before.clone();
        after.set(Coord::new(1, 1), None);
        after.set(Coord::new(2, 1), Some(Color::Black));
        let diff = before.diff(&after);
        assert_eq!(diff.added[Color::Black], vec![Coord::new(2, 1)]);
        assert!(diff.added[Color::White].is_empty());
        assert_eq!(diff.removed, vec![Coord::new(1, 1)]);
    }
}
