use std::fmt;

use itertools::Itertools;
use serde::{Deserialize, Serialize};


// Coordinates are written as a pair of lowercase letters, so 26 is the natural limit.
pub const MAX_BOARD_SIZE: u8 = 26;
pub const DEFAULT_BOARD_SIZE: u8 = 19;

const fn letter_to_index(letter: u8) -> Option<u8> {
    match letter {
        b'a'..=b'z' => Some(letter - b'a'),
        b'A'..=b'Z' => Some(letter - b'A'),
        _ => None,
    }
}


#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BoardSize(u8);

impl BoardSize {
    pub const fn new(size: u8) -> Option<Self> {
        if size >= 1 && size <= MAX_BOARD_SIZE { Some(BoardSize(size)) } else { None }
    }
    pub const fn get(self) -> u8 { self.0 }

    pub fn contains(self, coord: Coord) -> bool { coord.x < self.0 && coord.y < self.0 }

    // Converts raw (possibly negative) input coordinates. Anything outside the board is `None`.
    pub fn coord(self, x: i32, y: i32) -> Option<Coord> {
        let x = u8::try_from(x).ok()?;
        let y = u8::try_from(y).ok()?;
        let coord = Coord { x, y };
        self.contains(coord).then_some(coord)
    }

    pub fn coords(self) -> impl Iterator<Item = Coord> {
        (0..self.0).cartesian_product(0..self.0).map(|(y, x)| Coord { x, y })
    }
}

impl Default for BoardSize {
    fn default() -> Self { BoardSize(DEFAULT_BOARD_SIZE) }
}

impl TryFrom<u8> for BoardSize {
    type Error = String;
    fn try_from(size: u8) -> Result<Self, Self::Error> {
        BoardSize::new(size).ok_or_else(|| format!("Invalid board size: {size}"))
    }
}

impl From<BoardSize> for u8 {
    fn from(size: BoardSize) -> u8 { size.0 }
}


// Board point, 0-based. `x` is the column and `y` is the row, both counted from the top-left.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: u8,
    pub y: u8,
}

impl Coord {
    pub const fn new(x: u8, y: u8) -> Self { Coord { x, y } }

    // SGF-style point: "aa" is the top-left corner.
    pub fn to_letters(self) -> String {
        [self.x, self.y].iter().map(|&v| (b'a' + v) as char).collect()
    }

    pub fn from_letters(s: &str) -> Option<Self> {
        let (x, y) = s.bytes().collect_tuple()?;
        Some(Coord { x: letter_to_index(x)?, y: letter_to_index(y)? })
    }

    // Identifier used by the rendering layer for per-point elements.
    pub fn id(self) -> String { format!("{}-{}", self.x, self.y) }

    pub fn neighbors(self, size: BoardSize) -> impl Iterator<Item = Coord> {
        let (x, y) = (self.x as i32, self.y as i32);
        [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)]
            .into_iter()
            .filter_map(move |(nx, ny)| size.coord(nx, ny))
    }
}

impl fmt::Debug for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coord({},{})", self.x, self.y)
    }
}
