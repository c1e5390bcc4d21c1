// Board annotations. At most one mark per point; letters and numbers come from free lists so
// that allocation always yields the lowest unused slot.

use std::collections::{BTreeSet, HashMap};

use log::debug;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use crate::coord::Coord;
use crate::tree::Fields;


pub const NUM_LETTERS: usize = 26;

pub const TRIANGLE_KEY: &str = "TR";
pub const SQUARE_KEY: &str = "SQ";
pub const LABEL_KEY: &str = "LB";

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Mark {
    Triangle,
    Square,
    // 0 is "A".
    Letter(u8),
    Number(u32),
}

// What the mark tool would create on an empty point.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, EnumIter)]
pub enum MarkKind {
    Triangle,
    Square,
    Letter,
    Number,
}

#[must_use]
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MarkChange {
    Added(Mark),
    Removed(Mark),
    // Nothing to do, e.g. all letters are taken.
    Unchanged,
}

impl Mark {
    pub fn kind(self) -> MarkKind {
        match self {
            Mark::Triangle => MarkKind::Triangle,
            Mark::Square => MarkKind::Square,
            Mark::Letter(_) => MarkKind::Letter,
            Mark::Number(_) => MarkKind::Number,
        }
    }

    pub fn label(self) -> Option<String> {
        match self {
            Mark::Triangle | Mark::Square => None,
            Mark::Letter(i) => Some(letter_char(i).to_string()),
            Mark::Number(n) => Some(n.to_string()),
        }
    }

    // Node property that persists the mark, e.g. ("LB", "dd:A").
    pub fn to_field(self, pos: Coord) -> (&'static str, String) {
        match self.label() {
            None if self == Mark::Triangle => (TRIANGLE_KEY, pos.to_letters()),
            None => (SQUARE_KEY, pos.to_letters()),
            Some(text) => (LABEL_KEY, format!("{}:{}", pos.to_letters(), text)),
        }
    }

    // Label text is a number mark if it parses as one and a letter mark otherwise.
    pub fn from_label(text: &str) -> Option<Mark> {
        let text = text.trim();
        if let Ok(n) = text.parse::<u32>() {
            return Some(Mark::Number(n));
        }
        let first = text.chars().next()?.to_ascii_uppercase();
        first.is_ascii_uppercase().then(|| Mark::Letter(first as u8 - b'A'))
    }
}

pub fn letter_char(index: u8) -> char { (b'A' + index % NUM_LETTERS as u8) as char }

#[derive(Clone, Debug)]
pub struct MarkRegistry {
    marks: HashMap<Coord, Mark>,
    used_letters: [bool; NUM_LETTERS],
    used_numbers: BTreeSet<u32>,
}

impl MarkRegistry {
    pub fn new() -> Self {
        MarkRegistry {
            marks: HashMap::new(),
            used_letters: [false; NUM_LETTERS],
            // Numbering starts at 1.
            used_numbers: BTreeSet::from([0]),
        }
    }

    pub fn clear(&mut self) { *self = Self::new(); }

    pub fn get(&self, pos: Coord) -> Option<Mark> { self.marks.get(&pos).copied() }
    pub fn has(&self, pos: Coord) -> bool { self.marks.contains_key(&pos) }
    pub fn len(&self) -> usize { self.marks.len() }
    pub fn is_empty(&self) -> bool { self.marks.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = (Coord, Mark)> + '_ {
        self.marks.iter().map(|(pos, mark)| (*pos, *mark))
    }

    pub fn get_letter(&self) -> Option<u8> {
        self.used_letters.iter().position(|used| !used).map(|i| i as u8)
    }

    pub fn get_number(&self) -> u32 {
        (0..).find(|n| !self.used_numbers.contains(n)).unwrap_or(u32::MAX)
    }

    // Clicking a point with a mark clears it; clicking an empty point allocates a new mark.
    pub fn draw_mark(&mut self, pos: Coord, kind: MarkKind) -> MarkChange {
        if let Some(old) = self.remove_mark(pos) {
            return MarkChange::Removed(old);
        }
        let mark = match kind {
            MarkKind::Triangle => Mark::Triangle,
            MarkKind::Square => Mark::Square,
            MarkKind::Number => Mark::Number(self.get_number()),
            MarkKind::Letter => match self.get_letter() {
                Some(i) => Mark::Letter(i),
                None => {
                    debug!("All {NUM_LETTERS} letters are in use, not marking {pos:?}");
                    return MarkChange::Unchanged;
                }
            },
        };
        self.insert(pos, mark);
        MarkChange::Added(mark)
    }

    pub fn remove_mark(&mut self, pos: Coord) -> Option<Mark> {
        let mark = self.marks.remove(&pos)?;
        self.release(mark);
        Some(mark)
    }

    // Places a specific mark. Repeating the same mark is a no-op; a different mark on the same
    // point is replaced. Returns whether anything changed.
    pub fn place(&mut self, pos: Coord, mark: Mark) -> bool {
        if let Mark::Letter(i) = mark {
            if i as usize >= NUM_LETTERS {
                return false;
            }
        }
        match self.get(pos) {
            Some(old) if old == mark => return false,
            Some(_) => {
                self.remove_mark(pos);
            }
            None => {}
        }
        self.insert(pos, mark);
        true
    }

    pub fn place_triangle(&mut self, pos: Coord) -> bool { self.place(pos, Mark::Triangle) }
    pub fn place_square(&mut self, pos: Coord) -> bool { self.place(pos, Mark::Square) }
    pub fn place_letter(&mut self, pos: Coord, index: u8) -> bool { self.place(pos, Mark::Letter(index)) }
    pub fn place_number(&mut self, pos: Coord, n: u32) -> bool { self.place(pos, Mark::Number(n)) }

    pub fn place_label(&mut self, pos: Coord, text: &str) -> bool {
        match Mark::from_label(text) {
            Some(mark) => self.place(pos, mark),
            None => {
                debug!("Ignoring label {text:?} at {pos:?}");
                false
            }
        }
    }

    // Replaces all marks with the ones stored in a node.
    pub fn load_from_fields(&mut self, fields: &Fields) {
        self.clear();
        for pos in fields.coords(TRIANGLE_KEY) {
            self.place_triangle(pos);
        }
        for pos in fields.coords(SQUARE_KEY) {
            self.place_square(pos);
        }
        for value in fields.get(LABEL_KEY) {
            if let Some((pos, text)) = value.split_once(':') {
                if let Some(pos) = Coord::from_letters(pos) {
                    self.place_label(pos, text);
                }
            }
        }
    }

    fn insert(&mut self, pos: Coord, mark: Mark) {
        match mark {
            Mark::Letter(i) => self.used_letters[i as usize] = true,
            Mark::Number(n) => {
                self.used_numbers.insert(n);
            }
            Mark::Triangle | Mark::Square => {}
        }
        self.marks.insert(pos, mark);
    }

    // Concurrent edits can put the same label on two points; the slot stays taken while any
    // point still shows it.
    fn release(&mut self, mark: Mark) {
        if self.marks.values().any(|m| *m == mark) {
            return;
        }
        match mark {
            Mark::Letter(i) => self.used_letters[i as usize] = false,
            Mark::Number(0) => {}
            Mark::Number(n) => {
                self.used_numbers.remove(&n);
            }
            Mark::Triangle | Mark::Square => {}
        }
    }
}

impl Default for MarkRegistry {
    fn default() -> Self { Self::new() }
}
