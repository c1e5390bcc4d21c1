// Game records in SGF: `(;SZ[19]PB[..];B[dd];W[pp](;B[qd])(;B[dp]))`.
//
// Only what the review core needs: properties are kept verbatim in node fields, B/W become move
// or pass nodes, everything else is an opaque property. Point values use two lowercase letters.

use std::fmt::Write;

use log::debug;

use crate::color::Color;
use crate::coord::{BoardSize, Coord};
use crate::error::ProtocolError;
use crate::tree::{Fields, MoveTree, Node, NodeId, NodeKind};


pub const SIZE_KEY: &str = "SZ";
pub const HANDICAP_KEY: &str = "HA";
pub const COMMENT_KEY: &str = "C";

#[derive(Clone, Debug)]
pub struct GameRecord {
    pub size: BoardSize,
    // Preferred children point at the first variation; `current` is the root.
    pub tree: MoveTree,
}

impl GameRecord {
    pub fn empty(size: BoardSize) -> Self {
        let mut fields = Fields::new();
        fields.add(SIZE_KEY, size.get().to_string());
        GameRecord { size, tree: MoveTree::with_root_fields(fields) }
    }
}

// An empty record is a fresh 19x19 board.
pub fn parse(text: &str) -> Result<GameRecord, ProtocolError> {
    let mut parser = Parser { chars: text.chars().collect(), pos: 0 };
    parser.skip_whitespace();
    if parser.at_end() {
        return Ok(GameRecord::empty(BoardSize::default()));
    }
    parser.expect('(')?;
    parser.skip_whitespace();
    parser.expect(';')?;
    let root_fields = parser.properties()?;
    let size = match root_fields.first(SIZE_KEY) {
        None => BoardSize::default(),
        Some(s) => s
            .split(':')
            .next()
            .and_then(|s| s.trim().parse().ok())
            .and_then(BoardSize::new)
            .ok_or_else(|| ProtocolError::Sgf(format!("unsupported board size: {s}")))?,
    };
    let mut tree = MoveTree::with_root_fields(root_fields);
    parser.sequence(&mut tree, NodeId::ROOT, size)?;
    // Adding children makes the latest one preferred; records start on the main line.
    tree.set_prefs(&Default::default());
    tree.rewind();
    debug!("Parsed game record: {}x{}, {} nodes", size.get(), size.get(), tree.len());
    Ok(GameRecord { size, tree })
}

pub fn write(tree: &MoveTree) -> String {
    let mut out = String::from("(");
    write_sequence(tree, tree.root(), &mut out);
    out.push(')');
    out
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn at_end(&self) -> bool { self.pos >= self.chars.len() }
    fn peek(&self) -> Option<char> { self.chars.get(self.pos).copied() }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, what: &str) -> ProtocolError {
        ProtocolError::Sgf(format!("{what} at offset {}", self.pos))
    }

    fn expect(&mut self, c: char) -> Result<(), ProtocolError> {
        if self.peek() != Some(c) {
            return Err(self.error(&format!("expected '{c}'")));
        }
        self.pos += 1;
        Ok(())
    }

    // Remainder of a game tree whose first node has already been read as `parent`.
    fn sequence(&mut self, tree: &mut MoveTree, parent: NodeId, size: BoardSize) -> Result<(), ProtocolError> {
        let mut parent = parent;
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(';') => {
                    self.pos += 1;
                    let mut fields = self.properties()?;
                    let kind = node_kind(&mut fields, size);
                    parent = tree.add_child(parent, kind, fields);
                }
                Some('(') => {
                    self.pos += 1;
                    self.sequence(tree, parent, size)?;
                }
                Some(')') => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => return Err(self.error("unexpected character")),
                None => return Err(self.error("unterminated game tree")),
            }
        }
    }

    fn properties(&mut self) -> Result<Fields, ProtocolError> {
        let mut fields = Fields::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_alphabetic()) {
                self.pos += 1;
            }
            if start == self.pos {
                return Ok(fields);
            }
            // Old-style records use mixed case like "AddBlack"; only capitals carry meaning.
            let key: String = self.chars[start..self.pos].iter().filter(|c| c.is_ascii_uppercase()).collect();
            self.skip_whitespace();
            if self.peek() != Some('[') {
                return Err(self.error("property without a value"));
            }
            while self.peek() == Some('[') {
                self.pos += 1;
                let value = self.value()?;
                fields.add(&key, value);
                self.skip_whitespace();
            }
        }
    }

    fn value(&mut self) -> Result<String, ProtocolError> {
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated property value")),
                Some(']') => {
                    self.pos += 1;
                    return Ok(value);
                }
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        // Soft line break.
                        Some('\n') => {}
                        Some(c) => value.push(c),
                        None => return Err(self.error("dangling escape")),
                    }
                    self.pos += 1;
                }
                Some(c) => {
                    value.push(c);
                    self.pos += 1;
                }
            }
        }
    }
}

// Pulls the move out of the fields. `B[]`, and `B[tt]` on boards up to 19x19, are passes.
fn node_kind(fields: &mut Fields, size: BoardSize) -> NodeKind {
    for color in [Color::Black, Color::White] {
        let key = color.to_sgf();
        if !fields.has(key) {
            continue;
        }
        let value = fields.remove(key).into_iter().next().unwrap_or_default();
        let value = value.trim();
        if value.is_empty() || (value == "tt" && size.get() <= 19) {
            return NodeKind::Pass { color };
        }
        match Coord::from_letters(value).filter(|c| size.contains(*c)) {
            Some(coord) => return NodeKind::Move { coord, color },
            None => {
                debug!("Ignoring move {key}[{value}] outside the board");
                return NodeKind::Setup;
            }
        }
    }
    NodeKind::Setup
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c == ']' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn write_node(node: &Node, out: &mut String) {
    out.push(';');
    match node.kind() {
        NodeKind::Move { coord, color } => {
            let _ = write!(out, "{}[{}]", color.to_sgf(), coord.to_letters());
        }
        NodeKind::Pass { color } => {
            let _ = write!(out, "{}[]", color.to_sgf());
        }
        NodeKind::Root | NodeKind::Setup => {}
    }
    for (key, values) in node.fields.iter() {
        out.push_str(key);
        for value in values {
            let _ = write!(out, "[{}]", escape(value));
        }
    }
}

fn write_sequence(tree: &MoveTree, first: &Node, out: &mut String) {
    let mut node = first;
    loop {
        write_node(node, out);
        let children: Vec<&Node> = node.down().iter().filter_map(|id| tree.node(*id)).collect();
        match children.as_slice() {
            [] => return,
            [only] => node = only,
            many => {
                for child in many {
                    out.push('(');
                    write_sequence(tree, child, out);
                    out.push(')');
                }
                return;
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_with_variations() {
        let record = parse("(;GM[1]SZ[9]PB[Shusaku]C[a \\] b];B[cc];W[gg](;B[cg]C[main])(;B[gc];W[])) ").unwrap();
        assert_eq!(record.size.get(), 9);
        let tree = &record.tree;
        assert_eq!(tree.len(), 6);
        assert_eq!(tree.root().fields.first("C"), Some("a ] b"));
        let line: Vec<_> = tree.preferred_line().into_iter().filter_map(|id| tree.node(id)?.coord()).collect();
        assert_eq!(line, vec![Coord::new(2, 2), Coord::new(6, 6), Coord::new(2, 6)]);
        let second = tree.node(tree.root().down()[0]).unwrap();
        let third = tree.node(second.down()[0]).unwrap();
        let variation = tree.node(third.down()[1]).unwrap();
        let pass = tree.node(variation.down()[0]).unwrap();
        assert!(pass.is_pass());
        assert_eq!(pass.color(), Some(Color::White));
    }

    #[test]
    fn empty_record_is_default_board() {
        let record = parse("  ").unwrap();
        assert_eq!(record.size.get(), 19);
        assert_eq!(record.tree.len(), 1);
    }

    #[test]
    fn malformed_records_are_rejected() {
        assert!(matches!(parse("(;SZ[9];B[aa]"), Err(ProtocolError::Sgf(_))));
        assert!(matches!(parse(";B[aa])"), Err(ProtocolError::Sgf(_))));
        assert!(matches!(parse("(;SZ[40])"), Err(ProtocolError::Sgf(_))));
    }

    #[test]
    fn write_then_parse() {
        let text = "(;AB[aa][bb]SZ[9];B[cc];W[dd](;B[ee]LB[ee:A])(;B[ff]C[x\\]y]))";
        let record = parse(text).unwrap();
        assert_eq!(write(&record.tree), text);
    }
}
