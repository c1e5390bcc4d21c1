use crossterm::style::{self, Stylize};
use itertools::Itertools;

use goban_review::client::ClientState;
use goban_review::color::Color;
use goban_review::coord::Coord;
use goban_review::grid::GridItem;
use goban_review::marks::Mark;
use goban_review::review::{ReviewState, Tool};
use goban_review::turn::ColorMode;


fn stone_char(color: Color) -> char {
    match color {
        Color::Black => '●',
        Color::White => '○',
    }
}

fn mark_char(mark: Mark) -> char {
    match mark {
        Mark::Triangle => '△',
        Mark::Square => '□',
        // Two-digit numbers do not fit: show the last digit.
        mark => mark.label().and_then(|l| l.chars().last()).unwrap_or('?'),
    }
}

// Marks on empty points replace the intersection; marks on stones are shown by color.
pub fn point_char(review: &ReviewState, pos: Coord) -> char {
    match (review.board().get(pos), review.marks().get(pos)) {
        (GridItem::Stone(color), _) => stone_char(color),
        (_, Some(mark)) => mark_char(mark),
        _ => '┼',
    }
}

fn format_point(review: &ReviewState, pos: Coord) -> String {
    let ch = point_char(review, pos);
    let text = format!("{ch} ");
    if review.current_move() == Some(pos) {
        text.reverse().to_string()
    } else if review.marks().has(pos) && !matches!(review.board().get(pos), GridItem::Empty) {
        text.with(style::Color::Red).to_string()
    } else {
        text
    }
}

pub fn render_board(review: &ReviewState) -> String {
    let n: u8 = review.size().into();
    let header: String = (0..n).map(|x| format!("{} ", (b'a' + x) as char)).collect();
    let mut ret = format!("   {}\n", header.with(style::Color::DarkGrey));
    for y in 0..n {
        let row: String = (0..n).map(|x| format_point(review, Coord::new(x, y))).collect();
        ret.push_str(&format!("{} {}\n", format!("{:>2}", (b'a' + y) as char).with(style::Color::DarkGrey), row));
    }
    ret
}

fn tool_name(review: &ReviewState) -> String {
    match review.tool() {
        Tool::Stone => match review.turn().mode() {
            ColorMode::Toggling => format!("alternate, {:?} to play", review.color()),
            ColorMode::Fixed(color) => format!("{color:?} only"),
        },
        Tool::Mark(kind) => format!("{kind:?}"),
        Tool::Pen => "pen".to_owned(),
    }
}

pub fn render_status(client: &ClientState) -> String {
    let review = client.review();
    let mut lines = vec![
        format!("Move {}   Tool: {}", review.move_number(), tool_name(review)),
        review.game_info().rows().into_iter().map(|(label, value)| format!("{label}: {value}")).join("   "),
    ];
    let users = client.user_names();
    if !users.is_empty() {
        lines.push(format!("Users: {}", users.iter().join(", ")));
    }
    if !review.strokes().is_empty() {
        lines.push(format!("{} pen strokes", review.strokes().len()));
    }
    lines.extend(review.comments().iter().map(|c| format!("  {}", c.clone().with(style::Color::Cyan))));
    lines.join("\n")
}
