// Freehand pen strokes drawn over the board.
//
// Positions are board-relative in [0, 1]. A stroke is a chain of segments; the first segment of
// a chain has no start point. Segments are persisted in the node's "PX" property as
// "x0:y0:x1:y1:color" with four decimals, where -1 stands for a missing start.

use derive_new::new;
use serde::{Deserialize, Serialize};


pub const PEN_KEY: &str = "PX";
pub const DEFAULT_PEN_COLOR: &str = "#0000FF";

const NULL_ENDPOINT: f64 = -1.0;

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize, new)]
pub struct PenPoint {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(from = "PenWire", into = "PenWire")]
pub struct PenStroke {
    pub start: Option<PenPoint>,
    pub end: PenPoint,
    pub color: String,
}

// Events carry a segment as `[x0, y0, x1, y1, color]`, with nulls for a missing start.
#[derive(Clone, Serialize, Deserialize)]
struct PenWire(Option<f64>, Option<f64>, f64, f64, String);

impl From<PenWire> for PenStroke {
    fn from(PenWire(x0, y0, x1, y1, color): PenWire) -> Self {
        let start = x0.zip(y0).map(|(x, y)| PenPoint::new(x, y));
        PenStroke { start, end: PenPoint::new(x1, y1), color }
    }
}

impl From<PenStroke> for PenWire {
    fn from(stroke: PenStroke) -> Self {
        let (x0, y0) = stroke.start.map(|p| (p.x, p.y)).unzip();
        PenWire(x0, y0, stroke.end.x, stroke.end.y, stroke.color)
    }
}

impl PenStroke {
    pub fn encode(&self) -> String {
        let (x0, y0) = self.start.map_or((NULL_ENDPOINT, NULL_ENDPOINT), |p| (p.x, p.y));
        format!("{:.4}:{:.4}:{:.4}:{:.4}:{}", x0, y0, self.end.x, self.end.y, self.color)
    }

    // Returns `None` for anything that is not exactly five tokens of the expected shape.
    pub fn decode(s: &str) -> Option<PenStroke> {
        let tokens: Vec<_> = s.split(':').collect();
        let [x0, y0, x1, y1, color] = tokens.as_slice() else {
            return None;
        };
        let [x0, y0, x1, y1] = [x0, y0, x1, y1].map(|t| t.trim().parse::<f64>().ok());
        let start = match (x0?, y0?) {
            (x, y) if x == NULL_ENDPOINT || y == NULL_ENDPOINT => None,
            (x, y) => Some(PenPoint::new(x, y)),
        };
        Some(PenStroke { start, end: PenPoint::new(x1?, y1?), color: (*color).to_owned() })
    }
}

// Tracks the pointer while the pen tool is active and turns motion into segments.
#[derive(Debug)]
pub struct PenCanvas {
    color: String,
    last: Option<PenPoint>,
    down: bool,
}

impl PenCanvas {
    pub fn new(color: String) -> Self { PenCanvas { color, last: None, down: false } }

    pub fn color(&self) -> &str { &self.color }
    pub fn set_color(&mut self, color: String) { self.color = color; }
    pub fn is_drawing(&self) -> bool { self.down }

    pub fn pen_down(&mut self) {
        self.down = true;
        self.last = None;
    }

    // Segment from the previous pointer position (if any) to `pos`.
    #[must_use]
    pub fn pen_move(&mut self, pos: PenPoint) -> Option<PenStroke> {
        if !self.down {
            return None;
        }
        let start = self.last.replace(pos);
        Some(PenStroke { start, end: pos, color: self.color.clone() })
    }

    pub fn pen_up(&mut self) {
        self.down = false;
        self.last = None;
    }
}

impl Default for PenCanvas {
    fn default() -> Self { Self::new(DEFAULT_PEN_COLOR.to_owned()) }
}
