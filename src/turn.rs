use crate::color::Color;


#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ColorMode {
    // Alternate colors after every placement.
    Toggling,
    Fixed(Color),
}

// Color of the next stone placed by the local user.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TurnColor {
    mode: ColorMode,
    color: Color,
}

impl TurnColor {
    pub fn new(first: Color) -> Self { TurnColor { mode: ColorMode::Toggling, color: first } }

    pub fn mode(&self) -> ColorMode { self.mode }
    pub fn color(&self) -> Color { self.color }
    pub fn is_toggling(&self) -> bool { self.mode == ColorMode::Toggling }

    pub fn set_toggling(&mut self) { self.mode = ColorMode::Toggling; }

    pub fn set_fixed(&mut self, color: Color) {
        self.mode = ColorMode::Fixed(color);
        self.color = color;
    }

    // Forces the color without leaving toggling mode (handshake, resets).
    pub fn reset(&mut self, color: Color) { self.color = color; }

    pub fn after_placement(&mut self) {
        if self.is_toggling() {
            self.color = self.color.opposite();
        }
    }

    // Navigation may jump between branches, so the color is derived from the tree rather than
    // flipped: the opposite of the current node's color, else the color of its first child.
    // Without either, the color is kept.
    pub fn recompute(&mut self, node_color: Option<Color>, first_child_color: Option<Color>) {
        if !self.is_toggling() {
            return;
        }
        if let Some(color) = node_color {
            self.color = color.opposite();
        } else if let Some(color) = first_child_color {
            self.color = color;
        }
    }
}

impl Default for TurnColor {
    fn default() -> Self { TurnColor::new(Color::Black) }
}
