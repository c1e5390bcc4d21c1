use enum_map::Enum;
use serde::{Deserialize, Serialize};
use strum::EnumIter;


// On the wire stone colors are integers: 0 is "no stone", 1 is black, 2 is white.
pub const NO_COLOR_CODE: u8 = 0;

#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Enum, EnumIter, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Color {
    Black,
    White,
}

impl Color {
    pub fn opposite(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    pub fn to_code(self) -> u8 {
        match self {
            Color::Black => 1,
            Color::White => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Color> {
        match code {
            1 => Some(Color::Black),
            2 => Some(Color::White),
            _ => None,
        }
    }

    // SGF property letter: "B" or "W".
    pub fn to_sgf(self) -> &'static str {
        match self {
            Color::Black => "B",
            Color::White => "W",
        }
    }
}

impl TryFrom<u8> for Color {
    type Error = String;
    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Color::from_code(code).ok_or_else(|| format!("Invalid stone color: {code}"))
    }
}

impl From<Color> for u8 {
    fn from(color: Color) -> u8 { color.to_code() }
}

pub fn optional_color_code(color: Option<Color>) -> u8 {
    color.map_or(NO_COLOR_CODE, Color::to_code)
}

// Serde adapter for `Option<Color>` fields that use 0 for "no color".
pub mod code {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{optional_color_code, Color, NO_COLOR_CODE};

    pub fn serialize<S: Serializer>(color: &Option<Color>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(optional_color_code(*color))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Color>, D::Error> {
        let code = Option::<u8>::deserialize(d)?.unwrap_or(NO_COLOR_CODE);
        match code {
            NO_COLOR_CODE => Ok(None),
            _ => Color::from_code(code)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("Invalid stone color: {code}"))),
        }
    }
}
