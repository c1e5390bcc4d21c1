// Snapshots and deltas pushed by the server.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::color::{self, Color};
use crate::coord::Coord;
use crate::minimap::MinimapDelta;


#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum FrameType {
    // Apply on top of the current position.
    Diff,
    // Replaces the whole position.
    Full,
}

impl TryFrom<u8> for FrameType {
    type Error = String;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrameType::Diff),
            1 => Ok(FrameType::Full),
            _ => Err(format!("Invalid frame type: {value}")),
        }
    }
}

impl From<FrameType> for u8 {
    fn from(t: FrameType) -> u8 {
        match t {
            FrameType::Diff => 0,
            FrameType::Full => 1,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct StoneSet {
    #[serde(default, deserialize_with = "nullable")]
    pub coords: Vec<Coord>,
    #[serde(with = "color::code", default)]
    pub color: Option<Color>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Diff {
    #[serde(default, deserialize_with = "nullable")]
    pub add: Vec<StoneSet>,
    #[serde(default, deserialize_with = "nullable")]
    pub remove: Vec<StoneSet>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Label {
    pub coord: Coord,
    pub text: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Marks {
    #[serde(default)]
    pub current: Option<Coord>,
    #[serde(default, deserialize_with = "nullable")]
    pub squares: Vec<Coord>,
    #[serde(default, deserialize_with = "nullable")]
    pub triangles: Vec<Coord>,
    #[serde(default, deserialize_with = "nullable")]
    pub labels: Vec<Label>,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Metadata {
    // Present when the board is (re)created.
    #[serde(default)]
    pub size: Option<u8>,
    #[serde(default, deserialize_with = "nullable")]
    pub fields: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub frame_type: FrameType,
    #[serde(default)]
    pub diff: Option<Diff>,
    #[serde(default)]
    pub marks: Option<Marks>,
    #[serde(default)]
    pub explorer: Option<MinimapDelta>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    // Comment lines of the node the frame leaves the viewer at.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Vec<String>>,
}

impl Frame {
    pub fn diff(diff: Diff) -> Self {
        Frame { frame_type: FrameType::Diff, ..Self::full(diff) }
    }

    pub fn full(diff: Diff) -> Self {
        Frame {
            frame_type: FrameType::Full,
            diff: Some(diff),
            marks: None,
            explorer: None,
            metadata: None,
            comments: None,
        }
    }
}

// Go-style encoders write empty collections as `null`.
fn nullable<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}


#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn parse_diff_frame() {
        let frame: Frame = serde_json::from_str(indoc! {r#"
            {
                "type": 0,
                "diff": {
                    "add": [{"coords": [{"x": 2, "y": 2}], "color": 1}],
                    "remove": null
                },
                "marks": {"current": {"x": 2, "y": 2}, "squares": null, "triangles": [], "labels": null},
                "explorer": null,
                "metadata": null
            }
        "#})
        .unwrap();
        assert_eq!(frame.frame_type, FrameType::Diff);
        assert_eq!(
            frame.diff,
            Some(Diff {
                add: vec![StoneSet { coords: vec![Coord::new(2, 2)], color: Some(Color::Black) }],
                remove: vec![],
            })
        );
        assert_eq!(frame.marks.unwrap().current, Some(Coord::new(2, 2)));
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        assert!(serde_json::from_str::<Frame>(r#"{"type": 7}"#).is_err());
        let frame: Frame = serde_json::from_str(r#"{"type": 1}"#).unwrap();
        assert_eq!(frame.frame_type, FrameType::Full);
        assert_eq!(frame.diff, None);
    }
}
