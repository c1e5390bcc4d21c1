// Wire protocol.
//
// Every message is a JSON object `{event, value, color?, userid?}`. Messages are decoded at the
// boundary into closed enums: `ServerEvent` for what the server broadcasts and `ClientEvent` for
// what this client sends.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::IntoStaticStr;

use crate::color::Color;
use crate::coord::{BoardSize, Coord};
use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::pen::PenStroke;
use crate::tree::NodeId;


#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct WireMessage {
    pub event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userid: Option<String>,
}

impl WireMessage {
    pub fn new(event: &str, value: Value) -> Self {
        WireMessage { event: event.to_owned(), value, color: None, userid: None }
    }

    pub fn parse(s: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(s).map_err(|err| ProtocolError::MalformedJson(err.to_string()))
    }

    pub fn to_json(&self) -> String {
        // Serializing a `Value`-based struct cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    fn value<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        serde_json::from_value(self.value.clone())
            .map_err(|err| ProtocolError::invalid_value(&self.event, err))
    }

    fn stone_color(&self) -> Result<Color, ProtocolError> {
        let code = self.color.ok_or_else(|| ProtocolError::invalid_value(&self.event, "missing color"))?;
        Color::try_from(code).map_err(|err| ProtocolError::invalid_value(&self.event, err))
    }
}

// A point as sent by peers: `[x, y]`, not yet checked against the board.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RawCoord(pub i32, pub i32);

impl RawCoord {
    pub fn resolve(self, size: BoardSize) -> Option<Coord> { size.coord(self.0, self.1) }
}

impl From<Coord> for RawCoord {
    fn from(c: Coord) -> Self { RawCoord(c.x as i32, c.y as i32) }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum NavKey {
    ArrowLeft,
    ArrowRight,
    ArrowUp,
    ArrowDown,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum Button {
    Rewind,
    FastForward,
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct ReviewSettings {
    // Input buffer, ms.
    #[serde(default)]
    pub buffer: i64,
    pub size: u8,
    #[serde(default)]
    pub password: String,
}

// Everything needed to join a room midway.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Handshake {
    // Game record. Either plain or base64-encoded.
    #[serde(default)]
    pub sgf: String,
    // Child positions from the root to the current node, comma-separated.
    #[serde(default)]
    pub loc: String,
    #[serde(default)]
    pub prefs: BTreeMap<String, usize>,
    #[serde(default)]
    pub buffer: i64,
    #[serde(default)]
    pub next_index: u32,
}

impl Handshake {
    pub fn sgf_text(&self) -> Result<String, ProtocolError> {
        let sgf = self.sgf.trim();
        if sgf.is_empty() || sgf.starts_with('(') {
            return Ok(sgf.to_owned());
        }
        let bytes = BASE64.decode(sgf).map_err(|err| ProtocolError::Sgf(err.to_string()))?;
        String::from_utf8(bytes).map_err(|err| ProtocolError::Sgf(err.to_string()))
    }

    pub fn location(&self) -> Vec<usize> {
        self.loc.split(',').filter_map(|d| d.trim().parse().ok()).collect()
    }

    pub fn prefs(&self) -> BTreeMap<NodeId, usize> {
        self.prefs
            .iter()
            .filter_map(|(index, child)| Some((NodeId(index.parse().ok()?), *child)))
            .collect()
    }

    // The value arrives either as an object or as a string containing the object.
    fn from_value(event: &str, value: &Value) -> Result<Self, ProtocolError> {
        let result = match value {
            Value::String(s) => serde_json::from_str(s),
            other => serde_json::from_value(other.clone()),
        };
        result.map_err(|err| ProtocolError::invalid_value(event, err))
    }
}

#[derive(Deserialize)]
struct LetterValue<T> {
    coords: RawCoord,
    #[serde(alias = "number")]
    letter: T,
}

#[derive(Clone, PartialEq, Debug, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ServerEvent {
    Keydown(NavKey),
    AddStone { coord: RawCoord, color: Color },
    RemoveStone(RawCoord),
    Pass(Color),
    Triangle(RawCoord),
    Square(RawCoord),
    Letter { coord: RawCoord, letter: String },
    Number { coord: RawCoord, number: u32 },
    RemoveMark(RawCoord),
    Handshake(Handshake),
    UploadSgf(Handshake),
    Button(Button),
    GotoGrid(NodeId),
    GotoCoord(RawCoord),
    Trash,
    Scissors(NodeId),
    UpdateBuffer(i64),
    UpdateSettings(ReviewSettings),
    Draw(PenStroke),
    ErasePen,
    Comment(String),
    Frame(Box<Frame>),
    Error(String),
    #[strum(serialize = "isprotected")]
    IsProtected(bool),
    #[strum(serialize = "checkpassword")]
    CheckPassword(String),
    Global(String),
    Connection { userid: String },
    Disconnection { userid: String },
    ConnectedUsers(BTreeMap<String, String>),
    Ping,
}

impl ServerEvent {
    pub fn name(&self) -> &'static str { self.into() }

    pub fn parse(s: &str) -> Result<Self, ProtocolError> { Self::decode(&WireMessage::parse(s)?) }

    pub fn decode(msg: &WireMessage) -> Result<Self, ProtocolError> {
        use ServerEvent::*;
        let userid = || msg.userid.clone().unwrap_or_default();
        Ok(match msg.event.as_str() {
            "keydown" => Keydown(msg.value()?),
            "add_stone" => AddStone { coord: msg.value()?, color: msg.stone_color()? },
            "remove_stone" => RemoveStone(msg.value()?),
            "pass" => Pass(msg.stone_color()?),
            "triangle" => Triangle(msg.value()?),
            "square" => Square(msg.value()?),
            "letter" => {
                let v: LetterValue<String> = msg.value()?;
                Letter { coord: v.coords, letter: v.letter }
            }
            "number" => {
                let v: LetterValue<u32> = msg.value()?;
                Number { coord: v.coords, number: v.letter }
            }
            "remove_mark" => RemoveMark(msg.value()?),
            "handshake" => Handshake(self::Handshake::from_value(&msg.event, &msg.value)?),
            "upload_sgf" => UploadSgf(self::Handshake::from_value(&msg.event, &msg.value)?),
            "button" => Button(msg.value()?),
            "goto_grid" => GotoGrid(msg.value()?),
            "goto_coord" => GotoCoord(msg.value()?),
            "trash" => Trash,
            "scissors" => Scissors(msg.value()?),
            "update_buffer" => UpdateBuffer(msg.value()?),
            "update_settings" => UpdateSettings(msg.value()?),
            "draw" => Draw(msg.value()?),
            "erase_pen" => ErasePen,
            "comment" => Comment(msg.value()?),
            "frame" => Frame(Box::new(msg.value()?)),
            "error" => Error(msg.value()?),
            "isprotected" => IsProtected(msg.value::<Option<bool>>()?.unwrap_or(false)),
            "checkpassword" => CheckPassword(msg.value::<Option<String>>()?.unwrap_or_default()),
            "global" => Global(msg.value()?),
            "connection" => Connection { userid: userid() },
            "disconnection" => Disconnection { userid: userid() },
            "connected_users" => ConnectedUsers(msg.value::<Option<_>>()?.unwrap_or_default()),
            "ping" => Ping,
            other => return Err(ProtocolError::UnknownEvent(other.to_owned())),
        })
    }
}

#[derive(Clone, PartialEq, Debug, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ClientEvent {
    Keydown(NavKey),
    AddStone { coord: Coord, color: Color },
    RemoveStone(Coord),
    Pass(Color),
    Triangle(Coord),
    Square(Coord),
    Letter { coord: Coord, letter: String },
    Number { coord: Coord, number: u32 },
    RemoveMark(Coord),
    Button(Button),
    GotoGrid(NodeId),
    GotoCoord(Coord),
    Trash,
    Scissors(NodeId),
    UpdateBuffer(i64),
    UpdateSettings(ReviewSettings),
    Draw(PenStroke),
    ErasePen,
    Comment(String),
    // Base64 of the record text.
    UploadSgf(String),
    RequestSgf(String),
    LinkOgsGame(String),
    #[strum(serialize = "isprotected")]
    IsProtected,
    #[strum(serialize = "checkpassword")]
    CheckPassword(String),
    Ping,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str { self.into() }

    pub fn upload_sgf(text: &str) -> Self { ClientEvent::UploadSgf(BASE64.encode(text)) }

    // Events that still go through while a modal dialog is open.
    pub fn allowed_while_modal_open(&self) -> bool {
        use ClientEvent::*;
        matches!(
            self,
            Trash | UpdateSettings(_) | Scissors(_) | UploadSgf(_) | RequestSgf(_) | LinkOgsGame(_) | CheckPassword(_)
        )
    }

    pub fn to_wire(&self) -> WireMessage {
        use ClientEvent::*;
        let point = |c: &Coord| json!([c.x, c.y]);
        let mut msg = WireMessage::new(self.name(), Value::Null);
        match self {
            Keydown(key) => msg.value = json!(key),
            AddStone { coord, color } => {
                msg.value = point(coord);
                msg.color = Some(color.to_code());
            }
            Pass(color) => msg.color = Some(color.to_code()),
            RemoveStone(c) | Triangle(c) | Square(c) | RemoveMark(c) | GotoCoord(c) => msg.value = point(c),
            Letter { coord, letter } => msg.value = json!({"coords": point(coord), "letter": letter}),
            Number { coord, number } => msg.value = json!({"coords": point(coord), "number": number}),
            Button(button) => msg.value = json!(button),
            GotoGrid(id) | Scissors(id) => msg.value = json!(id),
            Trash => msg.value = json!("all"),
            UpdateBuffer(ms) => msg.value = json!(ms),
            UpdateSettings(settings) => msg.value = json!(settings),
            Draw(stroke) => msg.value = json!(stroke),
            Comment(s) | UploadSgf(s) | RequestSgf(s) | LinkOgsGame(s) | CheckPassword(s) => msg.value = json!(s),
            ErasePen | IsProtected | Ping => {}
        }
        msg
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn decode_add_stone() {
        let event = ServerEvent::parse(r#"{"event": "add_stone", "value": [3, 4], "color": 2}"#).unwrap();
        assert_eq!(event, ServerEvent::AddStone { coord: RawCoord(3, 4), color: Color::White });
        let err = ServerEvent::parse(r#"{"event": "add_stone", "value": [3, 4], "color": 0}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { .. }));
    }

    #[test]
    fn unknown_event_is_distinct() {
        assert_eq!(
            ServerEvent::parse(r#"{"event": "teleport", "value": 1}"#),
            Err(ProtocolError::UnknownEvent("teleport".to_owned()))
        );
        assert!(matches!(ServerEvent::parse("{not json"), Err(ProtocolError::MalformedJson(_))));
    }

    #[test]
    fn handshake_as_string() {
        let inner = r#"{"sgf": "", "loc": "0,1", "prefs": {"0": 1}, "buffer": 250, "next_index": 7}"#;
        let msg = WireMessage::new("handshake", Value::String(inner.to_owned()));
        let ServerEvent::Handshake(h) = ServerEvent::decode(&msg).unwrap() else {
            panic!("expected handshake");
        };
        assert_eq!(h.location(), vec![0, 1]);
        assert_eq!(h.prefs(), BTreeMap::from([(NodeId(0), 1)]));
        assert_eq!(h.next_index, 7);
    }

    #[test]
    fn handshake_record_may_be_base64() {
        let h = Handshake { sgf: BASE64.encode("(;GM[1]SZ[9])"), ..Default::default() };
        assert_eq!(h.sgf_text().unwrap(), "(;GM[1]SZ[9])");
        let h = Handshake { sgf: "(;SZ[9])".to_owned(), ..Default::default() };
        assert_eq!(h.sgf_text().unwrap(), "(;SZ[9])");
    }

    #[test]
    fn client_events_encode() {
        let msg = ClientEvent::AddStone { coord: Coord::new(1, 2), color: Color::Black }.to_wire();
        assert_eq!(msg.to_json(), r#"{"event":"add_stone","value":[1,2],"color":1}"#);
        let msg = ClientEvent::Letter { coord: Coord::new(0, 0), letter: "A".to_owned() }.to_wire();
        assert_eq!(msg.value, json!({"coords": [0, 0], "letter": "A"}));
        assert_eq!(ClientEvent::CheckPassword(String::new()).name(), "checkpassword");
        assert_eq!(ClientEvent::ErasePen.to_wire().to_json(), r#"{"event":"erase_pen"}"#);
    }

    #[test]
    fn encoded_events_decode_back() {
        for event in [
            ClientEvent::Number { coord: Coord::new(5, 6), number: 3 },
            ClientEvent::Draw(PenStroke::decode("-1:-1:0.5:0.5:#000").unwrap()),
            ClientEvent::Scissors(NodeId(4)),
            ClientEvent::Keydown(NavKey::ArrowUp),
        ] {
            let msg = event.to_wire();
            assert!(ServerEvent::decode(&msg).is_ok(), "{msg:?}");
        }
    }

    #[test]
    fn modal_allow_list() {
        assert!(ClientEvent::Trash.allowed_while_modal_open());
        assert!(ClientEvent::CheckPassword("x".to_owned()).allowed_while_modal_open());
        assert!(!ClientEvent::Pass(Color::Black).allowed_while_modal_open());
        assert!(!ClientEvent::Ping.allowed_while_modal_open());
    }
}
