use thiserror::Error;

use crate::coord::Coord;
use crate::tree::NodeId;


#[macro_export]
macro_rules! internal_error_message {
    () => {
        format!("Internal error at {}:{}.", file!(), line!())
    };
    ($($arg:tt)+) => {
        format!("Internal error at {}:{}: {}.", file!(), line!(), format!($($arg)*))
    };
}

// Inbound data that does not match the wire protocol.
#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    MalformedJson(String),
    #[error("unknown event: {0:?}")]
    UnknownEvent(String),
    #[error("invalid value for {event:?}: {reason}")]
    InvalidValue { event: String, reason: String },
    #[error("cannot read game record: {0}")]
    Sgf(String),
}

impl ProtocolError {
    pub fn invalid_value(event: &str, reason: impl ToString) -> Self {
        ProtocolError::InvalidValue { event: event.to_owned(), reason: reason.to_string() }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum PlaceError {
    #[error("{0:?} is outside the board")]
    OutOfBounds(Coord),
    #[error("{0:?} is occupied")]
    Occupied(Coord),
    #[error("playing at {0:?} is suicide")]
    Suicide(Coord),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum CutError {
    #[error("cannot cut the root")]
    Root,
    #[error("node {0} does not exist")]
    UnknownNode(NodeId),
    #[error("cannot cut node {node}: current node {current} is inside its subtree")]
    CurrentInSubtree { node: NodeId, current: NodeId },
}

#[derive(Clone, PartialEq, Eq, Debug, Error)]
pub enum EventError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("server returned error: {0}")]
    ServerReturnedError(String),
}
