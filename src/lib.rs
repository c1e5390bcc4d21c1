#![forbid(unsafe_code)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub mod board;
pub mod client;
pub mod color;
pub mod coord;
pub mod error;
pub mod event;
pub mod frame;
pub mod game_info;
pub mod grid;
pub mod keepalive;
pub mod marks;
pub mod minimap;
pub mod network;
pub mod pen;
pub mod review;
pub mod sgf;
pub mod test_util;
pub mod tree;
pub mod turn;
