// Every WebSocket message carries one length-prefixed frame, the same bytes a raw stream would.

use std::io::{self, Cursor};
use std::net::TcpStream;

use anyhow::{Context, anyhow};
use tungstenite::protocol::Role;
use tungstenite::{Message, WebSocket};
use url::Url;

use goban_review::event::ClientEvent;
use goban_review::network as wire;


pub const DEFAULT_PORT: u16 = 80;

#[derive(Debug)]
pub enum CommunicationError {
    Socket(tungstenite::Error),
    Framing(io::Error),
}

pub fn connect(address: &str) -> anyhow::Result<(WebSocket<TcpStream>, WebSocket<TcpStream>)> {
    let url = Url::parse(address).context(format!("Invalid room address '{address}'."))?;
    if url.scheme() != "ws" {
        return Err(anyhow!("Only ws:// addresses are supported, got '{}'", url.scheme()));
    }
    let host = url.host_str().ok_or_else(|| anyhow!("Room address has no host"))?;
    let port = url.port().unwrap_or(DEFAULT_PORT);
    let stream = TcpStream::connect((host, port)).context(format!("Cannot connect to {host}:{port}."))?;
    let (socket_in, _) = tungstenite::client(url.as_str(), stream)
        .map_err(|err| anyhow!("WebSocket handshake failed: {err}"))?;
    let socket_out = clone_websocket(&socket_in, Role::Client)?;
    Ok((socket_in, socket_out))
}

pub fn write_event<S>(socket: &mut WebSocket<S>, event: &ClientEvent) -> Result<(), CommunicationError>
where
    S: io::Read + io::Write,
{
    let mut buf = Vec::new();
    wire::write_event(&mut buf, event).map_err(CommunicationError::Framing)?;
    socket.send(Message::Binary(buf.into())).map_err(CommunicationError::Socket)
}

// Returns the JSON payload of the next data message; decoding is up to `ClientState`.
// Skips control frames. Text frames are accepted without a prefix.
pub fn read_message<S>(socket: &mut WebSocket<S>) -> Result<String, CommunicationError>
where
    S: io::Read + io::Write,
{
    loop {
        let msg = socket.read().map_err(CommunicationError::Socket)?;
        return match msg {
            Message::Binary(data) => {
                wire::read_str(&mut Cursor::new(data.as_ref())).map_err(CommunicationError::Framing)
            }
            Message::Text(text) => Ok(text.as_str().to_owned()),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            Message::Close(_) => Err(CommunicationError::Socket(tungstenite::Error::ConnectionClosed)),
        };
    }
}

// Reads and writes happen on different threads, each owning its half.
pub fn clone_websocket(socket: &WebSocket<TcpStream>, role: Role) -> anyhow::Result<WebSocket<TcpStream>> {
    let stream = socket.get_ref().try_clone()?;
    let config = socket.get_config().clone();
    Ok(WebSocket::from_raw_socket(stream, role, Some(config)))
}
