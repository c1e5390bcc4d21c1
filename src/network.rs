// Message framing: a 4-byte little-endian length followed by the UTF-8 JSON payload.

use std::io;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::ProtocolError;
use crate::event::{ClientEvent, ServerEvent, WireMessage};


// Anything bigger is treated as a corrupted stream. Game records of long reviews stay well below.
pub const MAX_MESSAGE_LEN: u32 = 16 << 20;

pub fn length_prefix(len: usize) -> [u8; 4] {
    let mut buf = [0u8; 4];
    LittleEndian::write_u32(&mut buf, len as u32);
    buf
}

pub fn write_str(writer: &mut impl io::Write, data: &str) -> io::Result<()> {
    writer.write_all(&length_prefix(data.len()))?;
    writer.write_all(data.as_bytes())?;
    Ok(())
}

pub fn read_str(reader: &mut impl io::Read) -> io::Result<String> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf)?;
    let len = LittleEndian::read_u32(&len_buf);
    if len > MAX_MESSAGE_LEN {
        return Err(io::Error::new(io::ErrorKind::InvalidData, format!("message too long: {len} bytes")));
    }
    let mut content_buf = vec![0; len as usize];
    reader.read_exact(&mut content_buf)?;
    String::from_utf8(content_buf).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

pub fn write_event(writer: &mut impl io::Write, event: &ClientEvent) -> io::Result<()> {
    write_str(writer, &event.to_wire().to_json())
}

// Returns the outer error for transport failures and the inner one for undecodable content.
pub fn read_event(reader: &mut impl io::Read) -> io::Result<Result<ServerEvent, ProtocolError>> {
    let s = read_str(reader)?;
    Ok(parse_event(&s))
}

pub fn parse_event(s: &str) -> Result<ServerEvent, ProtocolError> {
    ServerEvent::decode(&WireMessage::parse(s)?)
}
