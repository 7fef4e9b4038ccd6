use std::io::{Read, Write};

use crate::error::TransportError;
use crate::message::Message;

/// Maximum frame body size accepted on decode, guarding against a
/// misbehaving peer claiming an unbounded length prefix.
pub const MAX_FRAME_BYTES: u32 = 64 * 1024 * 1024;

/// Write one length-prefixed JSON frame: a `u32` big-endian byte count
/// followed by that many bytes of `{"tag": ..., "args": [...]}`.
pub fn write_frame<W: Write>(w: &mut W, msg: &Message) -> Result<(), TransportError> {
    let body = serde_json::to_vec(&msg.to_json_body())?;
    let len = body.len() as u32;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(&body)?;
    w.flush()?;
    Ok(())
}

/// Read one length-prefixed JSON frame and validate it against the tag's
/// registered schema.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Message, TransportError> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_BYTES {
        return Err(TransportError::Protocol(format!(
            "frame length {len} exceeds maximum {MAX_FRAME_BYTES}"
        )));
    }
    let mut body = vec![0u8; len as usize];
    r.read_exact(&mut body)?;
    let json = serde_json::from_slice(&body)?;
    Message::from_json_body(json)
}

/// A frame carrying an opaque `u64` routing prefix ahead of the JSON body,
/// used by REQ/REP and ROUTER/DEALER to correlate a reply with the
/// connection that sent the request without the message schema itself
/// needing to carry connection identity.
pub fn write_routed_frame<W: Write>(
    w: &mut W,
    routing_prefix: u64,
    msg: &Message,
) -> Result<(), TransportError> {
    w.write_all(&routing_prefix.to_be_bytes())?;
    write_frame(w, msg)
}

pub fn read_routed_frame<R: Read>(r: &mut R) -> Result<(u64, Message), TransportError> {
    let mut prefix_buf = [0u8; 8];
    r.read_exact(&mut prefix_buf)?;
    let routing_prefix = u64::from_be_bytes(prefix_buf);
    let msg = read_frame(r)?;
    Ok((routing_prefix, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::io::Cursor;

    #[test]
    fn frame_round_trips_through_a_byte_buffer() {
        let msg = Message::new("BUILD", vec![Value::Str("numpy".into()), Value::Str("1.26.0".into())]).unwrap();
        let mut buf = Vec::new();
        write_frame(&mut buf, &msg).unwrap();

        let mut cursor = Cursor::new(buf);
        let decoded = read_frame(&mut cursor).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn routed_frame_carries_the_prefix_separately_from_the_body() {
        let msg = Message::bare("BYE").unwrap();
        let mut buf = Vec::new();
        write_routed_frame(&mut buf, 42, &msg).unwrap();

        let mut cursor = Cursor::new(buf);
        let (prefix, decoded) = read_routed_frame(&mut cursor).unwrap();
        assert_eq!(prefix, 42);
        assert_eq!(decoded, msg);
    }

    #[test]
    fn oversized_length_prefix_is_rejected_before_allocating() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(MAX_FRAME_BYTES + 1).to_be_bytes());
        let mut cursor = Cursor::new(buf);
        let err = read_frame(&mut cursor).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }
}
