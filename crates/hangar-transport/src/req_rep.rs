//! REQ/REP: strict alternating request/reply, correlated by a routing
//! prefix the substrate assigns per connection. Used builder↔DRIVER and
//! admin↔CHASE.

use std::net::TcpStream;

use crate::error::TransportError;
use crate::frame::{read_frame, write_frame};
use crate::message::Message;

/// One REQ-side connection: send a request, block for exactly one reply.
/// Mirrors the half of the builder protocol a builder process drives.
pub struct ReqClient {
    stream: TcpStream,
}

impl ReqClient {
    pub fn connect(addr: impl std::net::ToSocketAddrs) -> Result<ReqClient, TransportError> {
        let stream = TcpStream::connect(addr)?;
        Ok(ReqClient { stream })
    }

    pub fn request(&mut self, msg: &Message) -> Result<Message, TransportError> {
        write_frame(&mut self.stream, msg)?;
        read_frame(&mut self.stream)
    }

    pub fn set_read_timeout(&mut self, timeout: Option<std::time::Duration>) -> Result<(), TransportError> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }
}

/// One REP-side connection: read exactly one request, hand it to `handler`,
/// write back exactly one reply. The caller loops this per accepted
/// connection (typically one thread per builder session, matching the
/// thread-per-task model the rest of the master uses).
pub fn serve_one<F>(mut stream: TcpStream, mut handler: F) -> Result<(), TransportError>
where
    F: FnMut(Message) -> Result<Message, TransportError>,
{
    let request = read_frame(&mut stream)?;
    let reply = handler(request)?;
    write_frame(&mut stream, &reply)
}

/// Read-and-reply in a loop until the peer disconnects or `handler` asks to
/// stop by returning `Ok(None)`. This is the shape DRIVER's per-session loop
/// and CHASE's admin loop both use.
pub fn serve_loop<F>(mut stream: TcpStream, mut handler: F) -> Result<(), TransportError>
where
    F: FnMut(Message) -> Result<Option<Message>, TransportError>,
{
    loop {
        let request = match read_frame(&mut stream) {
            Ok(msg) => msg,
            Err(TransportError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                tracing::debug!("peer closed connection");
                return Ok(());
            }
            Err(e) => {
                tracing::warn!(error = %e, "frame read failed");
                return Err(e);
            }
        };
        tracing::trace!(tag = %request.tag, "received request");
        match handler(request)? {
            Some(reply) => write_frame(&mut stream, &reply)?,
            None => return Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn request_reply_round_trips_over_a_real_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            serve_one(stream, |req| {
                assert_eq!(req.tag, "BUILD");
                Message::bare("CONT")
            })
            .unwrap();
        });

        let mut client = ReqClient::connect(addr).unwrap();
        let reply = client
            .request(&Message::new("BUILD", vec![Value::Str("numpy".into()), Value::Str("1.26.0".into())]).unwrap())
            .unwrap();
        assert_eq!(reply.tag, "CONT");

        server.join().unwrap();
    }
}
