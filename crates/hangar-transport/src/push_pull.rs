//! PUSH/PULL: one-way fan-out. In-process it is a thin wrapper over
//! `std::sync::mpsc`; crossing a process boundary it is a one-directional
//! stream of length-prefixed frames with no reply expected.

use std::io::Write;
use std::net::TcpStream;
use std::sync::mpsc;

use crate::error::TransportError;
use crate::frame::{read_frame, write_frame};
use crate::message::Message;

#[derive(Clone)]
pub struct PushChannel {
    sender: mpsc::Sender<Message>,
}

pub struct PullChannel {
    receiver: mpsc::Receiver<Message>,
}

/// Create an in-process PUSH/PULL pair, e.g. for SUPERVISOR's control
/// fan-out to each in-process task.
pub fn channel() -> (PushChannel, PullChannel) {
    let (sender, receiver) = mpsc::channel();
    (PushChannel { sender }, PullChannel { receiver })
}

impl PushChannel {
    pub fn push(&self, msg: Message) -> Result<(), TransportError> {
        self.sender.send(msg).map_err(|_| TransportError::Disconnected)
    }
}

impl PullChannel {
    pub fn pull(&self) -> Result<Message, TransportError> {
        self.receiver.recv().map_err(|_| TransportError::Disconnected)
    }

    pub fn try_pull(&self) -> Result<Option<Message>, TransportError> {
        match self.receiver.try_recv() {
            Ok(msg) => Ok(Some(msg)),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(TransportError::Disconnected),
        }
    }
}

/// A one-directional TCP pusher for PUSH/PULL crossing a process boundary
/// (DRIVER → SCRIBE's notification socket, or SUPERVISOR's control socket
/// reaching a separately-launched process).
pub struct TcpPusher {
    stream: TcpStream,
}

impl TcpPusher {
    pub fn connect(addr: impl std::net::ToSocketAddrs) -> Result<TcpPusher, TransportError> {
        Ok(TcpPusher {
            stream: TcpStream::connect(addr)?,
        })
    }

    pub fn push(&mut self, msg: &Message) -> Result<(), TransportError> {
        write_frame(&mut self.stream, msg)
    }
}

impl Write for TcpPusher {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf)
    }
    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}

/// Read pushed frames off an accepted TCP connection until the peer closes
/// it, handing each one to `on_message`.
pub fn pull_loop<F>(mut stream: TcpStream, mut on_message: F) -> Result<(), TransportError>
where
    F: FnMut(Message),
{
    loop {
        match read_frame(&mut stream) {
            Ok(msg) => on_message(msg),
            Err(TransportError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_process_push_pull_delivers_in_order() {
        let (push, pull) = channel();
        push.push(Message::bare("SLEEP").unwrap()).unwrap();
        push.push(Message::bare("DIE").unwrap()).unwrap();

        assert_eq!(pull.pull().unwrap().tag, "SLEEP");
        assert_eq!(pull.pull().unwrap().tag, "DIE");
    }

    #[test]
    fn try_pull_is_non_blocking_on_an_empty_channel() {
        let (_push, pull) = channel();
        assert!(pull.try_pull().unwrap().is_none());
    }

    #[test]
    fn pull_after_drop_reports_disconnected() {
        let (push, pull) = channel();
        drop(push);
        assert!(matches!(pull.pull(), Err(TransportError::Disconnected)));
    }
}
