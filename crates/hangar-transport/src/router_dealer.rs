//! ROUTER/DEALER: asynchronous, multi-party messaging with several requests
//! in flight at once. Used for file-chunk transfer (JUGGLER) and ORACLE's
//! worker fan-out.

use std::collections::HashMap;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::message::Message;

/// A table of live connections keyed by routing prefix, each with its own
/// outbound channel. The owning task drains a single shared inbound channel
/// and looks up `connections` to route replies back.
pub struct RouterDealer {
    connections: Mutex<HashMap<u64, mpsc::Sender<Message>>>,
    next_prefix: Mutex<u64>,
}

impl RouterDealer {
    pub fn new() -> Arc<RouterDealer> {
        Arc::new(RouterDealer {
            connections: Mutex::new(HashMap::new()),
            next_prefix: Mutex::new(1),
        })
    }

    /// Register a new connection and get back its routing prefix plus the
    /// receiving half the connection's I/O thread should drain.
    pub fn register(&self) -> (u64, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel();
        let mut prefix_guard = self.next_prefix.lock().unwrap();
        let prefix = *prefix_guard;
        *prefix_guard += 1;
        self.connections.lock().unwrap().insert(prefix, tx);
        (prefix, rx)
    }

    pub fn deregister(&self, routing_prefix: u64) {
        self.connections.lock().unwrap().remove(&routing_prefix);
    }

    /// Deliver `msg` to the connection identified by `routing_prefix`. A
    /// missing or disconnected connection is reported, not silently dropped,
    /// so the caller (e.g. JUGGLER retrying a `FETCH`) can react.
    pub fn send_to(&self, routing_prefix: u64, msg: Message) -> Result<(), TransportError> {
        let connections = self.connections.lock().unwrap();
        let sender = connections
            .get(&routing_prefix)
            .ok_or_else(|| TransportError::Protocol(format!("no connection for routing prefix {routing_prefix}")))?;
        sender
            .send(msg)
            .map_err(|_| TransportError::Disconnected)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn register_assigns_distinct_increasing_prefixes() {
        let table = RouterDealer::new();
        let (p1, _rx1) = table.register();
        let (p2, _rx2) = table.register();
        assert_ne!(p1, p2);
        assert_eq!(table.connection_count(), 2);
    }

    #[test]
    fn send_to_delivers_on_the_registered_channel() {
        let table = RouterDealer::new();
        let (prefix, rx) = table.register();
        table
            .send_to(prefix, Message::new("FETCH", vec![Value::Int(0), Value::Int(4096)]).unwrap())
            .unwrap();
        let received = rx.recv().unwrap();
        assert_eq!(received.tag, "FETCH");
    }

    #[test]
    fn send_to_unknown_prefix_is_an_error() {
        let table = RouterDealer::new();
        let err = table.send_to(999, Message::bare("SENT").unwrap()).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[test]
    fn deregister_removes_the_connection() {
        let table = RouterDealer::new();
        let (prefix, _rx) = table.register();
        table.deregister(prefix);
        assert_eq!(table.connection_count(), 0);
        assert!(table.send_to(prefix, Message::bare("SENT").unwrap()).is_err());
    }
}
