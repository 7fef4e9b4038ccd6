use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};

use hangar_config::Config;
use hangar_transport::message::{decode_payload, encode_payload};
use hangar_transport::push_pull::PullChannel;
use hangar_transport::req_rep::serve_loop;
use hangar_transport::value::Value;
use hangar_transport::{Message, TransportError};
use hangar_types::FarmStatus;

use crate::error::SupervisorError;

#[derive(Debug, Clone)]
pub struct StatusOptions {
    pub addr: std::net::SocketAddr,
}

impl StatusOptions {
    pub fn from_config(config: &Config) -> Self {
        StatusOptions { addr: config.sockets.status }
    }
}

/// Drain BIG_BRO's `STATUS` pushes into a shared cache forever. Runs on its
/// own thread; returns once the sender side is dropped.
pub fn drain_into_cache(status_pull: PullChannel, cache: Arc<Mutex<FarmStatus>>) {
    loop {
        match status_pull.pull() {
            Ok(message) if message.tag == "STATUS" => {
                if let Some(Value::Str(_)) = message.args.first() {
                    match decode_payload::<FarmStatus>(&message.args[0]) {
                        Ok(status) => *cache.lock().unwrap() = status,
                        Err(e) => tracing::warn!(error = %e, "failed to decode a published farm status"),
                    }
                }
            }
            Ok(_) => {}
            Err(TransportError::Disconnected) => return,
        }
    }
}

/// Bind the status listener and serve forever: a monitor sends a bare
/// `SUB_HELLO`, gets back the most recently cached [`FarmStatus`]. Loopback
/// only, same posture as the control socket.
pub fn run(options: StatusOptions, cache: Arc<Mutex<FarmStatus>>) -> Result<(), SupervisorError> {
    if !options.addr.ip().is_loopback() {
        tracing::error!(addr = %options.addr, "refusing to bind supervisor status to a non-loopback address");
        return Err(SupervisorError::NonLoopbackPeer(options.addr));
    }

    let listener = TcpListener::bind(options.addr)?;
    tracing::info!(addr = %options.addr, "supervisor status listener bound");

    for incoming in listener.incoming() {
        let stream = incoming?;
        match stream.peer_addr() {
            Ok(peer) if peer.ip().is_loopback() => {}
            Ok(peer) => {
                tracing::error!(%peer, "refusing status connection from non-loopback peer");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read peer address, refusing connection");
                continue;
            }
        }

        let cache = Arc::clone(&cache);
        std::thread::Builder::new()
            .name("hangar-supervisor-status".into())
            .spawn(move || {
                if let Err(e) = accept_connection(stream, &cache) {
                    tracing::warn!(error = %e, "supervisor status connection ended with an error");
                }
            })
            .expect("failed to spawn supervisor status connection thread");
    }

    Ok(())
}

fn accept_connection(stream: TcpStream, cache: &Arc<Mutex<FarmStatus>>) -> Result<(), TransportError> {
    serve_loop(stream, |message| {
        if message.tag != "SUB_HELLO" {
            return Ok(Some(Message::new("ERROR", vec![Value::Str(format!("expected SUB_HELLO, got {}", message.tag))])?));
        }
        let snapshot = cache.lock().unwrap().clone();
        Ok(Some(Message::new("STATUS", vec![encode_payload(&snapshot)])?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_from_config_use_the_status_socket() {
        let config = Config::default();
        let options = StatusOptions::from_config(&config);
        assert_eq!(options.addr, config.sockets.status);
        assert!(options.addr.ip().is_loopback());
    }
}
