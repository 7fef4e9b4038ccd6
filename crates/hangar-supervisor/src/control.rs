use std::net::{TcpListener, TcpStream};

use hangar_config::Config;
use hangar_transport::req_rep::serve_loop;
use hangar_transport::value::Value;
use hangar_transport::Message;

use crate::error::SupervisorError;
use crate::registry::TaskRegistry;

#[derive(Debug, Clone)]
pub struct ControlOptions {
    pub addr: std::net::SocketAddr,
}

impl ControlOptions {
    pub fn from_config(config: &Config) -> Self {
        ControlOptions { addr: config.sockets.control }
    }
}

/// Bind the control listener and serve forever, refusing any connection
/// whose peer address isn't loopback — the same posture CHASE's admin
/// socket uses, since both are operator-only endpoints.
pub fn run(options: ControlOptions, registry: TaskRegistry) -> Result<(), SupervisorError> {
    if !options.addr.ip().is_loopback() {
        tracing::error!(addr = %options.addr, "refusing to bind supervisor control to a non-loopback address");
        return Err(SupervisorError::NonLoopbackPeer(options.addr));
    }

    let listener = TcpListener::bind(options.addr)?;
    tracing::info!(addr = %options.addr, "supervisor control listener bound");

    for incoming in listener.incoming() {
        let stream = incoming?;
        match stream.peer_addr() {
            Ok(peer) if peer.ip().is_loopback() => {}
            Ok(peer) => {
                tracing::error!(%peer, "refusing control connection from non-loopback peer");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read peer address, refusing connection");
                continue;
            }
        }

        let registry = registry.clone();
        std::thread::Builder::new()
            .name("hangar-supervisor-conn".into())
            .spawn(move || {
                if let Err(e) = accept_connection(stream, &registry) {
                    tracing::warn!(error = %e, "supervisor control connection ended with an error");
                }
            })
            .expect("failed to spawn supervisor control connection thread");
    }

    Ok(())
}

fn accept_connection(stream: TcpStream, registry: &TaskRegistry) -> Result<(), hangar_transport::TransportError> {
    serve_loop(stream, |message| {
        let reply = match dispatch(registry, &message) {
            Ok(()) => Message::bare("DONE")?,
            Err(e) => {
                tracing::warn!(error = %e, tag = %message.tag, "supervisor control request failed");
                Message::new("ERROR", vec![Value::Str(e.to_string())])?
            }
        };
        Ok(Some(reply))
    })
}

fn dispatch(registry: &TaskRegistry, message: &Message) -> Result<(), SupervisorError> {
    match (message.tag.as_str(), message.args.as_slice()) {
        ("PAUSE", []) => registry.pause(),
        ("RESUME", []) => registry.resume(),
        ("QUIT", []) => registry.quit(),
        ("KILL", [Value::Str(slave_id)]) => {
            let slave_id = slave_id.parse::<u64>().map_err(|_| SupervisorError::BadRequest(format!("invalid slave id {slave_id:?}")))?;
            registry.kill(slave_id)
        }
        (tag, _) => Err(SupervisorError::BadRequest(format!("unrecognized control request: {tag}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_from_config_use_the_control_socket() {
        let config = Config::default();
        let options = ControlOptions::from_config(&config);
        assert_eq!(options.addr, config.sockets.control);
        assert!(options.addr.ip().is_loopback());
    }
}
