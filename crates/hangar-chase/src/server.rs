use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;

use hangar_config::Config;
use hangar_oracle::OracleClient;
use hangar_transport::push_pull::PushChannel;
use hangar_transport::req_rep::serve_loop;
use hangar_transport::value::Value;
use hangar_transport::Message;

use crate::error::ChaseError;
use crate::protocol::{handle_import, handle_remove, parse_rebuild};

/// Where IMPORT reads artifact files from, and which bind address the admin
/// listener is allowed to serve on. `addr` must be loopback: CHASE is a
/// local-operator endpoint, never a builder-facing one.
#[derive(Debug, Clone)]
pub struct ChaseOptions {
    pub addr: std::net::SocketAddr,
    pub packages_dir: PathBuf,
}

impl ChaseOptions {
    pub fn from_config(config: &Config) -> Self {
        ChaseOptions {
            addr: config.sockets.admin,
            packages_dir: config.output.path.join("packages"),
        }
    }
}

/// Bind the admin listener and serve forever, refusing any connection whose
/// peer address is not loopback. Returns only on a bind failure.
pub fn run(options: ChaseOptions, oracle: OracleClient, secretary_push: PushChannel) -> Result<(), ChaseError> {
    if !options.addr.ip().is_loopback() {
        tracing::error!(addr = %options.addr, "refusing to bind chase to a non-loopback address");
        return Err(ChaseError::NonLoopbackPeer(options.addr));
    }

    let listener = TcpListener::bind(options.addr)?;
    tracing::info!(addr = %options.addr, "chase admin listener bound");

    for incoming in listener.incoming() {
        let stream = incoming?;
        match stream.peer_addr() {
            Ok(peer) if peer.ip().is_loopback() => {}
            Ok(peer) => {
                tracing::error!(%peer, "refusing admin connection from non-loopback peer");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read peer address, refusing connection");
                continue;
            }
        }

        let oracle = oracle.clone();
        let secretary_push = secretary_push.clone();
        let packages_dir = options.packages_dir.clone();
        std::thread::Builder::new()
            .name("hangar-chase-conn".into())
            .spawn(move || {
                if let Err(e) = accept_connection(stream, &oracle, &secretary_push, &packages_dir) {
                    tracing::warn!(error = %e, "chase connection ended with an error");
                }
            })
            .expect("failed to spawn chase connection thread");
    }

    Ok(())
}

fn accept_connection(
    stream: TcpStream,
    oracle: &OracleClient,
    secretary_push: &PushChannel,
    packages_dir: &PathBuf,
) -> Result<(), hangar_transport::TransportError> {
    serve_loop(stream, |message| {
        let reply = match dispatch(oracle, secretary_push, packages_dir, &message) {
            Ok(()) => Message::bare("DONE")?,
            Err(e) => {
                tracing::warn!(error = %e, tag = %message.tag, "chase request failed");
                Message::new("ERROR", vec![Value::Str(e.to_string())])?
            }
        };
        Ok(Some(reply))
    })
}

fn dispatch(
    oracle: &OracleClient,
    secretary_push: &PushChannel,
    packages_dir: &PathBuf,
    message: &Message,
) -> Result<(), ChaseError> {
    match (message.tag.as_str(), message.args.as_slice()) {
        ("IMPORT", [Value::Str(package), Value::Str(version), Value::Str(abi), Value::Bool(success), Value::Str(output), Value::List(files)]) => {
            let filenames = files
                .iter()
                .map(|v| match v {
                    Value::Str(s) => Ok(s.clone()),
                    _ => Err(ChaseError::BadRequest("IMPORT file list must contain strings".into())),
                })
                .collect::<Result<Vec<_>, _>>()?;
            handle_import(oracle, packages_dir, package.clone(), version.clone(), abi.clone(), *success, output.clone(), filenames)
        }
        ("REMOVE", [Value::Str(package), Value::Str(version), Value::Bool(skip)]) => {
            handle_remove(oracle, package.clone(), version.clone(), *skip)
        }
        ("REBUILD", [Value::Str(package), Value::Str(command)]) => {
            // Validate, but forward the original label: DRIVER's own RENDER
            // pushes already use "Home"/"Search"/"Project"/"Both" verbatim.
            parse_rebuild(package, command)?;
            let render = Message::new("RENDER", vec![Value::Str(package.clone()), Value::Str(command.clone())])?;
            secretary_push.push(render)?;
            Ok(())
        }
        (tag, _) => Err(ChaseError::BadRequest(format!("unrecognized admin request: {tag}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_from_config_use_the_admin_socket_and_output_path() {
        let config = Config::default();
        let options = ChaseOptions::from_config(&config);
        assert_eq!(options.addr, config.sockets.admin);
        assert_eq!(options.packages_dir, config.output.path.join("packages"));
        assert!(options.addr.ip().is_loopback());
    }
}
