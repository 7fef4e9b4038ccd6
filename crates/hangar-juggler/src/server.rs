use std::net::TcpStream;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use hangar_config::Config;
use hangar_transport::frame::{read_frame, write_frame};
use hangar_transport::push_pull::{PullChannel, PushChannel};
use hangar_transport::value::Value;
use hangar_transport::Message;

use crate::error::JugglerError;
use crate::protocol::{handle_chunk, handle_hello, JugglerEvent};
use crate::table::JugglerTable;

/// Pipelining window and chunk size, plus the on-disk root transfers land
/// under (`<output path>/packages`, per §5's "JUGGLER places artifacts in a
/// packages/ subtree").
#[derive(Debug, Clone)]
pub struct JugglerOptions {
    pub window: usize,
    pub chunk_size: u64,
    pub packages_dir: PathBuf,
}

impl JugglerOptions {
    pub fn from_config(config: &Config) -> Self {
        JugglerOptions {
            window: config.transfer.pipeline_depth as usize,
            chunk_size: config.transfer.chunk_size as u64,
            packages_dir: config.output.path.join("packages"),
        }
    }
}

enum JugglerRequest {
    Hello { slave_id: u64 },
    Chunk { slave_id: u64, offset: u64, data: Vec<u8> },
}

struct Envelope {
    request: JugglerRequest,
    reply_tx: mpsc::Sender<Result<Vec<Message>, JugglerError>>,
}

/// A handle connection threads use to submit one request to the single
/// thread owning [`JugglerTable`], mirroring DRIVER's `DriverHandle`.
#[derive(Clone)]
pub struct JugglerHandle {
    sender: mpsc::Sender<Envelope>,
}

impl JugglerHandle {
    fn submit(&self, request: JugglerRequest) -> Result<Vec<Message>, JugglerError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.sender
            .send(Envelope { request, reply_tx })
            .map_err(|_| JugglerError::Transport(hangar_transport::TransportError::Disconnected))?;
        reply_rx.recv().map_err(|_| JugglerError::Transport(hangar_transport::TransportError::Disconnected))?
    }
}

/// Drive one accepted file-socket connection: a `FILE_HELLO` establishes
/// which slave is writing, then `CHUNK`s stream in until the transfer
/// completes or the peer disconnects.
pub fn accept_connection(handle: JugglerHandle, mut stream: TcpStream) -> Result<(), hangar_transport::TransportError> {
    let mut slave_id: Option<u64> = None;
    loop {
        let request = match read_frame(&mut stream) {
            Ok(msg) => msg,
            Err(hangar_transport::TransportError::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let outcome = match (request.tag.as_str(), request.args.as_slice()) {
            ("FILE_HELLO", [Value::Int(id)]) => {
                slave_id = Some(*id as u64);
                handle.submit(JugglerRequest::Hello { slave_id: *id as u64 })
            }
            ("CHUNK", [Value::Int(offset), Value::Bytes(data)]) => match slave_id {
                Some(id) => handle.submit(JugglerRequest::Chunk { slave_id: id, offset: *offset as u64, data: data.clone() }),
                None => Err(JugglerError::NoTransfer(0)),
            },
            _ => Err(JugglerError::Transport(hangar_transport::TransportError::Protocol(format!(
                "unexpected tag on file socket: {}",
                request.tag
            )))),
        };

        match outcome {
            Ok(replies) => {
                for reply in &replies {
                    write_frame(&mut stream, reply)?;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "juggler rejected request");
                return Err(hangar_transport::TransportError::Protocol(e.to_string()));
            }
        }
    }
}

/// Spawn the single thread that owns [`JugglerTable`], processing connection
/// requests plus DRIVER's `EXPECT_FILE` announcements and `ABORT_TRANSFER`
/// notifications, and publishing verification outcomes back to DRIVER.
pub fn spawn(
    options: JugglerOptions,
    expect_pull: PullChannel,
    abort_pull: PullChannel,
    driver_events: PushChannel,
) -> JugglerHandle {
    let (sender, receiver) = mpsc::channel::<Envelope>();
    std::thread::Builder::new()
        .name("hangar-juggler".into())
        .spawn(move || run(receiver, options, expect_pull, abort_pull, driver_events))
        .expect("failed to spawn juggler thread");
    JugglerHandle { sender }
}

fn run(
    receiver: mpsc::Receiver<Envelope>,
    options: JugglerOptions,
    expect_pull: PullChannel,
    abort_pull: PullChannel,
    driver_events: PushChannel,
) {
    let mut table = JugglerTable::new(options.packages_dir.clone());

    loop {
        match receiver.recv_timeout(Duration::from_millis(200)) {
            Ok(envelope) => {
                let outcome = dispatch(&mut table, envelope.request, &driver_events, &options);
                let _ = envelope.reply_tx.send(outcome);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }

        drain_expectations(&mut table, &expect_pull);
        drain_aborts(&mut table, &abort_pull);
    }
}

fn dispatch(
    table: &mut JugglerTable,
    request: JugglerRequest,
    driver_events: &PushChannel,
    options: &JugglerOptions,
) -> Result<Vec<Message>, JugglerError> {
    match request {
        JugglerRequest::Hello { slave_id } => handle_hello(table, slave_id, options.window, options.chunk_size),
        JugglerRequest::Chunk { slave_id, offset, data } => {
            let (replies, event) = handle_chunk(table, slave_id, offset, &data, options.window, options.chunk_size)?;
            if let Some(event) = event {
                notify_driver(driver_events, slave_id, event);
            }
            Ok(replies)
        }
    }
}

fn notify_driver(driver_events: &PushChannel, slave_id: u64, event: JugglerEvent) {
    let message = match event {
        JugglerEvent::Verified(filename) => Message::new("FILE_VERIFIED", vec![Value::Int(slave_id as i64), Value::Str(filename)]),
        JugglerEvent::Rejected(filename) => Message::new("FILE_REJECTED", vec![Value::Int(slave_id as i64), Value::Str(filename)]),
    };
    match message {
        Ok(message) => {
            if let Err(e) = driver_events.push(message) {
                tracing::warn!(error = %e, "failed to notify driver of transfer outcome");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to build transfer outcome message"),
    }
}

fn drain_expectations(table: &mut JugglerTable, expect_pull: &PullChannel) {
    while let Ok(Some(msg)) = expect_pull.try_pull() {
        if let ("EXPECT_FILE", [Value::Int(slave_id), Value::Str(filename), Value::Str(sha256), Value::Int(size)]) =
            (msg.tag.as_str(), msg.args.as_slice())
        {
            table.expect(*slave_id as u64, filename.clone(), sha256.clone(), *size as u64);
        }
    }
}

/// DRIVER pushes `ABORT_TRANSFER` when a builder's session expires with a
/// file still in flight (§4.5): drop the partial transfer rather than leave
/// it orphaned until the builder reconnects, if it ever does.
fn drain_aborts(table: &mut JugglerTable, abort_pull: &PullChannel) {
    while let Ok(Some(msg)) = abort_pull.try_pull() {
        if let ("ABORT_TRANSFER", [Value::Int(slave_id)]) = (msg.tag.as_str(), msg.args.as_slice()) {
            table.abort(*slave_id as u64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_from_config_nest_packages_under_output_path() {
        let config = Config::default();
        let options = JugglerOptions::from_config(&config);
        assert_eq!(options.window, config.transfer.pipeline_depth as usize);
        assert_eq!(options.chunk_size, config.transfer.chunk_size as u64);
        assert_eq!(options.packages_dir, config.output.path.join("packages"));
    }
}
