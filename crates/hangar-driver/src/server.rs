use std::net::TcpStream;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use hangar_oracle::OracleClient;
use hangar_transport::message::decode_payload;
use hangar_transport::push_pull::{PullChannel, PushChannel};
use hangar_transport::req_rep::serve_loop;
use hangar_transport::value::Value;
use hangar_transport::Message;
use hangar_types::PendingQueueSnapshot;

use crate::error::DriverError;
use crate::protocol::{handle_built, handle_busy, handle_bye, handle_hello, handle_idle, handle_sent};
use crate::state::DriverState;

struct DriverRequest {
    slave_id: Option<u64>,
    message: Message,
    reply_tx: mpsc::Sender<Result<(Option<u64>, Message), DriverError>>,
}

/// A handle connection-acceptor threads use to submit one request to the
/// single thread that owns [`DriverState`], and block for its reply. This is
/// the same "one mpsc channel into a state-owning thread" shape ORACLE's
/// load balancer uses for database workers.
#[derive(Clone)]
pub struct DriverHandle {
    sender: mpsc::Sender<DriverRequest>,
}

impl DriverHandle {
    pub fn submit(&self, slave_id: Option<u64>, message: Message) -> Result<(Option<u64>, Message), DriverError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.sender
            .send(DriverRequest { slave_id, message, reply_tx })
            .map_err(|_| DriverError::Transport(hangar_transport::TransportError::Disconnected))?;
        reply_rx.recv().map_err(|_| DriverError::Transport(hangar_transport::TransportError::Disconnected))?
    }
}

/// Drive one accepted builder connection until it sends BYE or disconnects.
/// Each connection gets its own thread; all of them funnel through
/// [`DriverHandle::submit`] into the single state-owning thread.
pub fn accept_connection(handle: DriverHandle, stream: TcpStream) -> Result<(), hangar_transport::TransportError> {
    let mut slave_id: Option<u64> = None;
    serve_loop(stream, move |msg| {
        let is_bye = msg.tag == "BYE";
        match handle.submit(slave_id, msg) {
            Ok((id, reply)) => {
                slave_id = id;
                if is_bye {
                    Ok(None)
                } else {
                    Ok(Some(reply))
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "driver rejected request");
                Err(hangar_transport::TransportError::Protocol(e.to_string()))
            }
        }
    })
}

/// Spawn the single thread that owns [`DriverState`] and processes requests
/// from every connection plus ARCH's queue updates and JUGGLER's file
/// verification signals. Returns a [`DriverHandle`] connection threads use.
pub fn spawn(
    oracle: OracleClient,
    queue_pull: PullChannel,
    file_events_pull: PullChannel,
    secretary_push: PushChannel,
    juggler_expect_push: PushChannel,
    juggler_abort_push: PushChannel,
    upstream_url: String,
    shutdown_grace: Duration,
) -> DriverHandle {
    let (sender, receiver) = mpsc::channel::<DriverRequest>();
    std::thread::Builder::new()
        .name("hangar-driver".into())
        .spawn(move || {
            run(
                receiver,
                oracle,
                queue_pull,
                file_events_pull,
                secretary_push,
                juggler_expect_push,
                juggler_abort_push,
                upstream_url,
                shutdown_grace,
            )
        })
        .expect("failed to spawn driver thread");
    DriverHandle { sender }
}

fn run(
    receiver: mpsc::Receiver<DriverRequest>,
    oracle: OracleClient,
    queue_pull: PullChannel,
    file_events_pull: PullChannel,
    secretary_push: PushChannel,
    juggler_expect_push: PushChannel,
    juggler_abort_push: PushChannel,
    upstream_url: String,
    shutdown_grace: Duration,
) {
    let mut state = DriverState::new(upstream_url);
    let mut shutdown_deadline: Option<Instant> = None;

    loop {
        match receiver.recv_timeout(Duration::from_millis(200)) {
            Ok(request) => {
                let outcome = dispatch(&mut state, &oracle, &secretary_push, &juggler_expect_push, request.slave_id, request.message);
                let _ = request.reply_tx.send(outcome);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        }

        drain_queue_updates(&mut state, &queue_pull);
        drain_file_events(&mut state, &file_events_pull);
        sweep_expired(&mut state, &juggler_abort_push);

        if state.shutting_down {
            let deadline = *shutdown_deadline.get_or_insert_with(|| Instant::now() + shutdown_grace);
            if state.sessions.is_empty() || Instant::now() >= deadline {
                tracing::info!(remaining = state.sessions.len(), "driver completing graceful shutdown");
                return;
            }
        }
    }
}

fn dispatch(
    state: &mut DriverState,
    oracle: &OracleClient,
    secretary: &PushChannel,
    juggler_expect: &PushChannel,
    slave_id: Option<u64>,
    message: Message,
) -> Result<(Option<u64>, Message), DriverError> {
    match message.tag.as_str() {
        "HELLO" => {
            let (id, reply) = handle_hello(state, &message.args)?;
            Ok((Some(id), reply))
        }
        "IDLE" => {
            let id = slave_id.ok_or(DriverError::UnknownSlave(0))?;
            Ok((Some(id), handle_idle(state, id, &message.args)?))
        }
        "BUSY" => {
            let id = slave_id.ok_or(DriverError::UnknownSlave(0))?;
            Ok((Some(id), handle_busy(state, id, &message.args)?))
        }
        "BUILT" => {
            let id = slave_id.ok_or(DriverError::UnknownSlave(0))?;
            let (reply, files) = handle_built(state, oracle, id, &message.args)?;
            for file in files {
                let expect = Message::new(
                    "EXPECT_FILE",
                    vec![Value::Int(id as i64), Value::Str(file.filename), Value::Str(file.sha256), Value::Int(file.size as i64)],
                )?;
                if let Err(e) = juggler_expect.push(expect) {
                    tracing::warn!(error = %e, "failed to announce expected file to juggler");
                }
            }
            Ok((Some(id), reply))
        }
        "SENT" => {
            let id = slave_id.ok_or(DriverError::UnknownSlave(0))?;
            let (reply, rendered_package) = handle_sent(state, oracle, id)?;
            if let Some(package) = rendered_package {
                let render = Message::new("RENDER", vec![Value::Str(package), Value::Str("Both".into())])?;
                if let Err(e) = secretary.push(render) {
                    tracing::warn!(error = %e, "failed to notify secretary of completed build");
                }
            }
            Ok((Some(id), reply))
        }
        "BYE" => {
            if let Some(id) = slave_id {
                handle_bye(state, id);
            }
            Ok((None, Message::bare("BYE")?))
        }
        "STATS" => {
            let count = state.active_slave_count();
            Ok((slave_id, Message::new("STATS_REPLY", vec![Value::Int(count as i64)])?))
        }
        "PAUSE" => {
            state.paused = true;
            Ok((slave_id, Message::bare("DONE")?))
        }
        "RESUME" => {
            state.paused = false;
            Ok((slave_id, Message::bare("DONE")?))
        }
        "QUIT" => {
            state.shutting_down = true;
            Ok((slave_id, Message::bare("DONE")?))
        }
        "KILL" => {
            let target = match message.args.as_slice() {
                [Value::Str(s)] => s.parse::<u64>().map_err(|_| DriverError::UnexpectedMessage { tag: "KILL".into(), state: "any" })?,
                _ => return Err(DriverError::UnexpectedMessage { tag: "KILL".into(), state: "any" }),
            };
            if let Some(session) = state.sessions.get_mut(target) {
                session.kill_armed = true;
            }
            Ok((slave_id, Message::bare("DONE")?))
        }
        other => Err(DriverError::UnexpectedMessage { tag: other.to_string(), state: "any" }),
    }
}

fn drain_queue_updates(state: &mut DriverState, queue_pull: &PullChannel) {
    while let Ok(Some(msg)) = queue_pull.try_pull() {
        if msg.tag != "QUEUE" {
            continue;
        }
        match msg.args.first().map(decode_payload::<PendingQueueSnapshot>) {
            Some(Ok(snapshot)) => state.adopt_queue(snapshot),
            Some(Err(e)) => tracing::warn!(error = %e, "failed to decode queue snapshot from arch"),
            None => {}
        }
    }
}

fn drain_file_events(state: &mut DriverState, file_events_pull: &PullChannel) {
    while let Ok(Some(msg)) = file_events_pull.try_pull() {
        match (msg.tag.as_str(), msg.args.as_slice()) {
            ("FILE_VERIFIED", [Value::Int(slave_id), Value::Str(filename)]) => {
                state.record_file_verified(*slave_id as u64, filename);
            }
            ("FILE_REJECTED", [Value::Int(slave_id), Value::Str(filename)]) => {
                state.record_file_rejected(*slave_id as u64, filename);
            }
            _ => {}
        }
    }
}

/// Drop a session whose heartbeat has gone silent past its own
/// master-timeout. If it was mid-transfer, notify JUGGLER over the internal
/// `ABORT_TRANSFER` push channel so the partial file doesn't sit orphaned
/// until (or unless) the builder ever reconnects (§4.5).
fn sweep_expired(state: &mut DriverState, juggler_abort: &PushChannel) {
    let now = Instant::now();
    for slave_id in state.sessions.expired(now) {
        tracing::warn!(slave_id, "builder session expired, discarding");
        let session = state.sessions.remove(slave_id);
        if let Some(job) = session.as_ref().and_then(|s| s.current.clone()) {
            state.in_flight.remove(&(job.package, job.version, job.abi));
        }
        if session.is_some_and(|s| s.pending_send.is_some()) {
            match Message::new("ABORT_TRANSFER", vec![Value::Int(slave_id as i64)]) {
                Ok(message) => {
                    if let Err(e) = juggler_abort.push(message) {
                        tracing::warn!(slave_id, error = %e, "failed to notify juggler of expired transfer");
                    }
                }
                Err(e) => tracing::warn!(slave_id, error = %e, "failed to build abort-transfer message"),
            }
        }
    }
}
