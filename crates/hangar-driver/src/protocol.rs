use chrono::Utc;

use hangar_oracle::{OracleClient, OracleOp, OracleReply};
use hangar_transport::message::decode_payload;
use hangar_transport::value::Value;
use hangar_transport::Message;
use hangar_types::{BuilderCaps, BuilderStats, Build, BuildFile, FileInfo};

use crate::error::DriverError;
use crate::queue::pop_for_abi;
use crate::session::{CurrentJob, PendingSend, SlaveState};
use crate::state::DriverState;

fn expect_str(args: &[Value], index: usize) -> Result<String, DriverError> {
    match args.get(index) {
        Some(Value::Str(s)) => Ok(s.clone()),
        _ => Err(DriverError::UnexpectedMessage { tag: "<field>".into(), state: "any" }),
    }
}

/// HELLO arrives on a connection before DRIVER has allocated a slave id.
/// Answers with ACK carrying the new id and the configured upstream URL.
pub fn handle_hello(state: &mut DriverState, args: &[Value]) -> Result<(u64, Message), DriverError> {
    let caps = BuilderCaps {
        interpreter: expect_str(args, 0)?,
        abi: expect_str(args, 1)?,
        platform: expect_str(args, 2)?,
        label: expect_str(args, 3)?,
        os_name: expect_str(args, 4)?,
        os_version: expect_str(args, 5)?,
        board_revision: expect_str(args, 6)?,
    };
    // args[7] is a protocol/schema version int; args[8] is the builder's
    // reported master-timeout. A version mismatch is fatal at HELLO (§6).
    let master_timeout = match args.get(8) {
        Some(Value::Duration(d)) => d.clone().into(),
        _ => return Err(DriverError::UnexpectedMessage { tag: "HELLO".into(), state: "handshake" }),
    };

    let slave_id = state.sessions.allocate(caps, master_timeout);
    let reply = Message::new(
        "ACK",
        vec![Value::Int(slave_id as i64), Value::Str(state.upstream_url.clone())],
    )?;
    Ok((slave_id, reply))
}

/// IDLE: consult the queue for the slave's ABI and either dispatch a build,
/// tell it to sleep, or kill it if an operator has armed that slave.
pub fn handle_idle(state: &mut DriverState, slave_id: u64, args: &[Value]) -> Result<Message, DriverError> {
    let _stats: BuilderStats = decode_payload(args.first().ok_or_else(|| DriverError::UnexpectedMessage {
        tag: "IDLE".into(),
        state: "idle",
    })?)?;

    let session = state.sessions.get_mut(slave_id).ok_or(DriverError::UnknownSlave(slave_id))?;
    session.touch();

    if session.kill_armed {
        session.state = SlaveState::Goodbye;
        return Ok(Message::bare("DIE")?);
    }

    if state.paused {
        return Ok(Message::bare("SLEEP")?);
    }

    let abi = session.caps.abi.clone();
    match pop_for_abi(&state.queue, &abi, &mut state.in_flight) {
        Some((package, version)) => {
            let session = state.sessions.get_mut(slave_id).unwrap();
            session.state = SlaveState::Building;
            session.current = Some(CurrentJob {
                package: package.clone(),
                version: version.clone(),
                abi,
                started_at: Utc::now(),
            });
            Ok(Message::new("BUILD", vec![Value::Str(package), Value::Str(version)])?)
        }
        None => Ok(Message::bare("SLEEP")?),
    }
}

/// BUSY: a heartbeat from a build in progress. Replies DONE (forcing an
/// abort) only if an operator has armed early-termination for this slave.
pub fn handle_busy(state: &mut DriverState, slave_id: u64, args: &[Value]) -> Result<Message, DriverError> {
    let _stats: BuilderStats = decode_payload(args.first().ok_or_else(|| DriverError::UnexpectedMessage {
        tag: "BUSY".into(),
        state: "building",
    })?)?;

    let session = state.sessions.get_mut(slave_id).ok_or(DriverError::UnknownSlave(slave_id))?;
    session.touch();

    if session.cancel_armed {
        session.cancel_armed = false;
        session.state = SlaveState::Idle;
        if let Some(job) = session.current.take() {
            state.in_flight.remove(&(job.package, job.version, job.abi));
        }
        return Ok(Message::bare("DONE")?);
    }

    Ok(Message::bare("CONT")?)
}

/// BUILT: record the result via ORACLE, then either start the send loop
/// (success with at least one file) or go back to idle (failure, or a
/// success ORACLE rejects for carrying zero files). On success also returns
/// every file JUGGLER should expect, announced up front rather than one at
/// a time as `SEND` advances.
pub fn handle_built(
    state: &mut DriverState,
    oracle: &OracleClient,
    slave_id: u64,
    args: &[Value],
) -> Result<(Message, Vec<FileInfo>), DriverError> {
    let success = match args.first() {
        Some(Value::Bool(b)) => *b,
        _ => return Err(DriverError::UnexpectedMessage { tag: "BUILT".into(), state: "building" }),
    };
    let duration: std::time::Duration = match args.get(1) {
        Some(Value::Duration(d)) => d.clone().into(),
        _ => return Err(DriverError::UnexpectedMessage { tag: "BUILT".into(), state: "building" }),
    };
    let log = expect_str(args, 2)?;
    let files_payload = args.get(3).ok_or_else(|| DriverError::UnexpectedMessage {
        tag: "BUILT".into(),
        state: "building",
    })?;

    let session = state.sessions.get_mut(slave_id).ok_or(DriverError::UnknownSlave(slave_id))?;
    session.touch();
    let job = session.current.take().ok_or_else(|| DriverError::UnexpectedMessage {
        tag: "BUILT".into(),
        state: "building",
    })?;
    state.in_flight.remove(&(job.package.clone(), job.version.clone(), job.abi.clone()));
    let builder_id = format!("slave-{slave_id}");

    if !success {
        oracle.submit(OracleOp::LogBuildFailure {
            package: job.package,
            version: job.version,
            abi: job.abi,
            builder_id,
            started_at: job.started_at,
            duration_millis: duration.as_millis() as i64,
            output: log,
        })?;
        let session = state.sessions.get_mut(slave_id).unwrap();
        session.state = SlaveState::Idle;
        return Ok((Message::bare("DONE")?, Vec::new()));
    }

    let files: Vec<FileInfo> = decode_payload(files_payload)?;
    let mut build_files = Vec::with_capacity(files.len());
    let mut dependencies = Vec::new();
    for file in &files {
        build_files.push(BuildFile {
            filename: file.filename.clone(),
            build_id: 0,
            size: file.size,
            sha256: file.sha256.clone(),
            tags: file.tags.clone(),
            requires_python: file.requires_python.clone(),
        });
        dependencies.extend(file.dependencies.clone());
    }

    let build = Build {
        id: 0,
        package: job.package,
        version: job.version,
        abi: job.abi,
        builder_id,
        started_at: job.started_at,
        duration,
        success: true,
    };

    match oracle.submit(OracleOp::LogBuildSuccess { build, files: build_files, dependencies }) {
        Ok(OracleReply::BuildId(_)) => {
            let filenames: Vec<String> = files.iter().map(|f| f.filename.clone()).collect();
            let first = filenames[0].clone();
            let session = state.sessions.get_mut(slave_id).unwrap();
            session.state = SlaveState::Sending;
            session.pending_send = Some(PendingSend { filenames, next: 0 });
            Ok((Message::new("SEND", vec![Value::Str(first)])?, files))
        }
        Ok(_) => unreachable!("LogBuildSuccess always returns OracleReply::BuildId"),
        Err(e) => {
            tracing::warn!(error = %e, "failed to record successful build");
            let session = state.sessions.get_mut(slave_id).unwrap();
            session.state = SlaveState::Idle;
            Ok((Message::bare("DONE")?, Vec::new()))
        }
    }
}

/// SENT: the builder finished streaming one file's bytes to JUGGLER. Advance
/// to the next file once JUGGLER has confirmed the hash; if JUGGLER rejected
/// it, or hasn't reported yet, retry the same filename (idempotent — the
/// builder may reopen the file until it gets DONE). A filename rejected
/// three times in a row fails the whole build and drops the session (§7) —
/// the builder is not trusted to keep producing a bad file forever.
pub fn handle_sent(
    state: &mut DriverState,
    oracle: &OracleClient,
    slave_id: u64,
) -> Result<(Message, Option<String>), DriverError> {
    let session = state.sessions.get_mut(slave_id).ok_or(DriverError::UnknownSlave(slave_id))?;
    session.touch();
    let package = session.current.as_ref().map(|j| j.package.clone());

    let send = session.pending_send.as_mut().ok_or_else(|| DriverError::UnexpectedMessage {
        tag: "SENT".into(),
        state: "sending",
    })?;
    let filename = send.current_filename().ok_or_else(|| DriverError::UnexpectedMessage {
        tag: "SENT".into(),
        state: "sending",
    })?.to_string();

    if !session.verified.contains(&filename) {
        if session.rejected.contains(&filename) {
            let strikes = *session.rejection_counts.get(&filename).unwrap_or(&0);
            if strikes >= 3 {
                let job = session.current.clone().ok_or_else(|| DriverError::UnexpectedMessage {
                    tag: "SENT".into(),
                    state: "sending",
                })?;
                tracing::warn!(slave_id, filename, strikes, "file failed hash verification three times, failing build");
                oracle.submit(OracleOp::LogBuildFailure {
                    package: job.package.clone(),
                    version: job.version.clone(),
                    abi: job.abi.clone(),
                    builder_id: format!("slave-{slave_id}"),
                    started_at: job.started_at,
                    duration_millis: 0,
                    output: format!("file {filename:?} failed hash verification after {strikes} attempts"),
                })?;
                state.in_flight.remove(&(job.package, job.version, job.abi));
                state.sessions.remove(slave_id);
                return Ok((Message::bare("DIE")?, None));
            }
            tracing::warn!(slave_id, filename, strikes, "juggler rejected file, retrying");
        } else {
            tracing::trace!(slave_id, filename, "juggler has not confirmed file yet, retrying");
        }
        return Ok((Message::new("SEND", vec![Value::Str(filename)])?, None));
    }

    let send = session.pending_send.as_mut().unwrap();
    send.next += 1;
    if send.is_done() {
        session.pending_send = None;
        session.state = SlaveState::Idle;
        session.current = None;
        Ok((Message::bare("DONE")?, package))
    } else {
        let next = send.current_filename().unwrap().to_string();
        Ok((Message::new("SEND", vec![Value::Str(next)])?, None))
    }
}

/// BYE: the builder is disconnecting voluntarily. Drop its session.
pub fn handle_bye(state: &mut DriverState, slave_id: u64) {
    if let Some(job) = state.sessions.remove(slave_id).and_then(|s| s.current) {
        state.in_flight.remove(&(job.package, job.version, job.abi));
    }
}
