use std::collections::VecDeque;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::OracleError;
use crate::op::{OracleOp, OracleReply};
use crate::pool::{OraclePool, WorkerHandle, WorkerRequest};

/// A request arriving at the load balancer from an in-process caller (ARCH,
/// GAZER, DRIVER, ...), with the reply routed back on its own channel.
struct LbRequest {
    op: OracleOp,
    reply_tx: mpsc::Sender<Result<OracleReply, OracleError>>,
    parked_since: Option<Instant>,
}

/// The front door every ORACLE caller holds. Cloning is cheap; every clone
/// shares the same worker pool and idle set.
#[derive(Clone)]
pub struct OracleClient {
    sender: mpsc::Sender<LbRequest>,
}

impl OracleClient {
    /// Spawn the load balancer thread and its worker pool, returning a
    /// client handle. `timeout` bounds how long a parked request waits for
    /// an idle worker before failing with [`OracleError::Unavailable`].
    pub fn spawn(dsn: &str, pool_size: u32, timeout: Duration) -> Result<OracleClient, OracleError> {
        let pool = OraclePool::new(dsn, pool_size)?;
        let (sender, receiver) = mpsc::channel::<LbRequest>();
        thread::Builder::new()
            .name("hangar-oracle-lb".into())
            .spawn(move || run_lb(pool.workers, receiver, timeout))
            .expect("failed to spawn oracle LB thread");
        Ok(OracleClient { sender })
    }

    /// Spawn using the database section of a loaded [`hangar_config::Config`].
    pub fn from_config(config: &hangar_config::Config) -> Result<OracleClient, OracleError> {
        OracleClient::spawn(&config.database.dsn, config.database.pool_size, config.timeouts.db_timeout)
    }

    /// Submit an operation and block for its structured reply.
    pub fn submit(&self, op: OracleOp) -> Result<OracleReply, OracleError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.sender
            .send(LbRequest { op, reply_tx, parked_since: None })
            .map_err(|_| OracleError::Unavailable("load balancer thread gone".into()))?;
        reply_rx
            .recv()
            .map_err(|_| OracleError::Unavailable("load balancer dropped the request".into()))?
    }
}

/// A worker with its in-flight request's reply channel, held until the
/// worker answers. The worker is never re-inserted into the idle set before
/// that answer has been routed back to the caller.
struct InFlight {
    worker: WorkerHandle,
    worker_reply_rx: mpsc::Receiver<Result<OracleReply, OracleError>>,
    caller_reply_tx: mpsc::Sender<Result<OracleReply, OracleError>>,
}

fn run_lb(workers: Vec<WorkerHandle>, receiver: mpsc::Receiver<LbRequest>, timeout: Duration) {
    let mut idle: VecDeque<WorkerHandle> = workers.into_iter().collect();
    let mut parked: VecDeque<LbRequest> = VecDeque::new();
    let mut in_flight: Vec<InFlight> = Vec::new();

    loop {
        match receiver.recv_timeout(Duration::from_millis(50)) {
            Ok(mut request) => {
                request.parked_since = Some(Instant::now());
                dispatch_or_park(request, &mut idle, &mut parked, &mut in_flight);
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        poll_in_flight(&mut in_flight, &mut idle, &mut parked);
        expire_stale_parked(&mut parked, timeout);
    }
}

fn dispatch_or_park(
    request: LbRequest,
    idle: &mut VecDeque<WorkerHandle>,
    parked: &mut VecDeque<LbRequest>,
    in_flight: &mut Vec<InFlight>,
) {
    match idle.pop_front() {
        Some(worker) => in_flight.push(hand_off(worker, request)),
        None => parked.push_back(request),
    }
}

/// Exactly one outstanding request per worker: `hand_off` is the only place
/// a `WorkerHandle` is given a request, and the worker is not visible to
/// the idle set again until its [`InFlight`] slot resolves.
fn hand_off(worker: WorkerHandle, request: LbRequest) -> InFlight {
    let (worker_reply_tx, worker_reply_rx) = mpsc::channel();
    // A disconnected worker channel still produces an `InFlight` slot; the
    // next poll will observe the immediate disconnect and report
    // `Unavailable` rather than silently dropping the request.
    let _ = worker.sender.send(WorkerRequest { op: request.op, reply_tx: worker_reply_tx });
    InFlight {
        worker,
        worker_reply_rx,
        caller_reply_tx: request.reply_tx,
    }
}

fn poll_in_flight(in_flight: &mut Vec<InFlight>, idle: &mut VecDeque<WorkerHandle>, parked: &mut VecDeque<LbRequest>) {
    let mut pending = Vec::with_capacity(in_flight.len());
    let mut freed_workers = Vec::new();

    for slot in in_flight.drain(..) {
        match slot.worker_reply_rx.try_recv() {
            Ok(result) => {
                let _ = slot.caller_reply_tx.send(result);
                freed_workers.push(slot.worker);
            }
            Err(mpsc::TryRecvError::Empty) => pending.push(slot),
            Err(mpsc::TryRecvError::Disconnected) => {
                let _ = slot
                    .caller_reply_tx
                    .send(Err(OracleError::Unavailable("worker crashed mid-request".into())));
                freed_workers.push(slot.worker);
            }
        }
    }
    *in_flight = pending;

    for worker in freed_workers {
        match parked.pop_front() {
            Some(next) => in_flight.push(hand_off(worker, next)),
            None => idle.push_back(worker),
        }
    }
}

fn expire_stale_parked(parked: &mut VecDeque<LbRequest>, timeout: Duration) {
    while let Some(front) = parked.front() {
        let waited = front.parked_since.map(|t| t.elapsed()).unwrap_or_default();
        if waited < timeout {
            break;
        }
        let request = parked.pop_front().expect("front just checked");
        let _ = request
            .reply_tx
            .send(Err(OracleError::Unavailable("no oracle worker became available in time".into())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_set_starts_empty_for_zero_workers() {
        let idle: VecDeque<WorkerHandle> = VecDeque::new();
        assert!(idle.is_empty());
    }
}
