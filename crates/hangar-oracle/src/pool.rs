use std::str::FromStr;
use std::sync::mpsc;
use std::thread;

use postgres::{Config as PgConfig, NoTls};
use r2d2::{CustomizeConnection, Pool};
use r2d2_postgres::PostgresConnectionManager;

use crate::error::OracleError;
use crate::op::{OracleOp, OracleReply};

type PgPool = Pool<PostgresConnectionManager<NoTls>>;

/// Pins every pooled connection's `search_path` to the application schema
/// only, so no caller-supplied schema can ever be interpolated into SQL
/// elsewhere in this crate.
#[derive(Debug)]
struct PinSearchPath;

impl CustomizeConnection<postgres::Client, postgres::Error> for PinSearchPath {
    fn on_acquire(&self, conn: &mut postgres::Client) -> Result<(), postgres::Error> {
        conn.simple_query("SET search_path TO hangar, pg_catalog")?;
        Ok(())
    }
}

/// A request delivered to one worker thread: the operation plus a one-shot
/// reply channel.
pub struct WorkerRequest {
    pub op: OracleOp,
    pub reply_tx: mpsc::Sender<Result<OracleReply, OracleError>>,
}

/// A handle LB holds for one idle worker: the channel to hand it its next
/// request.
pub struct WorkerHandle {
    pub id: usize,
    pub sender: mpsc::Sender<WorkerRequest>,
}

/// Spawns a fixed pool of worker threads, each holding its own pooled
/// connection checkout for the duration of one operation. Workers are
/// stateless between requests: `execute` opens and commits its own
/// transaction.
pub struct OraclePool {
    pub workers: Vec<WorkerHandle>,
}

impl OraclePool {
    pub fn new(dsn: &str, pool_size: u32) -> Result<OraclePool, OracleError> {
        let pg_config = PgConfig::from_str(dsn).map_err(OracleError::Postgres)?;
        let manager = PostgresConnectionManager::new(pg_config, NoTls);
        let pool: PgPool = Pool::builder()
            .max_size(pool_size)
            .connection_customizer(Box::new(PinSearchPath))
            .build(manager)
            .map_err(OracleError::Pool)?;

        let workers = (0..pool_size as usize)
            .map(|id| spawn_worker(id, pool.clone()))
            .collect();

        Ok(OraclePool { workers })
    }
}

fn spawn_worker(id: usize, pool: PgPool) -> WorkerHandle {
    let (sender, receiver) = mpsc::channel::<WorkerRequest>();
    thread::Builder::new()
        .name(format!("hangar-oracle-worker-{id}"))
        .spawn(move || {
            for request in receiver {
                let result = pool
                    .get()
                    .map_err(OracleError::Pool)
                    .and_then(|mut conn| request.op.execute(&mut conn));
                if result.is_err() {
                    tracing::warn!(worker = id, "oracle operation failed");
                }
                // The LB side owns the request/reply correlation; a dropped
                // receiver just means the client gave up waiting.
                let _ = request.reply_tx.send(result);
            }
        })
        .expect("failed to spawn oracle worker thread");

    WorkerHandle { id, sender }
}
