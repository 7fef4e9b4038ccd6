//! Pooled Postgres access for the hangar build-farm master.
//!
//! ORACLE presents a fixed, closed set of named operations ([`OracleOp`]),
//! each executed as one transaction against a connection checked out from
//! an `r2d2`-pooled `postgres::Client`. [`OracleClient`] is the load
//! balancer front door every other component holds: it maintains an
//! idle-worker set and a FIFO of parked requests so that at most one
//! request is ever outstanding per worker at a time.

pub mod error;
pub mod fake;
pub mod lb;
pub mod op;
pub mod pool;

pub use error::OracleError;
pub use fake::FakeOracle;
pub use lb::OracleClient;
pub use op::{OracleOp, OracleReply, ProjectData, Statistics};
