//! Periodic statistics collection for the hangar build-farm master.
//!
//! BIG_BRO asks ORACLE for its SQL-aggregated counters, adds ARCH's per-ABI
//! queue depth and DRIVER's live session count (both gathered in-process
//! rather than fed from those tasks directly), and publishes the composite
//! to SCRIBE and to SUPERVISOR's status channel.

pub mod error;
pub mod tick;

pub use error::BigBroError;
pub use tick::{collect, run, tick as run_tick, BigBroOptions};
