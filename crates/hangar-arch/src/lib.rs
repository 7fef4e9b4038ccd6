//! Periodic pending-build queue planner for the hangar build-farm master.
//!
//! ARCH asks ORACLE for the current per-ABI pending queue, bounds it to the
//! top K rows per ABI, and publishes the snapshot to DRIVER over PUSH/PULL.
//! The satisfaction rules that decide which (package, version, abi) triples
//! are still pending — none-satisfies-all, own-ABI-satisfies, any-attempt-
//! satisfies, smallest-unsatisfied-ABI tie-break — are implemented once in
//! [`hangar_types::queue::compute_pending_queue`] and invoked server-side by
//! the `get_pending_queue` stored function ORACLE calls; ARCH's own job is
//! pacing the fetch and enforcing the memory bound on what comes back.

pub mod error;
pub mod plan;
pub mod tick;

pub use error::ArchError;
pub use plan::truncate_top_k;
pub use tick::{run, tick as run_tick, ArchOptions};
