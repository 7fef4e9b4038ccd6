//! CHASE: the loopback-only admin endpoint for importing artifacts from
//! local disk, removing or skipping versions, and triggering out-of-band
//! page re-renders, bypassing the builder-facing FETCH/CHUNK transfer path
//! entirely.

pub mod error;
pub mod protocol;
pub mod server;

pub use error::ChaseError;
pub use server::{run, ChaseOptions};
