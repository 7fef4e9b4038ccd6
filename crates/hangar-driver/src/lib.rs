//! Builder-protocol coordinator for the hangar build-farm master.
//!
//! DRIVER owns the map of live builder sessions and the state machine that
//! decides, on every incoming message, what a builder should do next. The
//! session map lives on a single thread (see [`server`]); every other
//! connection communicates with it over a channel rather than sharing
//! memory.

pub mod error;
pub mod protocol;
pub mod queue;
pub mod server;
pub mod session;
pub mod state;


pub use error::DriverError;
pub use server::{accept_connection, spawn, DriverHandle};
pub use session::{SlaveSession, SlaveState};
pub use state::DriverState;
