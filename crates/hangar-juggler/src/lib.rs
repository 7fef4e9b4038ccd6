//! Pipelined, out-of-order-tolerant file transfer from builders into the
//! packages tree, with SHA-256 verification and atomic publish — the file
//! socket half of the builder protocol that DRIVER does not speak.

pub mod error;
pub mod protocol;
pub mod rangeset;
pub mod server;
pub mod session;
pub mod table;

pub use error::JugglerError;
pub use protocol::JugglerEvent;
pub use server::{accept_connection, spawn, JugglerHandle, JugglerOptions};
pub use session::{ChunkOutcome, Transfer};
pub use table::JugglerTable;
