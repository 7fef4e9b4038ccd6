//! SCRIBE renders the simple-index, project pages, home page, search index,
//! and JSON API documents to disk; SECRETARY (the [`secretary`] module)
//! debounces bursts of render requests from DRIVER/CHASE/BIG_BRO into one
//! render per package per quiet period.

pub mod atomic;
pub mod error;
pub mod render;
pub mod secretary;
pub mod writer;

pub use error::ScribeError;
pub use secretary::SecretaryOptions;
pub use writer::Scribe;
