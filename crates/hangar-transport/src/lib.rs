//! The wire protocol substrate every hangar master task and builder speaks.
//!
//! Messages are length-prefixed `serde_json` frames validated against a
//! fixed schema registry (see [`schema::schema_for`]) rather than against
//! the bytes themselves, so a `Timestamp` and a bare `Int` are never
//! confused even though both encode as JSON numbers. Three socket roles are
//! built on top of this framing: [`req_rep`] (strict alternating
//! request/reply), [`router_dealer`] (multi-party, many requests in
//! flight), and [`push_pull`] (one-way fan-out).

pub mod error;
pub mod frame;
pub mod message;
pub mod push_pull;
pub mod req_rep;
pub mod router_dealer;
pub mod schema;
pub mod value;

pub use error::TransportError;
pub use frame::{read_frame, read_routed_frame, write_frame, write_routed_frame};
pub use message::{decode_payload, encode_payload, Message};
pub use schema::{schema_for, Schema};
pub use value::{FieldKind, Value};
