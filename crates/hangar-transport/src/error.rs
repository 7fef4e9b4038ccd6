use thiserror::Error;

use crate::value::FieldKind;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown message tag: {0:?}")]
    UnknownTag(String),

    #[error("schema violation for tag {tag:?}: expected {expected} args of kind {expected_kind:?}, got {got} args")]
    SchemaViolation {
        tag: String,
        expected: usize,
        expected_kind: Vec<FieldKind>,
        got: usize,
    },

    #[error("field {index} of tag {tag:?} has the wrong kind: expected {expected:?}")]
    FieldKindMismatch {
        tag: String,
        index: usize,
        expected: FieldKind,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("peer disconnected")]
    Disconnected,
}
